use std::fmt;

use crate::GeoPoint;

/// Identifier of a listing produced by the collection subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct ListingId(pub u64);

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A real-estate listing consumed read-only by the scoring pipeline.
///
/// # Examples
/// ```
/// use homescore_core::{GeoPoint, Listing, ListingId};
///
/// # fn main() -> Result<(), homescore_core::GeoPointError> {
/// let listing = Listing::new(ListingId(7), GeoPoint::new(37.5, 127.0)?, "naver")
///     .with_name("Riverside Apartments");
/// assert_eq!(listing.name.as_deref(), Some("Riverside Apartments"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Listing {
    /// Stable identifier.
    pub id: ListingId,
    /// Validated location of the property.
    pub location: GeoPoint,
    /// Platform the listing was collected from.
    pub source: String,
    /// Identifier assigned by the source platform, when known.
    pub external_id: Option<String>,
    /// Human-readable name, when known.
    pub name: Option<String>,
}

impl Listing {
    /// Construct a listing with only the required metadata.
    #[must_use]
    pub fn new(id: ListingId, location: GeoPoint, source: impl Into<String>) -> Self {
        Self {
            id,
            location,
            source: source.into(),
            external_id: None,
            name: None,
        }
    }

    /// Attach the source platform's identifier.
    #[must_use]
    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    /// Attach a display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}
