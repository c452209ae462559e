use std::fmt;

use crate::GeoPoint;

/// Category label used by park-proximity scoring.
pub const PARK_CATEGORY: &str = "park";

/// Category label used by transit-density scoring.
pub const TRANSIT_CATEGORY: &str = "transit";

/// Identifier of an amenity in the external catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct AmenityId(pub u64);

impl fmt::Display for AmenityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A point of interest used as input to proximity-based calculators.
///
/// # Examples
/// ```
/// use homescore_core::{Amenity, AmenityId, GeoPoint, PARK_CATEGORY};
///
/// # fn main() -> Result<(), homescore_core::GeoPointError> {
/// let park = Amenity::new(AmenityId(1), "Seoul Forest", PARK_CATEGORY, GeoPoint::new(37.544, 127.037)?)
///     .with_area_sq_m(480_994.0);
/// assert!(park.is_category(PARK_CATEGORY));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Amenity {
    /// Catalog identifier.
    pub id: AmenityId,
    /// Display name.
    pub name: String,
    /// Free-form category such as `park` or `transit`.
    pub category: String,
    /// Location of the amenity.
    pub location: GeoPoint,
    /// Footprint in square metres, when the catalog records one.
    pub area_sq_m: Option<f64>,
}

impl Amenity {
    /// Construct an amenity without a recorded footprint.
    #[must_use]
    pub fn new(
        id: AmenityId,
        name: impl Into<String>,
        category: impl Into<String>,
        location: GeoPoint,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            category: category.into(),
            location,
            area_sq_m: None,
        }
    }

    /// Attach a footprint in square metres.
    #[must_use]
    pub fn with_area_sq_m(mut self, area_sq_m: f64) -> Self {
        self.area_sq_m = Some(area_sq_m);
        self
    }

    /// Report whether the amenity belongs to `category` (ASCII case-insensitive).
    #[must_use]
    pub fn is_category(&self, category: &str) -> bool {
        self.category.eq_ignore_ascii_case(category)
    }
}
