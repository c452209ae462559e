//! Score types and the records the pipeline persists for them.

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::ListingId;

/// Identifier of a score type such as park proximity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct ScoreTypeId(pub u64);

impl fmt::Display for ScoreTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A named category of scoring.
///
/// Score types are created and retired by configuration; the pipeline only
/// reads them.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScoreType {
    /// Stable identifier.
    pub id: ScoreTypeId,
    /// Short display name.
    pub name: String,
    /// Longer explanation shown alongside the score.
    pub description: String,
    /// Inactive types are skipped by normalization.
    #[cfg_attr(feature = "serde", serde(default = "active_by_default"))]
    pub active: bool,
}

#[cfg(feature = "serde")]
const fn active_by_default() -> bool {
    true
}

impl ScoreType {
    /// Construct an active score type.
    #[must_use]
    pub fn new(id: ScoreTypeId, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: description.into(),
            active: true,
        }
    }

    /// Return a copy with the active flag cleared.
    #[must_use]
    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Errors returned by [`RawScore::new`].
#[derive(Debug, Clone, Copy, Error, PartialEq)]
pub enum RawScoreError {
    /// The value was negative, NaN or infinite.
    #[error("raw score {value} for listing {listing_id} must be finite and non-negative")]
    Invalid {
        /// Listing the score belongs to.
        listing_id: ListingId,
        /// Rejected value.
        value: f64,
    },
}

/// Un-normalized calculator output for one (listing, score type) pair.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawScore {
    /// Listing the score was computed for.
    pub listing_id: ListingId,
    /// Score type that produced the value.
    pub score_type_id: ScoreTypeId,
    /// Calculator output; always finite and `>= 0`.
    pub raw_score: f64,
    /// When the value was computed.
    pub computed_at: DateTime<Utc>,
}

impl RawScore {
    /// Validate and construct a [`RawScore`].
    ///
    /// # Errors
    /// Returns [`RawScoreError::Invalid`] when `raw_score` is negative or not
    /// finite.
    pub fn new(
        listing_id: ListingId,
        score_type_id: ScoreTypeId,
        raw_score: f64,
        computed_at: DateTime<Utc>,
    ) -> Result<Self, RawScoreError> {
        if !raw_score.is_finite() || raw_score < 0.0 {
            return Err(RawScoreError::Invalid {
                listing_id,
                value: raw_score,
            });
        }
        Ok(Self {
            listing_id,
            score_type_id,
            raw_score,
            computed_at,
        })
    }

    /// Upsert key shared by raw and normalized records.
    #[must_use]
    pub const fn key(&self) -> (ListingId, ScoreTypeId) {
        (self.listing_id, self.score_type_id)
    }
}

/// Normalized view of a score record.
///
/// `normalized_score` is `None` until the normalization stage has processed
/// the record's score type at least once.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NormalizedScore {
    /// Listing the score belongs to.
    pub listing_id: ListingId,
    /// Score type of the record.
    pub score_type_id: ScoreTypeId,
    /// Full-precision normalized value.
    pub normalized_score: Option<f64>,
}

impl NormalizedScore {
    /// Report whether normalization has run for this record.
    #[must_use]
    pub const fn is_normalized(&self) -> bool {
        self.normalized_score.is_some()
    }

    /// The normalized value rounded half-up to two decimal places.
    ///
    /// # Examples
    /// ```
    /// use homescore_core::{ListingId, NormalizedScore, ScoreTypeId};
    ///
    /// let score = NormalizedScore {
    ///     listing_id: ListingId(1),
    ///     score_type_id: ScoreTypeId(1),
    ///     normalized_score: Some(7.126),
    /// };
    /// assert_eq!(score.rounded(), Some(7.13));
    /// ```
    #[must_use]
    pub fn rounded(&self) -> Option<f64> {
        self.normalized_score.map(|value| round_half_up(value, 2))
    }
}

/// Round `value` half-up to `decimals` places.
///
/// The scaled value is nudged by a few ULPs before rounding so decimal
/// literals such as `2.675`, which are stored fractionally below the midpoint,
/// still round up as their decimal spelling suggests.
#[must_use]
#[expect(
    clippy::float_arithmetic,
    reason = "presentation rounding scales by a power of ten"
)]
pub fn round_half_up(value: f64, decimals: i32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let factor = 10_f64.powi(decimals);
    let scaled = value * factor;
    let nudged = scaled + scaled.abs() * f64::EPSILON * 4.0;
    // `f64::round` resolves ties away from zero, so negative midpoints use
    // `floor(x + 0.5)` to keep rounding towards positive infinity.
    let rounded = if nudged >= 0.0 {
        nudged.round()
    } else {
        (nudged + 0.5).floor()
    };
    rounded / factor
}
