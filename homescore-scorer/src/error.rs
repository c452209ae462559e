//! Error types raised while scoring and normalizing listings.
#![forbid(unsafe_code)]

use homescore_core::{ListingId, StoreError};
use thiserror::Error;

/// Failure of one (listing, calculator) evaluation.
///
/// These never abort a stage; they are logged and collected in the stage
/// report.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CalculationError {
    /// The calculator produced a negative or non-finite value.
    #[error("invalid raw score {value} for listing {listing_id}")]
    InvalidScore {
        /// Listing being scored.
        listing_id: ListingId,
        /// Rejected value.
        value: f64,
    },
    /// Amenities around the listing could not be looked up.
    #[error("amenity lookup failed for listing {listing_id}: {reason}")]
    AmenityLookup {
        /// Listing being scored.
        listing_id: ListingId,
        /// Description of the lookup failure.
        reason: String,
    },
}

/// Errors raised by [`ScoreNormalizer`](crate::ScoreNormalizer)
/// implementations.
#[derive(Debug, Clone, Copy, Error, PartialEq)]
pub enum NormalizeError {
    /// There were no raw scores to derive bounds from.
    #[error("score population is empty")]
    EmptyScorePopulation,
    /// A raw score was NaN or infinite.
    #[error("score {value} is not finite")]
    NonFiniteScore {
        /// Offending value.
        value: f64,
    },
}

/// Errors that stop a stage, or one score type within the normalization
/// stage.
#[derive(Debug, Error)]
pub enum StageError {
    /// The store stayed unavailable through every retry.
    #[error("{operation} failed after {attempts} attempts")]
    RetriesExhausted {
        /// Operation being retried.
        operation: &'static str,
        /// Number of attempts made, including the first.
        attempts: u32,
        /// Last transient error observed.
        #[source]
        source: StoreError,
    },
    /// The store reported a permanent failure; no retry was attempted.
    #[error("{operation} failed")]
    Store {
        /// Operation that failed.
        operation: &'static str,
        /// Store error.
        #[source]
        source: StoreError,
    },
    /// Normalizing a score population failed.
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

impl StageError {
    /// Underlying store error, if the failure came from the store.
    #[must_use]
    pub const fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::RetriesExhausted { source, .. } | Self::Store { source, .. } => Some(source),
            Self::Normalize(_) => None,
        }
    }
}
