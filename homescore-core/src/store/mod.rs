//! Collaborator traits between the scoring pipeline and its data store.
//!
//! The pipeline never assumes a storage technology. It reads listings in
//! keyset-paginated pages, looks amenities up by radius, and mutates scores
//! only through upserts keyed by `(listing_id, score_type_id)`, which keeps
//! repeated runs idempotent.

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::path::PathBuf;

use thiserror::Error;

use crate::{
    Amenity, GeoPoint, GeoPointError, Listing, ListingId, NormalizedScore, RawScore, ScoreType,
    ScoreTypeId,
};

mod amenity_index;
#[cfg(feature = "store-sqlite")]
mod sqlite;

pub use amenity_index::AmenityIndex;
#[cfg(feature = "store-sqlite")]
pub use sqlite::SqliteScoreStore;

/// Boxed error used to carry backend-specific failure causes.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors raised by store collaborators.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Opening the backing store failed.
    #[error("failed to open store at {path:?}")]
    Open {
        /// Location of the store.
        path: PathBuf,
        /// Backend error.
        #[source]
        source: BoxError,
    },
    /// The store could not be reached; the operation may succeed if retried.
    #[error("store unavailable during {operation}")]
    Unavailable {
        /// Description of the attempted operation.
        operation: &'static str,
        /// Backend error.
        #[source]
        source: BoxError,
    },
    /// The store rejected a query; retrying will not help.
    #[error("failed to {operation}")]
    Query {
        /// Description of the attempted operation.
        operation: &'static str,
        /// Backend error.
        #[source]
        source: BoxError,
    },
    /// A persisted row could not be turned into a domain value.
    #[error("stored {entity} {id} is invalid: {reason}")]
    InvalidRow {
        /// Kind of row, e.g. `listing`.
        entity: &'static str,
        /// Row identifier as stored.
        id: i64,
        /// Description of the problem.
        reason: String,
    },
}

impl StoreError {
    /// Build an [`StoreError::Unavailable`] from any error or message.
    pub fn unavailable(operation: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Unavailable {
            operation,
            source: source.into(),
        }
    }

    /// Build a [`StoreError::Query`] from any error or message.
    pub fn query(operation: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Query {
            operation,
            source: source.into(),
        }
    }

    /// Report whether retrying the failed operation could succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// A listing whose stored coordinates failed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedListing {
    /// Identifier of the skipped listing.
    pub id: ListingId,
    /// Validation failure.
    pub error: GeoPointError,
}

/// One page of listings returned by [`ListingSource::listings_after`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingPage {
    /// Valid listings in ascending id order.
    pub listings: Vec<Listing>,
    /// Rows skipped because their coordinates were invalid.
    pub rejected: Vec<RejectedListing>,
    /// Highest id read in this page, valid or rejected. `None` when the page
    /// is empty, which signals the end of the sequence.
    pub next_cursor: Option<ListingId>,
}

impl ListingPage {
    /// Report whether the page read no rows at all.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.next_cursor.is_none()
    }
}

/// Lazy, finite and restartable sequence of listings.
///
/// Pages are requested by keyset: each call returns up to `limit` rows with
/// ids strictly greater than `cursor`, in ascending id order. Restarting the
/// sequence means calling again with `cursor = None`.
pub trait ListingSource: Send + Sync {
    /// Fetch the page following `cursor`.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the backing store cannot be read.
    fn listings_after(
        &self,
        cursor: Option<ListingId>,
        limit: usize,
    ) -> Result<ListingPage, StoreError>;
}

/// Read-only amenity lookup.
///
/// # Examples
///
/// ```rust
/// use homescore_core::{Amenity, AmenityId, AmenityIndex, AmenitySource, GeoPoint};
///
/// # fn main() -> Result<(), homescore_core::GeoPointError> {
/// let park = Amenity::new(AmenityId(1), "Corner Park", "park", GeoPoint::new(37.5005, 127.0)?);
/// let index = AmenityIndex::new(vec![park.clone()]);
/// let home = GeoPoint::new(37.5, 127.0)?;
///
/// let found: Vec<_> = index.amenities_within(home, 100.0).collect();
/// assert_eq!(found, vec![park]);
/// # Ok(())
/// # }
/// ```
pub trait AmenitySource: Send + Sync {
    /// Return every amenity whose great-circle distance from `point` is at
    /// most `radius_m` metres, ordered by amenity id.
    fn amenities_within(
        &self,
        point: GeoPoint,
        radius_m: f64,
    ) -> Box<dyn Iterator<Item = Amenity> + Send + '_>;
}

/// Read access to configured score types.
pub trait ScoreTypeCatalog: Send + Sync {
    /// Return all score types whose active flag is set, ordered by id.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the catalog cannot be read.
    fn active_score_types(&self) -> Result<Vec<ScoreType>, StoreError>;
}

/// Persistence for raw and normalized scores.
///
/// Implementations must make every mutation an upsert keyed by
/// `(listing_id, score_type_id)` so that re-running a stage converges on the
/// same rows.
pub trait ScoreStore: Send + Sync {
    /// Insert or replace raw scores. Existing normalized values are kept until
    /// the next normalization pass rewrites them.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the batch cannot be written.
    fn upsert_raw_scores(&self, scores: &[RawScore]) -> Result<usize, StoreError>;

    /// Load the complete raw score population of one score type.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the rows cannot be read.
    fn raw_scores_for_type(&self, score_type_id: ScoreTypeId) -> Result<Vec<RawScore>, StoreError>;

    /// Write normalized values for one score type in a single bulk update.
    /// Returns the number of rows updated.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the update cannot be applied.
    fn update_normalized_scores(
        &self,
        score_type_id: ScoreTypeId,
        updates: &BTreeMap<ListingId, f64>,
    ) -> Result<usize, StoreError>;

    /// Raw scores recorded for a listing, ordered by score type.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the rows cannot be read.
    fn raw_scores_for(&self, listing_id: ListingId) -> Result<Vec<RawScore>, StoreError>;

    /// Normalized scores recorded for a listing, ordered by score type.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the rows cannot be read.
    fn normalized_scores_for(
        &self,
        listing_id: ListingId,
    ) -> Result<Vec<NormalizedScore>, StoreError>;

    /// Move the live scores into the snapshot history and clear the live set.
    /// Intended to run between pipeline runs. Returns the number of archived
    /// rows.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the snapshot cannot be written.
    fn archive_current_scores(&self) -> Result<usize, StoreError>;
}
