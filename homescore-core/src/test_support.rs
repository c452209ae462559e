//! Test-only, in-memory store implementations used by unit and behaviour
//! tests across the workspace.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{
    GeoPoint, GeoPointError, Listing, ListingId, ListingPage, ListingSource, NormalizedScore,
    RawScore, RejectedListing, ScoreStore, ScoreType, ScoreTypeCatalog, ScoreTypeId, StoreError,
};

#[derive(Debug, Clone)]
struct StoredScore {
    raw: RawScore,
    normalized: Option<f64>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory listing source, score type catalog and score store.
///
/// Listings with invalid coordinates can be seeded to exercise rejection
/// paths. The store performs linear scans and is intended only for small
/// datasets.
#[derive(Debug, Default)]
pub struct MemoryStore {
    listings: BTreeMap<ListingId, Result<Listing, GeoPointError>>,
    score_types: Vec<ScoreType>,
    scores: Mutex<BTreeMap<(ListingId, ScoreTypeId), StoredScore>>,
    snapshot: Mutex<Vec<StoredScore>>,
}

impl MemoryStore {
    /// Create a store seeded with listings.
    #[must_use]
    pub fn with_listings<I>(listings: I) -> Self
    where
        I: IntoIterator<Item = Listing>,
    {
        Self::default().and_listings(listings)
    }

    /// Add listings to the store.
    #[must_use]
    pub fn and_listings<I>(mut self, listings: I) -> Self
    where
        I: IntoIterator<Item = Listing>,
    {
        for listing in listings {
            self.listings.insert(listing.id, Ok(listing));
        }
        self
    }

    /// Add a listing row whose coordinates fail validation.
    #[must_use]
    pub fn and_invalid_listing(mut self, id: ListingId, latitude: f64, longitude: f64) -> Self {
        let row = GeoPoint::new(latitude, longitude).map(|location| Listing::new(id, location, "test"));
        self.listings.insert(id, row);
        self
    }

    /// Add score types to the catalog. Inactive types are stored but hidden
    /// from [`ScoreTypeCatalog::active_score_types`].
    #[must_use]
    pub fn and_score_types<I>(mut self, score_types: I) -> Self
    where
        I: IntoIterator<Item = ScoreType>,
    {
        self.score_types.extend(score_types);
        self.score_types.sort_by_key(|score_type| score_type.id);
        self
    }

    /// Normalized value stored for a key, if any.
    #[must_use]
    pub fn normalized_score(&self, listing_id: ListingId, score_type_id: ScoreTypeId) -> Option<f64> {
        lock(&self.scores)
            .get(&(listing_id, score_type_id))
            .and_then(|stored| stored.normalized)
    }

    /// Raw value stored for a key, if any.
    #[must_use]
    pub fn raw_score(&self, listing_id: ListingId, score_type_id: ScoreTypeId) -> Option<f64> {
        lock(&self.scores)
            .get(&(listing_id, score_type_id))
            .map(|stored| stored.raw.raw_score)
    }

    /// Number of live score records.
    #[must_use]
    pub fn score_count(&self) -> usize {
        lock(&self.scores).len()
    }

    /// Number of archived score records.
    #[must_use]
    pub fn snapshot_len(&self) -> usize {
        lock(&self.snapshot).len()
    }
}

impl ListingSource for MemoryStore {
    fn listings_after(
        &self,
        cursor: Option<ListingId>,
        limit: usize,
    ) -> Result<ListingPage, StoreError> {
        let rows = self
            .listings
            .iter()
            .filter(|(id, _)| cursor.is_none_or(|after| **id > after))
            .take(limit);

        let mut page = ListingPage::default();
        for (id, row) in rows {
            page.next_cursor = Some(*id);
            match row {
                Ok(listing) => page.listings.push(listing.clone()),
                Err(error) => page.rejected.push(RejectedListing {
                    id: *id,
                    error: *error,
                }),
            }
        }
        Ok(page)
    }
}

impl ScoreTypeCatalog for MemoryStore {
    fn active_score_types(&self) -> Result<Vec<ScoreType>, StoreError> {
        Ok(self
            .score_types
            .iter()
            .filter(|score_type| score_type.active)
            .cloned()
            .collect())
    }
}

impl ScoreStore for MemoryStore {
    fn upsert_raw_scores(&self, scores: &[RawScore]) -> Result<usize, StoreError> {
        let mut stored = lock(&self.scores);
        for score in scores {
            stored
                .entry(score.key())
                .and_modify(|existing| existing.raw = score.clone())
                .or_insert_with(|| StoredScore {
                    raw: score.clone(),
                    normalized: None,
                });
        }
        Ok(scores.len())
    }

    fn raw_scores_for_type(&self, score_type_id: ScoreTypeId) -> Result<Vec<RawScore>, StoreError> {
        Ok(lock(&self.scores)
            .values()
            .filter(|stored| stored.raw.score_type_id == score_type_id)
            .map(|stored| stored.raw.clone())
            .collect())
    }

    fn update_normalized_scores(
        &self,
        score_type_id: ScoreTypeId,
        updates: &BTreeMap<ListingId, f64>,
    ) -> Result<usize, StoreError> {
        let mut stored = lock(&self.scores);
        let mut updated = 0;
        for (listing_id, value) in updates {
            if let Some(record) = stored.get_mut(&(*listing_id, score_type_id)) {
                record.normalized = Some(*value);
                updated += 1;
            }
        }
        Ok(updated)
    }

    fn raw_scores_for(&self, listing_id: ListingId) -> Result<Vec<RawScore>, StoreError> {
        Ok(lock(&self.scores)
            .range((listing_id, ScoreTypeId(0))..=(listing_id, ScoreTypeId(u64::MAX)))
            .map(|(_, stored)| stored.raw.clone())
            .collect())
    }

    fn normalized_scores_for(
        &self,
        listing_id: ListingId,
    ) -> Result<Vec<NormalizedScore>, StoreError> {
        Ok(lock(&self.scores)
            .range((listing_id, ScoreTypeId(0))..=(listing_id, ScoreTypeId(u64::MAX)))
            .map(|(&(_, score_type_id), stored)| NormalizedScore {
                listing_id,
                score_type_id,
                normalized_score: stored.normalized,
            })
            .collect())
    }

    fn archive_current_scores(&self) -> Result<usize, StoreError> {
        let mut live = lock(&self.scores);
        let mut snapshot = lock(&self.snapshot);
        let archived = live.len();
        snapshot.extend(std::mem::take(&mut *live).into_values());
        Ok(archived)
    }
}

/// Wrapper whose score writes fail a configurable number of times.
///
/// Reads are delegated untouched. Transient failures surface as
/// [`StoreError::Unavailable`]; permanent ones as [`StoreError::Query`].
#[derive(Debug)]
pub struct FlakyStore<S> {
    inner: S,
    remaining_failures: AtomicUsize,
    write_attempts: AtomicUsize,
    transient: bool,
}

impl<S> FlakyStore<S> {
    /// Fail the first `failures` writes with a transient error.
    #[must_use]
    pub const fn new(inner: S, failures: usize) -> Self {
        Self {
            inner,
            remaining_failures: AtomicUsize::new(failures),
            write_attempts: AtomicUsize::new(0),
            transient: true,
        }
    }

    /// Fail every write with a permanent error.
    #[must_use]
    pub const fn permanent(inner: S) -> Self {
        Self {
            inner,
            remaining_failures: AtomicUsize::new(usize::MAX),
            write_attempts: AtomicUsize::new(0),
            transient: false,
        }
    }

    /// Number of write calls observed, failed or not.
    #[must_use]
    pub fn write_attempts(&self) -> usize {
        self.write_attempts.load(Ordering::SeqCst)
    }

    /// Borrow the wrapped store.
    #[must_use]
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    fn before_write(&self, operation: &'static str) -> Result<(), StoreError> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        let fail = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        match (fail, self.transient) {
            (false, _) => Ok(()),
            (true, true) => Err(StoreError::unavailable(operation, "simulated outage")),
            (true, false) => Err(StoreError::query(operation, "simulated constraint failure")),
        }
    }
}

impl<S: ListingSource> ListingSource for FlakyStore<S> {
    fn listings_after(
        &self,
        cursor: Option<ListingId>,
        limit: usize,
    ) -> Result<ListingPage, StoreError> {
        self.inner.listings_after(cursor, limit)
    }
}

impl<S: ScoreTypeCatalog> ScoreTypeCatalog for FlakyStore<S> {
    fn active_score_types(&self) -> Result<Vec<ScoreType>, StoreError> {
        self.inner.active_score_types()
    }
}

impl<S: ScoreStore> ScoreStore for FlakyStore<S> {
    fn upsert_raw_scores(&self, scores: &[RawScore]) -> Result<usize, StoreError> {
        self.before_write("write raw scores")?;
        self.inner.upsert_raw_scores(scores)
    }

    fn raw_scores_for_type(&self, score_type_id: ScoreTypeId) -> Result<Vec<RawScore>, StoreError> {
        self.inner.raw_scores_for_type(score_type_id)
    }

    fn update_normalized_scores(
        &self,
        score_type_id: ScoreTypeId,
        updates: &BTreeMap<ListingId, f64>,
    ) -> Result<usize, StoreError> {
        self.before_write("write normalized scores")?;
        self.inner.update_normalized_scores(score_type_id, updates)
    }

    fn raw_scores_for(&self, listing_id: ListingId) -> Result<Vec<RawScore>, StoreError> {
        self.inner.raw_scores_for(listing_id)
    }

    fn normalized_scores_for(
        &self,
        listing_id: ListingId,
    ) -> Result<Vec<NormalizedScore>, StoreError> {
        self.inner.normalized_scores_for(listing_id)
    }

    fn archive_current_scores(&self) -> Result<usize, StoreError> {
        self.before_write("archive scores")?;
        self.inner.archive_current_scores()
    }
}

/// Score type catalog that can never be read.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnreadableCatalog;

impl ScoreTypeCatalog for UnreadableCatalog {
    fn active_score_types(&self) -> Result<Vec<ScoreType>, StoreError> {
        Err(StoreError::unavailable(
            "read score types",
            "catalog offline",
        ))
    }
}
