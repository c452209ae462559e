//! SQLite-backed listing, score type and score persistence.
//!
//! A single connection is guarded by a mutex, so every write is serialized.
//! Multi-row mutations run inside one transaction each: a batch either lands
//! completely or not at all.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode, Row};

use crate::{
    Amenity, AmenityId, GeoPoint, Listing, ListingId, NormalizedScore, RawScore, ScoreType,
    ScoreTypeId,
};

use super::{
    ListingPage, ListingSource, RejectedListing, ScoreStore, ScoreTypeCatalog, StoreError,
};

/// How long a statement waits on a locked database before reporting busy.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS listings (
        id INTEGER PRIMARY KEY,
        lat REAL NOT NULL,
        lon REAL NOT NULL,
        source TEXT NOT NULL,
        external_id TEXT,
        name TEXT
    );
    CREATE TABLE IF NOT EXISTS amenities (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        category TEXT NOT NULL,
        lat REAL NOT NULL,
        lon REAL NOT NULL,
        area_sq_m REAL
    );
    CREATE TABLE IF NOT EXISTS score_types (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT NOT NULL,
        active INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS listing_scores (
        listing_id INTEGER NOT NULL,
        score_type_id INTEGER NOT NULL,
        raw_score REAL NOT NULL,
        normalized_score REAL,
        computed_at TEXT NOT NULL,
        PRIMARY KEY (listing_id, score_type_id)
    );
    CREATE INDEX IF NOT EXISTS listing_scores_by_type
        ON listing_scores (score_type_id);
    CREATE TABLE IF NOT EXISTS listing_scores_snapshot (
        snapshot_id INTEGER PRIMARY KEY,
        listing_id INTEGER NOT NULL,
        score_type_id INTEGER NOT NULL,
        raw_score REAL NOT NULL,
        normalized_score REAL,
        computed_at TEXT NOT NULL,
        archived_at TEXT NOT NULL
    );
";

/// Score store persisted in a single SQLite database.
///
/// The schema is created on open when missing. Listings, amenities and score
/// types are normally written by the collection side; the `upsert_*` helpers
/// exist for imports and tests.
pub struct SqliteScoreStore {
    path: PathBuf,
    connection: Mutex<Connection>,
}

impl fmt::Debug for SqliteScoreStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteScoreStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteScoreStore {
    /// Open (or create) the database at `path` and ensure the schema exists.
    ///
    /// # Errors
    /// Returns [`StoreError::Open`] when the database cannot be opened or the
    /// schema cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = path.as_ref().to_path_buf();
        let connection = Connection::open(&db_path).map_err(|source| StoreError::Open {
            path: db_path.clone(),
            source: Box::new(source),
        })?;
        Self::initialise(db_path, connection)
    }

    /// Open a private in-memory database with the schema applied.
    ///
    /// # Errors
    /// Returns [`StoreError::Open`] when SQLite cannot allocate the database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let path = PathBuf::from(":memory:");
        let connection = Connection::open_in_memory().map_err(|source| StoreError::Open {
            path: path.clone(),
            source: Box::new(source),
        })?;
        Self::initialise(path, connection)
    }

    fn initialise(path: PathBuf, connection: Connection) -> Result<Self, StoreError> {
        let prepared = connection
            .busy_timeout(BUSY_TIMEOUT)
            .and_then(|()| connection.execute_batch(SCHEMA));
        if let Err(source) = prepared {
            return Err(StoreError::Open {
                path,
                source: Box::new(source),
            });
        }
        Ok(Self {
            path,
            connection: Mutex::new(connection),
        })
    }

    /// Location of the database, `:memory:` for in-memory stores.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert or replace listings.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the rows cannot be written.
    pub fn upsert_listings(&self, listings: &[Listing]) -> Result<usize, StoreError> {
        const OPERATION: &str = "write listings";
        self.write(OPERATION, |transaction| {
            let mut statement = transaction
                .prepare_cached(
                    "INSERT OR REPLACE INTO listings (id, lat, lon, source, external_id, name)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )
                .map_err(|source| classify(OPERATION, source))?;
            for listing in listings {
                statement
                    .execute((
                        to_sql_id("listing", listing.id.0)?,
                        listing.location.latitude(),
                        listing.location.longitude(),
                        &listing.source,
                        &listing.external_id,
                        &listing.name,
                    ))
                    .map_err(|source| classify(OPERATION, source))?;
            }
            Ok(listings.len())
        })
    }

    /// Insert or replace amenities.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the rows cannot be written.
    pub fn upsert_amenities(&self, amenities: &[Amenity]) -> Result<usize, StoreError> {
        const OPERATION: &str = "write amenities";
        self.write(OPERATION, |transaction| {
            let mut statement = transaction
                .prepare_cached(
                    "INSERT OR REPLACE INTO amenities (id, name, category, lat, lon, area_sq_m)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )
                .map_err(|source| classify(OPERATION, source))?;
            for amenity in amenities {
                statement
                    .execute((
                        to_sql_id("amenity", amenity.id.0)?,
                        &amenity.name,
                        &amenity.category,
                        amenity.location.latitude(),
                        amenity.location.longitude(),
                        amenity.area_sq_m,
                    ))
                    .map_err(|source| classify(OPERATION, source))?;
            }
            Ok(amenities.len())
        })
    }

    /// Insert or replace score type definitions.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the rows cannot be written.
    pub fn upsert_score_types(&self, score_types: &[ScoreType]) -> Result<usize, StoreError> {
        const OPERATION: &str = "write score types";
        self.write(OPERATION, |transaction| {
            let mut statement = transaction
                .prepare_cached(
                    "INSERT OR REPLACE INTO score_types (id, name, description, active)
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .map_err(|source| classify(OPERATION, source))?;
            for score_type in score_types {
                statement
                    .execute((
                        to_sql_id("score type", score_type.id.0)?,
                        &score_type.name,
                        &score_type.description,
                        score_type.active,
                    ))
                    .map_err(|source| classify(OPERATION, source))?;
            }
            Ok(score_types.len())
        })
    }

    /// Load the whole amenity catalog, ordered by id.
    ///
    /// Rows with invalid coordinates are logged and skipped.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the rows cannot be read.
    pub fn load_amenities(&self) -> Result<Vec<Amenity>, StoreError> {
        const OPERATION: &str = "read amenities";
        let connection = self.lock(OPERATION)?;
        let mut statement = connection
            .prepare_cached(
                "SELECT id, name, category, lat, lon, area_sq_m FROM amenities ORDER BY id",
            )
            .map_err(|source| classify(OPERATION, source))?;
        let rows = statement
            .query_map([], |row| {
                Ok(AmenityRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    category: row.get(2)?,
                    latitude: row.get(3)?,
                    longitude: row.get(4)?,
                    area_sq_m: row.get(5)?,
                })
            })
            .map_err(|source| classify(OPERATION, source))?;

        let mut amenities = Vec::new();
        for result in rows {
            let row = result.map_err(|source| classify(OPERATION, source))?;
            let id = AmenityId(from_sql_id("amenity", row.id)?);
            match GeoPoint::new(row.latitude, row.longitude) {
                Ok(location) => amenities.push(Amenity {
                    id,
                    name: row.name,
                    category: row.category,
                    location,
                    area_sq_m: row.area_sq_m,
                }),
                Err(error) => log::warn!("skipping amenity {id}: {error}"),
            }
        }
        Ok(amenities)
    }

    /// Number of rows held in the snapshot history.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the table cannot be read.
    pub fn snapshot_len(&self) -> Result<usize, StoreError> {
        const OPERATION: &str = "count snapshot rows";
        let connection = self.lock(OPERATION)?;
        let count: i64 = connection
            .query_row("SELECT COUNT(*) FROM listing_scores_snapshot", [], |row| {
                row.get(0)
            })
            .map_err(|source| classify(OPERATION, source))?;
        usize::try_from(count).map_err(|source| StoreError::query(OPERATION, source))
    }

    fn lock(&self, operation: &'static str) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.connection
            .lock()
            .map_err(|_| StoreError::query(operation, "connection mutex poisoned"))
    }

    /// Run `body` inside a transaction and commit when it succeeds.
    fn write<T>(
        &self,
        operation: &'static str,
        body: impl FnOnce(&rusqlite::Transaction<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut connection = self.lock(operation)?;
        let transaction = connection
            .transaction()
            .map_err(|source| classify(operation, source))?;
        let output = body(&transaction)?;
        transaction
            .commit()
            .map_err(|source| classify(operation, source))?;
        Ok(output)
    }

    fn read_raw_scores(
        &self,
        operation: &'static str,
        query: &str,
        key: i64,
    ) -> Result<Vec<RawScore>, StoreError> {
        let connection = self.lock(operation)?;
        let mut statement = connection
            .prepare_cached(query)
            .map_err(|source| classify(operation, source))?;
        let rows = statement
            .query_map([key], ScoreRow::from_row)
            .map_err(|source| classify(operation, source))?;
        let mut scores = Vec::new();
        for result in rows {
            let row = result.map_err(|source| classify(operation, source))?;
            scores.push(row.into_raw_score()?);
        }
        Ok(scores)
    }
}

struct ListingRow {
    id: i64,
    latitude: f64,
    longitude: f64,
    source: String,
    external_id: Option<String>,
    name: Option<String>,
}

struct AmenityRow {
    id: i64,
    name: String,
    category: String,
    latitude: f64,
    longitude: f64,
    area_sq_m: Option<f64>,
}

struct ScoreRow {
    listing_id: i64,
    score_type_id: i64,
    raw_score: f64,
    normalized_score: Option<f64>,
    computed_at: String,
}

impl ScoreRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            listing_id: row.get(0)?,
            score_type_id: row.get(1)?,
            raw_score: row.get(2)?,
            normalized_score: row.get(3)?,
            computed_at: row.get(4)?,
        })
    }

    fn ids(&self) -> Result<(ListingId, ScoreTypeId), StoreError> {
        Ok((
            ListingId(from_sql_id("listing", self.listing_id)?),
            ScoreTypeId(from_sql_id("score type", self.score_type_id)?),
        ))
    }

    fn into_raw_score(self) -> Result<RawScore, StoreError> {
        let (listing_id, score_type_id) = self.ids()?;
        let computed_at = DateTime::parse_from_rfc3339(&self.computed_at)
            .map_err(|err| StoreError::InvalidRow {
                entity: "score",
                id: self.listing_id,
                reason: format!("bad computed_at timestamp: {err}"),
            })?
            .with_timezone(&Utc);
        RawScore::new(listing_id, score_type_id, self.raw_score, computed_at).map_err(|err| {
            StoreError::InvalidRow {
                entity: "score",
                id: self.listing_id,
                reason: err.to_string(),
            }
        })
    }

    fn into_normalized_score(self) -> Result<NormalizedScore, StoreError> {
        let (listing_id, score_type_id) = self.ids()?;
        Ok(NormalizedScore {
            listing_id,
            score_type_id,
            normalized_score: self.normalized_score,
        })
    }
}

/// Map a `rusqlite` failure onto the transient/permanent split.
fn classify(operation: &'static str, source: rusqlite::Error) -> StoreError {
    let transient = matches!(
        &source,
        rusqlite::Error::SqliteFailure(failure, _)
            if matches!(
                failure.code,
                ErrorCode::DatabaseBusy
                    | ErrorCode::DatabaseLocked
                    | ErrorCode::CannotOpen
                    | ErrorCode::SystemIoFailure
            )
    );
    if transient {
        StoreError::unavailable(operation, source)
    } else {
        StoreError::query(operation, source)
    }
}

fn to_sql_id(entity: &'static str, id: u64) -> Result<i64, StoreError> {
    i64::try_from(id).map_err(|_| {
        StoreError::query(
            "convert identifier",
            format!("{entity} id {id} exceeds the SQLite integer range"),
        )
    })
}

fn from_sql_id(entity: &'static str, id: i64) -> Result<u64, StoreError> {
    u64::try_from(id).map_err(|_| StoreError::InvalidRow {
        entity,
        id,
        reason: "identifier is negative".to_owned(),
    })
}

impl ListingSource for SqliteScoreStore {
    fn listings_after(
        &self,
        cursor: Option<ListingId>,
        limit: usize,
    ) -> Result<ListingPage, StoreError> {
        const OPERATION: &str = "read listings";
        let after = match cursor {
            Some(id) => to_sql_id("listing", id.0)?,
            None => -1,
        };
        let row_limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let connection = self.lock(OPERATION)?;
        let mut statement = connection
            .prepare_cached(
                "SELECT id, lat, lon, source, external_id, name FROM listings
                 WHERE id > ?1 ORDER BY id LIMIT ?2",
            )
            .map_err(|source| classify(OPERATION, source))?;
        let rows = statement
            .query_map((after, row_limit), |row| {
                Ok(ListingRow {
                    id: row.get(0)?,
                    latitude: row.get(1)?,
                    longitude: row.get(2)?,
                    source: row.get(3)?,
                    external_id: row.get(4)?,
                    name: row.get(5)?,
                })
            })
            .map_err(|source| classify(OPERATION, source))?;

        let mut page = ListingPage::default();
        for result in rows {
            let row = result.map_err(|source| classify(OPERATION, source))?;
            let id = ListingId(from_sql_id("listing", row.id)?);
            page.next_cursor = Some(id);
            match GeoPoint::new(row.latitude, row.longitude) {
                Ok(location) => page.listings.push(Listing {
                    id,
                    location,
                    source: row.source,
                    external_id: row.external_id,
                    name: row.name,
                }),
                Err(error) => page.rejected.push(RejectedListing { id, error }),
            }
        }
        Ok(page)
    }
}

impl ScoreTypeCatalog for SqliteScoreStore {
    fn active_score_types(&self) -> Result<Vec<ScoreType>, StoreError> {
        const OPERATION: &str = "read score types";
        let connection = self.lock(OPERATION)?;
        let mut statement = connection
            .prepare_cached(
                "SELECT id, name, description FROM score_types WHERE active <> 0 ORDER BY id",
            )
            .map_err(|source| classify(OPERATION, source))?;
        let rows = statement
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(|source| classify(OPERATION, source))?;

        let mut score_types = Vec::new();
        for result in rows {
            let (id, name, description) = result.map_err(|source| classify(OPERATION, source))?;
            let score_type_id = ScoreTypeId(from_sql_id("score type", id)?);
            score_types.push(ScoreType::new(score_type_id, name, description));
        }
        Ok(score_types)
    }
}

impl ScoreStore for SqliteScoreStore {
    fn upsert_raw_scores(&self, scores: &[RawScore]) -> Result<usize, StoreError> {
        const OPERATION: &str = "write raw scores";
        self.write(OPERATION, |transaction| {
            let mut statement = transaction
                .prepare_cached(
                    "INSERT INTO listing_scores (listing_id, score_type_id, raw_score, computed_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT (listing_id, score_type_id) DO UPDATE SET
                         raw_score = excluded.raw_score,
                         computed_at = excluded.computed_at",
                )
                .map_err(|source| classify(OPERATION, source))?;
            for score in scores {
                statement
                    .execute((
                        to_sql_id("listing", score.listing_id.0)?,
                        to_sql_id("score type", score.score_type_id.0)?,
                        score.raw_score,
                        score.computed_at.to_rfc3339(),
                    ))
                    .map_err(|source| classify(OPERATION, source))?;
            }
            Ok(scores.len())
        })
    }

    fn raw_scores_for_type(&self, score_type_id: ScoreTypeId) -> Result<Vec<RawScore>, StoreError> {
        self.read_raw_scores(
            "read raw scores by type",
            "SELECT listing_id, score_type_id, raw_score, normalized_score, computed_at
             FROM listing_scores WHERE score_type_id = ?1 ORDER BY listing_id",
            to_sql_id("score type", score_type_id.0)?,
        )
    }

    fn update_normalized_scores(
        &self,
        score_type_id: ScoreTypeId,
        updates: &BTreeMap<ListingId, f64>,
    ) -> Result<usize, StoreError> {
        const OPERATION: &str = "write normalized scores";
        let type_key = to_sql_id("score type", score_type_id.0)?;
        self.write(OPERATION, |transaction| {
            let mut statement = transaction
                .prepare_cached(
                    "UPDATE listing_scores SET normalized_score = ?3
                     WHERE listing_id = ?1 AND score_type_id = ?2",
                )
                .map_err(|source| classify(OPERATION, source))?;
            let mut updated = 0;
            for (listing_id, value) in updates {
                updated += statement
                    .execute((to_sql_id("listing", listing_id.0)?, type_key, *value))
                    .map_err(|source| classify(OPERATION, source))?;
            }
            Ok(updated)
        })
    }

    fn raw_scores_for(&self, listing_id: ListingId) -> Result<Vec<RawScore>, StoreError> {
        self.read_raw_scores(
            "read raw scores by listing",
            "SELECT listing_id, score_type_id, raw_score, normalized_score, computed_at
             FROM listing_scores WHERE listing_id = ?1 ORDER BY score_type_id",
            to_sql_id("listing", listing_id.0)?,
        )
    }

    fn normalized_scores_for(
        &self,
        listing_id: ListingId,
    ) -> Result<Vec<NormalizedScore>, StoreError> {
        const OPERATION: &str = "read normalized scores";
        let key = to_sql_id("listing", listing_id.0)?;
        let connection = self.lock(OPERATION)?;
        let mut statement = connection
            .prepare_cached(
                "SELECT listing_id, score_type_id, raw_score, normalized_score, computed_at
                 FROM listing_scores WHERE listing_id = ?1 ORDER BY score_type_id",
            )
            .map_err(|source| classify(OPERATION, source))?;
        let rows = statement
            .query_map([key], ScoreRow::from_row)
            .map_err(|source| classify(OPERATION, source))?;
        let mut scores = Vec::new();
        for result in rows {
            let row = result.map_err(|source| classify(OPERATION, source))?;
            scores.push(row.into_normalized_score()?);
        }
        Ok(scores)
    }

    fn archive_current_scores(&self) -> Result<usize, StoreError> {
        const OPERATION: &str = "archive scores";
        let archived_at = Utc::now().to_rfc3339();
        self.write(OPERATION, |transaction| {
            let archived = transaction
                .execute(
                    "INSERT INTO listing_scores_snapshot
                         (listing_id, score_type_id, raw_score, normalized_score, computed_at,
                          archived_at)
                     SELECT listing_id, score_type_id, raw_score, normalized_score, computed_at, ?1
                     FROM listing_scores",
                    [&archived_at],
                )
                .map_err(|source| classify(OPERATION, source))?;
            transaction
                .execute("DELETE FROM listing_scores", [])
                .map_err(|source| classify(OPERATION, source))?;
            Ok(archived)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    fn point(latitude: f64, longitude: f64) -> GeoPoint {
        GeoPoint::new(latitude, longitude).expect("valid coordinate")
    }

    fn raw(listing: u64, score_type: u64, value: f64) -> RawScore {
        RawScore::new(
            ListingId(listing),
            ScoreTypeId(score_type),
            value,
            Utc::now(),
        )
        .expect("valid raw score")
    }

    #[fixture]
    fn store() -> SqliteScoreStore {
        SqliteScoreStore::open_in_memory().expect("open in-memory store")
    }

    #[fixture]
    fn temp_db() -> (TempDir, PathBuf) {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("homescore.db");
        (dir, path)
    }

    #[rstest]
    fn pages_listings_by_keyset(store: SqliteScoreStore) {
        let listings: Vec<_> = (1..=5)
            .map(|id| Listing::new(ListingId(id), point(37.5, 127.0), "naver"))
            .collect();
        store.upsert_listings(&listings).expect("seed listings");

        let first = store.listings_after(None, 2).expect("first page");
        assert_eq!(first.listings.len(), 2);
        assert_eq!(first.next_cursor, Some(ListingId(2)));

        let second = store
            .listings_after(first.next_cursor, 10)
            .expect("second page");
        let ids: Vec<_> = second.listings.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![ListingId(3), ListingId(4), ListingId(5)]);

        let last = store
            .listings_after(second.next_cursor, 10)
            .expect("final page");
        assert!(last.is_exhausted());
    }

    #[rstest]
    fn rejects_listings_with_invalid_coordinates(store: SqliteScoreStore) {
        {
            let connection = store.connection.lock().expect("lock");
            connection
                .execute(
                    "INSERT INTO listings (id, lat, lon, source) VALUES (1, 95.0, 0.0, 'x'),
                     (2, 37.5, 127.0, 'x')",
                    [],
                )
                .expect("insert raw rows");
        }
        let page = store.listings_after(None, 10).expect("page");
        assert_eq!(page.listings.len(), 1);
        assert_eq!(page.rejected.len(), 1);
        assert_eq!(page.rejected.first().map(|r| r.id), Some(ListingId(1)));
        assert_eq!(page.next_cursor, Some(ListingId(2)));
    }

    #[rstest]
    fn upsert_replaces_raw_score_and_keeps_normalized_value(store: SqliteScoreStore) {
        store.upsert_raw_scores(&[raw(1, 1, 3.0)]).expect("insert");
        let updates = BTreeMap::from([(ListingId(1), 7.5)]);
        assert_eq!(
            store
                .update_normalized_scores(ScoreTypeId(1), &updates)
                .expect("normalize"),
            1
        );

        store.upsert_raw_scores(&[raw(1, 1, 4.0)]).expect("replace");
        let raws = store.raw_scores_for(ListingId(1)).expect("raw scores");
        assert_eq!(raws.len(), 1);
        assert_eq!(raws.first().map(|r| r.raw_score), Some(4.0));

        let normalized = store.normalized_scores_for(ListingId(1)).expect("normalized");
        assert_eq!(
            normalized.first().and_then(|n| n.normalized_score),
            Some(7.5)
        );
    }

    #[rstest]
    fn fresh_scores_are_not_normalized(store: SqliteScoreStore) {
        store.upsert_raw_scores(&[raw(4, 2, 1.0)]).expect("insert");
        let normalized = store.normalized_scores_for(ListingId(4)).expect("normalized");
        assert!(normalized.iter().all(|n| !n.is_normalized()));
    }

    #[rstest]
    fn reads_population_for_one_score_type(store: SqliteScoreStore) {
        store
            .upsert_raw_scores(&[raw(2, 1, 5.0), raw(1, 1, 1.0), raw(1, 2, 9.0)])
            .expect("insert");
        let population = store.raw_scores_for_type(ScoreTypeId(1)).expect("read");
        let ids: Vec<_> = population.iter().map(|s| s.listing_id).collect();
        assert_eq!(ids, vec![ListingId(1), ListingId(2)]);
    }

    #[rstest]
    fn only_active_score_types_are_listed(store: SqliteScoreStore) {
        store
            .upsert_score_types(&[
                ScoreType::new(ScoreTypeId(1), "park", "Park proximity"),
                ScoreType::new(ScoreTypeId(2), "legacy", "Retired").deactivated(),
            ])
            .expect("seed types");
        let active = store.active_score_types().expect("read types");
        assert_eq!(active.len(), 1);
        assert_eq!(active.first().map(|t| t.id), Some(ScoreTypeId(1)));
    }

    #[rstest]
    fn archive_moves_live_scores_to_snapshot(store: SqliteScoreStore) {
        store
            .upsert_raw_scores(&[raw(1, 1, 1.0), raw(2, 1, 2.0)])
            .expect("insert");
        assert_eq!(store.archive_current_scores().expect("archive"), 2);
        assert_eq!(store.snapshot_len().expect("count"), 2);
        assert!(store.raw_scores_for(ListingId(1)).expect("read").is_empty());
    }

    #[rstest]
    fn amenities_round_trip_through_the_catalog(store: SqliteScoreStore) {
        let park = Amenity::new(AmenityId(7), "Riverside", "park", point(37.5, 127.0))
            .with_area_sq_m(12_000.0);
        store
            .upsert_amenities(std::slice::from_ref(&park))
            .expect("seed amenities");
        assert_eq!(store.load_amenities().expect("load"), vec![park]);
    }

    #[rstest]
    fn reopening_a_file_keeps_scores(#[from(temp_db)] (_dir, path): (TempDir, PathBuf)) {
        {
            let store = SqliteScoreStore::open(&path).expect("open");
            store.upsert_raw_scores(&[raw(1, 1, 2.5)]).expect("insert");
        }
        let reopened = SqliteScoreStore::open(&path).expect("reopen");
        assert_eq!(reopened.raw_scores_for(ListingId(1)).expect("read").len(), 1);
    }

    #[rstest]
    fn open_reports_missing_directory(#[from(temp_db)] (dir, _path): (TempDir, PathBuf)) {
        let missing = dir.path().join("absent").join("homescore.db");
        let err = SqliteScoreStore::open(&missing).expect_err("missing parent directory");
        assert!(matches!(err, StoreError::Open { .. }));
    }
}
