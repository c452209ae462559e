//! Behavioural coverage for the scoring pipeline over SQLite.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::sync::Arc;

use homescore_core::{
    Amenity, AmenityId, AmenityIndex, AmenitySource, GeoPoint, Listing, ListingId, PARK_CATEGORY,
    ScoreStore, ScoreType, ScoreTypeId, SqliteScoreStore,
};
use homescore_scorer::{
    CalculatorRegistry, ParkProximityCalculator, ParkProximityConfig, PipelineReport,
    RetryPolicy, RunContext, ScoreCalculator, ScoreSummary, run_pipeline,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use rusqlite::Connection;
use tempfile::TempDir;

const PARK: ScoreTypeId = ScoreTypeId(1);
const BESIDE: ListingId = ListingId(1);
const BETWEEN: ListingId = ListingId(2);
const BEYOND: ListingId = ListingId(3);
const INVALID: ListingId = ListingId(4);

/// Temporary directory for each scenario.
#[fixture]
pub fn temp_dir() -> TempDir {
    match TempDir::new() {
        Ok(dir) => dir,
        Err(err) => panic!("create temporary directory: {err}"),
    }
}

/// Store under test.
#[fixture]
pub fn store() -> RefCell<Option<SqliteScoreStore>> {
    RefCell::new(None)
}

/// Report of the last pipeline run.
#[fixture]
pub fn report() -> RefCell<Option<PipelineReport>> {
    RefCell::new(None)
}

fn point(latitude: f64, longitude: f64) -> GeoPoint {
    GeoPoint::new(latitude, longitude).unwrap_or_else(|err| panic!("point: {err}"))
}

fn with_store<T>(
    store: &RefCell<Option<SqliteScoreStore>>,
    body: impl FnOnce(&SqliteScoreStore) -> T,
) -> T {
    let binding = store.borrow();
    let opened = binding
        .as_ref()
        .unwrap_or_else(|| panic!("store must be initialised"));
    body(opened)
}

fn with_report<T>(
    report: &RefCell<Option<PipelineReport>>,
    body: impl FnOnce(&PipelineReport) -> T,
) -> T {
    let binding = report.borrow();
    let finished = binding
        .as_ref()
        .unwrap_or_else(|| panic!("pipeline must have run"));
    body(finished)
}

fn normalized(store: &RefCell<Option<SqliteScoreStore>>, listing_id: ListingId) -> f64 {
    let scores = with_store(store, |opened| {
        opened
            .normalized_scores_for(listing_id)
            .unwrap_or_else(|err| panic!("read scores: {err}"))
    });
    scores
        .iter()
        .find(|score| score.score_type_id == PARK)
        .and_then(|score| score.normalized_score)
        .unwrap_or_else(|| panic!("listing {listing_id} has no normalized park score"))
}

#[given("an SQLite store with three listings and one large park")]
fn seeded_store(temp_dir: &TempDir, store: &RefCell<Option<SqliteScoreStore>>) {
    let opened = SqliteScoreStore::open(temp_dir.path().join("homescore.db"))
        .unwrap_or_else(|err| panic!("open store: {err}"));
    opened
        .upsert_listings(&[
            Listing::new(BESIDE, point(37.5665, 126.9780), "naver"),
            Listing::new(BETWEEN, point(37.5692, 126.9780), "naver"),
            Listing::new(BEYOND, point(37.6200, 126.9780), "zigbang"),
        ])
        .unwrap_or_else(|err| panic!("seed listings: {err}"));
    opened
        .upsert_amenities(&[
            Amenity::new(AmenityId(10), "Seoul Plaza", PARK_CATEGORY, point(37.5665, 126.9780))
                .with_area_sq_m(60_000.0),
        ])
        .unwrap_or_else(|err| panic!("seed amenities: {err}"));
    opened
        .upsert_score_types(&[ScoreType::new(PARK, "park", "Green space nearby")])
        .unwrap_or_else(|err| panic!("seed score types: {err}"));
    *store.borrow_mut() = Some(opened);
}

#[given("a stored listing with an out-of-range longitude")]
fn invalid_listing(store: &RefCell<Option<SqliteScoreStore>>) {
    with_store(store, |opened| {
        let connection = Connection::open(opened.path())
            .unwrap_or_else(|err| panic!("open raw connection: {err}"));
        connection
            .execute(
                "INSERT INTO listings (id, lat, lon, source) VALUES (4, 37.5, 190.0, 'zigbang')",
                [],
            )
            .unwrap_or_else(|err| panic!("insert invalid listing: {err}"));
    });
}

#[when("the pipeline runs with batches of two listings")]
fn run(store: &RefCell<Option<SqliteScoreStore>>, report: &RefCell<Option<PipelineReport>>) {
    let finished = with_store(store, |opened| {
        let amenities = opened
            .load_amenities()
            .unwrap_or_else(|err| panic!("load amenities: {err}"));
        let index: Arc<dyn AmenitySource> = Arc::new(AmenityIndex::new(amenities));
        let park: Arc<dyn ScoreCalculator> = Arc::new(ParkProximityCalculator::new(
            index,
            ParkProximityConfig::new(PARK),
        ));
        let calculators: CalculatorRegistry = [park].into_iter().collect();
        let batch_size = NonZeroUsize::new(2).unwrap_or_else(|| panic!("non-zero batch size"));
        run_pipeline(
            opened,
            &calculators,
            batch_size,
            RetryPolicy::immediate(1),
            &RunContext::new(),
        )
    });
    *report.borrow_mut() = Some(finished);
}

#[then("the pipeline completes")]
fn completes(report: &RefCell<Option<PipelineReport>>) {
    with_report(report, |finished| assert!(finished.is_completed()));
}

#[then("the invalid listing is reported as rejected")]
fn rejected(report: &RefCell<Option<PipelineReport>>) {
    with_report(report, |finished| {
        let ids: Vec<_> = finished.raw.rejected.iter().map(|row| row.id).collect();
        assert_eq!(ids, vec![INVALID]);
        assert_eq!(finished.raw.listings_seen, 3);
    });
}

#[then("the listing beside the park scores 10.0")]
fn beside_scores_top(store: &RefCell<Option<SqliteScoreStore>>) {
    assert_eq!(normalized(store, BESIDE), 10.0);
}

#[then("the listing beyond walking distance scores 1.0")]
fn beyond_scores_base(store: &RefCell<Option<SqliteScoreStore>>) {
    assert_eq!(normalized(store, BEYOND), 1.0);
}

#[then("the listing in between scores strictly between them")]
fn between_scores_middle(store: &RefCell<Option<SqliteScoreStore>>) {
    let score = normalized(store, BETWEEN);
    assert!(score > 1.0 && score < 10.0, "unexpected score {score}");
}

#[then("the summary of the listing beside the park totals 10.0")]
fn summary_total(store: &RefCell<Option<SqliteScoreStore>>) {
    let summary = with_store(store, |opened| {
        ScoreSummary::load(opened, BESIDE, &BTreeSet::new())
            .unwrap_or_else(|err| panic!("load summary: {err}"))
    });
    assert_eq!(summary.total, Some(10.0));
    let factors: Vec<_> = summary.top_factors.iter().map(|f| f.score_type_id).collect();
    assert_eq!(factors, vec![PARK]);
}

#[scenario(path = "tests/features/pipeline.feature", index = 0)]
fn park_scores_are_normalized(
    temp_dir: TempDir,
    store: RefCell<Option<SqliteScoreStore>>,
    report: RefCell<Option<PipelineReport>>,
) {
    let _ = (temp_dir, store, report);
}

#[scenario(path = "tests/features/pipeline.feature", index = 1)]
fn invalid_listing_does_not_stop_the_run(
    temp_dir: TempDir,
    store: RefCell<Option<SqliteScoreStore>>,
    report: RefCell<Option<PipelineReport>>,
) {
    let _ = (temp_dir, store, report);
}
