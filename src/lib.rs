//! Facade crate for the homescore listing scoring pipeline.
//!
//! This crate re-exports the core domain types and exposes the scoring
//! stages and the SQLite store behind feature flags.

#![forbid(unsafe_code)]

pub use homescore_core::{
    Amenity, AmenityId, AmenityIndex, AmenitySource, GeoPoint, GeoPointError, Listing, ListingId,
    ListingPage, ListingSource, NormalizedScore, RawScore, RejectedListing, ScoreStore, ScoreType,
    ScoreTypeCatalog, ScoreTypeId, StoreError, distance_km, distance_m, within_distance,
};

#[cfg(feature = "store-sqlite")]
pub use homescore_core::SqliteScoreStore;

#[cfg(feature = "scorer")]
pub use homescore_scorer::{
    AmenityDensityCalculator, AmenityDensityConfig, CalculationError, CalculatorRegistry,
    CancellationToken, LinearScoreNormalizer, NormalizationReport, NormalizationStage,
    NormalizeError, ParkProximityCalculator, ParkProximityConfig, PipelineReport, PipelineStore,
    RawScoringReport, RawScoringStage, RetryPolicy, RunContext, ScoreCalculator, ScoreNormalizer,
    ScoreSummary, StageError, StageState, run_pipeline,
};
