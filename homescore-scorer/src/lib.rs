//! Scoring and normalization stages for homescore listings.
//!
//! The crate turns listings into comparable desirability scores in two
//! stages:
//! - **Raw scoring** runs every registered [`ScoreCalculator`] against every
//!   listing, reading listings in keyset-paginated batches and upserting one
//!   raw score per (listing, score type).
//! - **Normalization** loads, per active score type, the complete raw
//!   population and rescales it onto `[1, 10]` with a
//!   [`LinearScoreNormalizer`], writing the results back in one bulk update.
//!
//! Both stages take a [`RunContext`] carrying a correlation id for log lines
//! and a [`CancellationToken`] checked at batch and score-type boundaries.
//! Transient store failures are retried according to a [`RetryPolicy`].
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use homescore_core::test_support::MemoryStore;
//! use homescore_core::{AmenityIndex, GeoPoint, Listing, ListingId, ScoreType, ScoreTypeId};
//! use homescore_scorer::{
//!     CalculatorRegistry, ParkProximityCalculator, ParkProximityConfig, RunContext,
//!     run_pipeline, DEFAULT_BATCH_SIZE, RetryPolicy,
//! };
//!
//! # fn main() -> Result<(), homescore_core::GeoPointError> {
//! let park = ScoreTypeId(1);
//! let store = MemoryStore::with_listings([Listing::new(ListingId(1), GeoPoint::new(37.5, 127.0)?, "naver")])
//!     .and_score_types([ScoreType::new(park, "park", "Park proximity")]);
//! let mut calculators = CalculatorRegistry::new();
//! calculators.register(Arc::new(ParkProximityCalculator::new(
//!     Arc::new(AmenityIndex::new(Vec::new())),
//!     ParkProximityConfig::new(park),
//! )));
//!
//! let report = run_pipeline(&store, &calculators, DEFAULT_BATCH_SIZE, RetryPolicy::default(), &RunContext::new());
//! assert!(report.is_completed());
//! assert_eq!(store.normalized_score(ListingId(1), park), Some(5.0));
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod calculator;
mod context;
mod density;
mod error;
mod normalizer;
mod park;
mod pipeline;
mod retry;
mod stage;
mod summary;

pub use calculator::{CalculatorRegistry, ScoreCalculator, checked_raw_score};
pub use context::{CancellationToken, RunContext};
pub use density::{AmenityDensityCalculator, AmenityDensityConfig};
pub use error::{CalculationError, NormalizeError, StageError};
pub use normalizer::{
    BASE_SCORE, LinearScoreNormalizer, MAX_SCORE, PopulationBounds, ScoreNormalizer,
    UNIFORM_SCORE,
};
pub use park::{ParkProximityCalculator, ParkProximityConfig};
pub use pipeline::{PipelineReport, PipelineStore, run_pipeline};
pub use retry::RetryPolicy;
pub use stage::{
    CalculationFailure, DEFAULT_BATCH_SIZE, FailedBatch, NormalizationReport, NormalizationStage,
    RawScoringReport, RawScoringStage, ScoreTypeOutcome, ScoreTypeStatus, SkipReason, StageState,
};
pub use summary::{ScoreFactor, ScoreSummary, TOP_FACTOR_COUNT};
