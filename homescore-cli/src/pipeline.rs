//! `score`, `normalize` and `run` command implementation.

use std::io::Write;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::Parser;
use homescore_core::{
    AmenityIndex, AmenitySource, ScoreTypeId, SqliteScoreStore, TRANSIT_CATEGORY,
};
use homescore_scorer::{
    AmenityDensityCalculator, AmenityDensityConfig, CalculatorRegistry, DEFAULT_BATCH_SIZE,
    NormalizationStage, ParkProximityCalculator, ParkProximityConfig, RawScoringStage,
    RetryPolicy, RunContext, ScoreCalculator, run_pipeline,
};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::report::{NormalizationSummary, PipelineSummary, RawScoringSummary};
use crate::{
    ARG_BATCH_SIZE, ARG_DATABASE, ARG_INITIAL_BACKOFF_MS, ARG_MAX_BACKOFF_MS, ARG_MAX_RETRIES,
    ARG_PARK_COVERAGE_WEIGHT, ARG_PARK_DISTANCE_WEIGHT, ARG_PARK_NORMALIZE, ARG_PARK_RADIUS_M,
    ARG_PARK_SCORE_TYPE, ARG_PARK_TARGET_AREA_SQ_M, ARG_TRANSIT_CAP, ARG_TRANSIT_NORMALIZE,
    ARG_TRANSIT_RADIUS_M, ARG_TRANSIT_SCORE_TYPE, CliError, open_existing_store,
    resolve_database, write_json,
};

/// Score type produced by the park calculator unless configured otherwise.
const DEFAULT_PARK_SCORE_TYPE: u64 = 1;
/// Score type produced by the transit calculator unless configured otherwise.
const DEFAULT_TRANSIT_SCORE_TYPE: u64 = 2;

/// CLI arguments shared by the `score`, `normalize` and `run` subcommands.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "pipeline",
    long_about = "Run the scoring stages over an SQLite score database. \
                 Tunables can come from CLI flags, the [cmds.pipeline] \
                 section of a configuration file, or HOMESCORE_CMDS_PIPELINE_* \
                 environment variables.",
    about = "Run the scoring stages"
)]
#[ortho_config(prefix = "HOMESCORE")]
pub(crate) struct PipelineArgs {
    /// Path to the SQLite score database.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Listings read and written per batch.
    #[arg(long = ARG_BATCH_SIZE, value_name = "count")]
    #[serde(default)]
    pub(crate) batch_size: Option<usize>,
    /// Retries allowed after a transient store failure.
    #[arg(long = ARG_MAX_RETRIES, value_name = "count")]
    #[serde(default)]
    pub(crate) max_retries: Option<u32>,
    /// Delay before the first retry, in milliseconds.
    #[arg(long = ARG_INITIAL_BACKOFF_MS, value_name = "ms")]
    #[serde(default)]
    pub(crate) initial_backoff_ms: Option<u64>,
    /// Upper bound on any retry delay, in milliseconds.
    #[arg(long = ARG_MAX_BACKOFF_MS, value_name = "ms")]
    #[serde(default)]
    pub(crate) max_backoff_ms: Option<u64>,
    /// Score type id produced by the park proximity calculator.
    #[arg(long = ARG_PARK_SCORE_TYPE, value_name = "id")]
    #[serde(default)]
    pub(crate) park_score_type: Option<u64>,
    /// Walking radius searched for parks, in metres.
    #[arg(long = ARG_PARK_RADIUS_M, value_name = "metres")]
    #[serde(default)]
    pub(crate) park_radius_m: Option<f64>,
    /// Points awarded for a park at the doorstep.
    #[arg(long = ARG_PARK_DISTANCE_WEIGHT, value_name = "points")]
    #[serde(default)]
    pub(crate) park_distance_weight: Option<f64>,
    /// Points awarded for full park coverage.
    #[arg(long = ARG_PARK_COVERAGE_WEIGHT, value_name = "points")]
    #[serde(default)]
    pub(crate) park_coverage_weight: Option<f64>,
    /// Park area in range that earns the full coverage weight.
    #[arg(long = ARG_PARK_TARGET_AREA_SQ_M, value_name = "m2")]
    #[serde(default)]
    pub(crate) park_target_area_sq_m: Option<f64>,
    /// Whether park scores are normalized (`false` copies raw scores).
    #[arg(long = ARG_PARK_NORMALIZE, value_name = "bool")]
    #[serde(default)]
    pub(crate) park_normalize: Option<bool>,
    /// Score type id produced by the transit density calculator.
    #[arg(long = ARG_TRANSIT_SCORE_TYPE, value_name = "id")]
    #[serde(default)]
    pub(crate) transit_score_type: Option<u64>,
    /// Search radius for transit stops, in metres.
    #[arg(long = ARG_TRANSIT_RADIUS_M, value_name = "metres")]
    #[serde(default)]
    pub(crate) transit_radius_m: Option<f64>,
    /// Upper bound on the transit density score.
    #[arg(long = ARG_TRANSIT_CAP, value_name = "score")]
    #[serde(default)]
    pub(crate) transit_cap: Option<f64>,
    /// Whether transit scores are normalized (`false` copies raw scores).
    #[arg(long = ARG_TRANSIT_NORMALIZE, value_name = "bool")]
    #[serde(default)]
    pub(crate) transit_normalize: Option<bool>,
}

impl PipelineArgs {
    pub(crate) fn into_config(self) -> Result<PipelineConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        PipelineConfig::try_from(merged)
    }
}

/// Resolved pipeline configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PipelineConfig {
    /// Path to the SQLite score database.
    pub(crate) database: Utf8PathBuf,
    /// Listings per batch.
    pub(crate) batch_size: NonZeroUsize,
    /// Retry schedule for store calls.
    pub(crate) retry: RetryPolicy,
    /// Park proximity tunables.
    pub(crate) park: ParkProximityConfig,
    /// Transit density tunables.
    pub(crate) transit: AmenityDensityConfig,
}

impl TryFrom<PipelineArgs> for PipelineConfig {
    type Error = CliError;

    fn try_from(args: PipelineArgs) -> Result<Self, Self::Error> {
        let batch_size = args.batch_size.map_or(Ok(DEFAULT_BATCH_SIZE), |size| {
            NonZeroUsize::new(size).ok_or_else(|| CliError::InvalidArgument {
                field: ARG_BATCH_SIZE,
                expected: "at least 1",
                value: size.to_string(),
            })
        })?;

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_retries: args.max_retries.unwrap_or(defaults.max_retries),
            initial_backoff: args
                .initial_backoff_ms
                .map_or(defaults.initial_backoff, Duration::from_millis),
            max_backoff: args
                .max_backoff_ms
                .map_or(defaults.max_backoff, Duration::from_millis),
            ..defaults
        };

        let mut park = ParkProximityConfig::new(ScoreTypeId(
            args.park_score_type.unwrap_or(DEFAULT_PARK_SCORE_TYPE),
        ));
        park.radius_m = positive(ARG_PARK_RADIUS_M, args.park_radius_m, park.radius_m)?;
        park.distance_weight = args
            .park_distance_weight
            .map_or(Ok(park.distance_weight), |w| non_negative(ARG_PARK_DISTANCE_WEIGHT, w))?;
        park.coverage_weight = args
            .park_coverage_weight
            .map_or(Ok(park.coverage_weight), |w| non_negative(ARG_PARK_COVERAGE_WEIGHT, w))?;
        park.target_area_sq_m = positive(
            ARG_PARK_TARGET_AREA_SQ_M,
            args.park_target_area_sq_m,
            park.target_area_sq_m,
        )?;
        park.normalize = args.park_normalize.unwrap_or(park.normalize);

        let mut transit = AmenityDensityConfig::new(
            ScoreTypeId(args.transit_score_type.unwrap_or(DEFAULT_TRANSIT_SCORE_TYPE)),
            TRANSIT_CATEGORY,
        );
        transit.radius_m = positive(ARG_TRANSIT_RADIUS_M, args.transit_radius_m, transit.radius_m)?;
        transit.cap = args
            .transit_cap
            .map(|cap| non_negative(ARG_TRANSIT_CAP, cap))
            .transpose()?;
        transit.normalize = args.transit_normalize.unwrap_or(transit.normalize);

        if park.score_type_id == transit.score_type_id {
            return Err(CliError::InvalidArgument {
                field: ARG_TRANSIT_SCORE_TYPE,
                expected: "different from the park score type",
                value: transit.score_type_id.to_string(),
            });
        }

        Ok(Self {
            database: resolve_database(args.database),
            batch_size,
            retry,
            park,
            transit,
        })
    }
}

fn positive(field: &'static str, value: Option<f64>, default: f64) -> Result<f64, CliError> {
    value.map_or(Ok(default), |v| {
        require(field, v, "a finite number above 0", v > 0.0)
    })
}

fn non_negative(field: &'static str, value: f64) -> Result<f64, CliError> {
    require(field, value, "a finite number of at least 0", value >= 0.0)
}

fn require(
    field: &'static str,
    value: f64,
    expected: &'static str,
    accepted: bool,
) -> Result<f64, CliError> {
    if value.is_finite() && accepted {
        Ok(value)
    } else {
        Err(CliError::InvalidArgument {
            field,
            expected,
            value: value.to_string(),
        })
    }
}

/// Which stages a command runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stages {
    RawScoring,
    Normalization,
    Both,
}

/// Register the park and transit calculators over the stored amenities.
pub(crate) fn build_registry(
    store: &SqliteScoreStore,
    config: &PipelineConfig,
) -> Result<CalculatorRegistry, CliError> {
    let amenities = store.load_amenities()?;
    log::info!("indexed {} amenities", amenities.len());
    let index: Arc<dyn AmenitySource> = Arc::new(AmenityIndex::new(amenities));
    let park: Arc<dyn ScoreCalculator> = Arc::new(ParkProximityCalculator::new(
        Arc::clone(&index),
        config.park,
    ));
    let transit: Arc<dyn ScoreCalculator> = Arc::new(AmenityDensityCalculator::new(
        index,
        config.transit.clone(),
    ));
    Ok([park, transit].into_iter().collect())
}

pub(crate) fn run_stages(
    args: PipelineArgs,
    stages: Stages,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let config = args.into_config()?;
    let store = open_existing_store(&config.database)?;
    let calculators = build_registry(&store, &config)?;
    let context = RunContext::new();
    log::info!(
        "[{}] scoring {} with {} calculators",
        context.correlation_id(),
        config.database,
        calculators.len()
    );

    let summary = match stages {
        Stages::RawScoring => {
            let report = RawScoringStage::new(&store, &store, &calculators)
                .with_batch_size(config.batch_size)
                .with_retry_policy(config.retry)
                .run(&context);
            PipelineSummary {
                raw: Some(RawScoringSummary::from(&report)),
                normalization: None,
            }
        }
        Stages::Normalization => {
            let report = NormalizationStage::new(&store, &store, &calculators)
                .with_retry_policy(config.retry)
                .run(&context);
            PipelineSummary {
                raw: None,
                normalization: Some(NormalizationSummary::from(&report)),
            }
        }
        Stages::Both => {
            let report = run_pipeline(
                &store,
                &calculators,
                config.batch_size,
                config.retry,
                &context,
            );
            PipelineSummary::from(&report)
        }
    };
    write_json(writer, &summary)?;
    ensure_completed(&summary)
}

fn ensure_completed(summary: &PipelineSummary) -> Result<(), CliError> {
    if let Some(raw) = summary.raw.as_ref().filter(|raw| !raw.completed) {
        return Err(CliError::StageIncomplete {
            stage: "raw scoring",
            state: raw.state.clone(),
        });
    }
    match summary.normalization.as_ref().filter(|n| !n.completed) {
        Some(normalization) => Err(CliError::StageIncomplete {
            stage: "normalization",
            state: normalization.state.clone(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<PipelineConfig, CliError> {
    let merged = PipelineArgs::merge_from_layers(layers).map_err(CliError::from)?;
    PipelineConfig::try_from(merged)
}
