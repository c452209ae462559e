//! Normalization: per score type, read all raw scores, rescale, write back.

use std::collections::BTreeMap;
use std::fmt;

use homescore_core::{ListingId, ScoreStore, ScoreType, ScoreTypeCatalog, ScoreTypeId};
use rayon::prelude::*;
use uuid::Uuid;

use super::{StageMachine, StageState};
use crate::{CalculatorRegistry, NormalizeError, RetryPolicy, RunContext, StageError};

/// Why a score type was left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No calculator is registered for the type.
    NoCalculator,
    /// The type has no raw scores yet.
    EmptyScorePopulation,
    /// Cancellation was requested before the type was processed.
    Cancelled,
}

/// Result of normalizing one score type.
#[derive(Debug)]
pub enum ScoreTypeStatus {
    /// Raw scores were rescaled and written back.
    Normalized {
        /// Rows updated.
        updated: usize,
    },
    /// The calculator opted out; raw values were copied through.
    PassedThrough {
        /// Rows updated.
        updated: usize,
    },
    /// Nothing was written.
    Skipped(SkipReason),
    /// Reading, rescaling or writing failed; other types were unaffected.
    Failed(StageError),
}

/// Status of one active score type.
#[derive(Debug)]
pub struct ScoreTypeOutcome {
    /// Score type processed.
    pub score_type_id: ScoreTypeId,
    /// Display name from the catalog.
    pub name: String,
    /// What happened.
    pub status: ScoreTypeStatus,
}

impl ScoreTypeOutcome {
    /// Report whether the type failed because retries against the store ran out.
    #[must_use]
    pub const fn store_unreachable(&self) -> bool {
        matches!(
            self.status,
            ScoreTypeStatus::Failed(StageError::RetriesExhausted { .. })
        )
    }
}

/// Outcome of a [`NormalizationStage`] run.
#[derive(Debug)]
pub struct NormalizationReport {
    /// Correlation id of the run.
    pub correlation_id: Uuid,
    /// Terminal state reached.
    pub state: StageState,
    /// One entry per active score type, ordered by id.
    pub outcomes: Vec<ScoreTypeOutcome>,
    /// Catalog failure that failed the stage, if any. Per-type store
    /// failures stay in `outcomes`.
    pub error: Option<StageError>,
}

impl NormalizationReport {
    /// Outcome recorded for `score_type_id`.
    #[must_use]
    pub fn outcome(&self, score_type_id: ScoreTypeId) -> Option<&ScoreTypeOutcome> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.score_type_id == score_type_id)
    }

    /// Number of score types whose processing failed.
    #[must_use]
    pub fn failed_types(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome.status, ScoreTypeStatus::Failed(_)))
            .count()
    }

    /// Report whether the stage processed every active type.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.state == StageState::Completed
    }
}

/// Rescales the raw scores of every active score type.
///
/// Score types are independent and processed concurrently. For each one the
/// complete raw population is loaded, normalized with the calculator's
/// normalizer (or copied through when it has none), and written back in a
/// single bulk update. A failing type is reported and the others continue.
/// The stage itself fails when the catalog cannot be read or when the store
/// stayed unreachable through every retry for some type.
pub struct NormalizationStage<'a> {
    catalog: &'a dyn ScoreTypeCatalog,
    store: &'a dyn ScoreStore,
    calculators: &'a CalculatorRegistry,
    retry: RetryPolicy,
}

impl fmt::Debug for NormalizationStage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NormalizationStage")
            .field("calculators", self.calculators)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl<'a> NormalizationStage<'a> {
    /// Assemble a stage with the default retry policy.
    #[must_use]
    pub fn new(
        catalog: &'a dyn ScoreTypeCatalog,
        store: &'a dyn ScoreStore,
        calculators: &'a CalculatorRegistry,
    ) -> Self {
        Self {
            catalog,
            store,
            calculators,
            retry: RetryPolicy::default(),
        }
    }

    /// Set the retry policy for store calls.
    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Normalize every active score type.
    #[must_use]
    pub fn run(&self, context: &RunContext) -> NormalizationReport {
        let id = context.correlation_id();
        let mut machine = StageMachine::new("normalization", id);
        machine.advance(StageState::PerScoreTypeLoop);

        let score_types = match self.retry.run(context, "read score types", || {
            self.catalog.active_score_types()
        }) {
            Ok(score_types) => score_types,
            Err(error) => {
                log::error!("[{id}] normalization failed: {error}");
                machine.advance(StageState::Failed);
                return NormalizationReport {
                    correlation_id: id,
                    state: machine.state(),
                    outcomes: Vec::new(),
                    error: Some(error),
                };
            }
        };
        log::info!(
            "[{id}] normalization started for {} score types",
            score_types.len()
        );

        let outcomes: Vec<_> = score_types
            .into_par_iter()
            .map(|score_type| {
                let status = self.normalize_type(context, &score_type);
                log_outcome(id, &score_type, &status);
                ScoreTypeOutcome {
                    score_type_id: score_type.id,
                    name: score_type.name,
                    status,
                }
            })
            .collect();

        if context.is_cancelled() {
            machine.advance(StageState::Cancelled);
        } else if outcomes.iter().any(ScoreTypeOutcome::store_unreachable) {
            log::error!("[{id}] normalization failed: store unreachable");
            machine.advance(StageState::Failed);
        } else {
            machine.advance(StageState::Completed);
        }
        NormalizationReport {
            correlation_id: id,
            state: machine.state(),
            outcomes,
            error: None,
        }
    }

    fn normalize_type(&self, context: &RunContext, score_type: &ScoreType) -> ScoreTypeStatus {
        if context.is_cancelled() {
            return ScoreTypeStatus::Skipped(SkipReason::Cancelled);
        }
        let Some(calculator) = self.calculators.get(score_type.id) else {
            return ScoreTypeStatus::Skipped(SkipReason::NoCalculator);
        };
        let population = match self.retry.run(context, "read raw scores", || {
            self.store.raw_scores_for_type(score_type.id)
        }) {
            Ok(population) => population,
            Err(error) => return ScoreTypeStatus::Failed(error),
        };
        if population.is_empty() {
            return ScoreTypeStatus::Skipped(SkipReason::EmptyScorePopulation);
        }

        let raw_values: Vec<f64> = population.iter().map(|score| score.raw_score).collect();
        let normalizer = calculator.normalizer();
        let values = match normalizer.map(|n| n.normalize_population(&raw_values)) {
            None => raw_values,
            Some(Ok(values)) => values,
            Some(Err(NormalizeError::EmptyScorePopulation)) => {
                return ScoreTypeStatus::Skipped(SkipReason::EmptyScorePopulation);
            }
            Some(Err(error)) => return ScoreTypeStatus::Failed(error.into()),
        };

        let updates: BTreeMap<ListingId, f64> = population
            .iter()
            .map(|score| score.listing_id)
            .zip(values)
            .collect();
        match self.retry.run(context, "write normalized scores", || {
            self.store.update_normalized_scores(score_type.id, &updates)
        }) {
            Ok(updated) if normalizer.is_some() => ScoreTypeStatus::Normalized { updated },
            Ok(updated) => ScoreTypeStatus::PassedThrough { updated },
            Err(error) => ScoreTypeStatus::Failed(error),
        }
    }
}

fn log_outcome(id: Uuid, score_type: &ScoreType, status: &ScoreTypeStatus) {
    let name = &score_type.name;
    let type_id = score_type.id;
    match status {
        ScoreTypeStatus::Normalized { updated } => {
            log::info!("[{id}] normalized {updated} {name} ({type_id}) scores");
        }
        ScoreTypeStatus::PassedThrough { updated } => {
            log::info!("[{id}] copied {updated} raw {name} ({type_id}) scores through");
        }
        ScoreTypeStatus::Skipped(reason) => {
            log::warn!("[{id}] skipped {name} ({type_id}): {reason:?}");
        }
        ScoreTypeStatus::Failed(error) => {
            log::error!("[{id}] normalizing {name} ({type_id}) failed: {error}");
        }
    }
}
