//! Raw scoring followed by normalization over one store.
#![forbid(unsafe_code)]

use std::num::NonZeroUsize;

use homescore_core::{ListingSource, ScoreStore, ScoreTypeCatalog};

use crate::{
    CalculatorRegistry, NormalizationReport, NormalizationStage, RawScoringReport,
    RawScoringStage, RetryPolicy, RunContext,
};

/// Store able to serve every collaborator role of a pipeline run.
pub trait PipelineStore: ListingSource + ScoreTypeCatalog + ScoreStore {}

impl<T: ListingSource + ScoreTypeCatalog + ScoreStore> PipelineStore for T {}

/// Reports of both stages. Normalization is absent when raw scoring did not
/// complete.
#[derive(Debug)]
pub struct PipelineReport {
    /// Raw scoring outcome.
    pub raw: RawScoringReport,
    /// Normalization outcome, when it ran.
    pub normalization: Option<NormalizationReport>,
}

impl PipelineReport {
    /// Report whether both stages completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.raw.is_completed()
            && self
                .normalization
                .as_ref()
                .is_some_and(NormalizationReport::is_completed)
    }
}

/// Score every listing, then normalize every active score type.
///
/// Normalization needs the complete raw population, so it only runs once
/// raw scoring has completed.
#[must_use]
pub fn run_pipeline(
    store: &dyn PipelineStore,
    calculators: &CalculatorRegistry,
    batch_size: NonZeroUsize,
    retry: RetryPolicy,
    context: &RunContext,
) -> PipelineReport {
    let raw = RawScoringStage::new(store, store, calculators)
        .with_batch_size(batch_size)
        .with_retry_policy(retry)
        .run(context);
    if !raw.is_completed() {
        log::warn!(
            "[{}] normalization skipped: raw scoring {}",
            context.correlation_id(),
            raw.state
        );
        return PipelineReport {
            raw,
            normalization: None,
        };
    }
    let normalization = NormalizationStage::new(store, store, calculators)
        .with_retry_policy(retry)
        .run(context);
    PipelineReport {
        raw,
        normalization: Some(normalization),
    }
}
