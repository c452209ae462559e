//! JSON renderings of stage reports.

use homescore_scorer::{
    NormalizationReport, PipelineReport, RawScoringReport, ScoreTypeStatus, SkipReason,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub(crate) struct CalculationFailureLine {
    pub(crate) listing_id: u64,
    pub(crate) score_type_id: u64,
    pub(crate) error: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct RejectedListingLine {
    pub(crate) listing_id: u64,
    pub(crate) error: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct FailedBatchLine {
    pub(crate) index: usize,
    pub(crate) cursor: Option<u64>,
    pub(crate) error: String,
}

/// Raw scoring outcome as printed by the CLI.
#[derive(Debug, Serialize)]
pub(crate) struct RawScoringSummary {
    pub(crate) correlation_id: String,
    pub(crate) state: String,
    #[serde(skip)]
    pub(crate) completed: bool,
    pub(crate) listings_seen: usize,
    pub(crate) scores_written: usize,
    pub(crate) committed_batches: usize,
    pub(crate) calculation_failures: Vec<CalculationFailureLine>,
    pub(crate) rejected: Vec<RejectedListingLine>,
    pub(crate) failed_batch: Option<FailedBatchLine>,
}

impl From<&RawScoringReport> for RawScoringSummary {
    fn from(report: &RawScoringReport) -> Self {
        Self {
            correlation_id: report.correlation_id.to_string(),
            state: report.state.to_string(),
            completed: report.is_completed(),
            listings_seen: report.listings_seen,
            scores_written: report.scores_written,
            committed_batches: report.committed_batches,
            calculation_failures: report
                .calculation_failures
                .iter()
                .map(|failure| CalculationFailureLine {
                    listing_id: failure.listing_id.0,
                    score_type_id: failure.score_type_id.0,
                    error: failure.error.to_string(),
                })
                .collect(),
            rejected: report
                .rejected
                .iter()
                .map(|rejected| RejectedListingLine {
                    listing_id: rejected.id.0,
                    error: rejected.error.to_string(),
                })
                .collect(),
            failed_batch: report.failed_batch.as_ref().map(|batch| FailedBatchLine {
                index: batch.index,
                cursor: batch.cursor.map(|cursor| cursor.0),
                error: batch.error.to_string(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ScoreTypeLine {
    pub(crate) score_type_id: u64,
    pub(crate) name: String,
    pub(crate) status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) updated: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) detail: Option<String>,
}

/// Normalization outcome as printed by the CLI.
#[derive(Debug, Serialize)]
pub(crate) struct NormalizationSummary {
    pub(crate) correlation_id: String,
    pub(crate) state: String,
    #[serde(skip)]
    pub(crate) completed: bool,
    pub(crate) score_types: Vec<ScoreTypeLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<String>,
}

impl From<&NormalizationReport> for NormalizationSummary {
    fn from(report: &NormalizationReport) -> Self {
        let score_types = report
            .outcomes
            .iter()
            .map(|outcome| {
                let (status, updated, detail) = match &outcome.status {
                    ScoreTypeStatus::Normalized { updated } => ("normalized", Some(*updated), None),
                    ScoreTypeStatus::PassedThrough { updated } => {
                        ("passed_through", Some(*updated), None)
                    }
                    ScoreTypeStatus::Skipped(reason) => {
                        ("skipped", None, Some(skip_label(*reason).to_owned()))
                    }
                    ScoreTypeStatus::Failed(error) => ("failed", None, Some(error.to_string())),
                };
                ScoreTypeLine {
                    score_type_id: outcome.score_type_id.0,
                    name: outcome.name.clone(),
                    status,
                    updated,
                    detail,
                }
            })
            .collect();
        Self {
            correlation_id: report.correlation_id.to_string(),
            state: report.state.to_string(),
            completed: report.is_completed(),
            score_types,
            error: report.error.as_ref().map(ToString::to_string),
        }
    }
}

const fn skip_label(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::NoCalculator => "no calculator registered",
        SkipReason::EmptyScorePopulation => "no raw scores",
        SkipReason::Cancelled => "cancelled",
    }
}

/// Output of the `score`, `normalize` and `run` commands.
#[derive(Debug, Serialize)]
pub(crate) struct PipelineSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) raw: Option<RawScoringSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) normalization: Option<NormalizationSummary>,
}

impl From<&PipelineReport> for PipelineSummary {
    fn from(report: &PipelineReport) -> Self {
        Self {
            raw: Some(RawScoringSummary::from(&report.raw)),
            normalization: report.normalization.as_ref().map(NormalizationSummary::from),
        }
    }
}
