//! Stage orchestration: raw scoring and normalization.
#![forbid(unsafe_code)]

use std::fmt;

use uuid::Uuid;

mod normalize;
mod raw;

pub use normalize::{
    NormalizationReport, NormalizationStage, ScoreTypeOutcome, ScoreTypeStatus, SkipReason,
};
pub use raw::{CalculationFailure, DEFAULT_BATCH_SIZE, FailedBatch, RawScoringReport, RawScoringStage};

/// Lifecycle of a stage run.
///
/// Raw scoring moves `Pending -> Running`, normalization moves
/// `Pending -> PerScoreTypeLoop`; both end in `Completed`, `Failed` or
/// `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageState {
    /// Not started.
    Pending,
    /// Raw scoring is reading and scoring listing pages.
    Running,
    /// Normalization is working through the active score types.
    PerScoreTypeLoop,
    /// Every input was processed.
    Completed,
    /// The stage stopped on an unrecoverable store failure.
    Failed,
    /// The stage stopped at a boundary after cancellation was requested.
    Cancelled,
}

impl StageState {
    /// Report whether the state ends a run.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Report whether moving from `self` to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running | Self::PerScoreTypeLoop)
                | (
                    Self::Running | Self::PerScoreTypeLoop,
                    Self::Completed | Self::Failed | Self::Cancelled
                )
        )
    }
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::PerScoreTypeLoop => "per-score-type loop",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Tracks and logs the state of one stage run.
#[derive(Debug)]
struct StageMachine {
    stage: &'static str,
    correlation_id: Uuid,
    state: StageState,
}

impl StageMachine {
    const fn new(stage: &'static str, correlation_id: Uuid) -> Self {
        Self {
            stage,
            correlation_id,
            state: StageState::Pending,
        }
    }

    const fn state(&self) -> StageState {
        self.state
    }

    fn advance(&mut self, next: StageState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal {} transition {} -> {next}",
            self.stage,
            self.state
        );
        log::debug!(
            "[{}] {}: {} -> {next}",
            self.correlation_id,
            self.stage,
            self.state
        );
        self.state = next;
    }
}
