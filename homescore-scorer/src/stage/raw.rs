//! Raw scoring: every registered calculator against every listing.

use std::fmt;
use std::num::NonZeroUsize;

use chrono::{DateTime, Utc};
use homescore_core::{
    Listing, ListingId, ListingSource, RawScore, RejectedListing, ScoreStore, ScoreTypeId,
};
use rayon::prelude::*;
use uuid::Uuid;

use super::{StageMachine, StageState};
use crate::{CalculationError, CalculatorRegistry, RetryPolicy, RunContext, ScoreCalculator, StageError};

/// Listings read and written per batch unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: NonZeroUsize = NonZeroUsize::MIN.saturating_add(99);

/// One (listing, calculator) evaluation that produced no score.
#[derive(Debug, Clone, PartialEq)]
pub struct CalculationFailure {
    /// Listing being scored.
    pub listing_id: ListingId,
    /// Score type of the failing calculator.
    pub score_type_id: ScoreTypeId,
    /// Reason the calculator gave.
    pub error: CalculationError,
}

/// The batch that stopped a failed run.
#[derive(Debug)]
pub struct FailedBatch {
    /// Zero-based position of the batch in the run.
    pub index: usize,
    /// Keyset cursor the batch was read after; `None` for the first batch.
    pub cursor: Option<ListingId>,
    /// Store failure that stopped the run.
    pub error: StageError,
}

/// Outcome of a [`RawScoringStage`] run.
#[derive(Debug)]
pub struct RawScoringReport {
    /// Correlation id of the run.
    pub correlation_id: Uuid,
    /// Terminal state reached.
    pub state: StageState,
    /// Valid listings read.
    pub listings_seen: usize,
    /// Raw score rows upserted.
    pub scores_written: usize,
    /// Batches whose scores were committed.
    pub committed_batches: usize,
    /// Evaluations skipped because a calculator failed.
    pub calculation_failures: Vec<CalculationFailure>,
    /// Listings skipped because of invalid stored coordinates.
    pub rejected: Vec<RejectedListing>,
    /// Batch that failed the run, if it failed.
    pub failed_batch: Option<FailedBatch>,
}

impl RawScoringReport {
    const fn new(correlation_id: Uuid) -> Self {
        Self {
            correlation_id,
            state: StageState::Pending,
            listings_seen: 0,
            scores_written: 0,
            committed_batches: 0,
            calculation_failures: Vec::new(),
            rejected: Vec::new(),
            failed_batch: None,
        }
    }

    /// Report whether every listing was processed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.state == StageState::Completed
    }
}

/// Runs every registered calculator against every listing and upserts the
/// raw scores in bounded batches.
///
/// Listings are read by keyset pagination, one batch at a time. Within a
/// batch, (listing, calculator) pairs are evaluated in parallel; failures are
/// recorded and never abort the run. Each batch is written in one upsert,
/// retried on transient store errors.
pub struct RawScoringStage<'a> {
    listings: &'a dyn ListingSource,
    store: &'a dyn ScoreStore,
    calculators: &'a CalculatorRegistry,
    batch_size: NonZeroUsize,
    retry: RetryPolicy,
}

impl fmt::Debug for RawScoringStage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawScoringStage")
            .field("calculators", self.calculators)
            .field("batch_size", &self.batch_size)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl<'a> RawScoringStage<'a> {
    /// Assemble a stage with the default batch size and retry policy.
    #[must_use]
    pub fn new(
        listings: &'a dyn ListingSource,
        store: &'a dyn ScoreStore,
        calculators: &'a CalculatorRegistry,
    ) -> Self {
        Self {
            listings,
            store,
            calculators,
            batch_size: DEFAULT_BATCH_SIZE,
            retry: RetryPolicy::default(),
        }
    }

    /// Set the number of listings per batch.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: NonZeroUsize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the retry policy for store calls.
    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Score every listing.
    ///
    /// The report always comes back; inspect [`RawScoringReport::state`] to
    /// learn whether the run completed, failed or was cancelled.
    #[must_use]
    pub fn run(&self, context: &RunContext) -> RawScoringReport {
        let id = context.correlation_id();
        let mut machine = StageMachine::new("raw scoring", id);
        let mut report = RawScoringReport::new(id);
        machine.advance(StageState::Running);
        log::info!(
            "[{id}] raw scoring started: {} calculators, batches of {}",
            self.calculators.len(),
            self.batch_size
        );

        let mut cursor = None;
        loop {
            if context.is_cancelled() {
                log::info!("[{id}] raw scoring cancelled after {} batches", report.committed_batches);
                machine.advance(StageState::Cancelled);
                break;
            }
            match self.process_batch(context, cursor, &mut report) {
                Ok(Some(next)) => cursor = Some(next),
                Ok(None) => {
                    machine.advance(StageState::Completed);
                    break;
                }
                Err(error) => {
                    log::error!(
                        "[{id}] raw scoring failed at batch {}: {error}",
                        report.committed_batches
                    );
                    report.failed_batch = Some(FailedBatch {
                        index: report.committed_batches,
                        cursor,
                        error,
                    });
                    machine.advance(StageState::Failed);
                    break;
                }
            }
        }

        report.state = machine.state();
        log::info!(
            "[{id}] raw scoring {}: {} listings, {} scores, {} failures, {} rejected",
            report.state,
            report.listings_seen,
            report.scores_written,
            report.calculation_failures.len(),
            report.rejected.len()
        );
        report
    }

    /// Read, score and write one batch. Returns the next cursor, or `None`
    /// once the listing sequence is exhausted.
    fn process_batch(
        &self,
        context: &RunContext,
        cursor: Option<ListingId>,
        report: &mut RawScoringReport,
    ) -> Result<Option<ListingId>, StageError> {
        let id = context.correlation_id();
        let page = self.retry.run(context, "read listings", || {
            self.listings.listings_after(cursor, self.batch_size.get())
        })?;
        let Some(next_cursor) = page.next_cursor else {
            return Ok(None);
        };

        for rejected in &page.rejected {
            log::warn!("[{id}] skipping listing {}: {}", rejected.id, rejected.error);
        }
        report.rejected.extend(page.rejected);
        report.listings_seen += page.listings.len();

        let (scores, failures) = self.score_listings(&page.listings, Utc::now());
        for failure in &failures {
            log::warn!(
                "[{id}] score type {} skipped for listing {}: {}",
                failure.score_type_id,
                failure.listing_id,
                failure.error
            );
        }
        report.calculation_failures.extend(failures);

        if !scores.is_empty() {
            let written = self
                .retry
                .run(context, "write raw scores", || self.store.upsert_raw_scores(&scores))?;
            report.scores_written += written;
        }
        report.committed_batches += 1;
        Ok(Some(next_cursor))
    }

    fn score_listings(
        &self,
        listings: &[Listing],
        computed_at: DateTime<Utc>,
    ) -> (Vec<RawScore>, Vec<CalculationFailure>) {
        let outcomes: Vec<_> = listings
            .par_iter()
            .flat_map_iter(|listing| {
                self.calculators
                    .iter()
                    .map(move |calculator| evaluate(calculator.as_ref(), listing, computed_at))
            })
            .collect();

        let mut scores = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(score) => scores.push(score),
                Err(failure) => failures.push(failure),
            }
        }
        (scores, failures)
    }
}

fn evaluate(
    calculator: &dyn ScoreCalculator,
    listing: &Listing,
    computed_at: DateTime<Utc>,
) -> Result<RawScore, CalculationFailure> {
    let score_type_id = calculator.score_type_id();
    let failure = |error| CalculationFailure {
        listing_id: listing.id,
        score_type_id,
        error,
    };
    let value = calculator.calculate_raw_score(listing).map_err(failure)?;
    RawScore::new(listing.id, score_type_id, value, computed_at).map_err(|_| {
        failure(CalculationError::InvalidScore {
            listing_id: listing.id,
            value,
        })
    })
}
