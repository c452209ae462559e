//! Per-listing aggregation of normalized scores.
#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use homescore_core::{ListingId, NormalizedScore, ScoreStore, ScoreTypeId, StoreError, round_half_up};

use crate::{BASE_SCORE, MAX_SCORE};

/// Number of strongest factors reported per listing.
pub const TOP_FACTOR_COUNT: usize = 3;

/// One contributing score type and its rounded normalized value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreFactor {
    /// Score type of the factor.
    pub score_type_id: ScoreTypeId,
    /// Normalized value rounded half-up to two decimals.
    pub score: f64,
}

/// Headline score of a listing.
///
/// `total` is the mean of every normalized score not excluded by the caller
/// that lies in `[BASE_SCORE, MAX_SCORE]`, rounded half-up to two decimals.
/// Passthrough types store raw values on their own scale, so values outside
/// the band are listed as factors but left out of the mean. `total` is `None`
/// when no value qualifies. `top_factors` holds up to [`TOP_FACTOR_COUNT`] factors in
/// descending order, ties broken by score type id.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreSummary {
    /// Listing summarized.
    pub listing_id: ListingId,
    /// Rounded average normalized score.
    pub total: Option<f64>,
    /// Strongest factors first.
    pub top_factors: Vec<ScoreFactor>,
}

impl ScoreSummary {
    /// Summarize `scores`, ignoring score types in `excluded` and records
    /// that were never normalized.
    ///
    /// # Examples
    /// ```
    /// use std::collections::BTreeSet;
    /// use homescore_core::{ListingId, NormalizedScore, ScoreTypeId};
    /// use homescore_scorer::ScoreSummary;
    ///
    /// let scores: Vec<_> = [(1, 4.0), (2, 8.0), (3, 6.5)]
    ///     .into_iter()
    ///     .map(|(id, value)| NormalizedScore {
    ///         listing_id: ListingId(7),
    ///         score_type_id: ScoreTypeId(id),
    ///         normalized_score: Some(value),
    ///     })
    ///     .collect();
    /// let summary = ScoreSummary::from_scores(ListingId(7), &scores, &BTreeSet::new());
    /// assert_eq!(summary.total, Some(6.17));
    /// assert_eq!(summary.top_factors.first().map(|f| f.score_type_id), Some(ScoreTypeId(2)));
    /// ```
    #[must_use]
    #[expect(
        clippy::float_arithmetic,
        reason = "the headline score is an arithmetic mean"
    )]
    pub fn from_scores(
        listing_id: ListingId,
        scores: &[NormalizedScore],
        excluded: &BTreeSet<ScoreTypeId>,
    ) -> Self {
        let mut factors: Vec<(ScoreTypeId, f64)> = scores
            .iter()
            .filter(|score| !excluded.contains(&score.score_type_id))
            .filter_map(|score| score.normalized_score.map(|value| (score.score_type_id, value)))
            .collect();

        let banded: Vec<f64> = factors
            .iter()
            .map(|(_, value)| *value)
            .filter(|value| (BASE_SCORE..=MAX_SCORE).contains(value))
            .collect();
        let total = u32::try_from(banded.len())
            .ok()
            .filter(|count| *count > 0)
            .map(|count| {
                let sum: f64 = banded.iter().sum();
                round_half_up(sum / f64::from(count), 2)
            });

        factors.sort_by(|(a_id, a), (b_id, b)| b.total_cmp(a).then(a_id.cmp(b_id)));
        let top_factors = factors
            .into_iter()
            .take(TOP_FACTOR_COUNT)
            .map(|(score_type_id, value)| ScoreFactor {
                score_type_id,
                score: round_half_up(value, 2),
            })
            .collect();

        Self {
            listing_id,
            total,
            top_factors,
        }
    }

    /// Load a listing's normalized scores from `store` and summarize them.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the scores cannot be read.
    pub fn load(
        store: &dyn ScoreStore,
        listing_id: ListingId,
        excluded: &BTreeSet<ScoreTypeId>,
    ) -> Result<Self, StoreError> {
        let scores = store.normalized_scores_for(listing_id)?;
        Ok(Self::from_scores(listing_id, &scores, excluded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn normalized(score_type: u64, value: Option<f64>) -> NormalizedScore {
        NormalizedScore {
            listing_id: ListingId(1),
            score_type_id: ScoreTypeId(score_type),
            normalized_score: value,
        }
    }

    #[rstest]
    fn keeps_the_three_strongest_factors() {
        let scores = [
            normalized(1, Some(2.0)),
            normalized(2, Some(9.0)),
            normalized(3, Some(5.5)),
            normalized(4, Some(7.126)),
        ];
        let summary = ScoreSummary::from_scores(ListingId(1), &scores, &BTreeSet::new());
        let top: Vec<_> = summary
            .top_factors
            .iter()
            .map(|factor| (factor.score_type_id.0, factor.score))
            .collect();
        assert_eq!(top, vec![(2, 9.0), (4, 7.13), (3, 5.5)]);
    }

    #[rstest]
    fn excluded_types_do_not_count() {
        let scores = [normalized(1, Some(10.0)), normalized(2, Some(2.0))];
        let excluded = BTreeSet::from([ScoreTypeId(1)]);
        let summary = ScoreSummary::from_scores(ListingId(1), &scores, &excluded);
        assert_eq!(summary.total, Some(2.0));
        assert_eq!(summary.top_factors.len(), 1);
    }

    #[rstest]
    fn unnormalized_scores_give_no_total() {
        let summary =
            ScoreSummary::from_scores(ListingId(1), &[normalized(1, None)], &BTreeSet::new());
        assert_eq!(summary.total, None);
        assert!(summary.top_factors.is_empty());
    }

    #[rstest]
    fn out_of_band_values_are_left_out_of_the_total() {
        let scores = [
            normalized(1, Some(4.0)),
            normalized(2, Some(250.0)),
            normalized(3, Some(0.2)),
            normalized(4, Some(8.0)),
        ];
        let summary = ScoreSummary::from_scores(ListingId(1), &scores, &BTreeSet::new());
        assert_eq!(summary.total, Some(6.0));
        assert_eq!(
            summary.top_factors.first().map(|factor| factor.score_type_id),
            Some(ScoreTypeId(2))
        );
    }

    #[rstest]
    fn only_out_of_band_values_give_no_total() {
        let summary =
            ScoreSummary::from_scores(ListingId(1), &[normalized(1, Some(42.0))], &BTreeSet::new());
        assert_eq!(summary.total, None);
        assert_eq!(summary.top_factors.len(), 1);
    }

    #[rstest]
    fn ties_are_broken_by_score_type() {
        let scores = [normalized(5, Some(4.0)), normalized(2, Some(4.0))];
        let summary = ScoreSummary::from_scores(ListingId(1), &scores, &BTreeSet::new());
        let ids: Vec<_> = summary.top_factors.iter().map(|f| f.score_type_id).collect();
        assert_eq!(ids, vec![ScoreTypeId(2), ScoreTypeId(5)]);
    }
}
