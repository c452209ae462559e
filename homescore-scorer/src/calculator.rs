//! Raw score calculators and their registry.
#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use homescore_core::{Listing, ListingId, ScoreTypeId};

use crate::{CalculationError, ScoreNormalizer};

/// Computes one raw score per listing for a single score type.
///
/// Calculators must be deterministic for identical inputs, side-effect free
/// and carry no state across listings, so the stages may evaluate them
/// concurrently and in any order.
pub trait ScoreCalculator: Send + Sync {
    /// Score type whose records this calculator produces.
    fn score_type_id(&self) -> ScoreTypeId;

    /// Normalizer applied to this score type, or `None` to copy raw values
    /// through unchanged.
    fn normalizer(&self) -> Option<&dyn ScoreNormalizer>;

    /// Compute the raw score for `listing`. Successful values are finite and
    /// non-negative.
    ///
    /// # Errors
    /// Returns [`CalculationError`] when the score cannot be computed.
    fn calculate_raw_score(&self, listing: &Listing) -> Result<f64, CalculationError>;
}

/// Validate a calculator output.
///
/// # Errors
/// Returns [`CalculationError::InvalidScore`] when `value` is negative, NaN or
/// infinite.
pub fn checked_raw_score(listing_id: ListingId, value: f64) -> Result<f64, CalculationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(CalculationError::InvalidScore { listing_id, value })
    }
}

/// Calculators keyed by the score type they produce.
///
/// Populated once at start-up and shared read-only by both stages.
#[derive(Default, Clone)]
pub struct CalculatorRegistry {
    calculators: BTreeMap<ScoreTypeId, Arc<dyn ScoreCalculator>>,
}

impl fmt::Debug for CalculatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalculatorRegistry")
            .field("score_types", &self.calculators.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CalculatorRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `calculator` under its score type, returning any calculator
    /// it replaced.
    pub fn register(
        &mut self,
        calculator: Arc<dyn ScoreCalculator>,
    ) -> Option<Arc<dyn ScoreCalculator>> {
        self.calculators
            .insert(calculator.score_type_id(), calculator)
    }

    /// Calculator registered for `score_type_id`.
    #[must_use]
    pub fn get(&self, score_type_id: ScoreTypeId) -> Option<&Arc<dyn ScoreCalculator>> {
        self.calculators.get(&score_type_id)
    }

    /// Calculators ordered by score type id.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ScoreCalculator>> + '_ {
        self.calculators.values()
    }

    /// Number of registered calculators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.calculators.len()
    }

    /// Report whether no calculator is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calculators.is_empty()
    }
}

impl FromIterator<Arc<dyn ScoreCalculator>> for CalculatorRegistry {
    fn from_iter<I: IntoIterator<Item = Arc<dyn ScoreCalculator>>>(iter: I) -> Self {
        let mut registry = Self::new();
        for calculator in iter {
            registry.register(calculator);
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    struct Constant(ScoreTypeId, f64);

    impl ScoreCalculator for Constant {
        fn score_type_id(&self) -> ScoreTypeId {
            self.0
        }

        fn normalizer(&self) -> Option<&dyn ScoreNormalizer> {
            None
        }

        fn calculate_raw_score(&self, _listing: &Listing) -> Result<f64, CalculationError> {
            Ok(self.1)
        }
    }

    #[rstest]
    fn register_replaces_calculators_for_the_same_type() {
        let mut registry = CalculatorRegistry::new();
        assert!(registry.register(Arc::new(Constant(ScoreTypeId(1), 1.0))).is_none());
        assert!(registry.register(Arc::new(Constant(ScoreTypeId(1), 2.0))).is_some());
        assert_eq!(registry.len(), 1);
    }

    #[rstest]
    fn iterates_in_score_type_order() {
        let registry: CalculatorRegistry = [
            Arc::new(Constant(ScoreTypeId(3), 0.0)) as Arc<dyn ScoreCalculator>,
            Arc::new(Constant(ScoreTypeId(1), 0.0)),
        ]
        .into_iter()
        .collect();
        let ids: Vec<_> = registry.iter().map(|calc| calc.score_type_id()).collect();
        assert_eq!(ids, vec![ScoreTypeId(1), ScoreTypeId(3)]);
    }

    #[rstest]
    #[case(-1.0)]
    #[case(f64::NAN)]
    #[case(f64::NEG_INFINITY)]
    fn checked_raw_score_rejects_invalid_values(#[case] value: f64) {
        assert!(matches!(
            checked_raw_score(ListingId(9), value),
            Err(CalculationError::InvalidScore { listing_id: ListingId(9), .. })
        ));
    }
}
