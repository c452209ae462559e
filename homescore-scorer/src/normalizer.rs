//! Linear min-max rescaling of raw scores onto the `[1, 10]` band.
#![forbid(unsafe_code)]

use std::fmt;

use crate::NormalizeError;

/// Lowest normalized score.
pub const BASE_SCORE: f64 = 1.0;

/// Highest normalized score.
pub const MAX_SCORE: f64 = 10.0;

/// Score assigned to every member of a population whose raw values are all
/// equal.
pub const UNIFORM_SCORE: f64 = 5.0;

/// Rescales raw scores against the population they belong to.
///
/// Implementations must be stateless: the output depends only on the raw
/// value and the population.
pub trait ScoreNormalizer: Send + Sync + fmt::Debug {
    /// Normalize `raw` against `population`.
    ///
    /// # Errors
    /// Returns [`NormalizeError::EmptyScorePopulation`] for an empty
    /// population and [`NormalizeError::NonFiniteScore`] when `raw` or a
    /// member of the population is not finite.
    fn normalize(&self, raw: f64, population: &[f64]) -> Result<f64, NormalizeError>;

    /// Normalize every member of `population`, preserving order.
    ///
    /// Implementations may override this to compute population statistics
    /// once, but the output must equal calling [`Self::normalize`] for each
    /// element.
    ///
    /// # Errors
    /// Returns the same errors as [`Self::normalize`].
    fn normalize_population(&self, population: &[f64]) -> Result<Vec<f64>, NormalizeError> {
        population
            .iter()
            .map(|&raw| self.normalize(raw, population))
            .collect()
    }
}

/// Minimum and maximum of a score population.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopulationBounds {
    min: f64,
    max: f64,
}

impl PopulationBounds {
    /// Scan `population` for its bounds.
    ///
    /// # Errors
    /// Returns [`NormalizeError::EmptyScorePopulation`] when `population` is
    /// empty and [`NormalizeError::NonFiniteScore`] when any value is NaN or
    /// infinite.
    ///
    /// # Examples
    /// ```
    /// use homescore_scorer::PopulationBounds;
    ///
    /// let bounds = PopulationBounds::of(&[5.0, 1.0, 9.0]).expect("non-empty population");
    /// assert_eq!((bounds.min(), bounds.max()), (1.0, 9.0));
    /// ```
    pub fn of(population: &[f64]) -> Result<Self, NormalizeError> {
        let mut values = population.iter().copied();
        let first = values.next().ok_or(NormalizeError::EmptyScorePopulation)?;
        let initial = Self::checked(first)?;
        values.try_fold(initial, |bounds, value| {
            let finite = Self::checked(value)?;
            Ok(Self {
                min: bounds.min.min(finite.min),
                max: bounds.max.max(finite.max),
            })
        })
    }

    fn checked(value: f64) -> Result<Self, NormalizeError> {
        if value.is_finite() {
            Ok(Self {
                min: value,
                max: value,
            })
        } else {
            Err(NormalizeError::NonFiniteScore { value })
        }
    }

    /// Smallest raw score.
    #[must_use]
    pub const fn min(self) -> f64 {
        self.min
    }

    /// Largest raw score.
    #[must_use]
    pub const fn max(self) -> f64 {
        self.max
    }

    /// Report whether every member of the population is equal.
    #[must_use]
    #[expect(
        clippy::float_cmp,
        reason = "uniformity is an exact equality of the observed bounds"
    )]
    pub fn is_uniform(self) -> bool {
        self.min == self.max
    }
}

/// Maps raw scores linearly onto `[BASE_SCORE, MAX_SCORE]`.
///
/// The smallest raw score maps to [`BASE_SCORE`], the largest to
/// [`MAX_SCORE`]. A population with no spread maps entirely to
/// [`UNIFORM_SCORE`]. Results are clamped to the band and are not rounded.
///
/// # Examples
/// ```
/// use homescore_scorer::{LinearScoreNormalizer, ScoreNormalizer};
///
/// let normalizer = LinearScoreNormalizer;
/// let scores = normalizer.normalize_population(&[1.0, 5.0, 9.0]).expect("normalize");
/// assert_eq!(scores, vec![1.0, 5.5, 10.0]);
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LinearScoreNormalizer;

impl LinearScoreNormalizer {
    /// Scale `raw` against precomputed `bounds`.
    #[must_use]
    #[expect(
        clippy::float_arithmetic,
        reason = "min-max rescaling is floating-point interpolation"
    )]
    pub fn scale(self, raw: f64, bounds: PopulationBounds) -> f64 {
        if bounds.is_uniform() {
            return UNIFORM_SCORE;
        }
        let fraction = (raw - bounds.min) / (bounds.max - bounds.min);
        (BASE_SCORE + fraction * (MAX_SCORE - BASE_SCORE)).clamp(BASE_SCORE, MAX_SCORE)
    }
}

impl ScoreNormalizer for LinearScoreNormalizer {
    fn normalize(&self, raw: f64, population: &[f64]) -> Result<f64, NormalizeError> {
        let bounds = PopulationBounds::of(population)?;
        if !raw.is_finite() {
            return Err(NormalizeError::NonFiniteScore { value: raw });
        }
        Ok(self.scale(raw, bounds))
    }

    fn normalize_population(&self, population: &[f64]) -> Result<Vec<f64>, NormalizeError> {
        let bounds = PopulationBounds::of(population)?;
        Ok(population
            .iter()
            .map(|&raw| self.scale(raw, bounds))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[1.0, 5.0, 9.0], &[1.0, 5.5, 10.0])]
    #[case(&[2.0, 6.0, 10.0], &[1.0, 5.5, 10.0])]
    #[case(&[3.0, 3.0, 3.0], &[5.0, 5.0, 5.0])]
    #[case(&[0.0], &[5.0])]
    fn normalizes_populations(#[case] population: &[f64], #[case] expected: &[f64]) {
        let scores = LinearScoreNormalizer
            .normalize_population(population)
            .expect("normalize population");
        assert_eq!(scores, expected);
    }

    #[rstest]
    fn empty_population_is_an_error() {
        let err = LinearScoreNormalizer
            .normalize(1.0, &[])
            .expect_err("empty population");
        assert_eq!(err, NormalizeError::EmptyScorePopulation);
    }

    #[rstest]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    fn non_finite_members_are_rejected(#[case] value: f64) {
        let err = LinearScoreNormalizer
            .normalize_population(&[1.0, value])
            .expect_err("non-finite member");
        assert!(matches!(err, NormalizeError::NonFiniteScore { .. }));
    }

    #[rstest]
    fn values_outside_the_population_are_clamped() {
        let population = [2.0, 4.0];
        assert_eq!(LinearScoreNormalizer.normalize(100.0, &population), Ok(MAX_SCORE));
        assert_eq!(LinearScoreNormalizer.normalize(0.0, &population), Ok(BASE_SCORE));
    }

    #[derive(Debug)]
    struct PerElement;

    impl ScoreNormalizer for PerElement {
        fn normalize(&self, raw: f64, population: &[f64]) -> Result<f64, NormalizeError> {
            LinearScoreNormalizer.normalize(raw, population)
        }
    }

    #[rstest]
    fn default_population_method_delegates_to_normalize() {
        let population = [0.5, 7.25, 3.0, 12.0];
        assert_eq!(
            PerElement.normalize_population(&population),
            LinearScoreNormalizer.normalize_population(&population)
        );
    }
}
