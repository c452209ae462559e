//! Property coverage for linear normalization.

use homescore_scorer::{BASE_SCORE, LinearScoreNormalizer, MAX_SCORE, ScoreNormalizer};
use proptest::collection::vec;
use proptest::prelude::*;

fn population() -> impl Strategy<Value = Vec<f64>> {
    vec(0.0_f64..1_000_000.0, 1..64)
}

proptest! {
    #[test]
    fn results_stay_within_the_band(values in population()) {
        let normalized = LinearScoreNormalizer
            .normalize_population(&values)
            .unwrap_or_else(|err| panic!("normalize: {err}"));
        prop_assert_eq!(normalized.len(), values.len());
        for score in normalized {
            prop_assert!((BASE_SCORE..=MAX_SCORE).contains(&score));
        }
    }

    #[test]
    fn population_and_per_element_agree(values in population()) {
        let batch = LinearScoreNormalizer
            .normalize_population(&values)
            .unwrap_or_else(|err| panic!("normalize: {err}"));
        for (raw, expected) in values.iter().zip(batch) {
            let single = LinearScoreNormalizer
                .normalize(*raw, &values)
                .unwrap_or_else(|err| panic!("normalize: {err}"));
            prop_assert_eq!(single.to_bits(), expected.to_bits());
        }
    }

    #[test]
    fn ordering_is_preserved(values in population()) {
        let normalized = LinearScoreNormalizer
            .normalize_population(&values)
            .unwrap_or_else(|err| panic!("normalize: {err}"));
        for (i, a) in values.iter().enumerate() {
            for (j, b) in values.iter().enumerate() {
                if a <= b {
                    let (Some(na), Some(nb)) = (normalized.get(i), normalized.get(j)) else {
                        panic!("normalized population shorter than input");
                    };
                    prop_assert!(na <= nb);
                }
            }
        }
    }

    #[test]
    fn extremes_map_to_the_band_edges(values in vec(0.0_f64..1_000.0, 2..32)) {
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        prop_assume!(min < max);
        prop_assert_eq!(LinearScoreNormalizer.normalize(min, &values), Ok(BASE_SCORE));
        prop_assert_eq!(LinearScoreNormalizer.normalize(max, &values), Ok(MAX_SCORE));
    }
}
