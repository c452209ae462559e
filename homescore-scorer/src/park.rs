//! Park proximity scoring.
#![forbid(unsafe_code)]

use std::fmt;
use std::sync::Arc;

use homescore_core::{AmenitySource, Listing, PARK_CATEGORY, ScoreTypeId};

use crate::{
    CalculationError, LinearScoreNormalizer, ScoreCalculator, ScoreNormalizer, checked_raw_score,
};

/// Tunables for [`ParkProximityCalculator`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParkProximityConfig {
    /// Score type the calculator produces.
    pub score_type_id: ScoreTypeId,
    /// Walking radius searched for parks, in metres.
    pub radius_m: f64,
    /// Points awarded for a park at the listing's doorstep.
    pub distance_weight: f64,
    /// Points awarded once the parks in range reach `target_area_sq_m`.
    pub coverage_weight: f64,
    /// Combined park area that earns the full coverage weight.
    pub target_area_sq_m: f64,
    /// Whether raw scores are normalized or copied through.
    pub normalize: bool,
}

impl ParkProximityConfig {
    /// Walking radius of roughly ten minutes on foot.
    pub const DEFAULT_RADIUS_M: f64 = 600.0;
    /// Default proximity weight.
    pub const DEFAULT_DISTANCE_WEIGHT: f64 = 4.0;
    /// Default coverage weight.
    pub const DEFAULT_COVERAGE_WEIGHT: f64 = 6.0;
    /// Default target green area in square metres.
    pub const DEFAULT_TARGET_AREA_SQ_M: f64 = 50_000.0;

    /// Defaults for `score_type_id`.
    #[must_use]
    pub const fn new(score_type_id: ScoreTypeId) -> Self {
        Self {
            score_type_id,
            radius_m: Self::DEFAULT_RADIUS_M,
            distance_weight: Self::DEFAULT_DISTANCE_WEIGHT,
            coverage_weight: Self::DEFAULT_COVERAGE_WEIGHT,
            target_area_sq_m: Self::DEFAULT_TARGET_AREA_SQ_M,
            normalize: true,
        }
    }
}

/// Scores a listing by how close it is to parks and how much park area lies
/// within walking distance.
///
/// With no park in range the score is `0`. Otherwise it is the sum of a
/// proximity term, `max(0, 1 - nearest / radius) * distance_weight`, and a
/// coverage term, `min(total_area / target_area, 1) * coverage_weight`.
/// Parks without a recorded area contribute nothing to coverage.
pub struct ParkProximityCalculator {
    amenities: Arc<dyn AmenitySource>,
    config: ParkProximityConfig,
    normalizer: LinearScoreNormalizer,
}

impl fmt::Debug for ParkProximityCalculator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParkProximityCalculator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ParkProximityCalculator {
    /// Build a calculator over an amenity catalog.
    #[must_use]
    pub fn new(amenities: Arc<dyn AmenitySource>, config: ParkProximityConfig) -> Self {
        Self {
            amenities,
            config,
            normalizer: LinearScoreNormalizer,
        }
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &ParkProximityConfig {
        &self.config
    }
}

impl ScoreCalculator for ParkProximityCalculator {
    fn score_type_id(&self) -> ScoreTypeId {
        self.config.score_type_id
    }

    fn normalizer(&self) -> Option<&dyn ScoreNormalizer> {
        self.config
            .normalize
            .then_some(&self.normalizer as &dyn ScoreNormalizer)
    }

    #[expect(
        clippy::float_arithmetic,
        reason = "proximity and coverage are weighted ratios"
    )]
    fn calculate_raw_score(&self, listing: &Listing) -> Result<f64, CalculationError> {
        let config = &self.config;
        let mut nearest_m: Option<f64> = None;
        let mut total_area = 0.0;
        for park in self
            .amenities
            .amenities_within(listing.location, config.radius_m)
            .filter(|amenity| amenity.is_category(PARK_CATEGORY))
        {
            let distance = listing.location.distance_m(park.location);
            nearest_m = Some(nearest_m.map_or(distance, |best| best.min(distance)));
            total_area += park.area_sq_m.unwrap_or(0.0).max(0.0);
        }

        let Some(nearest) = nearest_m else {
            return Ok(0.0);
        };
        let proximity = (1.0 - nearest / config.radius_m).max(0.0) * config.distance_weight;
        let coverage = (total_area / config.target_area_sq_m).min(1.0) * config.coverage_weight;
        checked_raw_score(listing.id, proximity + coverage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use homescore_core::{Amenity, AmenityId, AmenityIndex, GeoPoint, ListingId};
    use rstest::{fixture, rstest};

    const PARK: ScoreTypeId = ScoreTypeId(1);

    fn point(latitude: f64, longitude: f64) -> GeoPoint {
        GeoPoint::new(latitude, longitude).expect("valid coordinate")
    }

    #[fixture]
    fn home() -> Listing {
        Listing::new(ListingId(1), point(37.5, 127.0), "test")
    }

    fn calculator(amenities: Vec<Amenity>) -> ParkProximityCalculator {
        ParkProximityCalculator::new(
            Arc::new(AmenityIndex::new(amenities)),
            ParkProximityConfig::new(PARK),
        )
    }

    #[rstest]
    fn no_parks_scores_zero(home: Listing) {
        let cafe = Amenity::new(AmenityId(1), "Cafe", "cafe", point(37.5, 127.0));
        assert_eq!(calculator(vec![cafe]).calculate_raw_score(&home), Ok(0.0));
    }

    #[rstest]
    fn park_on_the_doorstep_with_large_area_scores_ten(home: Listing) {
        let park = Amenity::new(AmenityId(1), "Forest", PARK_CATEGORY, point(37.5, 127.0))
            .with_area_sq_m(80_000.0);
        assert_eq!(calculator(vec![park]).calculate_raw_score(&home), Ok(10.0));
    }

    #[rstest]
    fn distant_small_park_scores_less_than_near_one(home: Listing) {
        let near = calculator(vec![
            Amenity::new(AmenityId(1), "Near", PARK_CATEGORY, point(37.501, 127.0))
                .with_area_sq_m(10_000.0),
        ])
        .calculate_raw_score(&home)
        .expect("near score");
        let far = calculator(vec![
            Amenity::new(AmenityId(2), "Far", PARK_CATEGORY, point(37.504, 127.0))
                .with_area_sq_m(10_000.0),
        ])
        .calculate_raw_score(&home)
        .expect("far score");
        assert!(near > far, "near park ({near}) should beat far park ({far})");
        assert!((0.0..=10.0).contains(&far));
    }

    #[rstest]
    fn parks_beyond_the_radius_are_ignored(home: Listing) {
        // About 1.1 km north.
        let park = Amenity::new(AmenityId(1), "Distant", PARK_CATEGORY, point(37.51, 127.0))
            .with_area_sq_m(1_000_000.0);
        assert_eq!(calculator(vec![park]).calculate_raw_score(&home), Ok(0.0));
    }

    #[rstest]
    fn opting_out_of_normalization_drops_the_normalizer() {
        let mut config = ParkProximityConfig::new(PARK);
        config.normalize = false;
        let calc = ParkProximityCalculator::new(Arc::new(AmenityIndex::new(Vec::new())), config);
        assert!(calc.normalizer().is_none());
        assert!(calculator(Vec::new()).normalizer().is_some());
    }
}
