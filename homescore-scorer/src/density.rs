//! Inverse-distance amenity density scoring, e.g. for transit stops.
#![forbid(unsafe_code)]

use std::fmt;
use std::sync::Arc;

use homescore_core::{AmenitySource, Listing, ScoreTypeId};

use crate::{
    CalculationError, LinearScoreNormalizer, ScoreCalculator, ScoreNormalizer, checked_raw_score,
};

/// Tunables for [`AmenityDensityCalculator`].
#[derive(Debug, Clone, PartialEq)]
pub struct AmenityDensityConfig {
    /// Score type the calculator produces.
    pub score_type_id: ScoreTypeId,
    /// Amenity category counted, compared case-insensitively.
    pub category: String,
    /// Search radius in metres.
    pub radius_m: f64,
    /// Upper bound applied to the summed score.
    pub cap: Option<f64>,
    /// Whether raw scores are normalized or copied through.
    pub normalize: bool,
}

impl AmenityDensityConfig {
    /// Default search radius in metres.
    pub const DEFAULT_RADIUS_M: f64 = 500.0;

    /// Defaults for `category` under `score_type_id`.
    #[must_use]
    pub fn new(score_type_id: ScoreTypeId, category: impl Into<String>) -> Self {
        Self {
            score_type_id,
            category: category.into(),
            radius_m: Self::DEFAULT_RADIUS_M,
            cap: None,
            normalize: true,
        }
    }
}

/// Sums `1 - distance / radius` over every amenity of one category within
/// the radius, so nearby amenities count for more than distant ones.
pub struct AmenityDensityCalculator {
    amenities: Arc<dyn AmenitySource>,
    config: AmenityDensityConfig,
    normalizer: LinearScoreNormalizer,
}

impl fmt::Debug for AmenityDensityCalculator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmenityDensityCalculator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AmenityDensityCalculator {
    /// Build a calculator over an amenity catalog.
    #[must_use]
    pub fn new(amenities: Arc<dyn AmenitySource>, config: AmenityDensityConfig) -> Self {
        Self {
            amenities,
            config,
            normalizer: LinearScoreNormalizer,
        }
    }
}

impl ScoreCalculator for AmenityDensityCalculator {
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
        reason = "density is a sum of distance ratios"
    )]
    fn calculate_raw_score(&self, listing: &Listing) -> Result<f64, CalculationError> {
        let radius = self.config.radius_m;
        let density: f64 = self
            .amenities
            .amenities_within(listing.location, radius)
            .filter(|amenity| amenity.is_category(&self.config.category))
            .map(|amenity| (1.0 - listing.location.distance_m(amenity.location) / radius).max(0.0))
            .sum();
        let capped = self.config.cap.map_or(density, |cap| density.min(cap));
        checked_raw_score(listing.id, capped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use homescore_core::{Amenity, AmenityId, AmenityIndex, GeoPoint, ListingId, TRANSIT_CATEGORY};
    use rstest::rstest;

    const TRANSIT: ScoreTypeId = ScoreTypeId(2);

    fn point(latitude: f64, longitude: f64) -> GeoPoint {
        GeoPoint::new(latitude, longitude).expect("valid coordinate")
    }

    fn stop(id: u64, latitude: f64) -> Amenity {
        Amenity::new(AmenityId(id), format!("stop {id}"), TRANSIT_CATEGORY, point(latitude, 127.0))
    }

    fn score(config: AmenityDensityConfig, amenities: Vec<Amenity>) -> f64 {
        let home = Listing::new(ListingId(1), point(37.5, 127.0), "test");
        AmenityDensityCalculator::new(Arc::new(AmenityIndex::new(amenities)), config)
            .calculate_raw_score(&home)
            .expect("density score")
    }

    #[rstest]
    fn stops_on_the_doorstep_count_fully() {
        let config = AmenityDensityConfig::new(TRANSIT, TRANSIT_CATEGORY);
        assert_eq!(score(config, vec![stop(1, 37.5), stop(2, 37.5)]), 2.0);
    }

    #[rstest]
    fn more_nearby_stops_score_higher() {
        let one = score(
            AmenityDensityConfig::new(TRANSIT, TRANSIT_CATEGORY),
            vec![stop(1, 37.502)],
        );
        let two = score(
            AmenityDensityConfig::new(TRANSIT, TRANSIT_CATEGORY),
            vec![stop(1, 37.502), stop(2, 37.501)],
        );
        assert!(two > one);
    }

    #[rstest]
    fn other_categories_are_ignored() {
        let park = Amenity::new(AmenityId(1), "Park", "park", point(37.5, 127.0));
        assert_eq!(
            score(AmenityDensityConfig::new(TRANSIT, TRANSIT_CATEGORY), vec![park]),
            0.0
        );
    }

    #[rstest]
    fn cap_bounds_the_score() {
        let mut config = AmenityDensityConfig::new(TRANSIT, "TRANSIT");
        config.cap = Some(1.5);
        assert_eq!(score(config, vec![stop(1, 37.5), stop(2, 37.5)]), 1.5);
    }
}
