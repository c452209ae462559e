//! Validated WGS84 coordinates and great-circle distance.
//!
//! [`GeoPoint`] is a transient computation helper: it is built from stored
//! latitude/longitude pairs, used for haversine distance and spatial index
//! queries, and never persisted directly.

use geo::{Coord, Point, Rect};
use thiserror::Error;

/// Mean earth radius used by every distance computation, in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

const METRES_PER_KM: f64 = 1000.0;

/// Slack added to bounding boxes so rounding never excludes an edge point.
const BBOX_PADDING_DEG: f64 = 1e-9;

/// Errors returned by [`GeoPoint::new`].
#[derive(Debug, Clone, Copy, Error, PartialEq)]
pub enum GeoPointError {
    /// Latitude or longitude was outside the WGS84 range or not finite.
    #[error("invalid coordinate (latitude {latitude}, longitude {longitude})")]
    InvalidCoordinate {
        /// Rejected latitude in degrees.
        latitude: f64,
        /// Rejected longitude in degrees.
        longitude: f64,
    },
}

/// An immutable latitude/longitude pair in degrees.
///
/// # Examples
///
/// ```
/// use homescore_core::GeoPoint;
///
/// # fn main() -> Result<(), homescore_core::GeoPointError> {
/// let city_hall = GeoPoint::new(37.5663, 126.9779)?;
/// let station = GeoPoint::new(37.5547, 126.9707)?;
/// assert!(city_hall.within_distance(station, 1_500.0));
/// assert!(GeoPoint::new(91.0, 0.0).is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "RawGeoPoint", into = "RawGeoPoint")
)]
pub struct GeoPoint {
    latitude: f64,
    longitude: f64,
}

impl GeoPoint {
    /// Validate and construct a [`GeoPoint`].
    ///
    /// # Errors
    /// Returns [`GeoPointError::InvalidCoordinate`] when the latitude is
    /// outside `[-90, 90]`, the longitude is outside `[-180, 180]`, or either
    /// value is not finite.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GeoPointError> {
        let valid = (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude);
        if !valid {
            return Err(GeoPointError::InvalidCoordinate {
                latitude,
                longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Latitude in degrees.
    #[must_use]
    pub const fn latitude(self) -> f64 {
        self.latitude
    }

    /// Longitude in degrees.
    #[must_use]
    pub const fn longitude(self) -> f64 {
        self.longitude
    }

    /// Great-circle distance to `other` in kilometres.
    #[must_use]
    pub fn distance_km(self, other: Self) -> f64 {
        distance_km(self, other)
    }

    /// Great-circle distance to `other` in metres.
    #[must_use]
    pub fn distance_m(self, other: Self) -> f64 {
        distance_m(self, other)
    }

    /// Report whether `other` lies no further than `max_meters` away.
    #[must_use]
    pub fn within_distance(self, other: Self, max_meters: f64) -> bool {
        within_distance(self, other, max_meters)
    }

    /// Return a lon/lat rectangle that encloses every point within
    /// `radius_m` of `self`.
    ///
    /// The rectangle is a pre-filter for spatial index lookups; callers must
    /// still apply [`GeoPoint::within_distance`]. When the radius reaches a
    /// pole or crosses the antimeridian the rectangle spans the full
    /// longitude range.
    #[must_use]
    #[expect(
        clippy::float_arithmetic,
        reason = "bounding box derivation is spherical trigonometry"
    )]
    pub fn bounding_box(self, radius_m: f64) -> Rect<f64> {
        let angular =
            (radius_m.max(0.0) / (EARTH_RADIUS_KM * METRES_PER_KM)).min(std::f64::consts::PI);
        let delta_lat = angular.to_degrees() + BBOX_PADDING_DEG;
        let min_lat = (self.latitude - delta_lat).max(-90.0);
        let max_lat = (self.latitude + delta_lat).min(90.0);

        let full_range = (-180.0, 180.0);
        let (min_lon, max_lon) = if min_lat <= -90.0 || max_lat >= 90.0 {
            full_range
        } else {
            let ratio = angular.sin() / self.latitude.to_radians().cos();
            if ratio >= 1.0 {
                full_range
            } else {
                let delta_lon = ratio.asin().to_degrees() + BBOX_PADDING_DEG;
                let west = self.longitude - delta_lon;
                let east = self.longitude + delta_lon;
                if west < -180.0 || east > 180.0 {
                    full_range
                } else {
                    (west, east)
                }
            }
        };

        Rect::new(
            Coord {
                x: min_lon,
                y: min_lat,
            },
            Coord {
                x: max_lon,
                y: max_lat,
            },
        )
    }
}

impl From<GeoPoint> for Coord<f64> {
    fn from(point: GeoPoint) -> Self {
        Self {
            x: point.longitude,
            y: point.latitude,
        }
    }
}

impl From<GeoPoint> for Point<f64> {
    fn from(point: GeoPoint) -> Self {
        Self::new(point.longitude, point.latitude)
    }
}

impl TryFrom<Coord<f64>> for GeoPoint {
    type Error = GeoPointError;

    fn try_from(coord: Coord<f64>) -> Result<Self, Self::Error> {
        Self::new(coord.y, coord.x)
    }
}

#[cfg(feature = "serde")]
#[derive(serde::Serialize, serde::Deserialize)]
struct RawGeoPoint {
    latitude: f64,
    longitude: f64,
}

#[cfg(feature = "serde")]
impl TryFrom<RawGeoPoint> for GeoPoint {
    type Error = GeoPointError;

    fn try_from(raw: RawGeoPoint) -> Result<Self, Self::Error> {
        Self::new(raw.latitude, raw.longitude)
    }
}

#[cfg(feature = "serde")]
impl From<GeoPoint> for RawGeoPoint {
    fn from(point: GeoPoint) -> Self {
        Self {
            latitude: point.latitude,
            longitude: point.longitude,
        }
    }
}

/// Haversine distance between `a` and `b` in kilometres.
///
/// The result is symmetric and is exactly `0.0` when both points carry the
/// same coordinates.
#[must_use]
#[expect(
    clippy::float_arithmetic,
    reason = "haversine distance is floating-point trigonometry"
)]
pub fn distance_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let half_d_lat = (lat_b - lat_a) / 2.0;
    let half_d_lon = (b.longitude - a.longitude).to_radians() / 2.0;

    // Rounding can push the haversine term fractionally outside [0, 1].
    let h = (half_d_lat.sin().powi(2) + lat_a.cos() * lat_b.cos() * half_d_lon.sin().powi(2))
        .clamp(0.0, 1.0);
    let central_angle = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * central_angle
}

/// Haversine distance between `a` and `b` in metres.
#[must_use]
#[expect(clippy::float_arithmetic, reason = "unit conversion")]
pub fn distance_m(a: GeoPoint, b: GeoPoint) -> f64 {
    distance_km(a, b) * METRES_PER_KM
}

/// Report whether `a` and `b` are at most `max_meters` apart.
#[must_use]
pub fn within_distance(a: GeoPoint, b: GeoPoint, max_meters: f64) -> bool {
    distance_m(a, b) <= max_meters
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Intersects;
    use rstest::rstest;

    fn point(latitude: f64, longitude: f64) -> GeoPoint {
        GeoPoint::new(latitude, longitude).expect("valid coordinate")
    }

    #[rstest]
    #[case(91.0, 0.0)]
    #[case(-90.5, 0.0)]
    #[case(0.0, -181.0)]
    #[case(0.0, 180.01)]
    #[case(f64::NAN, 0.0)]
    #[case(0.0, f64::INFINITY)]
    fn rejects_out_of_range(#[case] latitude: f64, #[case] longitude: f64) {
        let err = GeoPoint::new(latitude, longitude).expect_err("coordinate should be rejected");
        assert!(matches!(err, GeoPointError::InvalidCoordinate { .. }));
    }

    #[rstest]
    #[case(90.0, 180.0)]
    #[case(-90.0, -180.0)]
    #[case(0.0, 0.0)]
    fn accepts_boundaries(#[case] latitude: f64, #[case] longitude: f64) {
        assert!(GeoPoint::new(latitude, longitude).is_ok());
    }

    #[rstest]
    fn one_degree_of_latitude_is_about_111_km() {
        let d = distance_km(point(0.0, 0.0), point(1.0, 0.0));
        assert!((d - 111.194_93).abs() < 1e-3, "got {d}");
    }

    #[rstest]
    fn distance_in_metres_scales_kilometres() {
        let a = point(37.5663, 126.9779);
        let b = point(37.5547, 126.9707);
        assert!((distance_m(a, b) - distance_km(a, b) * 1000.0).abs() < 1e-9);
    }

    #[rstest]
    fn antipodal_points_are_half_circumference_apart() {
        let d = distance_km(point(0.0, 0.0), point(0.0, 180.0));
        assert!((d - EARTH_RADIUS_KM * std::f64::consts::PI).abs() < 1e-6);
    }

    #[rstest]
    #[case(500.0, true)]
    #[case(100.0, false)]
    fn within_distance_is_inclusive_threshold(#[case] max_m: f64, #[case] expected: bool) {
        // ~0.0027 degrees of latitude is roughly 300 m.
        let a = point(37.5, 127.0);
        let b = point(37.5027, 127.0);
        assert_eq!(within_distance(a, b, max_m), expected);
    }

    #[rstest]
    fn bounding_box_contains_points_on_the_radius() {
        let centre = point(51.5, -0.12);
        let bbox = centre.bounding_box(1_000.0);
        // Walk the compass at exactly the radius and check containment.
        for bearing in (0..360).step_by(15) {
            let theta = f64::from(bearing).to_radians();
            let angular = 1_000.0 / (EARTH_RADIUS_KM * 1000.0);
            let lat1 = centre.latitude().to_radians();
            let lon1 = centre.longitude().to_radians();
            let lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * theta.cos()).asin();
            let lon2 = lon1
                + (theta.sin() * angular.sin() * lat1.cos())
                    .atan2(angular.cos() - lat1.sin() * lat2.sin());
            let edge = Coord {
                x: lon2.to_degrees(),
                y: lat2.to_degrees(),
            };
            assert!(bbox.intersects(&edge), "bearing {bearing} escaped the box");
        }
    }

    #[rstest]
    #[case(point(89.999, 0.0))]
    #[case(point(0.0, 179.9999))]
    fn bounding_box_widens_near_poles_and_antimeridian(#[case] centre: GeoPoint) {
        let bbox = centre.bounding_box(5_000.0);
        assert_eq!(bbox.min().x, -180.0);
        assert_eq!(bbox.max().x, 180.0);
    }

    #[rstest]
    fn converts_to_geo_types_with_longitude_as_x() {
        let p = point(10.0, 20.0);
        let coord: Coord<f64> = p.into();
        assert_eq!(coord, Coord { x: 20.0, y: 10.0 });
        assert_eq!(GeoPoint::try_from(coord), Ok(p));
    }
}
