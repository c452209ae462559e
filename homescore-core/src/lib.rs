//! Core domain types for the homescore pipeline.
//!
//! Listings, amenities and score types are read-only inputs; raw and
//! normalized scores are the records the pipeline owns. Constructors return
//! `Result` so invalid coordinates and scores surface at the boundary.
//!
//! The [`store`] module defines the collaborator traits the pipeline talks
//! to, together with an R\*-tree amenity index and, behind the
//! `store-sqlite` feature, an SQLite-backed score store.

mod amenity;
mod listing;
mod point;
mod score;
pub mod store;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use amenity::{Amenity, AmenityId, PARK_CATEGORY, TRANSIT_CATEGORY};
pub use listing::{Listing, ListingId};
pub use point::{EARTH_RADIUS_KM, GeoPoint, GeoPointError, distance_km, distance_m, within_distance};
pub use score::{
    NormalizedScore, RawScore, RawScoreError, ScoreType, ScoreTypeId, round_half_up,
};
#[cfg(feature = "store-sqlite")]
pub use store::SqliteScoreStore;
pub use store::{
    AmenityIndex, AmenitySource, BoxError, ListingPage, ListingSource, RejectedListing,
    ScoreStore, ScoreTypeCatalog, StoreError,
};
