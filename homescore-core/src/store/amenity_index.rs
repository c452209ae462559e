//! In-memory R\*-tree over amenities.

use std::fmt;

use rstar::{AABB, RTree, RTreeObject};

use crate::{Amenity, AmenitySource, GeoPoint};

/// Entry stored inside the R\*-tree, keyed on `[longitude, latitude]`.
#[derive(Debug, Clone)]
struct IndexedAmenity(Amenity);

impl RTreeObject for IndexedAmenity {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        let location = self.0.location;
        AABB::from_point([location.longitude(), location.latitude()])
    }
}

/// Read-only amenity catalog backed by an R\*-tree.
///
/// Radius queries first intersect the tree with the bounding box returned by
/// [`GeoPoint::bounding_box`] and then keep only amenities within the exact
/// haversine distance.
pub struct AmenityIndex {
    tree: RTree<IndexedAmenity>,
}

impl fmt::Debug for AmenityIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmenityIndex")
            .field("entries", &self.tree.size())
            .finish_non_exhaustive()
    }
}

impl AmenityIndex {
    /// Bulk-load an index from a collection of amenities.
    #[must_use]
    pub fn new<I>(amenities: I) -> Self
    where
        I: IntoIterator<Item = Amenity>,
    {
        let entries: Vec<_> = amenities.into_iter().map(IndexedAmenity).collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Number of indexed amenities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Report whether the index holds no amenities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

impl AmenitySource for AmenityIndex {
    fn amenities_within(
        &self,
        point: GeoPoint,
        radius_m: f64,
    ) -> Box<dyn Iterator<Item = Amenity> + Send + '_> {
        let bbox = point.bounding_box(radius_m);
        let envelope =
            AABB::from_corners([bbox.min().x, bbox.min().y], [bbox.max().x, bbox.max().y]);
        let mut found: Vec<_> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .filter(|entry| point.within_distance(entry.0.location, radius_m))
            .map(|entry| entry.0.clone())
            .collect();

        found.sort_unstable_by_key(|amenity| amenity.id);

        Box::new(found.into_iter())
    }
}
