//! Spatial index for pointer picking
//!
//! Each node registers exactly the rectangle its pill is drawn in, so a click
//! hits a node if and only if it lands on the visible pill. Uses an R-tree
//! (via `rstar`) for the lookup.

use egui::{Pos2, Rect};
use rstar::{Envelope, PointDistance, RTree, RTreeObject, AABB};

/// Index entry: node id plus its world-space pill bounds
#[derive(Debug, Clone)]
pub struct PickRegion {
    pub id: String,
    bounds: AABB<[f32; 2]>,
    /// Draw order; later entries are on top
    pub order: usize,
}

impl PickRegion {
    pub fn new(id: impl Into<String>, rect: Rect, order: usize) -> Self {
        Self {
            id: id.into(),
            bounds: AABB::from_corners([rect.min.x, rect.min.y], [rect.max.x, rect.max.y]),
            order,
        }
    }

    pub fn rect(&self) -> Rect {
        let (min, max) = (self.bounds.lower(), self.bounds.upper());
        Rect::from_min_max(Pos2::new(min[0], min[1]), Pos2::new(max[0], max[1]))
    }
}

impl RTreeObject for PickRegion {
    type Envelope = AABB<[f32; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.bounds
    }
}

impl PointDistance for PickRegion {
    fn distance_2(&self, point: &[f32; 2]) -> f32 {
        self.bounds.distance_2(point)
    }

    fn contains_point(&self, point: &[f32; 2]) -> bool {
        self.bounds.contains_point(point)
    }
}

#[derive(Clone)]
pub struct SpatialIndex {
    tree: RTree<PickRegion>,
    count: usize,
}

impl std::fmt::Debug for SpatialIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpatialIndex")
            .field("count", &self.count)
            .finish_non_exhaustive()
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self {
            tree: RTree::new(),
            count: 0,
        }
    }

    pub fn from_regions(regions: impl Iterator<Item = PickRegion>) -> Self {
        let regions: Vec<_> = regions.collect();
        let count = regions.len();
        Self {
            tree: RTree::bulk_load(regions),
            count,
        }
    }

    /// Replace the contents with fresh regions
    pub fn rebuild(&mut self, regions: impl Iterator<Item = PickRegion>) {
        *self = Self::from_regions(regions);
    }

    /// Topmost region containing the point
    pub fn hit_test(&self, point: Pos2) -> Option<&PickRegion> {
        self.tree
            .locate_all_at_point(&[point.x, point.y])
            .max_by_key(|r| r.order)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::vec2;

    fn region(id: &str, center: Pos2, order: usize) -> PickRegion {
        PickRegion::new(id, Rect::from_center_size(center, vec2(100.0, 40.0)), order)
    }

    #[test]
    fn test_hit_matches_pill_bounds_exactly() {
        let index = SpatialIndex::from_regions(
            [region("A", Pos2::new(0.0, 0.0), 0)].into_iter(),
        );

        assert_eq!(index.hit_test(Pos2::new(49.0, 19.0)).map(|r| r.id.as_str()), Some("A"));
        assert_eq!(index.hit_test(Pos2::new(50.0, 20.0)).map(|r| r.id.as_str()), Some("A"));
        assert!(index.hit_test(Pos2::new(50.5, 0.0)).is_none());
        assert!(index.hit_test(Pos2::new(0.0, 21.0)).is_none());
    }

    #[test]
    fn test_topmost_wins() {
        let index = SpatialIndex::from_regions(
            [
                region("BOTTOM", Pos2::new(0.0, 0.0), 0),
                region("TOP", Pos2::new(20.0, 0.0), 1),
            ]
            .into_iter(),
        );
        assert_eq!(index.hit_test(Pos2::new(10.0, 0.0)).unwrap().id, "TOP");
        assert_eq!(index.hit_test(Pos2::new(-40.0, 0.0)).unwrap().id, "BOTTOM");
    }

    #[test]
    fn test_rebuild_replaces_regions() {
        let mut index = SpatialIndex::from_regions(
            [
                region("A", Pos2::new(0.0, 0.0), 0),
                region("B", Pos2::new(1000.0, 0.0), 1),
            ]
            .into_iter(),
        );
        assert_eq!(index.len(), 2);

        index.rebuild([region("C", Pos2::new(0.0, 0.0), 0)].into_iter());
        assert_eq!(index.len(), 1);
        assert_eq!(index.hit_test(Pos2::ZERO).map(|r| r.id.as_str()), Some("C"));
        assert!(index.hit_test(Pos2::new(1000.0, 0.0)).is_none());
    }
}
