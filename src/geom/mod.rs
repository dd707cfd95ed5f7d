//! R-tree over polygon envelopes: the coarse spatial filter in front of every
//! exact intersection and containment test.

use geo::{BoundingRect, MultiPolygon, Point, Rect};
use rstar::{RTree, RTreeObject, AABB};

/// Envelope of one indexed polygon, tagged with its position in the index.
#[derive(Debug, Clone)]
struct Envelope {
    idx: usize,
    bbox: Rect<f64>,
}

impl RTreeObject for Envelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.bbox.min().into(), self.bbox.max().into())
    }
}

/// Polygons plus an R-tree of their bounding rectangles.
/// Empty polygons are kept (so positions stay aligned with the input) but never returned by queries.
#[derive(Debug, Clone)]
pub struct PolygonIndex {
    shapes: Vec<MultiPolygon<f64>>,
    rtree: RTree<Envelope>,
}

impl PolygonIndex {
    pub fn new(shapes: Vec<MultiPolygon<f64>>) -> Self {
        let envelopes = shapes.iter().enumerate()
            .filter_map(|(idx, shape)| shape.bounding_rect().map(|bbox| Envelope { idx, bbox }))
            .collect();
        Self { rtree: RTree::bulk_load(envelopes), shapes }
    }

    #[inline] pub fn shape(&self, idx: usize) -> &MultiPolygon<f64> { &self.shapes[idx] }

    /// Positions of polygons whose envelope intersects `rect`, in ascending order.
    pub fn candidates_in(&self, rect: &Rect<f64>) -> Vec<usize> {
        let search = AABB::from_corners(rect.min().into(), rect.max().into());
        self.collect(self.rtree.locate_in_envelope_intersecting(&search))
    }

    /// Positions of polygons whose envelope intersects `shape`'s envelope, in ascending order.
    pub fn candidates_for(&self, shape: &MultiPolygon<f64>) -> Vec<usize> {
        match shape.bounding_rect() {
            Some(rect) => self.candidates_in(&rect),
            None => Vec::new(),
        }
    }

    /// Positions of polygons whose envelope contains `point` (boundary included), in ascending order.
    pub fn candidates_at(&self, point: &Point<f64>) -> Vec<usize> {
        let search = AABB::from_point([point.x(), point.y()]);
        self.collect(self.rtree.locate_in_envelope_intersecting(&search))
    }

    // R-tree traversal order is arbitrary; callers rely on input order.
    fn collect<'a>(&self, hits: impl Iterator<Item = &'a Envelope>) -> Vec<usize> {
        let mut idxs: Vec<usize> = hits.map(|hit| hit.idx).collect();
        idxs.sort_unstable();
        idxs
    }
}
