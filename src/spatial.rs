use crate::types::CountryShape;
use geo::{BoundingRect, Contains, Point};
use rstar::{RTree, RTreeObject, AABB};

// Wrapper for RTree indexing
struct ShapeEnvelope {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for ShapeEnvelope {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

/// Resolves map coordinates to the country drawn there.
pub struct CountryIndex {
    tree: RTree<ShapeEnvelope>,
}

impl CountryIndex {
    pub fn build(shapes: &[CountryShape]) -> Self {
        let items: Vec<ShapeEnvelope> = shapes
            .iter()
            .enumerate()
            .filter_map(|(i, shape)| {
                // Empty geometries have no bounding box and can never be hit.
                let rect = shape.geometry.bounding_rect()?;
                Some(ShapeEnvelope {
                    index: i,
                    aabb: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
                })
            })
            .collect();

        Self { tree: RTree::bulk_load(items) }
    }

    /// Index into `shapes` of the first country containing the point, if any.
    pub fn locate(&self, shapes: &[CountryShape], lon: f64, lat: f64) -> Option<usize> {
        let point = Point::new(lon, lat);
        let envelope = AABB::from_point([lon, lat]);

        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|candidate| candidate.index)
            .filter(|&i| shapes.get(i).map_or(false, |shape| shape.geometry.contains(&point)))
            .collect();

        // Tree iteration order is unspecified; keep the answer stable for overlaps.
        hits.sort_unstable();
        hits.first().copied()
    }
}
