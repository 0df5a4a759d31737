#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geometry layer for geofence evaluation.
//!
//! Everything the tracker and the route segmenter need from computational
//! geometry goes through the [`ZoneGeometry`] trait: point containment,
//! segment intersection and a bounding envelope. The production
//! implementation is backed by [`geo`] multipolygons parsed from `GeoJSON`;
//! tests elsewhere can substitute a stub.
//!
//! [`ZoneIndex`] keeps an R-tree over zone envelopes so that per-sample
//! lookups only run exact geometry tests against nearby zones.

use geo::{BoundingRect, Contains, Coord, Intersects, Line, MultiPolygon, Point, Rect};
use rstar::{AABB, RTree, RTreeObject};
use thiserror::Error;

/// Errors raised when a zone boundary cannot be parsed or evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    /// The boundary has no polygons.
    #[error("Boundary has no polygons")]
    Empty,

    /// A ring has too few positions to enclose an area.
    #[error("Ring {ring} has {count} positions, at least 4 are required")]
    DegenerateRing {
        /// Ring index within its polygon (0 is the exterior).
        ring: usize,
        /// Number of positions in the ring.
        count: usize,
    },

    /// A coordinate is NaN or infinite.
    #[error("Boundary contains a non-finite coordinate")]
    NonFinite,

    /// A position has fewer than two numbers.
    #[error("Position with {len} values, expected at least 2")]
    MalformedPosition {
        /// Number of values found.
        len: usize,
    },

    /// The geometry is not a polygon or multipolygon.
    #[error("Unsupported geometry type: {kind}")]
    Unsupported {
        /// `GeoJSON` geometry type name.
        kind: &'static str,
    },

    /// `GeoJSON` to `geo` conversion failed.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// Geometry operations needed to evaluate a geofence boundary.
///
/// Failures are reported per call so a caller can skip one broken zone and
/// keep evaluating the rest.
pub trait ZoneGeometry {
    /// Whether `point` (x = longitude, y = latitude) lies inside the zone.
    ///
    /// # Errors
    ///
    /// Returns an error if the boundary is malformed.
    fn contains_point(&self, point: Coord<f64>) -> Result<bool, GeometryError>;

    /// Whether `segment` touches or crosses the zone.
    ///
    /// # Errors
    ///
    /// Returns an error if the boundary is malformed.
    fn intersects_segment(&self, segment: Line<f64>) -> Result<bool, GeometryError>;

    /// Bounding rectangle used for index prefiltering.
    ///
    /// `None` means the zone cannot be indexed and must always be
    /// evaluated directly.
    fn envelope(&self) -> Option<Rect<f64>>;
}

impl ZoneGeometry for MultiPolygon<f64> {
    fn contains_point(&self, point: Coord<f64>) -> Result<bool, GeometryError> {
        validate_boundary(self)?;
        Ok(self.contains(&Point::from(point)))
    }

    fn intersects_segment(&self, segment: Line<f64>) -> Result<bool, GeometryError> {
        validate_boundary(self)?;
        Ok(self.0.iter().any(|polygon| polygon.intersects(&segment)))
    }

    fn envelope(&self) -> Option<Rect<f64>> {
        validate_boundary(self).ok()?;
        self.bounding_rect()
    }
}

/// Checks that every ring of `boundary` can enclose an area.
///
/// Ring winding is not checked; containment is computed the same way for
/// either orientation, with interior rings subtracted.
///
/// # Errors
///
/// Returns the first problem found.
pub fn validate_boundary(boundary: &MultiPolygon<f64>) -> Result<(), GeometryError> {
    if boundary.0.is_empty() {
        return Err(GeometryError::Empty);
    }

    for polygon in &boundary.0 {
        let rings = std::iter::once(polygon.exterior()).chain(polygon.interiors());
        for (ring, line) in rings.enumerate() {
            let count = line.0.len();
            if count < 4 {
                return Err(GeometryError::DegenerateRing { ring, count });
            }
            if line.coords().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
                return Err(GeometryError::NonFinite);
            }
        }
    }

    Ok(())
}

/// Converts a `GeoJSON` geometry into a [`MultiPolygon`].
///
/// Handles both `Polygon` and `MultiPolygon` geometry types. Positions are
/// checked before conversion so a short coordinate array is reported
/// instead of reaching the converter.
///
/// # Errors
///
/// Returns an error for other geometry types or malformed positions.
pub fn parse_boundary(geometry: geojson::Geometry) -> Result<MultiPolygon<f64>, GeometryError> {
    use geojson::Value;

    let rings: Vec<&Vec<Vec<f64>>> = match &geometry.value {
        Value::Polygon(polygon) => polygon.iter().collect(),
        Value::MultiPolygon(polygons) => polygons.iter().flatten().collect(),
        Value::Point(_) => return Err(GeometryError::Unsupported { kind: "Point" }),
        Value::MultiPoint(_) => return Err(GeometryError::Unsupported { kind: "MultiPoint" }),
        Value::LineString(_) => return Err(GeometryError::Unsupported { kind: "LineString" }),
        Value::MultiLineString(_) => {
            return Err(GeometryError::Unsupported {
                kind: "MultiLineString",
            });
        }
        Value::GeometryCollection(_) => {
            return Err(GeometryError::Unsupported {
                kind: "GeometryCollection",
            });
        }
    };

    if let Some(position) = rings.iter().flat_map(|ring| ring.iter()).find(|p| p.len() < 2) {
        return Err(GeometryError::MalformedPosition {
            len: position.len(),
        });
    }

    let geo_geom: geo::Geometry<f64> =
        geometry
            .try_into()
            .map_err(|e: geojson::Error| GeometryError::Conversion {
                message: e.to_string(),
            })?;

    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Ok(mp),
        geo::Geometry::Polygon(p) => Ok(MultiPolygon(vec![p])),
        _ => Err(GeometryError::Conversion {
            message: "polygon converted to a non-polygon geometry".to_string(),
        }),
    }
}

/// A zone envelope stored in the R-tree, pointing back at its slot in
/// the owning collection.
struct IndexedEnvelope {
    slot: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// R-tree prefilter over a list of zone geometries.
///
/// Lookups return candidate slots (positions in the list the index was
/// built from) in ascending order. Zones without an envelope are returned
/// by every lookup.
pub struct ZoneIndex {
    tree: RTree<IndexedEnvelope>,
    unindexed: Vec<usize>,
}

impl ZoneIndex {
    /// Builds the index. Slot `i` refers to the `i`-th geometry yielded.
    #[must_use]
    pub fn build<'a, G, I>(geometries: I) -> Self
    where
        G: ZoneGeometry + 'a,
        I: IntoIterator<Item = &'a G>,
    {
        let mut entries = Vec::new();
        let mut unindexed = Vec::new();

        for (slot, geometry) in geometries.into_iter().enumerate() {
            match geometry.envelope() {
                Some(rect) => entries.push(IndexedEnvelope {
                    slot,
                    envelope: to_aabb(rect),
                }),
                None => unindexed.push(slot),
            }
        }

        log::debug!(
            "Indexed {} zone envelopes ({} without envelope)",
            entries.len(),
            unindexed.len()
        );

        Self {
            tree: RTree::bulk_load(entries),
            unindexed,
        }
    }

    /// Candidate slots whose envelope contains `point`.
    #[must_use]
    pub fn candidates_for_point(&self, point: Coord<f64>) -> Vec<usize> {
        self.collect(&AABB::from_point([point.x, point.y]))
    }

    /// Candidate slots whose envelope overlaps the bounding box of
    /// `segment`.
    #[must_use]
    pub fn candidates_for_segment(&self, segment: Line<f64>) -> Vec<usize> {
        self.collect(&to_aabb(segment.bounding_rect()))
    }

    /// Number of zones covered by the index, with or without envelope.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size() + self.unindexed.len()
    }

    /// Whether the index covers no zones.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn collect(&self, query: &AABB<[f64; 2]>) -> Vec<usize> {
        let mut slots: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(query)
            .map(|entry| entry.slot)
            .chain(self.unindexed.iter().copied())
            .collect();
        slots.sort_unstable();
        slots
    }
}

fn to_aabb(rect: Rect<f64>) -> AABB<[f64; 2]> {
    AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
}

#[cfg(test)]
mod tests {
    use geo::{LineString, Polygon, coord, polygon};

    use super::*;

    fn square(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: min_x, y: min_y),
            (x: max_x, y: min_y),
            (x: max_x, y: max_y),
            (x: min_x, y: max_y),
            (x: min_x, y: min_y),
        ]])
    }

    #[test]
    fn contains_point_inside_square() {
        let zone = square(77.0, 28.0, 77.1, 28.1);
        assert!(zone.contains_point(coord! { x: 77.05, y: 28.05 }).unwrap());
        assert!(!zone.contains_point(coord! { x: 76.9, y: 27.9 }).unwrap());
    }

    #[test]
    fn hole_is_subtracted_regardless_of_winding() {
        let exterior = LineString::from(vec![
            (0.0, 0.0),
            (0.0, 10.0),
            (10.0, 10.0),
            (10.0, 0.0),
            (0.0, 0.0),
        ]);
        let hole = LineString::from(vec![
            (4.0, 4.0),
            (6.0, 4.0),
            (6.0, 6.0),
            (4.0, 6.0),
            (4.0, 4.0),
        ]);
        let zone = MultiPolygon(vec![Polygon::new(exterior, vec![hole])]);

        assert!(zone.contains_point(coord! { x: 2.0, y: 2.0 }).unwrap());
        assert!(!zone.contains_point(coord! { x: 5.0, y: 5.0 }).unwrap());
    }

    #[test]
    fn segment_crossing_boundary_intersects() {
        let zone = square(77.0, 28.0, 77.1, 28.1);
        let crossing = Line::new(coord! { x: 76.9, y: 27.9 }, coord! { x: 77.05, y: 28.05 });
        let outside = Line::new(coord! { x: 76.0, y: 27.0 }, coord! { x: 76.5, y: 27.5 });

        assert!(zone.intersects_segment(crossing).unwrap());
        assert!(!zone.intersects_segment(outside).unwrap());
    }

    #[test]
    fn segment_passing_through_without_vertices_inside_intersects() {
        let zone = square(77.0, 28.0, 77.1, 28.1);
        let through = Line::new(coord! { x: 76.9, y: 28.05 }, coord! { x: 77.2, y: 28.05 });
        assert!(zone.intersects_segment(through).unwrap());
    }

    #[test]
    fn degenerate_ring_is_an_error() {
        let zone = MultiPolygon(vec![Polygon::new(
            LineString::from(vec![(0.0, 0.0), (1.0, 1.0)]),
            vec![],
        )]);

        assert!(matches!(
            zone.contains_point(coord! { x: 0.5, y: 0.5 }),
            Err(GeometryError::DegenerateRing { ring: 0, .. })
        ));
        assert!(ZoneGeometry::envelope(&zone).is_none());
    }

    #[test]
    fn non_finite_coordinate_is_an_error() {
        let zone = square(0.0, 0.0, f64::NAN, 1.0);
        assert_eq!(
            zone.contains_point(coord! { x: 0.5, y: 0.5 }),
            Err(GeometryError::NonFinite)
        );
    }

    #[test]
    fn empty_multipolygon_is_an_error() {
        let zone: MultiPolygon<f64> = MultiPolygon(vec![]);
        assert_eq!(
            zone.intersects_segment(Line::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 })),
            Err(GeometryError::Empty)
        );
    }

    #[test]
    fn parses_polygon_and_multipolygon() {
        let polygon: geojson::Geometry = r#"{
            "type": "Polygon",
            "coordinates": [[[77.0, 28.0], [77.1, 28.0], [77.1, 28.1], [77.0, 28.1], [77.0, 28.0]]]
        }"#
        .parse()
        .unwrap();
        let mp = parse_boundary(polygon).unwrap();
        assert_eq!(mp.0.len(), 1);

        let multi: geojson::Geometry = r#"{
            "type": "MultiPolygon",
            "coordinates": [
                [[[0, 0], [1, 0], [1, 1], [0, 0]]],
                [[[5, 5], [6, 5], [6, 6], [5, 5]]]
            ]
        }"#
        .parse()
        .unwrap();
        assert_eq!(parse_boundary(multi).unwrap().0.len(), 2);
    }

    #[test]
    fn rejects_non_polygon_geometry() {
        let point: geojson::Geometry = r#"{"type": "Point", "coordinates": [77.0, 28.0]}"#
            .parse()
            .unwrap();
        assert_eq!(
            parse_boundary(point),
            Err(GeometryError::Unsupported { kind: "Point" })
        );
    }

    #[test]
    fn rejects_short_position() {
        let polygon = geojson::Geometry::new(geojson::Value::Polygon(vec![vec![
            vec![77.0, 28.0],
            vec![77.1],
            vec![77.1, 28.1],
            vec![77.0, 28.0],
        ]]));
        assert_eq!(
            parse_boundary(polygon),
            Err(GeometryError::MalformedPosition { len: 1 })
        );
    }

    #[test]
    fn index_returns_sorted_candidates_and_unindexed_slots() {
        let zones = vec![
            square(10.0, 10.0, 11.0, 11.0),
            square(0.0, 0.0, 2.0, 2.0),
            MultiPolygon(vec![]),
            square(1.0, 1.0, 3.0, 3.0),
        ];
        let index = ZoneIndex::build(&zones);

        assert_eq!(index.len(), 4);
        assert_eq!(index.candidates_for_point(coord! { x: 1.5, y: 1.5 }), vec![1, 2, 3]);
        assert_eq!(index.candidates_for_point(coord! { x: 50.0, y: 50.0 }), vec![2]);

        let segment = Line::new(coord! { x: 2.5, y: 2.5 }, coord! { x: 10.5, y: 10.5 });
        assert_eq!(index.candidates_for_segment(segment), vec![0, 2, 3]);
    }
}
