//! Per-edge risk classification of a route.
//!
//! Each edge is tagged independently so the map can colour the path
//! continuously and a forbidden-zone traversal can be attributed to a
//! specific stretch of the trip.

use safe_route_geofence::GeofenceCollection;
use safe_route_geofence_models::{RiskLevel, RouteSegment};
use safe_route_spatial::ZoneGeometry;
use serde::{Deserialize, Serialize};

use crate::geometry::{RouteGeometry, vertex};

/// Splits `route` into its edges and tags each with the most severe
/// geofence it touches.
///
/// A route with `N` vertices yields `max(N - 1, 0)` segments. Zones are
/// listed in collection order. Zones with an unrecognized risk level count
/// as safe, and zones whose geometry fails to evaluate are skipped. The
/// result depends only on the inputs, so it can be recomputed whenever the
/// collection refreshes.
#[must_use]
pub fn segment_route<B: ZoneGeometry>(
    route: &RouteGeometry,
    geofences: Option<&GeofenceCollection<B>>,
) -> Vec<RouteSegment> {
    route
        .edges()
        .enumerate()
        .map(|(index, edge)| {
            let (risk_level, zones) = geofences.map_or_else(
                || (RiskLevel::Safe, Vec::new()),
                |geofences| {
                    geofences.intersecting(edge).fold(
                        (RiskLevel::Safe, Vec::new()),
                        |(risk, mut zones), geofence| {
                            zones.push(geofence.id().to_string());
                            (risk.max(geofence.fold_risk()), zones)
                        },
                    )
                },
            );

            RouteSegment {
                index,
                start: vertex(edge.start),
                end: vertex(edge.end),
                risk_level,
                zones,
            }
        })
        .collect()
}

/// Aggregate view of a segmented route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRiskSummary {
    /// Most severe segment risk, safe for an empty route.
    pub highest_risk: RiskLevel,
    /// Number of safe segments.
    pub safe_segments: usize,
    /// Number of caution segments.
    pub caution_segments: usize,
    /// Number of forbidden segments.
    pub forbidden_segments: usize,
    /// Indices of the forbidden segments.
    pub forbidden_indices: Vec<usize>,
    /// Every zone the route touches, once, in order of first contact.
    pub zones: Vec<String>,
}

/// Summarizes a segment list for display and override logging.
#[must_use]
pub fn summarize_route(segments: &[RouteSegment]) -> RouteRiskSummary {
    let mut summary = RouteRiskSummary {
        highest_risk: RiskLevel::highest(segments.iter().map(|s| s.risk_level)),
        safe_segments: 0,
        caution_segments: 0,
        forbidden_segments: 0,
        forbidden_indices: Vec::new(),
        zones: Vec::new(),
    };

    for segment in segments {
        match segment.risk_level {
            RiskLevel::Safe => summary.safe_segments += 1,
            RiskLevel::Caution => summary.caution_segments += 1,
            RiskLevel::Forbidden => {
                summary.forbidden_segments += 1;
                summary.forbidden_indices.push(segment.index);
            }
        }

        for zone in &segment.zones {
            if !summary.zones.contains(zone) {
                summary.zones.push(zone.clone());
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use geo::{Coord, Line, MultiPolygon, Rect, polygon};
    use safe_route_geofence::{Geofence, GeofenceSchema};
    use safe_route_geofence_models::Position;
    use safe_route_spatial::GeometryError;

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

    fn scenario_route() -> RouteGeometry {
        [(76.9, 27.9), (77.05, 28.05), (77.2, 28.2)]
            .into_iter()
            .collect()
    }

    #[test]
    fn forbidden_square_scenario() {
        let zones = GeofenceCollection::new(vec![Geofence::new(
            "PS Kotwali",
            square(77.0, 28.0, 77.1, 28.1),
            Some(RiskLevel::Forbidden),
        )]);

        let segments = segment_route(&scenario_route(), Some(&zones));
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].risk_level, RiskLevel::Forbidden);
        assert_eq!(segments[1].risk_level, RiskLevel::Forbidden);
        assert_eq!(segments[1].zones, vec!["PS Kotwali".to_string()]);
        assert_eq!(segments[1].index, 1);
        assert!((segments[1].start.longitude - 77.05).abs() < 1e-12);
    }

    #[test]
    fn segment_count_is_vertices_minus_one() {
        let zones: GeofenceCollection = GeofenceCollection::empty();
        for n in 0..5_u32 {
            let route: RouteGeometry = (0..n).map(|i| (f64::from(i), 0.0)).collect();
            let expected = n.saturating_sub(1) as usize;
            assert_eq!(segment_route(&route, Some(&zones)).len(), expected);
            assert_eq!(
                segment_route::<MultiPolygon<f64>>(&route, None).len(),
                expected
            );
        }
    }

    #[test]
    fn highest_severity_wins_and_zones_keep_collection_order() {
        let zones = GeofenceCollection::new(vec![
            Geofence::new("caution", square(0.0, 0.0, 2.0, 2.0), Some(RiskLevel::Caution)),
            Geofence::new("forbidden", square(1.0, 1.0, 3.0, 3.0), Some(RiskLevel::Forbidden)),
            Geofence::new("unlabelled", square(0.0, 0.0, 3.0, 3.0), None),
            Geofence::new("far", square(50.0, 50.0, 51.0, 51.0), Some(RiskLevel::Forbidden)),
        ]);
        let route: RouteGeometry = [(0.5, 0.5), (2.5, 2.5), (10.0, 10.0), (20.0, 20.0)]
            .into_iter()
            .collect();

        let segments = segment_route(&route, Some(&zones));
        assert_eq!(segments[0].risk_level, RiskLevel::Forbidden);
        assert_eq!(segments[0].zones, vec!["caution", "forbidden", "unlabelled"]);
        assert_eq!(segments[2].risk_level, RiskLevel::Safe);
        assert!(segments[2].zones.is_empty());
    }

    #[test]
    fn segmenting_is_idempotent() {
        let zones = GeofenceCollection::new(vec![Geofence::new(
            "z",
            square(77.0, 28.0, 77.1, 28.1),
            Some(RiskLevel::Caution),
        )]);
        let route = scenario_route();
        assert_eq!(
            segment_route(&route, Some(&zones)),
            segment_route(&route, Some(&zones))
        );
    }

    /// Stub that always intersects, or always fails to evaluate.
    struct Stub {
        fails: bool,
    }

    impl ZoneGeometry for Stub {
        fn contains_point(&self, _point: Coord<f64>) -> Result<bool, GeometryError> {
            Ok(false)
        }

        fn intersects_segment(&self, _segment: Line<f64>) -> Result<bool, GeometryError> {
            if self.fails {
                Err(GeometryError::Empty)
            } else {
                Ok(true)
            }
        }

        fn envelope(&self) -> Option<Rect<f64>> {
            None
        }
    }

    #[test]
    fn failing_geometry_is_skipped() {
        let zones = GeofenceCollection::new(vec![
            Geofence::new("bad", Stub { fails: true }, Some(RiskLevel::Forbidden)),
            Geofence::new("good", Stub { fails: false }, Some(RiskLevel::Caution)),
        ]);

        let segments = segment_route(&scenario_route(), Some(&zones));
        assert_eq!(segments.len(), 2);
        for segment in &segments {
            assert_eq!(segment.risk_level, RiskLevel::Caution);
            assert_eq!(segment.zones, vec!["good"]);
        }
    }

    #[test]
    fn summary_counts_levels_and_dedups_zones() {
        let zones = GeofenceCollection::new(vec![
            Geofence::new("caution", square(0.0, 0.0, 2.0, 2.0), Some(RiskLevel::Caution)),
            Geofence::new("forbidden", square(4.0, 4.0, 6.0, 6.0), Some(RiskLevel::Forbidden)),
        ]);
        let route: RouteGeometry = [(0.5, 0.5), (1.5, 1.5), (3.0, 3.0), (5.0, 5.0), (9.0, 9.0)]
            .into_iter()
            .collect();

        let summary = summarize_route(&segment_route(&route, Some(&zones)));
        assert_eq!(summary.highest_risk, RiskLevel::Forbidden);
        assert_eq!(summary.caution_segments, 2);
        assert_eq!(summary.forbidden_segments, 2);
        assert_eq!(summary.safe_segments, 0);
        assert_eq!(summary.forbidden_indices, vec![2, 3]);
        assert_eq!(summary.zones, vec!["caution", "forbidden"]);

        assert_eq!(summarize_route(&[]).highest_risk, RiskLevel::Safe);
    }

    #[test]
    fn unrecognized_loaded_risk_folds_as_safe() {
        let zones = GeofenceCollection::from_geojson_str(
            r#"{
                "type": "Feature",
                "properties": {"station_name": "Z", "risk_level": "purple", "safety_score": 0.1},
                "geometry": {"type": "Polygon", "coordinates": [[[77.0, 28.0], [77.1, 28.0], [77.1, 28.1], [77.0, 28.1], [77.0, 28.0]]]}
            }"#,
            &GeofenceSchema::default(),
        )
        .unwrap();

        let segments = segment_route(&scenario_route(), Some(&zones));
        assert_eq!(segments[0].risk_level, RiskLevel::Safe);
        assert_eq!(segments[0].zones, vec!["Z"]);

        let destination = Position::new(28.05, 77.05).unwrap();
        assert!(crate::destination_risk_check(&destination, Some(&zones)).is_none());
    }
}
