//! Route geometry as returned by the routing service.

use geo::{Coord, Line, coord};
use safe_route_geofence_models::RouteVertex;
use serde_json::Value;

use crate::RouteError;

/// An ordered path of (longitude, latitude) vertices from start to end.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteGeometry {
    vertices: Vec<Coord<f64>>,
}

impl RouteGeometry {
    #[must_use]
    pub const fn new(vertices: Vec<Coord<f64>>) -> Self {
        Self { vertices }
    }

    /// Parses a routing response.
    ///
    /// Accepts a `FeatureCollection` (the first feature with a
    /// `LineString` geometry is used), a single `Feature`, or a bare
    /// `LineString` geometry. Any other shape yields an empty route.
    ///
    /// # Errors
    ///
    /// Returns an error if `raw` is not valid JSON.
    pub fn from_geojson_str(raw: &str) -> Result<Self, RouteError> {
        Ok(Self::from_json_value(&serde_json::from_str(raw)?))
    }

    /// Extracts the route line from a parsed JSON document.
    ///
    /// Positions are read one by one; any that is not an array of at least
    /// two finite numbers is dropped with a warning.
    #[must_use]
    pub fn from_json_value(value: &Value) -> Self {
        let geometry = match kind(value) {
            Some("FeatureCollection") => value
                .get("features")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(|feature| feature.get("geometry"))
                .find(|geometry| kind(geometry) == Some("LineString")),
            Some("Feature") => value.get("geometry").filter(|g| !g.is_null()),
            _ => Some(value),
        };

        let Some(geometry) = geometry else {
            log::warn!("Route response has no geometry; treating route as empty");
            return Self::default();
        };

        if kind(geometry) != Some("LineString") {
            log::warn!("Route geometry is not a LineString; treating route as empty");
            return Self::default();
        }

        let positions = geometry
            .get("coordinates")
            .and_then(Value::as_array)
            .map_or(&[][..], Vec::as_slice);

        let vertices: Vec<Coord<f64>> = positions.iter().filter_map(parse_position).collect();
        if vertices.len() < positions.len() {
            log::warn!(
                "Dropped {} malformed route positions",
                positions.len() - vertices.len()
            );
        }

        Self::new(vertices)
    }

    #[must_use]
    pub fn vertices(&self) -> &[Coord<f64>] {
        &self.vertices
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Consecutive vertex pairs, in route order.
    pub fn edges(&self) -> impl Iterator<Item = Line<f64>> + '_ {
        self.vertices.windows(2).map(|pair| Line::new(pair[0], pair[1]))
    }
}

impl FromIterator<(f64, f64)> for RouteGeometry {
    /// Collects `(longitude, latitude)` pairs.
    fn from_iter<I: IntoIterator<Item = (f64, f64)>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(|(lng, lat)| coord! { x: lng, y: lat }).collect())
    }
}

fn kind(value: &Value) -> Option<&str> {
    value.get("type").and_then(Value::as_str)
}

/// Reads `[lng, lat, ...]`; extra values such as elevation are ignored.
fn parse_position(position: &Value) -> Option<Coord<f64>> {
    let values = position.as_array()?;
    let lng = values.first()?.as_f64()?;
    let lat = values.get(1)?.as_f64()?;
    (lng.is_finite() && lat.is_finite()).then_some(coord! { x: lng, y: lat })
}

pub(crate) const fn vertex(c: Coord<f64>) -> RouteVertex {
    RouteVertex {
        longitude: c.x,
        latitude: c.y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_first_linestring_from_feature_collection() {
        let raw = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [0, 0]}},
                {
                    "type": "Feature",
                    "properties": {"summary": {"distance": 1200.0}},
                    "geometry": {"type": "LineString", "coordinates": [[76.9, 27.9], [77.05, 28.05], [77.2, 28.2]]}
                }
            ]
        }"#;

        let route = RouteGeometry::from_geojson_str(raw).unwrap();
        assert_eq!(route.len(), 3);
        assert_eq!(route.vertices()[1], coord! { x: 77.05, y: 28.05 });
        assert_eq!(route.edges().count(), 2);
    }

    #[test]
    fn bare_linestring_ignores_elevation() {
        let raw = r#"{"type": "LineString", "coordinates": [[1.0, 2.0], [5.0, 6.0, 100.0]]}"#;
        let route = RouteGeometry::from_geojson_str(raw).unwrap();
        assert_eq!(
            route.vertices(),
            &[coord! { x: 1.0, y: 2.0 }, coord! { x: 5.0, y: 6.0 }]
        );
    }

    #[test]
    fn non_line_geometry_is_empty_route() {
        let raw = r#"{"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [0, 0]}}"#;
        assert!(RouteGeometry::from_geojson_str(raw).unwrap().is_empty());

        let missing = r#"{"type": "Feature", "properties": {}, "geometry": null}"#;
        assert!(RouteGeometry::from_geojson_str(missing).unwrap().is_empty());
    }

    #[test]
    fn malformed_positions_are_dropped() {
        let raw = r#"{
            "type": "Feature",
            "properties": {},
            "geometry": {"type": "LineString", "coordinates": [[1.0, 2.0], [2.0], "x", [3.0, "y"], [5.0, 6.0]]}
        }"#;
        let route = RouteGeometry::from_geojson_str(raw).unwrap();
        assert_eq!(
            route.vertices(),
            &[coord! { x: 1.0, y: 2.0 }, coord! { x: 5.0, y: 6.0 }]
        );
        assert_eq!(route.edges().count(), 1);
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(RouteGeometry::from_geojson_str("not json").is_err());
    }
}
