//! Avoid-zone geometry for the routing request.
//!
//! The routing service rejects large or intricate avoid polygons, so each
//! zone polygon is reduced to the bounding box of its exterior ring and the
//! total is capped.

use geo::{BoundingRect, MultiPolygon};
use geojson::{Geometry, Value};
use safe_route_geofence::GeofenceCollection;
use safe_route_geofence_models::{Position, RiskLevel};
use safe_route_spatial::{ZoneGeometry, validate_boundary};

use crate::position_coord;

/// Upper bound on avoid polygons sent with one routing request.
pub const DEFAULT_AVOID_POLYGON_LIMIT: usize = 30;

/// Decides which risk levels to actually avoid for a trip.
///
/// When the start or the end already lies inside a zone at one of the
/// `requested` levels, avoiding those zones would make the trip
/// unroutable, so avoidance is dropped entirely.
#[must_use]
pub fn effective_avoid_levels<B: ZoneGeometry>(
    start: &Position,
    end: &Position,
    geofences: &GeofenceCollection<B>,
    requested: &[RiskLevel],
) -> Vec<RiskLevel> {
    let inside_avoided = |position: &Position| {
        geofences
            .containing(position_coord(position))
            .any(|geofence| geofence.risk_level().is_some_and(|l| requested.contains(&l)))
    };

    if inside_avoided(start) || inside_avoided(end) {
        log::warn!("Start or end point is inside an avoided zone; routing without avoidance");
        return Vec::new();
    }

    requested.to_vec()
}

/// Builds a `MultiPolygon` of bounding boxes around every zone rated at
/// one of `levels`.
///
/// Each polygon of a zone contributes one box (coordinates rounded to five
/// decimals). At most `limit` boxes are produced. Returns `None` when
/// nothing is to be avoided, in which case the request carries no avoid
/// option at all.
#[must_use]
pub fn build_avoid_polygons(
    geofences: &GeofenceCollection<MultiPolygon<f64>>,
    levels: &[RiskLevel],
    limit: usize,
) -> Option<Geometry> {
    let mut polygons: Vec<Vec<Vec<Vec<f64>>>> = Vec::new();

    'zones: for geofence in geofences.iter() {
        if !geofence.risk_level().is_some_and(|l| levels.contains(&l)) {
            continue;
        }
        if let Err(e) = validate_boundary(geofence.boundary()) {
            log::warn!("Skipping avoid zone {}: {e}", geofence.id());
            continue;
        }

        for polygon in &geofence.boundary().0 {
            if polygons.len() >= limit {
                break 'zones;
            }
            let Some(rect) = polygon.exterior().bounding_rect() else {
                continue;
            };

            let (min_x, min_y) = (round5(rect.min().x), round5(rect.min().y));
            let (max_x, max_y) = (round5(rect.max().x), round5(rect.max().y));
            polygons.push(vec![vec![
                vec![min_x, min_y],
                vec![max_x, min_y],
                vec![max_x, max_y],
                vec![min_x, max_y],
                vec![min_x, min_y],
            ]]);
        }
    }

    log::info!("Built {} avoid polygon(s) for levels {levels:?}", polygons.len());

    if polygons.is_empty() {
        None
    } else {
        Some(Geometry::new(Value::MultiPolygon(polygons)))
    }
}

fn round5(value: f64) -> f64 {
    (value * 100_000.0).round() / 100_000.0
}
