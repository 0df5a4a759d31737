#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Route risk segmentation against a geofence collection.
//!
//! Splits a planned route into its edges and tags each with the most
//! severe geofence it touches, checks whether a destination sits inside a
//! forbidden zone before a route is requested, and builds the simplified
//! avoid-zone geometry sent to the external routing service. Route
//! computation itself happens elsewhere; this crate only reads the path it
//! returns.

pub mod avoid;
pub mod destination;
pub mod geometry;
pub mod segment;

pub use avoid::{DEFAULT_AVOID_POLYGON_LIMIT, build_avoid_polygons, effective_avoid_levels};
pub use destination::{DestinationGate, GateDecision, destination_risk_check};
pub use geometry::RouteGeometry;
pub use segment::{RouteRiskSummary, segment_route, summarize_route};

use geo::{Coord, coord};
use safe_route_geofence_models::Position;
use thiserror::Error;

/// Errors that can occur while reading route input.
#[derive(Debug, Error)]
pub enum RouteError {
    /// The input is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Position as an `x = longitude, y = latitude` coordinate.
pub(crate) const fn position_coord(position: &Position) -> Coord<f64> {
    coord! {
        x: position.longitude,
        y: position.latitude,
    }
}
