#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geofence collection loading and zone entry/exit tracking.
//!
//! A [`GeofenceCollection`] is loaded from a `GeoJSON` `FeatureCollection`
//! of risk-annotated zones and replaced wholesale whenever the upstream
//! data refreshes. The [`tracker`] module diffs successive containment sets
//! into [`TransitionEvent`]s, and the [`sink`] module delivers those events
//! to alerting and logging collaborators without blocking the caller.
//!
//! [`TransitionEvent`]: safe_route_geofence_models::TransitionEvent

pub mod collection;
pub mod sink;
pub mod tracker;

pub use collection::{Geofence, GeofenceCollection, GeofenceSchema, Properties};
pub use sink::{ChannelSink, EventSink, Fanout, LogSink};
pub use tracker::{ContainmentSet, TrackerUpdate, TrackingSession, update};

use thiserror::Error;

/// Errors that can occur while loading geofences.
#[derive(Debug, Error)]
pub enum GeofenceError {
    /// The input is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The input is JSON but not a feature or feature collection.
    #[error("Expected a FeatureCollection, found {found}")]
    NotAFeatureCollection {
        /// The `type` member found instead.
        found: String,
    },

    /// A `FeatureCollection` without a `features` array.
    #[error("FeatureCollection has no features array")]
    MissingFeatures,
}
