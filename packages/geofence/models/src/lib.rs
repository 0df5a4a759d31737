#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared types for geofence tracking and route risk segmentation.
//!
//! Defines the risk level taxonomy, position samples, zone transition
//! events and risk-tagged route segments, plus the payloads handed to the
//! external logging collaborator. Nothing in here performs I/O.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// How long a zone transition alert stays on screen before it expires.
pub const ALERT_TTL: Duration = Duration::from_secs(5);

/// Risk classification of a geofence.
///
/// Variants are declared in ascending severity so the derived [`Ord`]
/// gives `Safe < Caution < Forbidden`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum RiskLevel {
    /// No known risk.
    Safe,
    /// Elevated risk; route through with care.
    Caution,
    /// Zone the user should not enter.
    Forbidden,
}

impl RiskLevel {
    /// Parses a raw `risk_level` property value.
    ///
    /// Surrounding whitespace and letter case are ignored. Returns `None`
    /// for anything that is not one of the three levels.
    #[must_use]
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        raw.trim().parse().ok()
    }

    /// Resolves a possibly-unrecognized level for display purposes.
    ///
    /// Unknown zones are drawn as the most conservative class.
    #[must_use]
    pub fn or_styling_default(level: Option<Self>) -> Self {
        level.unwrap_or(Self::Forbidden)
    }

    /// Resolves a possibly-unrecognized level for severity folding.
    ///
    /// Unknown zones contribute nothing above the fold base.
    #[must_use]
    pub fn or_fold_default(level: Option<Self>) -> Self {
        level.unwrap_or(Self::Safe)
    }

    /// Returns the most severe level in `levels`, or [`RiskLevel::Safe`]
    /// when the iterator is empty.
    #[must_use]
    pub fn highest<I: IntoIterator<Item = Self>>(levels: I) -> Self {
        levels.into_iter().max().unwrap_or(Self::Safe)
    }

    /// Classifies a zone from its model safety score.
    ///
    /// `safety_score` is the probability of the safe class. A predicted
    /// label mentioning "high" always yields [`RiskLevel::Forbidden`].
    #[must_use]
    pub fn from_safety_score(
        safety_score: f64,
        predicted_label: Option<&str>,
        thresholds: &RiskThresholds,
    ) -> Self {
        if predicted_label.is_some_and(|label| label.to_lowercase().contains("high")) {
            return Self::Forbidden;
        }

        if safety_score >= thresholds.safe {
            Self::Safe
        } else if safety_score >= thresholds.caution {
            Self::Caution
        } else {
            Self::Forbidden
        }
    }
}

/// Safety score cut-offs used by [`RiskLevel::from_safety_score`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    /// Minimum score classified as safe.
    pub safe: f64,
    /// Minimum score classified as caution. Anything lower is forbidden.
    pub caution: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            safe: 0.7,
            caution: 0.4,
        }
    }
}

/// A WGS84 position reported by the location source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Horizontal accuracy radius in meters, if the source reports one.
    pub accuracy: Option<f64>,
}

impl Position {
    /// Creates a position after range-checking both coordinates.
    ///
    /// # Errors
    ///
    /// Returns an error if latitude is outside -90..=90 or longitude is
    /// outside -180..=180 (non-finite values are out of range).
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, InvalidPositionError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(InvalidPositionError::Latitude(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(InvalidPositionError::Longitude(longitude));
        }

        Ok(Self {
            latitude,
            longitude,
            accuracy: None,
        })
    }

    /// Attaches an accuracy radius in meters.
    #[must_use]
    pub const fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }
}

/// Error returned by [`Position::new`] for out-of-range coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InvalidPositionError {
    /// Latitude outside -90..=90.
    Latitude(f64),
    /// Longitude outside -180..=180.
    Longitude(f64),
}

impl std::fmt::Display for InvalidPositionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Latitude(v) => write!(f, "latitude {v} must be between -90 and 90"),
            Self::Longitude(v) => write!(f, "longitude {v} must be between -180 and 180"),
        }
    }
}

impl std::error::Error for InvalidPositionError {}

/// A position together with the time it arrived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    /// Reported position.
    pub position: Position,
    /// When the sample was received.
    pub received_at: DateTime<Utc>,
}

impl PositionSample {
    /// Stamps `position` with the current time.
    #[must_use]
    pub fn now(position: Position) -> Self {
        Self::at(position, Utc::now())
    }

    /// Stamps `position` with an explicit arrival time.
    #[must_use]
    pub const fn at(position: Position, received_at: DateTime<Utc>) -> Self {
        Self {
            position,
            received_at,
        }
    }
}

/// Direction of a containment change.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TransitionKind {
    /// The position moved into the geofence.
    Enter,
    /// The position moved out of the geofence.
    Exit,
}

/// A geofence entry or exit produced by the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionEvent {
    /// Entry or exit.
    pub kind: TransitionKind,
    /// Identifier of the geofence that was crossed.
    pub geofence_id: String,
    /// Risk level of the geofence (unknown levels resolve to forbidden).
    pub risk_level: RiskLevel,
    /// Safety score of the geofence, if it carries one.
    pub safety_score: Option<f64>,
    /// Position of the sample that caused the transition.
    pub position: Position,
    /// Arrival time of that sample.
    pub timestamp: DateTime<Utc>,
}

impl TransitionEvent {
    /// Short text for the transient on-screen alert.
    #[must_use]
    pub fn alert_message(&self) -> String {
        match self.kind {
            TransitionKind::Enter => {
                format!("Entering {} ({} zone)", self.geofence_id, self.risk_level)
            }
            TransitionKind::Exit => {
                format!("Leaving {} ({} zone)", self.geofence_id, self.risk_level)
            }
        }
    }

    /// Builds the payload for the external logging collaborator.
    #[must_use]
    pub fn log_entry(&self) -> GeofenceLogEntry {
        GeofenceLogEntry::from(self)
    }
}

/// Payload recorded by the logging collaborator for every transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceLogEntry {
    /// Geofence identifier.
    pub geofence_id: String,
    /// Entry or exit.
    pub event: TransitionKind,
    /// Risk level of the geofence.
    pub risk_level: RiskLevel,
    /// Safety score of the geofence.
    pub safety_score: Option<f64>,
    /// Latitude of the triggering sample.
    pub lat: f64,
    /// Longitude of the triggering sample.
    pub lng: f64,
    /// Accuracy radius of the triggering sample in meters.
    pub accuracy: Option<f64>,
    /// Arrival time of the triggering sample.
    pub timestamp: DateTime<Utc>,
}

impl From<&TransitionEvent> for GeofenceLogEntry {
    fn from(event: &TransitionEvent) -> Self {
        Self {
            geofence_id: event.geofence_id.clone(),
            event: event.kind,
            risk_level: event.risk_level,
            safety_score: event.safety_score,
            lat: event.position.latitude,
            lng: event.position.longitude,
            accuracy: event.position.accuracy,
            timestamp: event.timestamp,
        }
    }
}

/// A route vertex in (longitude, latitude) order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteVertex {
    /// Longitude in degrees.
    pub longitude: f64,
    /// Latitude in degrees.
    pub latitude: f64,
}

/// One directed edge of a route, tagged with the risk it passes through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSegment {
    /// Position of this edge in the route (0-based).
    pub index: usize,
    /// First vertex of the edge.
    pub start: RouteVertex,
    /// Second vertex of the edge.
    pub end: RouteVertex,
    /// Highest risk among the geofences this edge intersects.
    pub risk_level: RiskLevel,
    /// Identifiers of the intersected geofences, in collection order.
    pub zones: Vec<String>,
}

/// Payload logged when the user routes to a destination inside a
/// forbidden zone anyway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteOverrideLogEntry {
    /// The chosen destination.
    pub destination: Position,
    /// Geofence containing the destination.
    pub geofence_id: String,
    /// Risk level of that geofence.
    pub risk_level: RiskLevel,
    /// Whether the user explicitly accepted the risk.
    pub user_consented: bool,
    /// When the override was confirmed.
    pub timestamp: DateTime<Utc>,
}
