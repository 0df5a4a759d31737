//! Destination pre-check run before a route is requested.

use chrono::Utc;
use safe_route_geofence::{Geofence, GeofenceCollection};
use safe_route_geofence_models::{Position, RiskLevel, RouteOverrideLogEntry};
use safe_route_spatial::ZoneGeometry;
use serde::{Deserialize, Serialize};

use crate::position_coord;

/// Returns the first forbidden geofence containing `destination`.
///
/// Only zones explicitly rated forbidden are tested. The caller only needs
/// to know whether such a zone exists, so the scan stops at the first hit.
#[must_use]
pub fn destination_risk_check<'a, B: ZoneGeometry>(
    destination: &Position,
    geofences: Option<&'a GeofenceCollection<B>>,
) -> Option<&'a Geofence<B>> {
    let point = position_coord(destination);
    geofences?
        .near(point)
        .filter(|geofence| geofence.risk_level() == Some(RiskLevel::Forbidden))
        .find(|geofence| geofence.contains(point))
}

/// Outcome of the destination pre-check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DestinationGate {
    /// No forbidden zone contains the destination.
    Clear,
    /// The destination lies in a forbidden zone; the user has to confirm
    /// before a route is generated.
    RequiresConsent {
        /// The zone containing the destination.
        geofence_id: String,
        /// Its risk level.
        risk_level: RiskLevel,
    },
}

/// What to do after asking the user.
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// Generate the route. Carries the override entry to log when the user
    /// accepted a forbidden destination.
    Proceed(Option<RouteOverrideLogEntry>),
    /// The user declined; do not generate a route.
    Abort,
}

impl DestinationGate {
    /// Runs [`destination_risk_check`] and wraps the result.
    #[must_use]
    pub fn evaluate<B: ZoneGeometry>(
        destination: &Position,
        geofences: Option<&GeofenceCollection<B>>,
    ) -> Self {
        destination_risk_check(destination, geofences).map_or(Self::Clear, |geofence| {
            log::info!(
                "Destination ({}, {}) is inside forbidden zone {}",
                destination.latitude,
                destination.longitude,
                geofence.id()
            );
            Self::RequiresConsent {
                geofence_id: geofence.id().to_string(),
                risk_level: RiskLevel::Forbidden,
            }
        })
    }

    #[must_use]
    pub const fn requires_consent(&self) -> bool {
        matches!(self, Self::RequiresConsent { .. })
    }

    /// Applies the user's answer. A clear destination always proceeds.
    #[must_use]
    pub fn resolve(&self, destination: &Position, consented: bool) -> GateDecision {
        match self {
            Self::Clear => GateDecision::Proceed(None),
            Self::RequiresConsent { .. } if !consented => {
                log::info!("User declined route to forbidden destination");
                GateDecision::Abort
            }
            Self::RequiresConsent {
                geofence_id,
                risk_level,
            } => {
                log::warn!("User overrode forbidden destination in {geofence_id}");
                GateDecision::Proceed(Some(RouteOverrideLogEntry {
                    destination: *destination,
                    geofence_id: geofence_id.clone(),
                    risk_level: *risk_level,
                    user_consented: true,
                    timestamp: Utc::now(),
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use geo::{MultiPolygon, polygon};

    use super::*;

    fn zones() -> GeofenceCollection {
        let square = |min_x: f64, min_y: f64, max_x: f64, max_y: f64| {
            MultiPolygon(vec![polygon![
                (x: min_x, y: min_y),
                (x: max_x, y: min_y),
                (x: max_x, y: max_y),
                (x: min_x, y: max_y),
                (x: min_x, y: min_y),
            ]])
        };

        GeofenceCollection::new(vec![
            Geofence::new("caution", square(76.0, 27.0, 78.0, 29.0), Some(RiskLevel::Caution)),
            Geofence::new("unknown", square(76.8, 27.8, 77.0, 28.0), None),
            Geofence::new("PS Kotwali", square(77.0, 28.0, 77.1, 28.1), Some(RiskLevel::Forbidden)),
        ])
    }

    fn at(lng: f64, lat: f64) -> Position {
        Position::new(lat, lng).unwrap()
    }

    #[test]
    fn matches_only_forbidden_zones() {
        let zones = zones();

        let hit = destination_risk_check(&at(77.05, 28.05), Some(&zones)).unwrap();
        assert_eq!(hit.id(), "PS Kotwali");

        assert!(destination_risk_check(&at(76.9, 27.9), Some(&zones)).is_none());
        assert!(destination_risk_check(&at(76.5, 27.5), Some(&zones)).is_none());
    }

    #[test]
    fn empty_or_missing_collection_never_matches() {
        let empty: GeofenceCollection = GeofenceCollection::empty();
        assert!(destination_risk_check(&at(77.05, 28.05), Some(&empty)).is_none());
        assert!(destination_risk_check::<MultiPolygon<f64>>(&at(77.05, 28.05), None).is_none());
    }

    #[test]
    fn gate_requires_consent_and_logs_override() {
        let zones = zones();
        let destination = at(77.05, 28.05);

        let gate = DestinationGate::evaluate(&destination, Some(&zones));
        assert!(gate.requires_consent());
        assert_eq!(gate.resolve(&destination, false), GateDecision::Abort);

        let GateDecision::Proceed(Some(entry)) = gate.resolve(&destination, true) else {
            panic!("expected an override entry");
        };
        assert_eq!(entry.geofence_id, "PS Kotwali");
        assert_eq!(entry.risk_level, RiskLevel::Forbidden);
        assert!(entry.user_consented);
        assert_eq!(entry.destination, destination);
    }

    #[test]
    fn clear_destination_proceeds_without_log() {
        let zones = zones();
        let destination = at(76.5, 27.5);

        let gate = DestinationGate::evaluate(&destination, Some(&zones));
        assert_eq!(gate, DestinationGate::Clear);
        assert_eq!(gate.resolve(&destination, false), GateDecision::Proceed(None));
    }

    #[test]
    fn gate_serializes_with_status_tag() {
        let gate = DestinationGate::RequiresConsent {
            geofence_id: "PS Kotwali".to_string(),
            risk_level: RiskLevel::Forbidden,
        };
        let json = serde_json::to_value(&gate).unwrap();
        assert_eq!(json["status"], "requires_consent");
        assert_eq!(json["risk_level"], "forbidden");
    }
}
