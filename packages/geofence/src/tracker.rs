//! Zone entry/exit tracking.
//!
//! [`update`] is a pure reducer: it takes the containment set produced by
//! the previous call, a new position sample and the current geofence
//! snapshot, and returns the next containment set together with the
//! transitions between the two. Callers must feed samples in arrival order
//! and hand the returned set back in on the next call.
//!
//! [`TrackingSession`] wraps the reducer for callers that want the set kept
//! for them and the events pushed into an [`EventSink`].

use std::collections::BTreeSet;

use geo::coord;
use safe_route_geofence_models::{
    PositionSample, RiskLevel, TransitionEvent, TransitionKind,
};
use safe_route_spatial::ZoneGeometry;

use crate::collection::GeofenceCollection;
use crate::sink::EventSink;

/// Identifiers of the geofences containing the most recent sample.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainmentSet(BTreeSet<String>);

impl ContainmentSet {
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeSet::new())
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.0.contains(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Identifiers in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for ContainmentSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Result of feeding one sample to [`update`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerUpdate {
    /// Geofences containing the sample.
    pub containment: ContainmentSet,
    /// Exits followed by entries, each in ascending identifier order.
    pub events: Vec<TransitionEvent>,
}

/// Computes the containment set for `sample` and diffs it against
/// `previous`.
///
/// Every identifier only in the new set yields an
/// [`TransitionKind::Enter`], every identifier only in `previous` yields an
/// [`TransitionKind::Exit`]. With no geofence collection there is nothing
/// to evaluate: `previous` is returned unchanged with no events.
///
/// Exits for zones that vanished from a refreshed collection are still
/// reported; their risk resolves to the conservative default.
#[must_use]
pub fn update<B: ZoneGeometry>(
    previous: &ContainmentSet,
    sample: &PositionSample,
    geofences: Option<&GeofenceCollection<B>>,
) -> TrackerUpdate {
    let Some(geofences) = geofences else {
        return TrackerUpdate {
            containment: previous.clone(),
            events: Vec::new(),
        };
    };

    let point = coord! {
        x: sample.position.longitude,
        y: sample.position.latitude,
    };

    let containment: ContainmentSet = geofences
        .containing(point)
        .map(|geofence| geofence.id().to_string())
        .collect();

    let event = |kind: TransitionKind, id: &str| {
        let geofence = geofences.get(id);
        TransitionEvent {
            kind,
            geofence_id: id.to_string(),
            risk_level: RiskLevel::or_styling_default(geofence.and_then(|g| g.risk_level())),
            safety_score: geofence.and_then(|g| g.safety_score()),
            position: sample.position,
            timestamp: sample.received_at,
        }
    };

    let exits = previous
        .0
        .difference(&containment.0)
        .map(|id| event(TransitionKind::Exit, id));
    let enters = containment
        .0
        .difference(&previous.0)
        .map(|id| event(TransitionKind::Enter, id));
    let events: Vec<TransitionEvent> = exits.chain(enters).collect();

    for e in &events {
        log::debug!(
            "Geofence {} {} at ({}, {})",
            e.kind,
            e.geofence_id,
            e.position.latitude,
            e.position.longitude
        );
    }

    TrackerUpdate {
        containment,
        events,
    }
}

/// A tracking session that owns its containment set and forwards events
/// to a sink.
///
/// Dropping the session or calling [`TrackingSession::stop`] discards the
/// set; the next sample after a stop is evaluated from scratch.
pub struct TrackingSession<S> {
    containment: ContainmentSet,
    sink: S,
}

impl<S: EventSink> TrackingSession<S> {
    #[must_use]
    pub const fn new(sink: S) -> Self {
        Self {
            containment: ContainmentSet::new(),
            sink,
        }
    }

    /// Processes one sample and emits its transitions. Returns the number
    /// of events emitted.
    pub fn observe<B: ZoneGeometry>(
        &mut self,
        sample: &PositionSample,
        geofences: Option<&GeofenceCollection<B>>,
    ) -> usize {
        let TrackerUpdate {
            containment,
            events,
        } = update(&self.containment, sample, geofences);

        for event in &events {
            self.sink.emit(event);
        }

        self.containment = containment;
        events.len()
    }

    #[must_use]
    pub const fn containment(&self) -> &ContainmentSet {
        &self.containment
    }

    /// Stops tracking and discards the containment set.
    pub fn stop(&mut self) {
        self.containment = ContainmentSet::new();
    }
}
