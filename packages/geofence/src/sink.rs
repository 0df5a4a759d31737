//! Delivery of transition events to alerting and logging collaborators.
//!
//! The tracker never performs I/O itself. Whatever shows the transient
//! alert or ships the log entry implements [`EventSink`]; emission is
//! fire-and-forget and must not block.

use safe_route_geofence_models::{ALERT_TTL, RiskLevel, TransitionEvent, TransitionKind};
use tokio::sync::mpsc;

/// Receives transition events as they are produced.
pub trait EventSink {
    /// Hands one event to the sink. Must return without waiting on
    /// delivery.
    fn emit(&self, event: &TransitionEvent);
}

impl<F: Fn(&TransitionEvent)> EventSink for F {
    fn emit(&self, event: &TransitionEvent) {
        self(event);
    }
}

/// Writes every event through the `log` facade.
///
/// Entering a forbidden zone is logged at `warn`, everything else at
/// `info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: &TransitionEvent) {
        let entry = event.log_entry();
        if event.kind == TransitionKind::Enter && event.risk_level == RiskLevel::Forbidden {
            log::warn!(
                "{} (score={:?}, lat={}, lng={}, alert for {}s)",
                event.alert_message(),
                entry.safety_score,
                entry.lat,
                entry.lng,
                ALERT_TTL.as_secs()
            );
        } else {
            log::info!(
                "{} (score={:?}, lat={}, lng={})",
                event.alert_message(),
                entry.safety_score,
                entry.lat,
                entry.lng
            );
        }
    }
}

/// Forwards events into an unbounded `tokio` channel for an async
/// consumer (for example an HTTP logging client).
///
/// Sending never blocks. If the receiver is gone the event is dropped.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<TransitionEvent>,
}

impl ChannelSink {
    /// Creates a sink and the receiver that drains it.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TransitionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: &TransitionEvent) {
        if self.tx.send(event.clone()).is_err() {
            log::debug!(
                "Dropping {} event for {}: receiver closed",
                event.kind,
                event.geofence_id
            );
        }
    }
}

/// Emits every event to two sinks, first `A` then `B`.
#[derive(Debug, Clone, Default)]
pub struct Fanout<A, B>(pub A, pub B);

impl<A: EventSink, B: EventSink> EventSink for Fanout<A, B> {
    fn emit(&self, event: &TransitionEvent) {
        self.0.emit(event);
        self.1.emit(event);
    }
}
