//! Broadcast events and the sinks that deliver them.
//!
//! Event names and camelCase payload fields form the wire contract with
//! listeners (the API forwards them verbatim over SSE).

use roundcast_state::{OutcomeValues, RoundId};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledPayload {
    pub start_at: u64,
    pub end_at: u64,
    pub total_ms: u64,
    pub remaining_ms: u64,
    pub server_now: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedPayload {
    pub round_id: RoundId,
    pub start_at: u64,
    pub end_at: u64,
    pub total_ms: u64,
    pub remaining_ms: u64,
    pub server_now: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPayload {
    pub round_id: RoundId,
    pub outcome_values: OutcomeValues,
    pub server_now: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelledPayload {
    pub server_now: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastOutcomePayload {
    pub outcome_values: OutcomeValues,
    pub updated_at: u64,
    pub round_id: Option<RoundId>,
    pub server_now: u64,
}

/// A named lifecycle event. Serializes as its payload only; the name
/// travels separately (SSE `event:` line).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RoundEvent {
    Scheduled(ScheduledPayload),
    Started(StartedPayload),
    Result(ResultPayload),
    Cancelled(CancelledPayload),
    LastOutcome(LastOutcomePayload),
}

impl RoundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RoundEvent::Scheduled(_) => "round.scheduled",
            RoundEvent::Started(_) => "round.started",
            RoundEvent::Result(_) => "round.result",
            RoundEvent::Cancelled(_) => "round.cancelled",
            RoundEvent::LastOutcome(_) => "last.outcome",
        }
    }
}

/// Best-effort delivery of events to a tenant's listeners.
///
/// Implementations must not block: no acknowledgement, no buffering for
/// absent listeners.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: RoundEvent);
}

/// Default number of events a slow listener may fall behind before it
/// starts losing the oldest ones.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// [`EventSink`] over a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<RoundEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoundEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventSink for BroadcastSink {
    fn emit(&self, event: RoundEvent) {
        // send only fails when nobody is listening
        if self.tx.send(event).is_err() {
            trace!("event dropped, no listeners");
        }
    }
}
