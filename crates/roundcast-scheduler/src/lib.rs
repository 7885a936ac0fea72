//! roundcast-scheduler — the round scheduling state machine.
//!
//! One [`RoundScheduler`] per tenant owns the tenant's single active round.
//! It validates and serializes schedule/cancel requests, arms the start
//! and end timers, persists each transition through the
//! [`RoundGateway`](roundcast_state::RoundGateway) with bounded retry, and
//! broadcasts lifecycle events to an [`EventSink`].
//!
//! # Architecture
//!
//! ```text
//! RoundRegistry (tenant_id → scheduler + broadcast channel)
//!   └── RoundScheduler (cloneable handle)
//!       └── actor task (one ordered command queue)
//!           ├── Schedule / Cancel / Snapshot / LastOutcome / Recover
//!           ├── Timer(Start / End)      ← posted by the round's timers
//!           ├── ScheduledRound slot (at most one)
//!           ├── OutcomeCache
//!           ├── RetryPolicy → RoundGateway
//!           └── EventSink
//! ```
//!
//! Every mutation of the slot happens on the actor task, so schedule
//! attempts are evaluated strictly one at a time in arrival order and
//! timer callbacks never race with direct calls.

pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod outcome;
pub mod registry;
pub mod retry;
pub mod scheduler;
mod timers;

#[cfg(test)]
mod test_support;

pub use clock::Clock;
pub use config::{MAX_TIMING_MS, RetryConfig, RoundTiming};
pub use error::{SchedulerError, SchedulerResult};
pub use events::{BroadcastSink, EventSink, RoundEvent};
pub use outcome::{LastOutcome, OutcomeCache};
pub use registry::RoundRegistry;
pub use retry::RetryPolicy;
pub use scheduler::{
    CancelKind, RecoveryOutcome, RoundPhase, RoundScheduler, ScheduleSnapshot, ScheduledTimes,
    SchedulerSettings,
};
