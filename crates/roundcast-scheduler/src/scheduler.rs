//! The per-tenant round state machine.
//!
//! A [`RoundScheduler`] is a cheap, cloneable handle to an actor task that
//! owns the tenant's single round slot. The actor:
//! - Validates and serializes schedule/cancel requests (one FIFO queue)
//! - Rejects duplicates against memory and the durable latest record
//! - Arms a start and an end timer per round
//! - Persists each transition through the gateway with bounded retry
//! - Broadcasts lifecycle events through the [`EventSink`]

use std::sync::Arc;
use std::time::Duration;

use roundcast_state::{NewRound, OutcomeValues, RoundGateway, RoundId, TenantId, UserId};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, trace, warn};

use crate::clock::Clock;
use crate::config::RoundTiming;
use crate::error::{SchedulerError, SchedulerResult};
use crate::events::{
    CancelledPayload, EventSink, ResultPayload, RoundEvent, ScheduledPayload, StartedPayload,
};
use crate::outcome::{LastOutcome, OutcomeCache};
use crate::retry::RetryPolicy;
use crate::timers::{self, RoundTimers};

/// Commands buffered per tenant before callers wait for queue space.
const COMMAND_QUEUE_CAPACITY: usize = 64;

/// Everything a scheduler needs besides its collaborators.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulerSettings {
    pub timing: RoundTiming,
    pub retry: RetryPolicy,
    pub clock: Clock,
}

/// Start and end of a newly scheduled round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledTimes {
    pub start_at: u64,
    pub end_at: u64,
}

/// How a successful cancel took effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelKind {
    /// The round was dropped before it started; nothing was persisted.
    BeforeStart,
    /// The round is running; it will be recorded as cancelled at its end.
    DuringRound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    Pending,
    Running,
}

/// Read-only view of the scheduled round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSnapshot {
    pub phase: RoundPhase,
    pub start_at: u64,
    pub end_at: u64,
    pub total_ms: u64,
    pub remaining_ms: u64,
    pub round_id: Option<RoundId>,
    pub cancelled: bool,
}

impl ScheduleSnapshot {
    /// A `round.scheduled` event for a listener joining mid-countdown.
    pub fn to_event(&self, server_now: u64) -> RoundEvent {
        RoundEvent::Scheduled(ScheduledPayload {
            start_at: self.start_at,
            end_at: self.end_at,
            total_ms: self.total_ms,
            remaining_ms: self.remaining_ms,
            server_now,
        })
    }
}

/// What startup recovery found for a tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// The tenant has no stored rounds.
    NoRecord,
    /// The latest round already has an outcome or a cancellation marker.
    Settled,
    /// The latest round ended while the process was down and was marked cancelled.
    MarkedCancelled(RoundId),
    /// The latest round has not ended yet; it blocks new rounds until it does.
    StillActive(RoundId),
    /// Writing the cancellation marker failed.
    Failed(RoundId),
    /// The latest round could not be read.
    LookupFailed,
}

// ── Handle ────────────────────────────────────────────────────────

/// Handle to a tenant's scheduler actor.
///
/// The actor stops once every handle is dropped; pending timers are
/// aborted with it.
#[derive(Debug, Clone)]
pub struct RoundScheduler {
    tenant_id: TenantId,
    tx: mpsc::Sender<Command>,
}

impl RoundScheduler {
    /// Spawn the actor for `tenant_id` on the current tokio runtime.
    pub fn spawn(
        tenant_id: TenantId,
        gateway: Arc<dyn RoundGateway>,
        events: Arc<dyn EventSink>,
        settings: SchedulerSettings,
    ) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let actor = RoundActor {
            tenant_id,
            gateway,
            events,
            timing: settings.timing.sanitized(),
            retry: settings.retry,
            clock: settings.clock,
            timer_tx: tx.downgrade(),
            slot: None,
            next_seq: 0,
            outcomes: OutcomeCache::new(),
        };
        tokio::spawn(actor.run(rx));
        Self { tenant_id, tx }
    }

    /// Schedule a round revealing `outcome_values` once it ends.
    ///
    /// The values are validated before the request is queued.
    pub async fn schedule_round(
        &self,
        created_by: UserId,
        outcome_values: &[i64],
        name: Option<String>,
    ) -> SchedulerResult<ScheduledTimes> {
        let outcome_values =
            OutcomeValues::new(outcome_values).ok_or(SchedulerError::InvalidOutcome)?;
        self.request(|reply| Command::Schedule {
            created_by,
            outcome_values,
            name,
            reply,
        })
        .await?
    }

    /// Cancel the scheduled round.
    pub async fn cancel_round(&self) -> SchedulerResult<CancelKind> {
        self.request(|reply| Command::Cancel { reply }).await?
    }

    /// The scheduled round, if any.
    pub async fn get_scheduled(&self) -> SchedulerResult<Option<ScheduleSnapshot>> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// The last revealed outcome, seeded with random values if no round
    /// has completed yet.
    pub async fn get_or_create_last_outcome(&self) -> SchedulerResult<LastOutcome> {
        self.request(|reply| Command::LastOutcome { reply }).await
    }

    /// Reconcile the tenant's latest stored round after a restart.
    pub async fn recover(&self) -> SchedulerResult<RecoveryOutcome> {
        self.request(|reply| Command::Recover { reply }).await
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> SchedulerResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| SchedulerError::Unavailable(self.tenant_id))?;
        rx.await
            .map_err(|_| SchedulerError::Unavailable(self.tenant_id))
    }
}

// ── Actor ─────────────────────────────────────────────────────────

#[derive(Debug)]
enum Command {
    Schedule {
        created_by: UserId,
        outcome_values: OutcomeValues,
        name: Option<String>,
        reply: oneshot::Sender<SchedulerResult<ScheduledTimes>>,
    },
    Cancel {
        reply: oneshot::Sender<SchedulerResult<CancelKind>>,
    },
    Snapshot {
        reply: oneshot::Sender<Option<ScheduleSnapshot>>,
    },
    LastOutcome {
        reply: oneshot::Sender<LastOutcome>,
    },
    Recover {
        reply: oneshot::Sender<RecoveryOutcome>,
    },
    Timer(TimerFired),
}

/// Posted by a round's timers. `seq` ties the message to the round that
/// armed it, so a message for a cleared round is ignored.
#[derive(Debug, Clone, Copy)]
enum TimerFired {
    Start { seq: u64 },
    End { seq: u64 },
}

/// The in-memory round. Dropping it aborts its timers.
struct ScheduledRound {
    seq: u64,
    name: Option<String>,
    created_by: UserId,
    created_at: u64,
    start_at: u64,
    end_at: u64,
    outcome_values: OutcomeValues,
    round_id: Option<RoundId>,
    cancelled: bool,
    cancel_requested_at: Option<u64>,
    _timers: RoundTimers,
}

impl ScheduledRound {
    fn snapshot(&self, now: u64) -> ScheduleSnapshot {
        let (phase, total_ms, remaining_ms) = if now < self.start_at {
            (
                RoundPhase::Pending,
                self.start_at - self.created_at,
                self.start_at - now,
            )
        } else {
            (
                RoundPhase::Running,
                self.end_at - self.start_at,
                self.end_at.saturating_sub(now),
            )
        };
        ScheduleSnapshot {
            phase,
            start_at: self.start_at,
            end_at: self.end_at,
            total_ms,
            remaining_ms,
            round_id: self.round_id.clone(),
            cancelled: self.cancelled,
        }
    }
}

struct RoundActor {
    tenant_id: TenantId,
    gateway: Arc<dyn RoundGateway>,
    events: Arc<dyn EventSink>,
    timing: RoundTiming,
    retry: RetryPolicy,
    clock: Clock,
    timer_tx: mpsc::WeakSender<Command>,
    slot: Option<ScheduledRound>,
    next_seq: u64,
    outcomes: OutcomeCache,
}

impl RoundActor {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        debug!(tenant_id = self.tenant_id, "round scheduler started");
        while let Some(command) = rx.recv().await {
            self.handle(command).await;
        }
        debug!(tenant_id = self.tenant_id, "round scheduler stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Schedule {
                created_by,
                outcome_values,
                name,
                reply,
            } => {
                let result = self.schedule(created_by, outcome_values, name).await;
                let _ = reply.send(result);
            }
            Command::Cancel { reply } => {
                let _ = reply.send(self.cancel());
            }
            Command::Snapshot { reply } => {
                let now = self.clock.now_ms();
                let _ = reply.send(self.slot.as_ref().map(|round| round.snapshot(now)));
            }
            Command::LastOutcome { reply } => {
                let now = self.clock.now_ms();
                let _ = reply.send(self.outcomes.get_or_seed(now).clone());
            }
            Command::Recover { reply } => {
                let outcome = self.recover().await;
                let _ = reply.send(outcome);
            }
            Command::Timer(TimerFired::Start { seq }) => self.on_start(seq).await,
            Command::Timer(TimerFired::End { seq }) => self.on_end(seq).await,
        }
    }

    async fn schedule(
        &mut self,
        created_by: UserId,
        outcome_values: OutcomeValues,
        name: Option<String>,
    ) -> SchedulerResult<ScheduledTimes> {
        let tenant_id = self.tenant_id;

        // Check the in-memory slot.
        if self.slot.is_some() {
            debug!(tenant_id, "schedule rejected: round in memory");
            return Err(SchedulerError::AlreadyScheduled);
        }

        // Check the durable latest record.
        let gateway = &self.gateway;
        let latest = self
            .retry
            .run("latest_round", move || gateway.latest(tenant_id))
            .await
            .map_err(|e| {
                error!(tenant_id, error = %e, "duplicate check failed");
                SchedulerError::Persistence(e.to_string())
            })?;

        let now = self.clock.now_ms();
        if let Some(record) = latest.filter(|record| record.is_active_at(now)) {
            debug!(
                tenant_id,
                round_id = %record.id,
                end_at = record.end_at,
                "schedule rejected: stored round still active"
            );
            return Err(SchedulerError::AlreadyScheduled);
        }

        let start_at = now.saturating_add(self.timing.start_buffer_ms);
        let end_at = start_at.saturating_add(self.timing.duration_ms);
        let seq = self.next_seq;
        self.next_seq += 1;

        let timers = RoundTimers::new(
            timers::arm(
                self.timer_tx.clone(),
                Duration::from_millis(start_at - now),
                Command::Timer(TimerFired::Start { seq }),
            ),
            timers::arm(
                self.timer_tx.clone(),
                Duration::from_millis(end_at - now),
                Command::Timer(TimerFired::End { seq }),
            ),
        );

        self.slot = Some(ScheduledRound {
            seq,
            name,
            created_by,
            created_at: now,
            start_at,
            end_at,
            outcome_values,
            round_id: None,
            cancelled: false,
            cancel_requested_at: None,
            _timers: timers,
        });

        info!(tenant_id, created_by, start_at, end_at, "round scheduled");
        self.events.emit(RoundEvent::Scheduled(ScheduledPayload {
            start_at,
            end_at,
            total_ms: self.timing.start_buffer_ms,
            remaining_ms: start_at - now,
            server_now: now,
        }));

        Ok(ScheduledTimes { start_at, end_at })
    }

    fn cancel(&mut self) -> SchedulerResult<CancelKind> {
        let tenant_id = self.tenant_id;
        let now = self.clock.now_ms();

        let Some(round) = self.slot.as_mut() else {
            return Err(SchedulerError::NothingToCancel);
        };
        if now >= round.end_at {
            return Err(SchedulerError::TooLate);
        }

        let kind = if now < round.start_at {
            // Nothing persisted yet; dropping the slot aborts both timers.
            self.slot = None;
            info!(tenant_id, "round cancelled before start");
            CancelKind::BeforeStart
        } else {
            if round.cancelled {
                return Err(SchedulerError::NothingToCancel);
            }
            round.cancelled = true;
            round.cancel_requested_at = Some(now);
            info!(
                tenant_id,
                round_id = ?round.round_id,
                "round cancelled while running"
            );
            CancelKind::DuringRound
        };

        self.events
            .emit(RoundEvent::Cancelled(CancelledPayload { server_now: now }));
        Ok(kind)
    }

    async fn on_start(&mut self, seq: u64) {
        let tenant_id = self.tenant_id;
        let Some(round) = self.slot.as_ref().filter(|round| round.seq == seq) else {
            trace!(tenant_id, seq, "stale start timer ignored");
            return;
        };

        let new_round = NewRound {
            tenant_id,
            name: round.name.clone(),
            created_by: round.created_by,
            start_at: round.start_at,
            end_at: round.end_at,
        };
        let gateway = &self.gateway;
        let created = self
            .retry
            .run("create_round", move || gateway.create(new_round.clone()))
            .await;

        let record = match created {
            Ok(record) => record,
            Err(e) => {
                error!(tenant_id, error = %e, "failed to persist round start, aborting round");
                self.slot = None;
                return;
            }
        };

        let now = self.clock.now_ms();
        let Some(round) = self.slot.as_mut() else {
            return;
        };
        round.round_id = Some(record.id.clone());
        info!(tenant_id, round_id = %record.id, "round started");

        if round.cancelled {
            debug!(tenant_id, round_id = %record.id, "start not announced: round cancelled");
            return;
        }
        let event = RoundEvent::Started(StartedPayload {
            round_id: record.id,
            start_at: round.start_at,
            end_at: round.end_at,
            total_ms: round.end_at - round.start_at,
            remaining_ms: round.end_at.saturating_sub(now),
            server_now: now,
        });
        self.events.emit(event);
    }

    async fn on_end(&mut self, seq: u64) {
        let tenant_id = self.tenant_id;
        let Some(round) = self.slot.take_if(|round| round.seq == seq) else {
            trace!(tenant_id, seq, "stale end timer ignored");
            return;
        };
        let Some(round_id) = round.round_id.clone() else {
            warn!(tenant_id, "round ended without a stored start, clearing");
            return;
        };

        let gateway = &self.gateway;
        let id = &round_id;

        if round.cancelled {
            let marked = self
                .retry
                .run("mark_cancelled", move || gateway.mark_cancelled(id))
                .await;
            match marked {
                Ok(()) => info!(
                    tenant_id,
                    round_id = %round_id,
                    cancel_requested_at = ?round.cancel_requested_at,
                    "cancelled round closed"
                ),
                Err(e) => error!(
                    tenant_id,
                    round_id = %round_id,
                    error = %e,
                    "failed to persist cancellation"
                ),
            }
            return;
        }

        let values = &round.outcome_values;
        let finalized = self
            .retry
            .run("finalize_round", move || gateway.finalize(id, values))
            .await;
        if let Err(e) = finalized {
            error!(
                tenant_id,
                round_id = %round_id,
                error = %e,
                "failed to persist outcome, round cleared without result"
            );
            return;
        }

        let now = self.clock.now_ms();
        self.outcomes
            .record(round.outcome_values, now, round_id.clone());
        info!(tenant_id, round_id = %round_id, "round revealed");
        self.events.emit(RoundEvent::Result(ResultPayload {
            round_id,
            outcome_values: round.outcome_values,
            server_now: now,
        }));
    }

    async fn recover(&self) -> RecoveryOutcome {
        let tenant_id = self.tenant_id;
        let gateway = &self.gateway;

        let latest = match self
            .retry
            .run("latest_round", move || gateway.latest(tenant_id))
            .await
        {
            Ok(latest) => latest,
            Err(e) => {
                error!(tenant_id, error = %e, "recovery lookup failed");
                return RecoveryOutcome::LookupFailed;
            }
        };

        let Some(record) = latest else {
            return RecoveryOutcome::NoRecord;
        };
        if record.is_settled() {
            return RecoveryOutcome::Settled;
        }

        let now = self.clock.now_ms();
        if record.is_active_at(now) {
            info!(
                tenant_id,
                round_id = %record.id,
                end_at = record.end_at,
                "stored round still active, new rounds blocked until it ends"
            );
            return RecoveryOutcome::StillActive(record.id);
        }

        let id = &record.id;
        match self
            .retry
            .run("mark_cancelled", move || gateway.mark_cancelled(id))
            .await
        {
            Ok(()) => {
                info!(tenant_id, round_id = %record.id, "interrupted round marked cancelled");
                RecoveryOutcome::MarkedCancelled(record.id)
            }
            Err(e) => {
                error!(
                    tenant_id,
                    round_id = %record.id,
                    error = %e,
                    "failed to mark interrupted round cancelled"
                );
                RecoveryOutcome::Failed(record.id)
            }
        }
    }
}
