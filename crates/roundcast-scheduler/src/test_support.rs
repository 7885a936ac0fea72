//! Scripted collaborators for scheduler tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use roundcast_state::{
    NewRound, OutcomeValues, RoundGateway, RoundId, RoundRecord, StateError, StateResult, TenantId,
};

use crate::events::{EventSink, RoundEvent};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum GatewayCall {
    Create(NewRound),
    Finalize(RoundId, OutcomeValues),
    MarkCancelled(RoundId),
    Latest(TenantId),
    Tenants,
}

#[derive(Default)]
struct Script {
    calls: Vec<GatewayCall>,
    ids: VecDeque<String>,
    next_id: u32,
    rounds: HashMap<TenantId, RoundRecord>,
    fail_create: u32,
    fail_finalize: u32,
    fail_mark_cancelled: u32,
    fail_latest: u32,
}

/// In-memory gateway that records every call and fails on demand.
///
/// `fail_*` counters make the next N calls of that kind fail; created
/// rounds become the tenant's latest record.
#[derive(Default)]
pub(crate) struct ScriptedGateway {
    script: Mutex<Script>,
}

impl ScriptedGateway {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_ids(ids: &[&str]) -> Self {
        let gateway = Self::new();
        gateway.script.lock().unwrap().ids = ids.iter().map(|id| id.to_string()).collect();
        gateway
    }

    pub(crate) fn fail_create(&self, times: u32) {
        self.script.lock().unwrap().fail_create = times;
    }

    pub(crate) fn fail_finalize(&self, times: u32) {
        self.script.lock().unwrap().fail_finalize = times;
    }

    pub(crate) fn fail_mark_cancelled(&self, times: u32) {
        self.script.lock().unwrap().fail_mark_cancelled = times;
    }

    pub(crate) fn fail_latest(&self, times: u32) {
        self.script.lock().unwrap().fail_latest = times;
    }

    pub(crate) fn set_latest(&self, record: RoundRecord) {
        self.script
            .lock()
            .unwrap()
            .rounds
            .insert(record.tenant_id, record);
    }

    pub(crate) fn stored(&self, tenant_id: TenantId) -> Option<RoundRecord> {
        self.script.lock().unwrap().rounds.get(&tenant_id).cloned()
    }

    pub(crate) fn calls(&self) -> Vec<GatewayCall> {
        self.script.lock().unwrap().calls.clone()
    }

    pub(crate) fn creates(&self) -> Vec<NewRound> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                GatewayCall::Create(round) => Some(round),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn finalizes(&self) -> Vec<(RoundId, OutcomeValues)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                GatewayCall::Finalize(id, values) => Some((id, values)),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn cancellations(&self) -> Vec<RoundId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                GatewayCall::MarkCancelled(id) => Some(id),
                _ => None,
            })
            .collect()
    }
}

fn take_failure(counter: &mut u32, what: &str) -> StateResult<()> {
    if *counter > 0 {
        *counter -= 1;
        return Err(StateError::Write(format!("scripted {what} failure")));
    }
    Ok(())
}

fn set_outcome(script: &mut Script, id: &RoundId, values: Vec<u8>) -> StateResult<()> {
    let record = script
        .rounds
        .values_mut()
        .find(|record| &record.id == id)
        .ok_or_else(|| StateError::NotFound(id.to_string()))?;
    record.outcome_values = Some(values);
    Ok(())
}

#[async_trait]
impl RoundGateway for ScriptedGateway {
    async fn create(&self, round: NewRound) -> StateResult<RoundRecord> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(GatewayCall::Create(round.clone()));
        take_failure(&mut script.fail_create, "create")?;

        let id = match script.ids.pop_front() {
            Some(id) => id,
            None => {
                script.next_id += 1;
                format!("round-{}", script.next_id)
            }
        };
        let record = RoundRecord {
            id: RoundId::new(id),
            tenant_id: round.tenant_id,
            name: round.name,
            created_by: round.created_by,
            start_at: round.start_at,
            end_at: round.end_at,
            outcome_values: None,
            created_at: round.start_at,
        };
        script.rounds.insert(record.tenant_id, record.clone());
        Ok(record)
    }

    async fn finalize(&self, id: &RoundId, outcome: &OutcomeValues) -> StateResult<()> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(GatewayCall::Finalize(id.clone(), *outcome));
        take_failure(&mut script.fail_finalize, "finalize")?;
        set_outcome(&mut script, id, outcome.to_vec())
    }

    async fn mark_cancelled(&self, id: &RoundId) -> StateResult<()> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(GatewayCall::MarkCancelled(id.clone()));
        take_failure(&mut script.fail_mark_cancelled, "mark_cancelled")?;
        set_outcome(&mut script, id, Vec::new())
    }

    async fn latest(&self, tenant_id: TenantId) -> StateResult<Option<RoundRecord>> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(GatewayCall::Latest(tenant_id));
        take_failure(&mut script.fail_latest, "latest")?;
        Ok(script.rounds.get(&tenant_id).cloned())
    }

    async fn tenants(&self) -> StateResult<Vec<TenantId>> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(GatewayCall::Tenants);
        let mut tenants: Vec<_> = script.rounds.keys().copied().collect();
        tenants.sort_unstable();
        Ok(tenants)
    }
}

/// Sink that keeps every emitted event.
#[derive(Default)]
pub(crate) struct RecordingSink {
    events: Mutex<Vec<RoundEvent>>,
}

impl RecordingSink {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn events(&self) -> Vec<RoundEvent> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn names(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(RoundEvent::name).collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: RoundEvent) {
        self.events.lock().unwrap().push(event);
    }
}
