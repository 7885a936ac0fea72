//! The persistence seam consumed by the round scheduler.
//!
//! The scheduler only ever talks to storage through [`RoundGateway`], so
//! tests can substitute a scripted implementation and the daemon can use
//! the redb-backed [`StateStore`].

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use crate::error::StateResult;
use crate::store::StateStore;
use crate::types::*;

/// Durable storage for round records.
#[async_trait]
pub trait RoundGateway: Send + Sync {
    /// Persist a round that has just started. Assigns its id.
    async fn create(&self, round: NewRound) -> StateResult<RoundRecord>;

    /// Store the revealed outcome of a round.
    async fn finalize(&self, id: &RoundId, outcome: &OutcomeValues) -> StateResult<()>;

    /// Mark a round as cancelled (empty outcome sentinel).
    async fn mark_cancelled(&self, id: &RoundId) -> StateResult<()>;

    /// The newest round for a tenant, if any.
    async fn latest(&self, tenant_id: TenantId) -> StateResult<Option<RoundRecord>>;

    /// Tenants that have at least one stored round.
    async fn tenants(&self) -> StateResult<Vec<TenantId>>;
}

#[async_trait]
impl RoundGateway for StateStore {
    async fn create(&self, round: NewRound) -> StateResult<RoundRecord> {
        self.insert_round(&round, epoch_millis())
    }

    async fn finalize(&self, id: &RoundId, outcome: &OutcomeValues) -> StateResult<()> {
        self.set_outcome(id, outcome.to_vec())
    }

    async fn mark_cancelled(&self, id: &RoundId) -> StateResult<()> {
        self.set_outcome(id, Vec::new())
    }

    async fn latest(&self, tenant_id: TenantId) -> StateResult<Option<RoundRecord>> {
        self.latest_round(tenant_id)
    }

    async fn tenants(&self) -> StateResult<Vec<TenantId>> {
        self.list_tenants()
    }
}

/// Current Unix epoch in milliseconds.
fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
