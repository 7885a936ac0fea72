//! Per-tenant round schedulers and their event channels.
//!
//! Tenants are independent: each gets its own actor, slot, outcome cache
//! and broadcast channel, created the first time the tenant is touched.

use std::collections::HashMap;
use std::sync::Arc;

use roundcast_state::{RoundGateway, TenantId};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::{SchedulerError, SchedulerResult};
use crate::events::{BroadcastSink, DEFAULT_EVENT_CAPACITY, RoundEvent};
use crate::scheduler::{RecoveryOutcome, RoundScheduler, SchedulerSettings};

/// Per-tenant state held by the registry.
#[derive(Clone)]
struct TenantSlot {
    scheduler: RoundScheduler,
    events: BroadcastSink,
}

/// Lazily created per-tenant schedulers sharing one gateway.
#[derive(Clone)]
pub struct RoundRegistry {
    gateway: Arc<dyn RoundGateway>,
    settings: SchedulerSettings,
    event_capacity: usize,
    tenants: Arc<RwLock<HashMap<TenantId, TenantSlot>>>,
}

impl RoundRegistry {
    pub fn new(gateway: Arc<dyn RoundGateway>, settings: SchedulerSettings) -> Self {
        Self::with_event_capacity(gateway, settings, DEFAULT_EVENT_CAPACITY)
    }

    /// `event_capacity` bounds how far a listener may lag before losing events.
    pub fn with_event_capacity(
        gateway: Arc<dyn RoundGateway>,
        settings: SchedulerSettings,
        event_capacity: usize,
    ) -> Self {
        Self {
            gateway,
            settings,
            event_capacity,
            tenants: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// The tenant's scheduler, spawning it on first use.
    pub async fn scheduler(&self, tenant_id: TenantId) -> RoundScheduler {
        self.slot(tenant_id).await.scheduler
    }

    /// A new listener on the tenant's event channel.
    pub async fn subscribe(&self, tenant_id: TenantId) -> broadcast::Receiver<RoundEvent> {
        self.slot(tenant_id).await.events.subscribe()
    }

    /// Run startup recovery for every tenant with stored rounds.
    ///
    /// Failures are per tenant and never abort the sweep; only a failure
    /// to list tenants is returned.
    pub async fn recover_all(&self) -> SchedulerResult<Vec<(TenantId, RecoveryOutcome)>> {
        let gateway = &self.gateway;
        let tenants = self
            .settings
            .retry
            .run("list_tenants", move || gateway.tenants())
            .await
            .map_err(|e| SchedulerError::Persistence(e.to_string()))?;

        let mut outcomes = Vec::with_capacity(tenants.len());
        for tenant_id in tenants {
            let outcome = self.scheduler(tenant_id).await.recover().await?;
            match &outcome {
                RecoveryOutcome::Failed(_) | RecoveryOutcome::LookupFailed => {
                    warn!(tenant_id, ?outcome, "recovery incomplete")
                }
                _ => debug!(tenant_id, ?outcome, "tenant recovered"),
            }
            outcomes.push((tenant_id, outcome));
        }

        info!(tenants = outcomes.len(), "recovery complete");
        Ok(outcomes)
    }

    pub fn gateway(&self) -> &Arc<dyn RoundGateway> {
        &self.gateway
    }

    pub fn clock(&self) -> Clock {
        self.settings.clock
    }

    async fn slot(&self, tenant_id: TenantId) -> TenantSlot {
        if let Some(slot) = self.tenants.read().await.get(&tenant_id) {
            return slot.clone();
        }

        let mut tenants = self.tenants.write().await;
        tenants
            .entry(tenant_id)
            .or_insert_with(|| {
                debug!(tenant_id, "spawning round scheduler");
                let events = BroadcastSink::new(self.event_capacity);
                let scheduler = RoundScheduler::spawn(
                    tenant_id,
                    self.gateway.clone(),
                    Arc::new(events.clone()),
                    self.settings,
                );
                TenantSlot { scheduler, events }
            })
            .clone()
    }
}
