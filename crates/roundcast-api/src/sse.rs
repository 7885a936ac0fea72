//! Server-sent event stream of a tenant's round lifecycle.
//!
//! A new listener first receives `last.outcome` and, while a round is
//! scheduled, a `round.scheduled` snapshot. Those two events go to that
//! listener only; everything after comes from the tenant's broadcast
//! channel.

use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::{StreamExt, stream};
use roundcast_scheduler::RoundEvent;
use roundcast_state::TenantId;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::debug;

use crate::ApiState;
use crate::handlers::scheduler_error;

/// Interval between keep-alive comments.
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

fn to_sse(event: RoundEvent) -> Result<Event, axum::Error> {
    Event::default().event(event.name()).json_data(event)
}

/// GET /api/v1/tenants/{tenant}/events
pub async fn events(State(state): State<ApiState>, Path(tenant): Path<TenantId>) -> Response {
    // Subscribe before taking the snapshot so nothing emitted in between is
    // missed. An event emitted in that gap may arrive twice: once in the
    // greeting and once live.
    let live = state.registry.subscribe(tenant).await;
    let scheduler = state.registry.scheduler(tenant).await;

    let last_outcome = match scheduler.get_or_create_last_outcome().await {
        Ok(last) => last,
        Err(e) => return scheduler_error(e),
    };
    let scheduled = match scheduler.get_scheduled().await {
        Ok(scheduled) => scheduled,
        Err(e) => return scheduler_error(e),
    };

    let now = state.registry.clock().now_ms();
    let mut greeting = vec![last_outcome.to_event(now)];
    if let Some(snapshot) = scheduled {
        greeting.push(snapshot.to_event(now));
    }
    debug!(tenant_id = tenant, "event listener attached");

    let live = BroadcastStream::new(live).filter_map(move |item| {
        std::future::ready(match item {
            Ok(event) => Some(event),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                debug!(tenant_id = tenant, skipped, "listener lagged, events dropped");
                None
            }
        })
    });
    let events = stream::iter(greeting).chain(live).map(to_sse);

    Sse::new(events)
        .keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL).text("ping"))
        .into_response()
}
