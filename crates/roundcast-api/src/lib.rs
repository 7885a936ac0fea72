//! roundcast-api — REST API for roundcast.
//!
//! Provides axum route handlers for scheduling and cancelling rounds,
//! reading the current round, and streaming a tenant's lifecycle events
//! over server-sent events.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/api/v1/tenants/{tenant}/rounds` | Schedule a round |
//! | POST | `/api/v1/tenants/{tenant}/rounds/cancel` | Cancel the scheduled round |
//! | GET | `/api/v1/tenants/{tenant}/rounds/current` | Current round state |
//! | GET | `/api/v1/tenants/{tenant}/events` | SSE event stream |

pub mod handlers;
pub mod sse;

use axum::Router;
use axum::routing::{get, post};
use roundcast_scheduler::RoundRegistry;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub registry: RoundRegistry,
}

/// Build the complete API router.
pub fn build_router(registry: RoundRegistry) -> Router {
    let api_state = ApiState { registry };

    let api_routes = Router::new()
        .route("/tenants/{tenant}/rounds", post(handlers::schedule_round))
        .route("/tenants/{tenant}/rounds/cancel", post(handlers::cancel_round))
        .route("/tenants/{tenant}/rounds/current", get(handlers::current_round))
        .route("/tenants/{tenant}/events", get(sse::events))
        .with_state(api_state);

    Router::new().nest("/api/v1", api_routes)
}
