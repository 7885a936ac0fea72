//! REST API handlers.
//!
//! Each handler resolves the tenant's scheduler through the registry and
//! returns JSON in the `{success, data?, error?}` envelope.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use roundcast_scheduler::{CancelKind, LastOutcome, ScheduleSnapshot, SchedulerError};
use roundcast_state::{RoundId, RoundRecord, RoundStatus, TenantId, UserId};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
            code: None,
        })
    }
}

fn error_response(msg: &str, code: Option<&'static str>, status: StatusCode) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
            code,
        }),
    )
        .into_response()
}

/// HTTP status for a scheduler error.
pub fn status_for(err: &SchedulerError) -> StatusCode {
    match err {
        SchedulerError::InvalidOutcome => StatusCode::BAD_REQUEST,
        SchedulerError::AlreadyScheduled | SchedulerError::TooLate => StatusCode::CONFLICT,
        SchedulerError::NothingToCancel => StatusCode::NOT_FOUND,
        SchedulerError::Persistence(_) | SchedulerError::Unavailable(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

pub(crate) fn scheduler_error(err: SchedulerError) -> Response {
    let status = status_for(&err);
    if status.is_server_error() {
        warn!(error = %err, "request failed");
    }
    error_response(&err.to_string(), Some(err.code()), status)
}

// ── Scheduling ─────────────────────────────────────────────────

/// Schedule request body.
///
/// `outcome_values` is kept as raw JSON so that a malformed list is
/// reported as an invalid outcome rather than a body parse error.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub created_by: UserId,
    #[serde(default)]
    pub outcome_values: serde_json::Value,
    #[serde(default)]
    pub name: Option<String>,
}

/// Integers from a JSON array; `None` if it is not an array of integers.
fn integer_list(value: &serde_json::Value) -> Option<Vec<i64>> {
    value
        .as_array()?
        .iter()
        .map(|v| {
            v.as_i64().or_else(|| {
                v.as_f64()
                    .filter(|f| f.is_finite() && f.fract() == 0.0)
                    .map(|f| f as i64)
            })
        })
        .collect()
}

/// POST /api/v1/tenants/{tenant}/rounds
pub async fn schedule_round(
    State(state): State<ApiState>,
    Path(tenant): Path<TenantId>,
    body: Result<Json<ScheduleRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => return error_response(&rejection.body_text(), None, rejection.status()),
    };
    let Some(values) = integer_list(&req.outcome_values) else {
        return scheduler_error(SchedulerError::InvalidOutcome);
    };

    let scheduler = state.registry.scheduler(tenant).await;
    match scheduler.schedule_round(req.created_by, &values, req.name).await {
        Ok(times) => (StatusCode::CREATED, ApiResponse::ok(times)).into_response(),
        Err(e) => scheduler_error(e),
    }
}

#[derive(Debug, Serialize)]
struct CancelResponse {
    cancelled: CancelKind,
}

/// POST /api/v1/tenants/{tenant}/rounds/cancel
pub async fn cancel_round(
    State(state): State<ApiState>,
    Path(tenant): Path<TenantId>,
) -> Response {
    let scheduler = state.registry.scheduler(tenant).await;
    match scheduler.cancel_round().await {
        Ok(cancelled) => ApiResponse::ok(CancelResponse { cancelled }).into_response(),
        Err(e) => scheduler_error(e),
    }
}

// ── Current round ──────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum RoundState {
    Scheduled,
    StartedOrRevealed,
    Idle,
}

/// The latest stored round as seen by clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RoundView {
    id: RoundId,
    name: Option<String>,
    status: RoundStatus,
    start_at: u64,
    end_at: u64,
    outcome_values: Option<Vec<u8>>,
    total_ms: u64,
    remaining_ms: u64,
}

impl RoundView {
    fn new(record: RoundRecord, now: u64) -> Self {
        Self {
            total_ms: record.end_at.saturating_sub(record.start_at),
            remaining_ms: record.end_at.saturating_sub(now),
            status: record.status(),
            id: record.id,
            name: record.name,
            start_at: record.start_at,
            end_at: record.end_at,
            outcome_values: record.outcome_values,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CurrentRound {
    state: RoundState,
    #[serde(flatten)]
    scheduled: Option<ScheduleSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    round: Option<RoundView>,
    last_outcome: LastOutcome,
    server_now: u64,
}

/// GET /api/v1/tenants/{tenant}/rounds/current
pub async fn current_round(
    State(state): State<ApiState>,
    Path(tenant): Path<TenantId>,
) -> Response {
    let scheduler = state.registry.scheduler(tenant).await;
    let last_outcome = match scheduler.get_or_create_last_outcome().await {
        Ok(last) => last,
        Err(e) => return scheduler_error(e),
    };
    let scheduled = match scheduler.get_scheduled().await {
        Ok(scheduled) => scheduled,
        Err(e) => return scheduler_error(e),
    };
    let server_now = state.registry.clock().now_ms();

    if scheduled.is_some() {
        return ApiResponse::ok(CurrentRound {
            state: RoundState::Scheduled,
            scheduled,
            round: None,
            last_outcome,
            server_now,
        })
        .into_response();
    }

    let latest = match state.registry.gateway().latest(tenant).await {
        Ok(latest) => latest,
        Err(e) => return scheduler_error(SchedulerError::Persistence(e.to_string())),
    };
    let (state, round) = match latest {
        Some(record) => (
            RoundState::StartedOrRevealed,
            Some(RoundView::new(record, server_now)),
        ),
        None => (RoundState::Idle, None),
    };

    ApiResponse::ok(CurrentRound {
        state,
        scheduled: None,
        round,
        last_outcome,
        server_now,
    })
    .into_response()
}
