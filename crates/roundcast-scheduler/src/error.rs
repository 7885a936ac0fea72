//! Scheduler error types.

use roundcast_state::TenantId;
use thiserror::Error;

/// Errors returned by scheduler operations.
///
/// Everything except `Persistence` and `Unavailable` is an expected,
/// caller-facing outcome rather than a fault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("outcome must be exactly 6 integers between 1 and 6")]
    InvalidOutcome,

    #[error("a round is already scheduled")]
    AlreadyScheduled,

    #[error("no round to cancel")]
    NothingToCancel,

    #[error("too late to cancel: the round has already ended")]
    TooLate,

    #[error("persistence failed: {0}")]
    Persistence(String),

    #[error("round scheduler for tenant {0} is not running")]
    Unavailable(TenantId),
}

impl SchedulerError {
    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            SchedulerError::InvalidOutcome => "invalid_outcome",
            SchedulerError::AlreadyScheduled => "already_scheduled",
            SchedulerError::NothingToCancel => "nothing_to_cancel",
            SchedulerError::TooLate => "too_late",
            SchedulerError::Persistence(_) => "persistence_failure",
            SchedulerError::Unavailable(_) => "unavailable",
        }
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
