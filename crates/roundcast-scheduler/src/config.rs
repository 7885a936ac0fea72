//! Round timing and retry settings.
//!
//! Both are plain serde structs so the daemon can read them from its TOML
//! file; every field has a default.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Default delay between scheduling and round start.
pub const DEFAULT_START_BUFFER_MS: u64 = 1_500;

/// Default time between round start and outcome reveal.
pub const DEFAULT_DURATION_MS: u64 = 25_000;

/// Upper bound for either timing value: one day.
pub const MAX_TIMING_MS: u64 = 86_400_000;

/// Timing of a round, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundTiming {
    /// Delay between scheduling and start.
    pub start_buffer_ms: u64,
    /// Delay between start and reveal.
    pub duration_ms: u64,
}

impl Default for RoundTiming {
    fn default() -> Self {
        Self {
            start_buffer_ms: DEFAULT_START_BUFFER_MS,
            duration_ms: DEFAULT_DURATION_MS,
        }
    }
}

impl RoundTiming {
    /// Zero values fall back to the defaults; values above
    /// [`MAX_TIMING_MS`] are capped.
    pub fn new(start_buffer_ms: u64, duration_ms: u64) -> Self {
        Self {
            start_buffer_ms,
            duration_ms,
        }
        .sanitized()
    }

    /// Parse raw textual values (e.g. environment variables).
    ///
    /// Missing, non-numeric, non-finite, or non-positive values fall back
    /// to the defaults. Fractional milliseconds are truncated and anything
    /// above [`MAX_TIMING_MS`] is capped.
    pub fn from_raw(start_buffer_ms: Option<&str>, duration_ms: Option<&str>) -> Self {
        Self {
            start_buffer_ms: parse_positive_ms(start_buffer_ms).unwrap_or(DEFAULT_START_BUFFER_MS),
            duration_ms: parse_positive_ms(duration_ms).unwrap_or(DEFAULT_DURATION_MS),
        }
        .sanitized()
    }

    /// Replace zero values with the defaults and cap at [`MAX_TIMING_MS`].
    pub fn sanitized(self) -> Self {
        Self {
            start_buffer_ms: bounded_or(self.start_buffer_ms, DEFAULT_START_BUFFER_MS),
            duration_ms: bounded_or(self.duration_ms, DEFAULT_DURATION_MS),
        }
    }
}

/// Retry settings for gateway calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 2_000,
        }
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        RetryPolicy::new(
            config.max_attempts,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }
}

fn parse_positive_ms(raw: Option<&str>) -> Option<u64> {
    let value: f64 = raw?.trim().parse().ok()?;
    (value.is_finite() && value >= 1.0).then_some(value as u64)
}

fn bounded_or(value: u64, default: u64) -> u64 {
    if value == 0 {
        default
    } else {
        value.min(MAX_TIMING_MS)
    }
}
