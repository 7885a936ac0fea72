//! Wall-clock milliseconds that advance with tokio's timer.
//!
//! Round timestamps are Unix epoch milliseconds, but timers are driven by
//! `tokio::time`. `Clock` anchors an epoch reading to a tokio `Instant`
//! and derives "now" from the elapsed monotonic time, so timestamps and
//! timer deadlines never drift apart (and a paused test runtime moves both).

use std::time::{SystemTime, UNIX_EPOCH};

use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct Clock {
    epoch_ms: u64,
    origin: Instant,
}

impl Clock {
    /// Anchor to the current system time.
    pub fn system() -> Self {
        let epoch_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self::starting_at(epoch_ms)
    }

    /// Anchor to a fixed epoch value (for tests).
    pub fn starting_at(epoch_ms: u64) -> Self {
        Self {
            epoch_ms,
            origin: Instant::now(),
        }
    }

    /// Current time in Unix epoch milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.epoch_ms + self.origin.elapsed().as_millis() as u64
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::system()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn system_clock_is_after_2024() {
        assert!(Clock::system().now_ms() > 1_704_067_200_000);
    }

    #[tokio::test(start_paused = true)]
    async fn clock_follows_tokio_time() {
        let clock = Clock::starting_at(5_000);
        assert_eq!(clock.now_ms(), 5_000);

        tokio::time::advance(Duration::from_millis(1_500)).await;
        assert_eq!(clock.now_ms(), 6_500);
    }
}
