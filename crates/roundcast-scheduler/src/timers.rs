//! Lifecycle timers for a scheduled round.
//!
//! Each timer is a tokio task that sleeps and then posts a message onto
//! the scheduler's command queue. Timers hold only a weak sender, so a
//! pending timer never keeps a stopped scheduler alive.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

/// Spawn a task that posts `message` after `delay`.
pub(crate) fn arm<T>(tx: mpsc::WeakSender<T>, delay: Duration, message: T) -> JoinHandle<()>
where
    T: Send + 'static,
{
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        match tx.upgrade() {
            Some(tx) => {
                if tx.send(message).await.is_err() {
                    trace!("scheduler stopped before timer delivery");
                }
            }
            None => trace!("scheduler dropped, timer discarded"),
        }
    })
}

/// The start and end timers of one round. Dropping aborts both.
pub(crate) struct RoundTimers {
    start: JoinHandle<()>,
    end: JoinHandle<()>,
}

impl RoundTimers {
    pub(crate) fn new(start: JoinHandle<()>, end: JoinHandle<()>) -> Self {
        Self { start, end }
    }

    pub(crate) fn clear(&self) {
        self.start.abort();
        self.end.abort();
    }
}

impl Drop for RoundTimers {
    fn drop(&mut self) {
        self.clear();
    }
}
