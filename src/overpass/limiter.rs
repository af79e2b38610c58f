use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Slots never lie further apart than this, so `Instant` arithmetic stays in range.
const MAX_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Process-wide requests-per-second ceiling.
///
/// Each `acquire` reserves the next free slot and sleeps until it arrives,
/// so callers over the ceiling are suspended rather than rejected. Slots are
/// handed out in lock order, which keeps waiting callers roughly FIFO.
pub struct RateLimiter {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn per_second(rps: f64) -> Self {
        let interval = if rps.is_finite() && rps > 0.0 {
            Duration::try_from_secs_f64(1.0 / rps)
                .unwrap_or(MAX_INTERVAL)
                .min(MAX_INTERVAL)
        } else {
            Duration::ZERO
        };
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    #[cfg(test)]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait for a request slot.
    pub async fn acquire(&self) {
        let wait = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next {
                Some(at) if at > now => at,
                _ => now,
            };
            *next = Some(slot + self.interval);
            slot - now
        };

        if !wait.is_zero() {
            debug!(wait_ms = wait.as_millis() as u64, "rate limit: waiting for slot");
            sleep(wait).await;
        }
    }
}
