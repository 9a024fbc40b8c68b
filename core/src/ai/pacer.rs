//! Request pacing.
//!
//! A shared fixed-interval pacer: every `acquire` reserves the next free
//! slot on a timeline spaced `interval` apart, then sleeps until it. All
//! HTTP requests of a provider go through one pacer, so the rate ceiling
//! holds across concurrent batches.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub struct RequestPacer {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RequestPacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    /// A pacer that never waits.
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits until the caller may issue its request.
    pub async fn acquire(&self) {
        if self.interval.is_zero() {
            return;
        }

        let wake = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next {
                Some(reserved) if reserved > now => reserved,
                _ => now,
            };
            *next = Some(slot + self.interval);
            slot
        };

        tokio::time::sleep_until(wake).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn spaces_requests_by_interval() {
        let pacer = RequestPacer::new(Duration::from_millis(100));
        let start = Instant::now();

        pacer.acquire().await;
        pacer.acquire().await;
        pacer.acquire().await;

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(200), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn idle_pacer_does_not_accumulate_debt() {
        let pacer = RequestPacer::new(Duration::from_millis(50));
        pacer.acquire().await;

        tokio::time::sleep(Duration::from_secs(10)).await;

        let start = Instant::now();
        pacer.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn unlimited_pacer_returns_immediately() {
        let pacer = RequestPacer::unlimited();
        pacer.acquire().await;
        pacer.acquire().await;
    }
}
