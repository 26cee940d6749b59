//! Rate limiting for frames sent over a gateway connection.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tracing::debug;

const RATELIMIT_WINDOW: Duration = Duration::from_secs(60);

/// A rolling-window limit on how many frames may be sent over one connection.
///
/// Claims are served in arrival order: every send on a shard funnels through the single task
/// owning the bucket, so a deferred frame cannot be overtaken by a later one.
pub struct Bucket {
    name: &'static str,
    limit: usize,
    interval: Duration,
    /// When each of the most recent claims was made, oldest first.
    taken: VecDeque<Instant>,
}

impl Bucket {
    pub fn new(name: &'static str, limit: usize, interval: Duration) -> Self {
        Self {
            name,
            limit,
            interval,
            taken: VecDeque::with_capacity(limit),
        }
    }

    /// The shared limit for all frames on one connection: 120 per 60 seconds.
    pub fn global() -> Self {
        Self::new("global", 120, RATELIMIT_WINDOW)
    }

    /// The stricter limit for presence updates: 5 per 60 seconds.
    pub fn presence() -> Self {
        Self::new("presence", 5, RATELIMIT_WINDOW)
    }

    /// Claims a send slot, waiting for the window to roll past the oldest claim when the bucket
    /// is full. Never fails; over-limit sends are deferred, not dropped.
    pub async fn take(&mut self) {
        loop {
            self.drain(Instant::now());

            if self.taken.len() < self.limit {
                break;
            }

            if let Some(&oldest) = self.taken.front() {
                debug!("[Bucket {}] At limit, deferring send", self.name);
                sleep_until(oldest + self.interval).await;
            }
        }

        self.taken.push_back(Instant::now());
    }

    fn drain(&mut self, now: Instant) {
        while let Some(&front) = self.taken.front() {
            if now.saturating_duration_since(front) >= self.interval {
                self.taken.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sends_within_the_limit_are_immediate() {
        let mut bucket = Bucket::new("test", 120, RATELIMIT_WINDOW);

        let start = Instant::now();
        for _ in 0..120 {
            bucket.take().await;
        }

        assert_eq!(Instant::now(), start);
    }

    #[tokio::test(start_paused = true)]
    async fn send_over_the_limit_waits_for_the_window() {
        let mut bucket = Bucket::new("test", 5, RATELIMIT_WINDOW);

        let start = Instant::now();
        for _ in 0..5 {
            bucket.take().await;
        }

        // The sixth claim must wait until the first one leaves the window.
        bucket.take().await;
        assert!(Instant::now().duration_since(start) >= RATELIMIT_WINDOW);
    }

    #[tokio::test(start_paused = true)]
    async fn window_slides_rather_than_resets() {
        let mut bucket = Bucket::new("test", 2, Duration::from_secs(10));

        bucket.take().await;
        tokio::time::advance(Duration::from_secs(6)).await;
        bucket.take().await;

        // One slot frees up 10s after the first claim, i.e. 4s from now.
        let before = Instant::now();
        bucket.take().await;
        let waited = Instant::now().duration_since(before);

        assert!(waited >= Duration::from_secs(4));
        assert!(waited < Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn presence_bucket_is_independent_of_the_global_one() {
        let mut global = Bucket::global();
        let mut presence = Bucket::presence();

        for _ in 0..5 {
            presence.take().await;
        }

        // Presence is exhausted; the global bucket is untouched.
        let start = Instant::now();
        global.take().await;
        assert_eq!(Instant::now(), start);
    }
}
