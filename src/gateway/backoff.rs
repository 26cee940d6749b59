//! Reconnect pacing.

use std::time::Duration;

use rand::Rng;

const BASE_DELAY: Duration = Duration::from_secs(1);
const MAX_DELAY: Duration = Duration::from_secs(64);

/// Capped exponential backoff applied to every reconnect attempt, whatever triggered it.
///
/// Successive failures double the delay up to the cap; a successful session resets it. A jitter
/// of up to 25% is added so a fleet of shards does not thunder back in lockstep.
#[derive(Clone, Debug)]
pub struct ReconnectPolicy {
    attempts: u32,
}

impl ReconnectPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self {
            attempts: 0,
        }
    }

    /// Returns the delay to wait before the next reconnect attempt, and records the attempt.
    pub fn delay(&mut self) -> Duration {
        let exponent = self.attempts.min(6);
        self.attempts = self.attempts.saturating_add(1);

        let base = BASE_DELAY.saturating_mul(1 << exponent).min(MAX_DELAY);
        let jitter = rand::thread_rng().gen_range(0..=base.as_millis() as u64 / 4);

        base + Duration::from_millis(jitter)
    }

    /// Resets the policy after a connection proves healthy again.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_grow_and_cap() {
        let mut policy = ReconnectPolicy::new();

        let mut previous_base = Duration::ZERO;
        for attempt in 0..10 {
            let delay = policy.delay();
            let base = BASE_DELAY.saturating_mul(1 << attempt.min(6)).min(MAX_DELAY);

            assert!(delay >= base, "attempt {attempt}: {delay:?} below base {base:?}");
            assert!(delay <= base + base / 4, "attempt {attempt}: {delay:?} over jitter bound");
            assert!(base >= previous_base);
            previous_base = base;
        }

        assert!(previous_base == MAX_DELAY);
    }

    #[test]
    fn reset_returns_to_the_base_delay() {
        let mut policy = ReconnectPolicy::new();

        for _ in 0..5 {
            policy.delay();
        }
        policy.reset();

        let delay = policy.delay();
        assert!(delay >= BASE_DELAY && delay <= BASE_DELAY + BASE_DELAY / 4);
    }
}
