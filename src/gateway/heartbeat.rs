//! Heartbeat scheduling, kept apart from the socket so the timing rules stay testable.

use std::time::Duration;

use tokio::time::Instant;

/// How many heartbeats may go unacknowledged before the connection is considered a zombie.
pub(crate) const ZOMBIE_THRESHOLD: u8 = 3;

/// What the owning session should do on a heartbeat tick.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HeartbeatAction {
    /// The interval has not elapsed yet.
    Wait,
    /// Send a heartbeat frame now.
    Send,
    /// Too many heartbeats went unacknowledged; the connection is dead on the other side and
    /// must be re-established.
    Zombie,
}

/// Tracks the heartbeat schedule of one gateway connection.
///
/// A session owns exactly one of these, created when the gateway's Hello arrives; replacing the
/// session's connection replaces the heartbeater with it, so two schedules can never run against
/// the same socket.
#[derive(Clone, Debug)]
pub struct Heartbeater {
    interval: Duration,
    /// Basis for the first heartbeat, before anything has been sent.
    started: Instant,
    acks_missed: u8,
    last_sent: Option<Instant>,
    latency: Option<Duration>,
}

impl Heartbeater {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            started: now,
            acks_missed: 0,
            last_sent: None,
            latency: None,
        }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The round-trip time between the most recent heartbeat and its acknowledgement.
    #[must_use]
    pub fn latency(&self) -> Option<Duration> {
        self.latency
    }

    /// Decides what to do at `now`. The zombie check only applies once a heartbeat is due, so a
    /// connection gets the full interval to deliver each acknowledgement.
    pub fn tick(&self, now: Instant) -> HeartbeatAction {
        let due_at = self.last_sent.unwrap_or(self.started) + self.interval;

        if now < due_at {
            HeartbeatAction::Wait
        } else if self.acks_missed >= ZOMBIE_THRESHOLD {
            HeartbeatAction::Zombie
        } else {
            HeartbeatAction::Send
        }
    }

    /// Records that a heartbeat frame was written, counting it as unacknowledged until
    /// [`Self::ack`] is called.
    pub fn sent(&mut self, now: Instant) {
        self.last_sent = Some(now);
        self.acks_missed = self.acks_missed.saturating_add(1);
    }

    /// Records a heartbeat acknowledgement.
    pub fn ack(&mut self, now: Instant) {
        self.acks_missed = 0;
        self.latency = self.last_sent.map(|sent| now.saturating_duration_since(sent));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_millis(41_250);

    #[tokio::test(start_paused = true)]
    async fn first_heartbeat_waits_a_full_interval() {
        let start = Instant::now();
        let heartbeater = Heartbeater::new(INTERVAL, start);

        assert_eq!(heartbeater.tick(start), HeartbeatAction::Wait);
        assert_eq!(
            heartbeater.tick(start + INTERVAL - Duration::from_millis(1)),
            HeartbeatAction::Wait
        );
        assert_eq!(heartbeater.tick(start + INTERVAL), HeartbeatAction::Send);
    }

    #[tokio::test(start_paused = true)]
    async fn acknowledged_heartbeats_keep_the_schedule_alive() {
        let start = Instant::now();
        let mut heartbeater = Heartbeater::new(INTERVAL, start);

        let mut now = start;
        for _ in 0..10 {
            now += INTERVAL;
            assert_eq!(heartbeater.tick(now), HeartbeatAction::Send);
            heartbeater.sent(now);
            heartbeater.ack(now + Duration::from_millis(50));
        }

        assert_eq!(heartbeater.latency(), Some(Duration::from_millis(50)));
    }

    #[tokio::test(start_paused = true)]
    async fn three_missed_acks_zombify_without_a_fourth_send() {
        let start = Instant::now();
        let mut heartbeater = Heartbeater::new(INTERVAL, start);

        let mut now = start;
        let mut frames_sent = 0;
        for _ in 0..3 {
            now += INTERVAL;
            assert_eq!(heartbeater.tick(now), HeartbeatAction::Send);
            heartbeater.sent(now);
            frames_sent += 1;
        }

        now += INTERVAL;
        assert_eq!(heartbeater.tick(now), HeartbeatAction::Zombie);
        // Still a zombie on subsequent ticks; no frame is ever recorded as sent again.
        assert_eq!(heartbeater.tick(now + INTERVAL), HeartbeatAction::Zombie);
        assert_eq!(frames_sent, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn late_ack_revives_the_schedule() {
        let start = Instant::now();
        let mut heartbeater = Heartbeater::new(INTERVAL, start);

        let mut now = start;
        for _ in 0..3 {
            now += INTERVAL;
            heartbeater.sent(now);
        }

        heartbeater.ack(now + Duration::from_millis(10));
        assert_eq!(heartbeater.tick(now + INTERVAL), HeartbeatAction::Send);
    }
}
