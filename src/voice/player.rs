//! Plays an [`AudioSource`] over a [`VoiceSession`] at the fixed 20ms frame cadence.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

use crate::internal::prelude::*;
use crate::voice::constants::{FRAME_LEN, SILENT_FRAME};
use crate::voice::input::AudioSource;
use crate::voice::VoiceSession;

/// Number of silent frames sent after the last real one, so packet loss does not leave the
/// decoder interpolating the tail of the audio.
const SILENCE_FRAMES: u8 = 5;

/// Pause/stop flags shared between the playback loop and the control methods.
struct Controls {
    paused: AtomicBool,
    stopped: AtomicBool,
    unpause: Notify,
}

impl Controls {
    fn new() -> Self {
        Self {
            paused: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            unpause: Notify::new(),
        }
    }

    fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&self) {
        // The flag must be cleared before the wakeup, so a woken waiter re-checking the
        // state sees it.
        self.paused.store(false, Ordering::SeqCst);
        self.unpause.notify_waiters();
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.unpause.notify_waiters();
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }

    /// Waits until the player is resumed or stopped.
    ///
    /// [`Notify::notify_waiters`] only wakes waiters registered at the time of the call, so
    /// the wakeup slot is enabled *before* the flags are re-checked; a resume or stop landing
    /// between the check and the await is not lost.
    async fn wait_while_paused(&self) {
        loop {
            let notified = self.unpause.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if !self.paused.load(Ordering::SeqCst) || self.stopped.load(Ordering::SeqCst) {
                return;
            }

            notified.await;
        }
    }
}

/// Plays audio frames over a voice session.
///
/// Frames are scheduled against the absolute start time of playback rather than by sleeping a
/// fixed amount after each send, so encoding time does not accumulate as drift.
pub struct AudioPlayer {
    session: Arc<VoiceSession>,
    controls: Controls,
}

impl AudioPlayer {
    #[must_use]
    pub fn new(session: Arc<VoiceSession>) -> Arc<Self> {
        Arc::new(Self {
            session,
            controls: Controls::new(),
        })
    }

    /// The session this player sends over.
    #[must_use]
    pub fn session(&self) -> &Arc<VoiceSession> {
        &self.session
    }

    /// Plays the source to completion, or until [`Self::stop`] is called.
    ///
    /// While paused, no frames (and no silence) are sent and the speaking flag is cleared;
    /// resuming re-baselines the schedule so the pause does not count as lost time.
    ///
    /// # Errors
    ///
    /// Returns an error when sending a frame fails, e.g. because the session was torn down.
    pub async fn play(&self, mut source: Box<dyn AudioSource>) -> Result<()> {
        let is_opus = source.is_opus();

        self.session.set_speaking(true);

        let mut start = Instant::now();
        let mut loops: u32 = 0;

        loop {
            if self.controls.is_stopped() {
                break;
            }

            if self.controls.is_paused() {
                self.session.set_speaking(false);
                self.controls.wait_while_paused().await;

                if self.controls.is_stopped() {
                    break;
                }

                self.session.set_speaking(true);
                start = Instant::now();
                loops = 0;

                continue;
            }

            let frame = source.read_frame();
            if frame.is_empty() {
                debug!("[Voice] Source exhausted after {loops} frames");

                break;
            }

            self.session.send_audio(&frame, is_opus).await?;

            loops += 1;
            sleep_until(start + FRAME_LEN * loops).await;
        }

        for _ in 0..SILENCE_FRAMES {
            if self.session.send_audio(&SILENT_FRAME, true).await.is_err() {
                break;
            }
        }

        self.session.set_speaking(false);

        Ok(())
    }

    /// Pauses playback before the next frame.
    pub fn pause(&self) {
        self.controls.pause();
    }

    /// Resumes a paused player.
    pub fn resume(&self) {
        self.controls.resume();
    }

    /// Stops playback and tears the session down.
    pub fn stop(&self) {
        self.controls.stop();
        self.session.disconnect();
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.controls.is_paused()
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.controls.is_stopped()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;

    #[tokio::test]
    async fn resume_before_the_wait_is_not_lost() {
        let controls = Controls::new();

        controls.pause();
        // Fires with no waiter registered yet; the wait below must still return.
        controls.resume();

        timeout(Duration::from_secs(1), controls.wait_while_paused())
            .await
            .expect("wait should return once resumed");
    }

    #[tokio::test]
    async fn stop_wakes_a_paused_waiter() {
        let controls = Arc::new(Controls::new());
        controls.pause();

        let waiter = {
            let controls = Arc::clone(&controls);
            tokio::spawn(async move { controls.wait_while_paused().await })
        };
        tokio::task::yield_now().await;

        controls.stop();

        timeout(Duration::from_secs(5), waiter)
            .await
            .expect("stop should wake the waiter")
            .unwrap();
        assert!(controls.is_stopped());
    }

    #[tokio::test]
    async fn wait_returns_immediately_when_not_paused() {
        let controls = Controls::new();

        timeout(Duration::from_secs(1), controls.wait_while_paused())
            .await
            .expect("an unpaused player never waits");
    }
}
