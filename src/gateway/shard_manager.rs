use std::collections::HashMap;
use std::num::NonZeroU16;
use std::sync::Arc;
use std::time::Duration;

use futures::channel::mpsc::{self, UnboundedReceiver as Receiver, UnboundedSender as Sender};
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{error, info, warn};

use super::{
    ConnectionStage,
    EventDispatcher,
    GatewayError,
    PresenceData,
    Shard,
    ShardMessenger,
    ShardRunner,
    ShardRunnerOptions,
    VoiceGatewayManager,
};
use crate::http::Http;
use crate::internal::prelude::*;
use crate::internal::tokio::spawn_named;
use crate::model::gateway::{GatewayIntents, ShardInfo};
use crate::model::id::ShardId;

/// The gateway invalidates sessions identified too close together, so shard boots are spaced
/// out by this much.
const WAIT_BETWEEN_BOOTS_IN_SECONDS: u64 = 5;

/// Information about a shard runner the manager is keeping alive.
pub struct ShardRunnerInfo {
    /// The most recent heartbeat round-trip time, if any heartbeat has completed yet.
    pub latency: Option<Duration>,
    /// The current connection stage of the shard.
    pub stage: ConnectionStage,
    /// A channel for communicating with the runner.
    pub messenger: ShardMessenger,
}

pub struct ShardManagerOptions {
    pub token: Arc<str>,
    pub intents: GatewayIntents,
    pub presence: Option<PresenceData>,
    pub dispatcher: Arc<dyn EventDispatcher>,
    pub voice_manager: Option<Arc<dyn VoiceGatewayManager>>,
    pub http: Arc<Http>,
    /// A fixed gateway URL. When absent, the URL is fetched on the first boot.
    pub ws_url: Option<Arc<str>>,
}

/// A manager for handling the start, restart, and shutdown of a bot's shards.
///
/// Each started shard gets its own [`ShardRunner`] task; the manager keeps a channel to each
/// and enforces the mandatory spacing between identifies when booting several.
pub struct ShardManager {
    runners: Arc<Mutex<HashMap<ShardId, ShardRunnerInfo>>>,
    token: Arc<str>,
    intents: GatewayIntents,
    presence: Option<PresenceData>,
    dispatcher: Arc<dyn EventDispatcher>,
    voice_manager: Option<Arc<dyn VoiceGatewayManager>>,
    http: Arc<Http>,
    ws_url: Mutex<Option<Arc<str>>>,
    shard_total: Mutex<NonZeroU16>,
    last_start: Mutex<Option<Instant>>,
    return_tx: Sender<StdResult<(), GatewayError>>,
}

impl ShardManager {
    /// Creates a new shard manager.
    ///
    /// Also returns a channel which yields `Ok(())` every time a shard runner ends cleanly and
    /// `Err` when one halts on a fatal gateway error (bad token, disallowed intents, ...); most
    /// bots treat the first `Err` as reason to shut everything down.
    #[must_use]
    pub fn new(opt: ShardManagerOptions) -> (Arc<Self>, Receiver<StdResult<(), GatewayError>>) {
        let (return_tx, return_rx) = mpsc::unbounded();

        let manager = Arc::new(Self {
            runners: Arc::new(Mutex::new(HashMap::new())),
            token: opt.token,
            intents: opt.intents,
            presence: opt.presence,
            dispatcher: opt.dispatcher,
            voice_manager: opt.voice_manager,
            http: opt.http,
            ws_url: Mutex::new(opt.ws_url),
            shard_total: Mutex::new(NonZeroU16::MIN),
            last_start: Mutex::new(None),
            return_tx,
        });

        (manager, return_rx)
    }

    /// The map of shard runners currently alive, keyed by shard ID.
    #[must_use]
    pub fn runners(&self) -> Arc<Mutex<HashMap<ShardId, ShardRunnerInfo>>> {
        Arc::clone(&self.runners)
    }

    /// Boots `total` shards, IDs `0..total`, sequentially with the mandatory spacing between
    /// identifies.
    ///
    /// This is a no-op when any shard is already running.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway URL cannot be obtained or a connection fails outright.
    pub async fn create(self: &Arc<Self>, total: NonZeroU16) -> Result<()> {
        if !self.runners.lock().await.is_empty() {
            return Ok(());
        }

        *self.shard_total.lock().await = total;

        for id in 0..total.get() {
            self.boot(ShardId(id)).await?;
        }

        Ok(())
    }

    /// Boots a single shard by ID. A no-op when the shard is already running.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidShardData`] when `shard_id` is outside the configured
    /// total, or a connection error.
    pub async fn spawn(self: &Arc<Self>, shard_id: ShardId) -> Result<()> {
        if self.runners.lock().await.contains_key(&shard_id) {
            return Ok(());
        }

        if shard_id.0 >= self.shard_total.lock().await.get() {
            return Err(Error::Gateway(GatewayError::InvalidShardData));
        }

        self.boot(shard_id).await
    }

    /// Restarts a shard runner, resuming its session when possible.
    pub async fn restart(&self, shard_id: ShardId) {
        info!("Restarting shard {shard_id}");

        if let Some(info) = self.runners.lock().await.get(&shard_id) {
            info.messenger.restart();
        }
    }

    /// Sends a shutdown to the shard's runner and forgets it once it stops.
    pub async fn kill(&self, shard_id: ShardId) {
        info!("Killing shard {shard_id}");

        if let Some(info) = self.runners.lock().await.get(&shard_id) {
            info.messenger.shutdown(1000);
        }
    }

    /// Shuts down all running shards.
    pub async fn shutdown_all(&self) {
        let ids: Vec<ShardId> = self.runners.lock().await.keys().copied().collect();

        if ids.is_empty() {
            return;
        }

        info!("Shutting down all shards");

        for shard_id in ids {
            self.kill(shard_id).await;
        }
    }

    async fn boot(self: &Arc<Self>, shard_id: ShardId) -> Result<()> {
        self.check_last_start().await;

        let ws_url = self.ws_url().await?;
        let shard_total = *self.shard_total.lock().await;

        let shard = Shard::new(
            ws_url,
            Arc::clone(&self.token),
            ShardInfo::new(shard_id, shard_total),
            self.intents,
            self.presence.clone(),
        );

        let mut runner = ShardRunner::new(ShardRunnerOptions {
            shard,
            dispatcher: Arc::clone(&self.dispatcher),
            voice_manager: self.voice_manager.clone(),
            runners: Arc::clone(&self.runners),
        });

        let info = ShardRunnerInfo {
            latency: None,
            stage: ConnectionStage::Disconnected,
            messenger: runner.messenger(),
        };
        self.runners.lock().await.insert(shard_id, info);

        let manager = Arc::clone(self);
        spawn_named("shard_runner::run", async move {
            match runner.run().await {
                Ok(()) => manager.runner_finished(shard_id).await,
                Err(why) => {
                    error!("[ShardRunner {shard_id}] Halted: {why}");
                    manager.runner_failed(shard_id, why).await;
                },
            }
        });

        *self.last_start.lock().await = Some(Instant::now());

        Ok(())
    }

    async fn runner_finished(&self, shard_id: ShardId) {
        self.forget_runner(shard_id).await;

        let _ = self.return_tx.unbounded_send(Ok(()));
    }

    async fn runner_failed(&self, shard_id: ShardId, why: Error) {
        self.forget_runner(shard_id).await;

        let why = match why {
            Error::Gateway(why) => why,
            other => {
                warn!("[ShardRunner {shard_id}] Non-gateway failure: {other}");

                GatewayError::ReconnectFailure
            },
        };

        let _ = self.return_tx.unbounded_send(Err(why));
    }

    async fn forget_runner(&self, shard_id: ShardId) {
        self.runners.lock().await.remove(&shard_id);

        if let Some(voice_manager) = &self.voice_manager {
            voice_manager.deregister_shard(shard_id).await;
        }
    }

    /// Sleeps out the remainder of the identify spacing window, if the last boot was recent.
    async fn check_last_start(&self) {
        let Some(instant) = *self.last_start.lock().await else { return };

        let duration = Duration::from_secs(WAIT_BETWEEN_BOOTS_IN_SECONDS);
        let elapsed = instant.elapsed();

        if elapsed < duration {
            sleep(duration - elapsed).await;
        }
    }

    async fn ws_url(&self) -> Result<Arc<str>> {
        let mut guard = self.ws_url.lock().await;

        if let Some(url) = &*guard {
            return Ok(Arc::clone(url));
        }

        let gateway = self.http.get_gateway().await?;
        let url: Arc<str> = Arc::from(gateway.url);
        *guard = Some(Arc::clone(&url));

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullDispatcher;

    #[async_trait::async_trait]
    impl EventDispatcher for NullDispatcher {
        async fn dispatch(&self, _shard_id: ShardId, _event_name: &str, _data: Value) {}
    }

    fn manager() -> (Arc<ShardManager>, Receiver<StdResult<(), GatewayError>>) {
        ShardManager::new(ShardManagerOptions {
            token: Arc::from("test"),
            intents: GatewayIntents::non_privileged(),
            presence: None,
            dispatcher: Arc::new(NullDispatcher),
            voice_manager: None,
            http: Arc::new(Http::new("test")),
            ws_url: None,
        })
    }

    #[tokio::test]
    async fn spawn_rejects_ids_outside_the_total() {
        let (manager, _return_rx) = manager();

        let result = manager.spawn(ShardId(5)).await;
        assert!(matches!(result, Err(Error::Gateway(GatewayError::InvalidShardData))));
        assert!(manager.runners().lock().await.is_empty());
    }
}
