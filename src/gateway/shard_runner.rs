use std::collections::HashMap;
use std::sync::Arc;

use futures::channel::mpsc::{self, UnboundedReceiver as Receiver};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::{
    EventDispatcher,
    GatewayError,
    ReconnectPolicy,
    ReconnectType,
    Shard,
    ShardAction,
    ShardMessenger,
    ShardRunnerInfo,
    ShardRunnerMessage,
    VoiceGatewayManager,
    VoiceServerInfo,
};
use crate::internal::prelude::*;
use crate::model::event::GatewayEvent;
use crate::model::id::{snowflake, ChannelId, GuildId, ShardId, UserId};

/// A runner for managing a [`Shard`] and its respective WebSocket client.
///
/// One runner lives on one tokio task. Each pass of its loop drains queued control messages,
/// drives the heartbeat schedule, polls the socket (bounded by the client's 500ms window), and
/// executes whatever action the shard state machine asked for.
pub struct ShardRunner {
    pub shard: Shard,
    rx: Receiver<ShardRunnerMessage>,
    messenger: ShardMessenger,
    dispatcher: Arc<dyn EventDispatcher>,
    voice_manager: Option<Arc<dyn VoiceGatewayManager>>,
    runners: Arc<Mutex<HashMap<ShardId, ShardRunnerInfo>>>,
    policy: ReconnectPolicy,
}

pub struct ShardRunnerOptions {
    pub shard: Shard,
    pub dispatcher: Arc<dyn EventDispatcher>,
    pub voice_manager: Option<Arc<dyn VoiceGatewayManager>>,
    pub runners: Arc<Mutex<HashMap<ShardId, ShardRunnerInfo>>>,
}

impl ShardRunner {
    /// Creates a new runner for a Shard.
    #[must_use]
    pub fn new(opt: ShardRunnerOptions) -> Self {
        let (tx, rx) = mpsc::unbounded();

        Self {
            shard: opt.shard,
            rx,
            messenger: ShardMessenger::new(tx),
            dispatcher: opt.dispatcher,
            voice_manager: opt.voice_manager,
            runners: opt.runners,
            policy: ReconnectPolicy::new(),
        }
    }

    /// A channel for communicating with this runner from other tasks.
    #[must_use]
    pub fn messenger(&self) -> ShardMessenger {
        self.messenger.clone()
    }

    /// Starts the runner's loop to receive events.
    ///
    /// Returns when asked to shut down, or with an error when the gateway reports a fatal,
    /// non-reconnectable condition (e.g. bad token, disallowed intents).
    ///
    /// # Errors
    ///
    /// Returns fatal [`GatewayError`]s; transient failures are retried internally.
    pub async fn run(&mut self) -> Result<()> {
        let shard_id = self.shard.shard_info().id;
        debug!("[ShardRunner {shard_id}] Running");

        self.shard.start().await?;

        loop {
            if !self.handle_rx().await? {
                debug!("[ShardRunner {shard_id}] Shutting down");
                self.shard.shutdown(1000).await;

                return Ok(());
            }

            if !self.shard.do_heartbeat().await? {
                if !self.reconnect(self.shard.reconnection_type()).await? {
                    return Ok(());
                }
                continue;
            }

            let pre_stage = self.shard.stage();
            let (event, action, successful) = self.recv_event().await?;
            let post_stage = self.shard.stage();

            if pre_stage != post_stage {
                self.dispatcher.shard_stage_update(shard_id, pre_stage, post_stage).await;
            }

            match action {
                Some(ShardAction::Identify) => {
                    if let Err(why) = self.shard.identify().await {
                        warn!("[ShardRunner {shard_id}] Err identifying: {why:?}");

                        if !self.reconnect(ReconnectType::Reidentify).await? {
                            return Ok(());
                        }
                    }
                },
                Some(ShardAction::Resume) => {
                    if let Err(why) = self.shard.resume().await {
                        warn!("[ShardRunner {shard_id}] Err resuming: {why:?}");

                        // The session may be gone; fall back to a fresh identify.
                        if !self.reconnect(ReconnectType::Reidentify).await? {
                            return Ok(());
                        }
                    }
                },
                Some(ShardAction::Heartbeat) => {
                    if let Err(why) = self.shard.heartbeat().await {
                        warn!("[ShardRunner {shard_id}] Err heartbeating: {why:?}");

                        if !self.reconnect(self.shard.reconnection_type()).await? {
                            return Ok(());
                        }
                    }
                },
                Some(ShardAction::Reconnect(kind)) => {
                    if !self.reconnect(kind).await? {
                        return Ok(());
                    }
                },
                None => {},
            }

            if let Some(GatewayEvent::Dispatch {
                kind,
                data,
                ..
            }) = event
            {
                self.dispatch(kind, data).await;
            }

            if !successful && !self.shard.stage().is_connecting() {
                if !self.reconnect(self.shard.reconnection_type()).await? {
                    return Ok(());
                }
            }

            self.update_runner_info().await;
        }
    }

    /// Drains queued control messages. Returns `false` once the runner should stop.
    async fn handle_rx(&mut self) -> Result<bool> {
        loop {
            match self.rx.try_next() {
                Ok(Some(msg)) => {
                    if !self.handle_message(msg).await? {
                        return Ok(false);
                    }
                },
                // All senders are gone; the manager no longer knows this runner.
                Ok(None) => return Ok(false),
                Err(_) => return Ok(true),
            }
        }
    }

    async fn handle_message(&mut self, msg: ShardRunnerMessage) -> Result<bool> {
        let shard_id = self.shard.shard_info().id;

        match msg {
            ShardRunnerMessage::Restart => {
                // Reconnecting drains the queue again, so the recursive future must be boxed.
                let kind = self.shard.reconnection_type();

                Box::pin(self.reconnect(kind)).await
            },
            ShardRunnerMessage::Shutdown(code) => {
                self.shard.shutdown(code).await;

                Ok(false)
            },
            ShardRunnerMessage::ChunkGuild {
                guild_id,
                limit,
                filter,
            } => {
                if let Err(why) = self.shard.chunk_guild(guild_id, limit, filter).await {
                    warn!("[ShardRunner {shard_id}] Err requesting chunks: {why:?}");
                }

                Ok(true)
            },
            ShardRunnerMessage::SetPresence(presence) => {
                self.shard.set_presence(presence);

                if let Err(why) = self.shard.update_presence().await {
                    warn!("[ShardRunner {shard_id}] Err updating presence: {why:?}");
                }

                Ok(true)
            },
            ShardRunnerMessage::UpdateVoiceState {
                guild_id,
                channel_id,
                self_mute,
                self_deaf,
            } => {
                let update =
                    self.shard.update_voice_state(guild_id, channel_id, self_mute, self_deaf);

                if let Err(why) = update.await {
                    warn!("[ShardRunner {shard_id}] Err updating voice state: {why:?}");
                }

                Ok(true)
            },
        }
    }

    /// Polls the gateway once, classifying failures into "skip", "reconnect", and "fatal".
    async fn recv_event(&mut self) -> Result<(Option<GatewayEvent>, Option<ShardAction>, bool)> {
        let shard_id = self.shard.shard_info().id;

        let event = match self.shard.recv().await {
            Ok(Some(event)) => event,
            Ok(None) => return Ok((None, None, true)),
            Err(Error::Gateway(GatewayError::Closed(frame))) => {
                debug!("[ShardRunner {shard_id}] Connection closed: {frame:?}");

                // Fatal close codes surface as errors here and end the runner.
                let action = self.shard.handle_closed(frame.as_ref())?;

                return Ok((None, Some(action), false));
            },
            Err(Error::Tungstenite(why)) => {
                debug!("[ShardRunner {shard_id}] Websocket error: {why:?}");

                let action = ShardAction::Reconnect(self.shard.reconnection_type());

                return Ok((None, Some(action), false));
            },
            Err(why @ (Error::Json(_) | Error::Decode(..))) => {
                warn!("[ShardRunner {shard_id}] Err decoding frame: {why:?}");

                return Ok((None, None, true));
            },
            Err(Error::Gateway(GatewayError::MalformedPayload)) => {
                warn!("[ShardRunner {shard_id}] Skipping malformed frame");

                return Ok((None, None, true));
            },
            Err(why) => return Err(why),
        };

        let action = self.shard.handle_event(&event)?;

        Ok((Some(event), action, true))
    }

    /// Re-establishes the connection with backoff. Returns `false` if a shutdown request
    /// arrived while waiting.
    async fn reconnect(&mut self, kind: ReconnectType) -> Result<bool> {
        let shard_id = self.shard.shard_info().id;
        let mut kind = kind;

        loop {
            if !self.handle_rx().await? {
                return Ok(false);
            }

            let delay = self.policy.delay();
            info!("[ShardRunner {shard_id}] Reconnecting ({kind:?}) in {delay:?}");
            sleep(delay).await;

            match self.shard.reconnect(kind).await {
                Ok(()) => return Ok(true),
                Err(why) => {
                    warn!("[ShardRunner {shard_id}] Failed to reconnect: {why:?}");

                    // If resuming keeps failing at the transport level, the stored resume URL
                    // may be stale; retry from scratch.
                    kind = ReconnectType::Reidentify;
                },
            }
        }
    }

    async fn dispatch(&mut self, kind: String, data: Value) {
        let shard_id = self.shard.shard_info().id;

        if matches!(kind.as_str(), "READY" | "RESUMED") {
            self.policy.reset();
        }

        if let Some(voice_manager) = &self.voice_manager {
            match kind.as_str() {
                "READY" => {
                    if let Some(user_id) = self.shard.user_id() {
                        voice_manager
                            .register_shard(shard_id, self.messenger.clone(), user_id)
                            .await;
                    }
                },
                "VOICE_SERVER_UPDATE" => {
                    let guild_id = data.get("guild_id").and_then(snowflake).map(GuildId::new);
                    let token = data.get("token").and_then(Value::as_str);

                    if let (Some(guild_id), Some(token)) = (guild_id, token) {
                        let endpoint =
                            data.get("endpoint").and_then(Value::as_str).map(ToOwned::to_owned);

                        voice_manager
                            .server_update(VoiceServerInfo {
                                guild_id,
                                endpoint,
                                token: token.to_owned(),
                            })
                            .await;
                    }
                },
                "VOICE_STATE_UPDATE" => {
                    let user_id = data.get("user_id").and_then(snowflake).map(UserId::new);

                    // Only the bot's own voice state carries the session for our handshake.
                    if user_id.is_some() && user_id == self.shard.user_id() {
                        let guild_id = data.get("guild_id").and_then(snowflake).map(GuildId::new);
                        let channel_id =
                            data.get("channel_id").and_then(snowflake).map(ChannelId::new);
                        let session_id = data.get("session_id").and_then(Value::as_str);

                        if let (Some(guild_id), Some(session_id)) = (guild_id, session_id) {
                            voice_manager.state_update(guild_id, channel_id, session_id).await;
                        }
                    }
                },
                _ => {},
            }
        }

        self.dispatcher.dispatch(shard_id, &kind, data).await;
    }

    async fn update_runner_info(&self) {
        let shard_id = self.shard.shard_info().id;

        if let Some(info) = self.runners.lock().await.get_mut(&shard_id) {
            info.latency = self.shard.latency();
            info.stage = self.shard.stage();
        }
    }
}
