use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tracing::{debug, info, trace, warn};
use url::Url;

use super::bucket::Bucket;
use super::heartbeat::{HeartbeatAction, Heartbeater};
use super::{
    ChunkGuildFilter,
    ConnectionStage,
    GatewayError,
    PresenceData,
    ReconnectType,
    ShardAction,
    WsClient,
};
use crate::constants::{self, close_codes, Opcode};
use crate::internal::prelude::*;
use crate::model::event::GatewayEvent;
use crate::model::gateway::{GatewayIntents, ShardInfo};
use crate::model::id::{snowflake, ChannelId, GuildId, UserId};
use crate::model::payload::Payload;

/// A Shard is a higher-level handler for a websocket connection to Discord's gateway.
///
/// The shard itself does not decide when to read from or reconnect the socket; it turns received
/// control frames into [`ShardAction`]s for its runner to execute. This keeps the session state
/// machine in one place while the runner owns scheduling.
///
/// A shard created with [`Shard::new`] holds no connection until [`Shard::start`] is called.
pub struct Shard {
    /// The active transport, if any. Dropped on shutdown and replaced on reconnect.
    pub client: Option<WsClient>,
    global_bucket: Bucket,
    presence_bucket: Bucket,
    presence: PresenceData,
    heartbeater: Option<Heartbeater>,
    seq: u64,
    session_id: Option<String>,
    resume_ws_url: Option<String>,
    user_id: Option<UserId>,
    shard_info: ShardInfo,
    stage: ConnectionStage,
    /// Instant of the last transport (re)initialization.
    pub started: Instant,
    token: Arc<str>,
    ws_url: Arc<str>,
    intents: GatewayIntents,
}

impl Shard {
    /// Instantiates a new instance of a Shard for the given session parameters.
    ///
    /// No connection is opened; call [`Self::start`] for that.
    #[must_use]
    pub fn new(
        ws_url: Arc<str>,
        token: Arc<str>,
        shard_info: ShardInfo,
        intents: GatewayIntents,
        presence: Option<PresenceData>,
    ) -> Self {
        Self {
            client: None,
            global_bucket: Bucket::global(),
            presence_bucket: Bucket::presence(),
            presence: presence.unwrap_or_default(),
            heartbeater: None,
            seq: 0,
            session_id: None,
            resume_ws_url: None,
            user_id: None,
            shard_info,
            stage: ConnectionStage::Disconnected,
            started: Instant::now(),
            token,
            ws_url,
            intents,
        }
    }

    /// Opens the transport to the gateway, using the resume URL handed out by the last Ready
    /// when one is known.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the websocket connection fails.
    pub async fn start(&mut self) -> Result<()> {
        self.stage = ConnectionStage::Connecting;
        self.init_transport().await?;
        self.stage = ConnectionStage::Handshake;

        Ok(())
    }

    async fn init_transport(&mut self) -> Result<()> {
        let base = self.resume_ws_url.as_deref().unwrap_or(&self.ws_url);
        let url = Url::parse(&format!("{base}?v={}", constants::GATEWAY_VERSION)).map_err(|why| {
            warn!("Error building gateway url: {why:?}");

            Error::Gateway(GatewayError::BuildingUrl)
        })?;

        self.client = Some(WsClient::connect(url).await?);
        self.heartbeater = None;
        self.started = Instant::now();

        Ok(())
    }

    #[must_use]
    pub fn shard_info(&self) -> ShardInfo {
        self.shard_info
    }

    #[must_use]
    pub fn stage(&self) -> ConnectionStage {
        self.stage
    }

    #[must_use]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// The bot's own user ID, known once Ready has been received.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    /// The heartbeat round-trip time of the current connection.
    #[must_use]
    pub fn latency(&self) -> Option<Duration> {
        self.heartbeater.as_ref().and_then(Heartbeater::latency)
    }

    pub fn set_presence(&mut self, presence: PresenceData) {
        self.presence = presence;
    }

    /// Processes a received control frame, mutating session state and returning the follow-up
    /// action the runner should take, if any.
    ///
    /// # Errors
    ///
    /// Does not error today; the signature leaves room for fatal event handling.
    pub fn handle_event(&mut self, event: &GatewayEvent) -> Result<Option<ShardAction>> {
        match event {
            GatewayEvent::Dispatch {
                seq,
                kind,
                data,
            } => {
                if self.seq != 0 && *seq > self.seq + 1 {
                    warn!(
                        "[Shard {}] Sequence skipped: them: {seq}, us: {}",
                        self.shard_info, self.seq,
                    );
                }

                match kind.as_str() {
                    "READY" => {
                        self.session_id =
                            data.get("session_id").and_then(Value::as_str).map(ToOwned::to_owned);
                        self.resume_ws_url = data
                            .get("resume_gateway_url")
                            .and_then(Value::as_str)
                            .map(ToOwned::to_owned);
                        self.user_id = data
                            .get("user")
                            .and_then(|user| user.get("id"))
                            .and_then(snowflake)
                            .map(UserId::new);
                        self.stage = ConnectionStage::Connected;

                        info!("[Shard {}] Received Ready", self.shard_info);
                    },
                    "RESUMED" => {
                        info!("[Shard {}] Resumed", self.shard_info);
                        self.stage = ConnectionStage::Connected;
                    },
                    _ => {},
                }

                self.seq = *seq;

                Ok(None)
            },
            GatewayEvent::Heartbeat(seq) => {
                info!("[Shard {}] Received shard heartbeat (seq: {seq})", self.shard_info);

                Ok(Some(ShardAction::Heartbeat))
            },
            GatewayEvent::HeartbeatAck => {
                if let Some(heartbeater) = &mut self.heartbeater {
                    heartbeater.ack(Instant::now());
                }

                trace!("[Shard {}] Received heartbeat ack", self.shard_info);

                Ok(None)
            },
            GatewayEvent::Hello(interval) => {
                debug!("[Shard {}] Received a Hello; interval: {interval}", self.shard_info);

                // A fresh connection gets a fresh schedule; a second Hello on the same
                // connection simply restarts it.
                self.heartbeater =
                    Some(Heartbeater::new(Duration::from_millis(*interval), Instant::now()));

                Ok(Some(if self.stage == ConnectionStage::Resuming && self.session_id.is_some() {
                    ShardAction::Resume
                } else {
                    ShardAction::Identify
                }))
            },
            GatewayEvent::InvalidateSession(resumable) => {
                info!("[Shard {}] Received session invalidation", self.shard_info);

                if *resumable && self.session_id.is_some() {
                    Ok(Some(ShardAction::Reconnect(ReconnectType::Resume)))
                } else {
                    // The session is gone; identify again on the same connection.
                    self.session_id = None;
                    self.seq = 0;

                    Ok(Some(ShardAction::Identify))
                }
            },
            GatewayEvent::Reconnect => Ok(Some(ShardAction::Reconnect(self.reconnection_type()))),
        }
    }

    /// Classifies a close frame received from the gateway.
    ///
    /// Close codes indicating a misconfiguration are returned as errors, which halts the shard;
    /// reconnecting would only fail the same way again. Everything else results in a reconnect,
    /// resuming whenever a session survives the close.
    ///
    /// # Errors
    ///
    /// Returns the matching [`GatewayError`] for fatal close codes: authentication failure,
    /// invalid shard data, sharding required, invalid API version, and invalid or disallowed
    /// intents.
    pub fn handle_closed(&mut self, frame: Option<&CloseFrame<'static>>) -> Result<ShardAction> {
        let code = frame.map(|frame| u16::from(frame.code));

        match code {
            Some(close_codes::AUTHENTICATION_FAILED) => {
                return Err(Error::Gateway(GatewayError::InvalidAuthentication));
            },
            Some(close_codes::INVALID_SHARD) => {
                return Err(Error::Gateway(GatewayError::InvalidShardData));
            },
            Some(close_codes::SHARDING_REQUIRED) => {
                return Err(Error::Gateway(GatewayError::OverloadedShard));
            },
            Some(close_codes::INVALID_API_VERSION) => {
                return Err(Error::Gateway(GatewayError::InvalidApiVersion));
            },
            Some(close_codes::INVALID_GATEWAY_INTENTS) => {
                return Err(Error::Gateway(GatewayError::InvalidGatewayIntents));
            },
            Some(close_codes::DISALLOWED_GATEWAY_INTENTS) => {
                return Err(Error::Gateway(GatewayError::DisallowedGatewayIntents));
            },
            Some(close_codes::UNKNOWN_OPCODE) => {
                warn!("[Shard {}] Sent an invalid opcode", self.shard_info);
            },
            Some(close_codes::DECODE_ERROR) => {
                warn!("[Shard {}] Sent an invalid payload", self.shard_info);
            },
            Some(close_codes::NOT_AUTHENTICATED) => {
                warn!("[Shard {}] Sent a payload before identifying", self.shard_info);
            },
            Some(close_codes::ALREADY_AUTHENTICATED) => {
                warn!("[Shard {}] Already authenticated", self.shard_info);
            },
            Some(close_codes::RATE_LIMITED) => {
                warn!("[Shard {}] Gateway ratelimited the connection", self.shard_info);
            },
            Some(
                close_codes::INVALID_SEQUENCE | close_codes::SESSION_TIMEOUT | 1000 | 1001,
            ) => {
                debug!("[Shard {}] Session is no longer resumable", self.shard_info);

                self.session_id = None;
            },
            Some(close_codes::NO_INTERNET | close_codes::UNEXPECTED_SERVER_ERROR) => {
                debug!("[Shard {}] Transient gateway failure; reconnecting", self.shard_info);
            },
            other => {
                warn!(
                    "[Shard {}] Unknown close code {other:?}; reconnecting",
                    self.shard_info,
                );
            },
        }

        Ok(ShardAction::Reconnect(self.reconnection_type()))
    }

    /// Whether a reconnect should resume the session or identify from scratch.
    #[must_use]
    pub fn reconnection_type(&self) -> ReconnectType {
        if self.session_id.is_some() {
            ReconnectType::Resume
        } else {
            ReconnectType::Reidentify
        }
    }

    /// Receives and decodes the next gateway frame, if one arrives within the polling window.
    ///
    /// # Errors
    ///
    /// Errors if the transport is down, returns a close, or produces an undecodable frame.
    pub async fn recv(&mut self) -> Result<Option<GatewayEvent>> {
        let Some(client) = self.client.as_mut() else {
            return Err(Error::Gateway(GatewayError::NotConnected));
        };

        let Some(value) = client.recv_json().await? else {
            return Ok(None);
        };

        GatewayEvent::from_payload(Payload::from_value(value)?).map(Some)
    }

    /// Drives the heartbeat schedule. Returns whether the connection is still healthy: `false`
    /// means the connection zombied out or the heartbeat could not be written, and the runner
    /// must reconnect.
    ///
    /// # Errors
    ///
    /// Does not error today; failures are reported through the return value so the runner
    /// treats them uniformly.
    pub async fn do_heartbeat(&mut self) -> Result<bool> {
        let action = match &self.heartbeater {
            Some(heartbeater) => heartbeater.tick(Instant::now()),
            // No Hello yet; nothing to schedule.
            None => return Ok(true),
        };

        match action {
            HeartbeatAction::Wait => Ok(true),
            HeartbeatAction::Send => match self.heartbeat().await {
                Ok(()) => Ok(true),
                Err(why) => {
                    warn!("[Shard {}] Err heartbeating: {why:?}", self.shard_info);

                    Ok(false)
                },
            },
            HeartbeatAction::Zombie => {
                warn!(
                    "[Shard {}] No heartbeat acknowledgements; connection is a zombie",
                    self.shard_info,
                );

                Ok(false)
            },
        }
    }

    /// Sends a heartbeat carrying the last received sequence number.
    ///
    /// # Errors
    ///
    /// Errors if the frame cannot be written.
    pub async fn heartbeat(&mut self) -> Result<()> {
        trace!("[Shard {}] Sending heartbeat; seq: {}", self.shard_info, self.seq);

        let seq = if self.seq == 0 { Value::Null } else { json!(self.seq) };

        self.send(
            json!({
                "op": Opcode::Heartbeat.num(),
                "d": seq,
            }),
            false,
        )
        .await?;

        if let Some(heartbeater) = &mut self.heartbeater {
            heartbeater.sent(Instant::now());
        }

        Ok(())
    }

    /// Identifies, starting a brand new session.
    ///
    /// # Errors
    ///
    /// Errors if the frame cannot be written.
    pub async fn identify(&mut self) -> Result<()> {
        debug!("[Shard {}] Identifying", self.shard_info);

        self.stage = ConnectionStage::Identifying;

        let payload = json!({
            "op": Opcode::Identify.num(),
            "d": {
                "token": &*self.token,
                "intents": self.intents.bits(),
                "compress": false,
                "large_threshold": constants::LARGE_THRESHOLD,
                "shard": [self.shard_info.id.0, self.shard_info.total.get()],
                "properties": {
                    "os": std::env::consts::OS,
                    "browser": "accord",
                    "device": "accord",
                },
                "presence": self.presence_payload(),
            },
        });

        self.send(payload, false).await
    }

    /// Sends a resume for the existing session.
    ///
    /// # Errors
    ///
    /// Errors with [`GatewayError::NoSessionId`] if no session exists, or if the frame cannot
    /// be written.
    pub async fn resume(&mut self) -> Result<()> {
        let Some(session_id) = self.session_id.clone() else {
            return Err(Error::Gateway(GatewayError::NoSessionId));
        };

        debug!("[Shard {}] Sending resume; seq: {}", self.shard_info, self.seq);

        self.stage = ConnectionStage::Resuming;

        self.send(
            json!({
                "op": Opcode::Resume.num(),
                "d": {
                    "token": &*self.token,
                    "session_id": session_id,
                    "seq": self.seq,
                },
            }),
            false,
        )
        .await
    }

    /// Re-establishes the transport. [`ReconnectType::Resume`] keeps the session so the
    /// follow-up Hello leads to a resume; [`ReconnectType::Reidentify`] discards it.
    ///
    /// # Errors
    ///
    /// Errors if the new connection cannot be opened.
    pub async fn reconnect(&mut self, kind: ReconnectType) -> Result<()> {
        self.shutdown(1000).await;

        match kind {
            ReconnectType::Resume if self.session_id.is_some() => {
                self.stage = ConnectionStage::Resuming;
                self.init_transport().await
            },
            _ => {
                self.reset();
                self.start().await
            },
        }
    }

    /// Sends a presence update for the current presence.
    ///
    /// # Errors
    ///
    /// Errors if the frame cannot be written.
    pub async fn update_presence(&mut self) -> Result<()> {
        debug!("[Shard {}] Sending presence update", self.shard_info);

        let payload = json!({
            "op": Opcode::PresenceUpdate.num(),
            "d": self.presence_payload(),
        });

        self.send(payload, true).await
    }

    /// Requests that one or multiple guilds be chunked.
    ///
    /// This will ask Discord to start sending member chunks for large guilds (250 members+).
    ///
    /// # Errors
    ///
    /// Errors if the frame cannot be written.
    pub async fn chunk_guild(
        &mut self,
        guild_id: GuildId,
        limit: Option<u16>,
        filter: ChunkGuildFilter,
    ) -> Result<()> {
        debug!("[Shard {}] Requesting member chunks", self.shard_info);

        let mut d = JsonMap::new();
        d.insert("guild_id".to_owned(), json!(guild_id.get()));
        d.insert("limit".to_owned(), json!(limit.unwrap_or(0)));

        match filter {
            ChunkGuildFilter::None => {
                d.insert("query".to_owned(), json!(""));
            },
            ChunkGuildFilter::Query(query) => {
                d.insert("query".to_owned(), json!(query));
            },
            ChunkGuildFilter::UserIds(user_ids) => {
                let ids: Vec<u64> = user_ids.iter().copied().map(UserId::get).collect();
                d.insert("user_ids".to_owned(), json!(ids));
            },
        }

        self.send(
            json!({
                "op": Opcode::RequestGuildMembers.num(),
                "d": d,
            }),
            false,
        )
        .await
    }

    /// Updates the bot's voice state in a guild: joining a channel, moving between channels
    /// (both with `Some`), or disconnecting (`None`).
    ///
    /// The voice server responds over the gateway with `VOICE_STATE_UPDATE` and
    /// `VOICE_SERVER_UPDATE` dispatches, which the runner hands to the registered
    /// [`VoiceGatewayManager`].
    ///
    /// # Errors
    ///
    /// Errors if the frame cannot be written.
    ///
    /// [`VoiceGatewayManager`]: crate::gateway::VoiceGatewayManager
    pub async fn update_voice_state(
        &mut self,
        guild_id: GuildId,
        channel_id: Option<ChannelId>,
        self_mute: bool,
        self_deaf: bool,
    ) -> Result<()> {
        debug!("[Shard {}] Updating voice state in {guild_id}", self.shard_info);

        self.send(
            json!({
                "op": Opcode::VoiceStateUpdate.num(),
                "d": {
                    "guild_id": guild_id.get(),
                    "channel_id": channel_id.map(ChannelId::get),
                    "self_mute": self_mute,
                    "self_deaf": self_deaf,
                },
            }),
            false,
        )
        .await
    }

    /// Sends a frame, claiming a slot from the matching rate-limit bucket first. Over-limit
    /// sends wait; they are never dropped or reordered.
    ///
    /// # Errors
    ///
    /// Errors with [`GatewayError::NotConnected`] while the transport is down, or if the write
    /// fails.
    pub async fn send(&mut self, value: Value, is_presence: bool) -> Result<()> {
        let bucket =
            if is_presence { &mut self.presence_bucket } else { &mut self.global_bucket };
        bucket.take().await;

        match self.client.as_mut() {
            Some(client) => client.send_json(&value).await,
            None => Err(Error::Gateway(GatewayError::NotConnected)),
        }
    }

    /// Closes the transport, if one is open. Session state is left alone so a later reconnect
    /// can still resume.
    pub async fn shutdown(&mut self, code: u16) {
        if let Some(mut client) = self.client.take() {
            let frame = CloseFrame {
                code: code.into(),
                reason: "".into(),
            };

            if let Err(why) = client.close(Some(frame)).await {
                debug!("[Shard {}] Err closing connection: {why:?}", self.shard_info);
            }
        }

        self.heartbeater = None;
        self.stage = ConnectionStage::Disconnected;
    }

    fn reset(&mut self) {
        self.seq = 0;
        self.session_id = None;
        self.resume_ws_url = None;
        self.heartbeater = None;
        self.stage = ConnectionStage::Disconnected;
        self.started = Instant::now();
    }

    fn presence_payload(&self) -> Value {
        let activities: Vec<Value> = self
            .presence
            .activity
            .as_ref()
            .map(|activity| {
                json!({
                    "name": activity.name,
                    "type": activity.kind.num(),
                    "url": activity.url,
                })
            })
            .into_iter()
            .collect();

        json!({
            "afk": false,
            "since": 0,
            "status": self.presence.status.name(),
            "activities": activities,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU16;

    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

    use super::*;
    use crate::model::id::ShardId;

    fn shard() -> Shard {
        Shard::new(
            Arc::from("wss://gateway.discord.gg"),
            Arc::from("Bot token"),
            ShardInfo::new(ShardId(0), NonZeroU16::new(2).unwrap()),
            GatewayIntents::non_privileged(),
            None,
        )
    }

    fn close_frame(code: u16) -> CloseFrame<'static> {
        CloseFrame {
            code: CloseCode::from(code),
            reason: "".into(),
        }
    }

    fn ready_event(seq: u64) -> GatewayEvent {
        GatewayEvent::Dispatch {
            seq,
            kind: "READY".to_owned(),
            data: json!({
                "session_id": "deadbeef",
                "resume_gateway_url": "wss://gateway-us-east1-b.discord.gg",
                "user": { "id": "1000000000000000001" },
            }),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hello_triggers_identify_and_schedules_first_heartbeat() {
        let mut shard = shard();

        let action = shard.handle_event(&GatewayEvent::Hello(41_250)).unwrap();
        assert!(matches!(action, Some(ShardAction::Identify)));

        // First heartbeat is due one interval after the Hello, not immediately.
        let heartbeater = shard.heartbeater.as_ref().unwrap();
        assert_eq!(heartbeater.interval(), Duration::from_millis(41_250));
        assert_eq!(heartbeater.tick(Instant::now()), HeartbeatAction::Wait);
        assert_eq!(
            heartbeater.tick(Instant::now() + Duration::from_millis(41_250)),
            HeartbeatAction::Send
        );
    }

    #[tokio::test(start_paused = true)]
    async fn hello_while_resuming_triggers_resume() {
        let mut shard = shard();
        shard.handle_event(&ready_event(1)).unwrap();
        shard.stage = ConnectionStage::Resuming;

        let action = shard.handle_event(&GatewayEvent::Hello(41_250)).unwrap();
        assert!(matches!(action, Some(ShardAction::Resume)));
    }

    #[tokio::test(start_paused = true)]
    async fn ready_stores_session_and_user() {
        let mut shard = shard();
        shard.handle_event(&ready_event(1)).unwrap();

        assert_eq!(shard.session_id(), Some("deadbeef"));
        assert_eq!(shard.user_id(), Some(UserId::new(1_000_000_000_000_000_001)));
        assert_eq!(shard.stage(), ConnectionStage::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn sequence_tracks_the_latest_dispatch() {
        let mut shard = shard();

        for seq in 1..=5 {
            let event = GatewayEvent::Dispatch {
                seq,
                kind: "MESSAGE_CREATE".to_owned(),
                data: Value::Null,
            };
            shard.handle_event(&event).unwrap();
        }

        assert_eq!(shard.seq(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_close_codes_halt_the_shard() {
        let cases = [
            (close_codes::AUTHENTICATION_FAILED, "authentication failed"),
            (close_codes::INVALID_SHARD, "invalid shard"),
            (close_codes::SHARDING_REQUIRED, "sharding required"),
            (close_codes::INVALID_API_VERSION, "invalid api version"),
            (close_codes::INVALID_GATEWAY_INTENTS, "invalid intents"),
            (close_codes::DISALLOWED_GATEWAY_INTENTS, "disallowed intents"),
        ];

        for (code, label) in cases {
            let mut shard = shard();
            let frame = close_frame(code);

            assert!(shard.handle_closed(Some(&frame)).is_err(), "{label} must be fatal");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_close_codes_reconnect() {
        for code in [close_codes::NO_INTERNET, close_codes::UNEXPECTED_SERVER_ERROR, 9999] {
            let mut shard = shard();
            shard.handle_event(&ready_event(1)).unwrap();

            let action = shard.handle_closed(Some(&close_frame(code))).unwrap();
            assert!(
                matches!(action, ShardAction::Reconnect(ReconnectType::Resume)),
                "code {code} should resume",
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn session_killing_close_codes_force_reidentify() {
        for code in [close_codes::INVALID_SEQUENCE, close_codes::SESSION_TIMEOUT, 1000, 1001] {
            let mut shard = shard();
            shard.handle_event(&ready_event(1)).unwrap();

            let action = shard.handle_closed(Some(&close_frame(code))).unwrap();
            assert!(
                matches!(action, ShardAction::Reconnect(ReconnectType::Reidentify)),
                "code {code} should reidentify",
            );
            assert_eq!(shard.session_id(), None);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_request_prefers_resuming() {
        let mut shard = shard();
        assert!(matches!(
            shard.handle_event(&GatewayEvent::Reconnect).unwrap(),
            Some(ShardAction::Reconnect(ReconnectType::Reidentify)),
        ));

        shard.handle_event(&ready_event(1)).unwrap();
        assert!(matches!(
            shard.handle_event(&GatewayEvent::Reconnect).unwrap(),
            Some(ShardAction::Reconnect(ReconnectType::Resume)),
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn unresumable_invalidation_clears_the_session() {
        let mut shard = shard();
        shard.handle_event(&ready_event(3)).unwrap();

        let action = shard.handle_event(&GatewayEvent::InvalidateSession(false)).unwrap();
        assert!(matches!(action, Some(ShardAction::Identify)));
        assert_eq!(shard.session_id(), None);
        assert_eq!(shard.seq(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn resumable_invalidation_reconnects_with_resume() {
        let mut shard = shard();
        shard.handle_event(&ready_event(3)).unwrap();

        let action = shard.handle_event(&GatewayEvent::InvalidateSession(true)).unwrap();
        assert!(matches!(action, Some(ShardAction::Reconnect(ReconnectType::Resume))));
        assert_eq!(shard.session_id(), Some("deadbeef"));
    }

    #[tokio::test(start_paused = true)]
    async fn presence_payload_serializes_the_activity() {
        use crate::gateway::ActivityData;
        use crate::model::gateway::OnlineStatus;

        let mut shard = shard();
        shard.set_presence(PresenceData {
            activity: Some(ActivityData::streaming("jam", "https://example.com/live").unwrap()),
            status: OnlineStatus::Idle,
        });

        let payload = shard.presence_payload();

        assert_eq!(payload["status"], "idle");
        assert_eq!(payload["activities"][0]["name"], "jam");
        assert_eq!(payload["activities"][0]["type"], 1);
        assert_eq!(payload["activities"][0]["url"], "https://example.com/live");
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_ack_resets_the_missed_counter() {
        let mut shard = shard();
        shard.handle_event(&GatewayEvent::Hello(41_250)).unwrap();

        shard.heartbeater.as_mut().unwrap().sent(Instant::now());
        shard.handle_event(&GatewayEvent::HeartbeatAck).unwrap();

        let next_tick = Instant::now() + Duration::from_millis(41_250);
        assert_eq!(shard.heartbeater.as_ref().unwrap().tick(next_tick), HeartbeatAction::Send);
    }
}
