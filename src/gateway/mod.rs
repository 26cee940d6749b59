//! Contains the necessary plumbing for maintaining a connection with the gateway.
//!
//! The primary building blocks are the [`Shard`] and the [`ShardManager`].
//!
//! A [`Shard`] is a state machine over a single websocket connection: it tracks the session,
//! heartbeats, and rate-limit buckets, and turns received control frames into [`ShardAction`]s.
//! A [`ShardRunner`] drives one shard on its own task, and the [`ShardManager`] boots, monitors,
//! and shuts down the runners, spacing out their identifies as the gateway requires.
//!
//! Dispatch events are not interpreted here; they are handed, name and raw payload, to the
//! [`EventDispatcher`] supplied by the user.

mod backoff;
mod bucket;
mod error;
mod heartbeat;
mod shard;
mod shard_manager;
mod shard_messenger;
mod shard_runner;
mod voice;
mod ws;

use std::fmt;

use async_trait::async_trait;
use url::Url;

pub use self::backoff::ReconnectPolicy;
pub use self::bucket::Bucket;
pub use self::error::Error as GatewayError;
pub use self::heartbeat::{HeartbeatAction, Heartbeater};
pub use self::shard::Shard;
pub use self::shard_manager::{ShardManager, ShardManagerOptions, ShardRunnerInfo};
pub use self::shard_messenger::{ShardMessenger, ShardRunnerMessage};
pub use self::shard_runner::{ShardRunner, ShardRunnerOptions};
pub use self::voice::VoiceGatewayManager;
pub use self::ws::WsClient;
use crate::internal::prelude::*;
use crate::model::gateway::{ActivityType, OnlineStatus};
use crate::model::id::{GuildId, ShardId, UserId};

/// Presence data of the current user.
#[derive(Clone, Debug, Default)]
pub struct PresenceData {
    /// The current activity, if present.
    pub activity: Option<ActivityData>,
    /// The current online status.
    pub status: OnlineStatus,
}

/// Activity data of the current user.
#[derive(Clone, Debug)]
pub struct ActivityData {
    /// The name of the activity.
    pub name: String,
    /// The type of the activity.
    pub kind: ActivityType,
    /// The url of the activity, if the type is [`ActivityType::Streaming`].
    pub url: Option<Url>,
}

impl ActivityData {
    /// Creates an activity that appears as `Playing <name>`.
    #[must_use]
    pub fn playing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ActivityType::Playing,
            url: None,
        }
    }

    /// Creates an activity that appears as `Streaming <name>`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL parsing fails.
    pub fn streaming(name: impl Into<String>, url: &str) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            kind: ActivityType::Streaming,
            url: Some(Url::parse(url)?),
        })
    }

    /// Creates an activity that appears as `Listening to <name>`.
    #[must_use]
    pub fn listening(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ActivityType::Listening,
            url: None,
        }
    }

    /// Creates an activity that appears as `Watching <name>`.
    #[must_use]
    pub fn watching(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ActivityType::Watching,
            url: None,
        }
    }

    /// Creates an activity that appears as `Competing in <name>`.
    #[must_use]
    pub fn competing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ActivityType::Competing,
            url: None,
        }
    }
}

/// A filter for request-guild-members frames.
#[derive(Clone, Debug)]
pub enum ChunkGuildFilter {
    /// Returns all members of the guild. Requires the `GUILD_MEMBERS` intent.
    None,
    /// A common username prefix filter for the members returned.
    ///
    /// Will return a maximum of 100 members.
    Query(String),
    /// A set of exact user IDs to query for.
    ///
    /// Will return a maximum of 100 members.
    UserIds(Vec<UserId>),
}

/// Indicates the current connection stage of a [`Shard`].
///
/// This can be useful for knowing which shards are currently "down"/"up".
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[non_exhaustive]
pub enum ConnectionStage {
    /// Indicator that the shard is normally connected and is not in, e.g., a resume phase.
    Connected,
    /// Indicator that the shard is connecting and is in, e.g., a resume phase.
    Connecting,
    /// Indicator that the shard is fully disconnected and is not in a reconnecting phase.
    Disconnected,
    /// Indicator that the shard is currently initiating a handshake.
    Handshake,
    /// Indicator that the shard has sent an IDENTIFY packet and is awaiting a READY event.
    Identifying,
    /// Indicator that the shard has sent a RESUME packet and is awaiting a RESUMED event.
    Resuming,
}

impl ConnectionStage {
    /// Whether the stage is a form of connecting.
    #[must_use]
    pub fn is_connecting(self) -> bool {
        use ConnectionStage::{Connecting, Handshake, Identifying, Resuming};
        matches!(self, Connecting | Handshake | Identifying | Resuming)
    }
}

impl fmt::Display for ConnectionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connected => "connected",
            Self::Connecting => "connecting",
            Self::Disconnected => "disconnected",
            Self::Handshake => "handshaking",
            Self::Identifying => "identifying",
            Self::Resuming => "resuming",
        })
    }
}

/// A message to send from a shard over a WebSocket.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ShardAction {
    Heartbeat,
    Identify,
    Resume,
    Reconnect(ReconnectType),
}

/// The type of reconnection that should be performed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReconnectType {
    /// Indicator that a new connection should be made by sending an IDENTIFY.
    Reidentify,
    /// Indicator that a new connection should be made by sending a RESUME.
    Resume,
}

/// The receiving half of the library: every dispatch event a shard receives is handed here,
/// name and raw payload, without interpretation.
#[async_trait]
pub trait EventDispatcher: Send + Sync {
    /// Dispatched for every gateway dispatch frame.
    async fn dispatch(&self, shard_id: ShardId, event_name: &str, data: Value);

    /// Dispatched when a shard's connection stage changes.
    async fn shard_stage_update(&self, _shard_id: ShardId, _old: ConnectionStage, _new: ConnectionStage) {}
}

/// The raw fields of a voice server update dispatch, handed to a [`VoiceGatewayManager`].
#[derive(Clone, Debug)]
pub struct VoiceServerInfo {
    pub guild_id: GuildId,
    /// The voice server host. `None` means the allocated server went away and a new update
    /// will follow.
    pub endpoint: Option<String>,
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_stages() {
        assert!(ConnectionStage::Connecting.is_connecting());
        assert!(ConnectionStage::Handshake.is_connecting());
        assert!(ConnectionStage::Identifying.is_connecting());
        assert!(ConnectionStage::Resuming.is_connecting());
        assert!(!ConnectionStage::Connected.is_connecting());
        assert!(!ConnectionStage::Disconnected.is_connecting());
    }
}
