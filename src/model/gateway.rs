//! Models pertaining to the gateway.

use std::fmt;
use std::num::NonZeroU16;

use serde::Deserialize;

use super::id::ShardId;

/// A representation of the data retrieved from the gateway endpoint.
#[derive(Clone, Debug, Deserialize)]
#[non_exhaustive]
pub struct Gateway {
    /// The gateway to connect to.
    pub url: String,
}

/// A representation of the data retrieved from the bot gateway endpoint.
///
/// This is different from the [`Gateway`], as this includes the number of shards that are
/// recommended for use by the current bot user.
#[derive(Clone, Debug, Deserialize)]
#[non_exhaustive]
pub struct BotGateway {
    /// The gateway to connect to.
    pub url: String,
    /// The number of shards that are recommended to be used by the current bot user.
    pub shards: u16,
    /// Information describing how many gateway sessions you can initiate within a ratelimit
    /// period.
    pub session_start_limit: SessionStartLimit,
}

/// Information describing how many gateway sessions you can initiate within a ratelimit period.
#[derive(Clone, Debug, Deserialize)]
#[non_exhaustive]
pub struct SessionStartLimit {
    /// The number of sessions that you can initiate within the current ratelimit period.
    pub remaining: u64,
    /// The amount of time until the ratelimit period resets.
    pub reset_after: u64,
    /// The total number of session starts within the ratelimit period allowed.
    pub total: u64,
}

/// Information about a shard: its ID and the total number of shards used by the bot.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ShardInfo {
    pub id: ShardId,
    pub total: NonZeroU16,
}

impl ShardInfo {
    #[must_use]
    pub fn new(id: ShardId, total: NonZeroU16) -> Self {
        Self {
            id,
            total,
        }
    }
}

impl fmt::Display for ShardInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Formats as the `shard` array sent when identifying.
        write!(f, "[{}, {}]", self.id.0, self.total)
    }
}

/// The online status the current user should show up as.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum OnlineStatus {
    DoNotDisturb,
    Idle,
    Invisible,
    Offline,
    #[default]
    Online,
}

impl OnlineStatus {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::DoNotDisturb => "dnd",
            Self::Idle => "idle",
            Self::Invisible => "invisible",
            Self::Offline => "offline",
            Self::Online => "online",
        }
    }
}

/// The type of an activity shown in a presence.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum ActivityType {
    #[default]
    Playing = 0,
    Streaming = 1,
    Listening = 2,
    Watching = 3,
    Custom = 4,
    Competing = 5,
}

impl ActivityType {
    #[must_use]
    pub fn num(self) -> u64 {
        self as u64
    }
}

bitflags::bitflags! {
    /// [Gateway intents] declare which event groups a session wants to receive.
    ///
    /// [Gateway intents]: https://discord.com/developers/docs/topics/gateway#gateway-intents
    #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
    pub struct GatewayIntents: u64 {
        const GUILDS = 1;
        /// **Info**: This intent is privileged and must be enabled in the developer portal.
        const GUILD_MEMBERS = 1 << 1;
        const GUILD_MODERATION = 1 << 2;
        const GUILD_EMOJIS_AND_STICKERS = 1 << 3;
        const GUILD_INTEGRATIONS = 1 << 4;
        const GUILD_WEBHOOKS = 1 << 5;
        const GUILD_INVITES = 1 << 6;
        const GUILD_VOICE_STATES = 1 << 7;
        /// **Info**: This intent is privileged and must be enabled in the developer portal.
        const GUILD_PRESENCES = 1 << 8;
        const GUILD_MESSAGES = 1 << 9;
        const GUILD_MESSAGE_REACTIONS = 1 << 10;
        const GUILD_MESSAGE_TYPING = 1 << 11;
        const DIRECT_MESSAGES = 1 << 12;
        const DIRECT_MESSAGE_REACTIONS = 1 << 13;
        const DIRECT_MESSAGE_TYPING = 1 << 14;
        /// **Info**: This intent is privileged and must be enabled in the developer portal.
        const MESSAGE_CONTENT = 1 << 15;
        const GUILD_SCHEDULED_EVENTS = 1 << 16;
        const AUTO_MODERATION_CONFIGURATION = 1 << 20;
        const AUTO_MODERATION_EXECUTION = 1 << 21;
    }
}

impl GatewayIntents {
    /// Gets all of the intents that aren't considered privileged.
    #[must_use]
    pub const fn non_privileged() -> Self {
        Self::privileged().complement()
    }

    /// Gets all of the intents that are considered privileged.
    #[must_use]
    pub const fn privileged() -> Self {
        Self::GUILD_MEMBERS.union(Self::GUILD_PRESENCES).union(Self::MESSAGE_CONTENT)
    }
}

impl Default for GatewayIntents {
    fn default() -> Self {
        Self::non_privileged()
    }
}
