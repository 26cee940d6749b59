use async_trait::async_trait;

use super::{ShardMessenger, VoiceServerInfo};
use crate::model::id::{ChannelId, GuildId, ShardId, UserId};

/// Interface for any object that manages voice connections from gateway dispatches.
///
/// The gateway core knows nothing about guild semantics; it only recognizes the dispatch names
/// that belong to voice and hands their fields over. An implementation pairs the session ID from
/// a state update with the endpoint and token from the matching server update, then opens a
/// [`VoiceSession`].
///
/// [`VoiceSession`]: crate::voice::VoiceSession
#[async_trait]
pub trait VoiceGatewayManager: Send + Sync {
    /// Performed when a shard finishes its handshake. Gives the voice manager a channel for
    /// sending voice state updates through that shard, and the bot's user ID.
    async fn register_shard(&self, shard_id: ShardId, messenger: ShardMessenger, user_id: UserId);

    /// Performed when a shard's runner stops for good.
    async fn deregister_shard(&self, shard_id: ShardId);

    /// A `VOICE_SERVER_UPDATE` dispatch arrived: the host and token to use for a guild's voice
    /// connection.
    async fn server_update(&self, info: VoiceServerInfo);

    /// The bot's own `VOICE_STATE_UPDATE` dispatch arrived: the session ID to use in the voice
    /// handshake, and the channel the bot now occupies (`None` after a disconnect).
    async fn state_update(
        &self,
        guild_id: GuildId,
        channel_id: Option<ChannelId>,
        session_id: &str,
    );
}
