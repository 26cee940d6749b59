use futures::channel::mpsc::UnboundedSender as Sender;
use tracing::warn;

use super::{ChunkGuildFilter, PresenceData};
use crate::model::id::{ChannelId, GuildId};

/// A message to be passed around within the library's runners.
#[derive(Debug)]
pub enum ShardRunnerMessage {
    /// Indicator that the shard should tear its connection down and rebuild it, resuming if
    /// possible.
    Restart,
    /// Indicator that the runner should send a close with the given code and then stop.
    Shutdown(u16),
    /// Indicates that the client is to send a member chunk request.
    ChunkGuild {
        guild_id: GuildId,
        limit: Option<u16>,
        filter: ChunkGuildFilter,
    },
    /// Indicates that the client is to update its presence.
    SetPresence(PresenceData),
    /// Indicates that the client is to update the shard's voice state in a guild.
    UpdateVoiceState {
        guild_id: GuildId,
        channel_id: Option<ChannelId>,
        self_mute: bool,
        self_deaf: bool,
    },
}

/// A lightweight wrapper around an mpsc sender over to a [`ShardRunner`].
///
/// This is used to cleanly communicate with a shard's runner from another task, e.g. to queue a
/// voice channel join from a voice manager.
///
/// [`ShardRunner`]: super::ShardRunner
#[derive(Clone, Debug)]
pub struct ShardMessenger {
    tx: Sender<ShardRunnerMessage>,
}

impl ShardMessenger {
    #[must_use]
    pub(crate) fn new(tx: Sender<ShardRunnerMessage>) -> Self {
        Self {
            tx,
        }
    }

    /// Requests that one or multiple guilds be chunked.
    pub fn chunk_guild(
        &self,
        guild_id: GuildId,
        limit: Option<u16>,
        filter: ChunkGuildFilter,
    ) {
        self.send(ShardRunnerMessage::ChunkGuild {
            guild_id,
            limit,
            filter,
        });
    }

    /// Sets the user's presence on this shard.
    pub fn set_presence(&self, presence: PresenceData) {
        self.send(ShardRunnerMessage::SetPresence(presence));
    }

    /// Moves the bot into, between, or out of (`channel_id: None`) guild voice channels.
    pub fn update_voice_state(
        &self,
        guild_id: GuildId,
        channel_id: Option<ChannelId>,
        self_mute: bool,
        self_deaf: bool,
    ) {
        self.send(ShardRunnerMessage::UpdateVoiceState {
            guild_id,
            channel_id,
            self_mute,
            self_deaf,
        });
    }

    /// Asks the runner to tear down and rebuild its connection.
    pub fn restart(&self) {
        self.send(ShardRunnerMessage::Restart);
    }

    /// Shuts down the shard with the given websocket close code.
    pub fn shutdown(&self, code: u16) {
        self.send(ShardRunnerMessage::Shutdown(code));
    }

    fn send(&self, msg: ShardRunnerMessage) {
        // The runner dropping its receiver means it already stopped; nothing to do then.
        if let Err(why) = self.tx.unbounded_send(msg) {
            warn!("Failed to send to shard runner: {why:?}");
        }
    }
}
