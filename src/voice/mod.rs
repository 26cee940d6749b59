//! Voice connections: the voice websocket handshake, encrypted UDP audio, and playback.
//!
//! A [`VoiceSession`] is built from a [`ConnectionInfo`], which the shard assembles out of the
//! voice state and voice server updates it receives after a join request (see
//! [`Shard::update_voice_state`]). Audio is fed to the session either directly via
//! [`VoiceSession::send_audio`] or, more usually, through an [`AudioPlayer`] driving an
//! [`AudioSource`].
//!
//! [`Shard::update_voice_state`]: crate::gateway::Shard::update_voice_state

mod connection;
pub mod constants;
mod error;
pub mod input;
mod packet;
pub mod payload;
mod player;

pub use self::connection::VoiceSession;
pub use self::error::VoiceError;
pub use self::input::AudioSource;
pub use self::packet::Packetizer;
pub use self::player::AudioPlayer;
use crate::model::id::{GuildId, UserId};

bitflags::bitflags! {
    /// What kind of audio a speaking user is transmitting.
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    pub struct SpeakingState: u8 {
        /// Normal transmission of voice audio.
        const MICROPHONE = 1;
        /// Transmission of context audio for video; no speaking indicator.
        const SOUNDSHARE = 1 << 1;
        /// Priority speaker, lowering the volume of the other speakers.
        const PRIORITY = 1 << 2;
    }
}

/// Everything needed to open a voice connection to one guild.
///
/// The session ID arrives in the bot's own voice state update, the token and endpoint in the
/// voice server update; both are dispatched after the shard requests a channel join.
#[derive(Clone, Debug)]
pub struct ConnectionInfo {
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub session_id: String,
    pub token: String,
    /// The voice server host, e.g. `us-west42.discord.media:443`.
    pub endpoint: String,
}
