//! A set of constants used by the library.

/// The guild member threshold before the gateway stops sending offline members in guild member
/// lists.
pub const LARGE_THRESHOLD: u8 = 250;
/// The gateway version used by the library.
pub const GATEWAY_VERSION: u8 = 10;
/// The voice gateway version used by the library.
pub const VOICE_GATEWAY_VERSION: u8 = 4;
/// The [UserAgent] sent along with every request.
///
/// [UserAgent]: reqwest::header::USER_AGENT
pub const USER_AGENT: &str = concat!("accord/", env!("CARGO_PKG_VERSION"));

/// An enum representing the [gateway opcodes].
///
/// [gateway opcodes]: https://discord.com/developers/docs/topics/opcodes-and-status-codes#gateway-gateway-opcodes
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum Opcode {
    /// An event was dispatched.
    Dispatch = 0,
    /// Fired periodically by the client to keep the connection alive.
    Heartbeat = 1,
    /// Starts a new session during the initial handshake.
    Identify = 2,
    /// Update the client's presence.
    PresenceUpdate = 3,
    /// Used to join, move between, and leave voice channels.
    VoiceStateUpdate = 4,
    /// Resume a previous session that was disconnected.
    Resume = 6,
    /// The client should attempt to reconnect and resume immediately.
    Reconnect = 7,
    /// Request information about offline guild members in a large guild.
    RequestGuildMembers = 8,
    /// The session has been invalidated.
    InvalidSession = 9,
    /// Sent immediately after connecting; contains the heartbeat interval.
    Hello = 10,
    /// Acknowledges a received heartbeat.
    HeartbeatAck = 11,
}

impl Opcode {
    pub fn from_num(num: u64) -> Option<Self> {
        match num {
            0 => Some(Self::Dispatch),
            1 => Some(Self::Heartbeat),
            2 => Some(Self::Identify),
            3 => Some(Self::PresenceUpdate),
            4 => Some(Self::VoiceStateUpdate),
            6 => Some(Self::Resume),
            7 => Some(Self::Reconnect),
            8 => Some(Self::RequestGuildMembers),
            9 => Some(Self::InvalidSession),
            10 => Some(Self::Hello),
            11 => Some(Self::HeartbeatAck),
            _ => None,
        }
    }

    #[must_use]
    pub fn num(self) -> u64 {
        self as u64
    }
}

/// An enum representing the [voice opcodes].
///
/// [voice opcodes]: https://discord.com/developers/docs/topics/opcodes-and-status-codes#voice-voice-opcodes
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum VoiceOpcode {
    /// Begin a voice websocket connection.
    Identify = 0,
    /// Select the voice protocol.
    SelectProtocol = 1,
    /// Completes the websocket handshake.
    Ready = 2,
    /// Keep the websocket connection alive.
    Heartbeat = 3,
    /// Describes the session.
    SessionDescription = 4,
    /// Indicates which users are speaking.
    Speaking = 5,
    /// Acknowledges a received client heartbeat.
    HeartbeatAck = 6,
    /// Resume a connection.
    Resume = 7,
    /// Time to wait between sending heartbeats, in milliseconds.
    Hello = 8,
    /// Acknowledges a successful session resume.
    Resumed = 9,
    /// A client has disconnected from the voice channel.
    ClientDisconnect = 13,
}

impl VoiceOpcode {
    pub fn from_num(num: u64) -> Option<Self> {
        match num {
            0 => Some(Self::Identify),
            1 => Some(Self::SelectProtocol),
            2 => Some(Self::Ready),
            3 => Some(Self::Heartbeat),
            4 => Some(Self::SessionDescription),
            5 => Some(Self::Speaking),
            6 => Some(Self::HeartbeatAck),
            7 => Some(Self::Resume),
            8 => Some(Self::Hello),
            9 => Some(Self::Resumed),
            13 => Some(Self::ClientDisconnect),
            _ => None,
        }
    }

    #[must_use]
    pub fn num(self) -> u64 {
        self as u64
    }
}

pub mod close_codes {
    /// The connection dropped without internet access; sent by some proxies in place of a real
    /// close code.
    pub const NO_INTERNET: u16 = 50;
    /// The gateway hit an unexpected error. Reconnect and resume.
    pub const UNEXPECTED_SERVER_ERROR: u16 = 1011;
    /// Unknown error; try reconnecting.
    pub const UNKNOWN_ERROR: u16 = 4000;
    /// An invalid gateway opcode, or an invalid payload for an opcode, was sent.
    pub const UNKNOWN_OPCODE: u16 = 4001;
    /// An invalid payload was sent.
    pub const DECODE_ERROR: u16 = 4002;
    /// A payload was sent prior to identifying.
    pub const NOT_AUTHENTICATED: u16 = 4003;
    /// The account token sent with the identify payload was incorrect.
    ///
    /// This is fatal.
    pub const AUTHENTICATION_FAILED: u16 = 4004;
    /// More than one identify payload was sent on the same session.
    pub const ALREADY_AUTHENTICATED: u16 = 4005;
    /// The sequence sent when resuming the session was invalid.
    pub const INVALID_SEQUENCE: u16 = 4007;
    /// Payloads were sent too quickly.
    pub const RATE_LIMITED: u16 = 4008;
    /// The session timed out. Reconnect and start a new one.
    pub const SESSION_TIMEOUT: u16 = 4009;
    /// An invalid shard was sent when identifying.
    ///
    /// This is fatal.
    pub const INVALID_SHARD: u16 = 4010;
    /// The session would have handled too many guilds; sharding is required.
    ///
    /// This is fatal.
    pub const SHARDING_REQUIRED: u16 = 4011;
    /// An invalid gateway version was sent.
    ///
    /// This is fatal.
    pub const INVALID_API_VERSION: u16 = 4012;
    /// An invalid gateway intents bitfield was sent.
    ///
    /// This is fatal.
    pub const INVALID_GATEWAY_INTENTS: u16 = 4013;
    /// A disallowed gateway intent was sent; the intent may not be enabled for the application.
    ///
    /// This is fatal.
    pub const DISALLOWED_GATEWAY_INTENTS: u16 = 4014;
}
