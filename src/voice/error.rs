use std::error::Error as StdError;
use std::fmt;

/// An error returned from the voice module.
#[derive(Debug)]
#[non_exhaustive]
pub enum VoiceError {
    /// An error occurred while encoding with Opus.
    Opus(audiopus::Error),
    /// The voice server handed out an endpoint that is not a valid URL.
    EndpointUrl,
    /// An indicator that an endpoint does not exist.
    ExpectedHandshake,
    /// No response to the IP discovery datagram arrived in time.
    DiscoveryTimeout,
    /// The IP discovery response did not carry a readable address and port.
    IllegalDiscoveryResponse,
    /// The secret key from the session description could not be used to build a cipher.
    KeyGen,
    /// Sealing a voice packet failed.
    Encryption,
    /// The voice server does not support the encryption mode this library speaks.
    VoiceModeUnavailable,
    /// The session was torn down while something was still using it.
    Disconnected,
}

impl fmt::Display for VoiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Opus(inner) => fmt::Display::fmt(&inner, f),
            Self::EndpointUrl => f.write_str("Invalid voice endpoint URL"),
            Self::ExpectedHandshake => f.write_str("Expected a Hello and a Ready during handshake"),
            Self::DiscoveryTimeout => f.write_str("IP discovery response timed out"),
            Self::IllegalDiscoveryResponse => f.write_str("IP discovery response was malformed"),
            Self::KeyGen => f.write_str("Key generation failed"),
            Self::Encryption => f.write_str("Encryption of an audio packet failed"),
            Self::VoiceModeUnavailable => f.write_str("Encryption mode unavailable"),
            Self::Disconnected => f.write_str("The voice session was disconnected"),
        }
    }
}

impl StdError for VoiceError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Opus(inner) => Some(inner),
            _ => None,
        }
    }
}

impl From<audiopus::Error> for VoiceError {
    fn from(e: audiopus::Error) -> Self {
        Self::Opus(e)
    }
}
