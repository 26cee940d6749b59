//! Constants used for sending voice data.

use std::time::Duration;

/// The voice sample rate in Hertz.
pub const SAMPLE_RATE: u32 = 48_000;
/// Number of audio frames/packets to be sent per second.
pub const AUDIO_FRAME_RATE: u32 = 50;
/// Length of one audio frame.
pub const FRAME_LEN: Duration = Duration::from_millis(1000 / AUDIO_FRAME_RATE as u64);
/// Number of samples in one complete frame of audio per channel, i.e. 20ms at 48kHz.
pub const MONO_FRAME_SIZE: usize = (SAMPLE_RATE / AUDIO_FRAME_RATE) as usize;
/// Number of individual samples in one complete frame of stereo audio.
pub const STEREO_FRAME_SIZE: usize = 2 * MONO_FRAME_SIZE;
/// Number of bytes in one complete frame of raw 16-bit stereo audio.
pub const PCM_FRAME_LEN: usize = 2 * STEREO_FRAME_SIZE;
/// Maximum number of bytes an encrypted voice packet may occupy.
pub const VOICE_PACKET_MAX: usize = 1460;
/// Length of the RTP header prefixed to every voice packet.
pub const RTP_HEADER_LEN: usize = 12;
/// The encryption mode this library speaks.
pub const CRYPTO_MODE: &str = "xsalsa20_poly1305";
/// How long to wait for the voice server to answer the IP discovery datagram.
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(2);
/// An Opus frame of pure silence, sent before un-setting the speaking flag so lost packets do
/// not leave interpolation artifacts.
pub const SILENT_FRAME: [u8; 3] = [0xf8, 0xff, 0xfe];
