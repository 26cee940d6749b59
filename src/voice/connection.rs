//! The voice session: websocket handshake, UDP IP discovery, and encrypted audio transport.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use futures::channel::mpsc::{self, UnboundedReceiver as Receiver, UnboundedSender as Sender};
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, trace, warn};
use url::Url;
use xsalsa20poly1305::aead::KeyInit;
use xsalsa20poly1305::XSalsa20Poly1305;

use crate::constants::VOICE_GATEWAY_VERSION;
use crate::gateway::WsClient;
use crate::internal::prelude::*;
use crate::internal::tokio::spawn_named;
use crate::model::event::VoiceEvent;
use crate::model::id::GuildId;
use crate::voice::constants::{
    CRYPTO_MODE,
    DISCOVERY_TIMEOUT,
    STEREO_FRAME_SIZE,
    VOICE_PACKET_MAX,
};
use crate::voice::packet::Packetizer;
use crate::voice::{payload, ConnectionInfo, SpeakingState, VoiceError};

/// How long the whole websocket handshake may take before it is abandoned.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
/// Heartbeats are sent at a fraction of the advertised interval.
const HEARTBEAT_RATIO: f64 = 0.75;
/// Missing this many heartbeat acks in a row tears the session down.
const ZOMBIE_THRESHOLD: u8 = 3;

/// An established voice connection to one guild.
///
/// Holds the UDP transport and the cipher negotiated during the handshake; a background task
/// keeps the voice websocket alive. All methods take `&self`, so the session is shared behind
/// an [`Arc`].
pub struct VoiceSession {
    info: ConnectionInfo,
    /// Taken out on disconnect so the transport closes without waiting for the last handle.
    udp: StdMutex<Option<Arc<UdpSocket>>>,
    ssrc: u32,
    ws_tx: Sender<Value>,
    packetizer: Mutex<Packetizer>,
    encoder: Mutex<audiopus::coder::Encoder>,
    speaking: AtomicBool,
    destroyed: Arc<AtomicBool>,
}

impl VoiceSession {
    /// Performs the full voice handshake and returns a ready-to-use session.
    ///
    /// The handshake waits for Hello and Ready, discovers the external address over UDP,
    /// selects the encryption protocol, and derives the cipher from the session description.
    ///
    /// # Errors
    ///
    /// Returns an error when any handshake stage fails or times out, or when the server does
    /// not offer the supported encryption mode.
    pub async fn connect(info: ConnectionInfo) -> Result<Arc<Self>> {
        let url = generate_url(&info.endpoint)?;
        debug!("[Voice] Connecting to {url}");

        let mut client = WsClient::connect(url).await?;

        let mut handshake = timeout(HANDSHAKE_TIMEOUT, await_hello_and_ready(&mut client, &info))
            .await
            .map_err(|_| VoiceError::ExpectedHandshake)??;

        if !handshake.modes.iter().any(|mode| mode == CRYPTO_MODE) {
            return Err(Error::Voice(VoiceError::VoiceModeUnavailable));
        }

        let udp = UdpSocket::bind("0.0.0.0:0").await?;
        udp.connect((handshake.ip.as_str(), handshake.port)).await?;

        let (address, port) = discover_external_address(&udp, handshake.ssrc).await?;
        info!("[Voice] Discovered external address {address}:{port}");

        client.send_json(&payload::build_select_protocol(&address, port)).await?;

        let secret_key = timeout(
            HANDSHAKE_TIMEOUT,
            await_session_description(&mut client, &mut handshake.heartbeat),
        )
        .await
        .map_err(|_| VoiceError::ExpectedHandshake)??;

        let cipher =
            XSalsa20Poly1305::new_from_slice(&secret_key).map_err(|_| VoiceError::KeyGen)?;

        let mut encoder = audiopus::coder::Encoder::new(
            audiopus::SampleRate::Hz48000,
            audiopus::Channels::Stereo,
            audiopus::Application::Audio,
        )
        .map_err(VoiceError::from)?;
        encoder
            .set_bitrate(audiopus::Bitrate::BitsPerSecond(128_000))
            .map_err(VoiceError::from)?;

        let (ws_tx, ws_rx) = mpsc::unbounded();
        let destroyed = Arc::new(AtomicBool::new(false));

        spawn_named(
            "voice::ws_runner",
            run_ws(client, ws_rx, handshake.heartbeat, Arc::clone(&destroyed)),
        );

        Ok(Arc::new(Self {
            info,
            udp: StdMutex::new(Some(Arc::new(udp))),
            ssrc: handshake.ssrc,
            ws_tx,
            packetizer: Mutex::new(Packetizer::new(cipher, handshake.ssrc)),
            encoder: Mutex::new(encoder),
            speaking: AtomicBool::new(false),
            destroyed,
        }))
    }

    /// The guild this session is connected to.
    #[must_use]
    pub fn guild_id(&self) -> GuildId {
        self.info.guild_id
    }

    /// The synchronization source the voice server assigned to this session.
    #[must_use]
    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    /// Whether the session is still usable.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.destroyed.load(Ordering::Relaxed)
    }

    /// Encrypts and sends one frame of audio.
    ///
    /// A frame is either 20ms of raw 16-bit stereo PCM at 48kHz, which is Opus-encoded here,
    /// or a single pre-encoded Opus packet sent as-is.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::Disconnected`] when the session has been torn down, or an
    /// encoding, encryption, or socket error.
    pub async fn send_audio(&self, frame: &[u8], is_opus: bool) -> Result<()> {
        if !self.is_active() {
            return Err(Error::Voice(VoiceError::Disconnected));
        }

        if frame.is_empty() {
            return Ok(());
        }

        let Some(udp) = self.udp() else {
            return Err(Error::Voice(VoiceError::Disconnected));
        };

        let opus_frame = if is_opus {
            frame.to_vec()
        } else {
            let mut pcm = [0i16; STEREO_FRAME_SIZE];
            let samples = (frame.len() / 2).min(STEREO_FRAME_SIZE);
            LittleEndian::read_i16_into(&frame[..samples * 2], &mut pcm[..samples]);

            let mut output = [0u8; VOICE_PACKET_MAX];
            let len = self
                .encoder
                .lock()
                .await
                .encode(&pcm, &mut output)
                .map_err(VoiceError::from)?;

            output[..len].to_vec()
        };

        self.set_speaking(true);

        let packet = self.packetizer.lock().await.seal(&opus_frame)?;
        udp.send(&packet).await?;

        Ok(())
    }

    fn udp(&self) -> Option<Arc<UdpSocket>> {
        self.udp.lock().ok().and_then(|guard| guard.clone())
    }

    /// Updates the speaking flag, notifying the voice gateway only when it changes.
    pub fn set_speaking(&self, speaking: bool) {
        if self.speaking.swap(speaking, Ordering::SeqCst) == speaking {
            return;
        }

        let state =
            if speaking { SpeakingState::MICROPHONE } else { SpeakingState::empty() };
        let _ = self.ws_tx.unbounded_send(payload::build_speaking(state));
    }

    /// Tears the session down, closing the UDP transport. Safe to call more than once.
    pub fn disconnect(&self) {
        if !self.destroyed.swap(true, Ordering::SeqCst) {
            info!("[Voice] Disconnecting from guild {}", self.info.guild_id);
        }

        if let Ok(mut guard) = self.udp.lock() {
            guard.take();
        }
    }
}

impl Drop for VoiceSession {
    fn drop(&mut self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }
}

/// Heartbeat pacing for the voice gateway.
///
/// Created the moment Hello arrives, so the connection is kept alive through the rest of the
/// handshake (UDP discovery and the wait for the session description) and not only once the
/// background task takes over.
struct VoiceHeartbeat {
    interval: Duration,
    next: Instant,
}

impl VoiceHeartbeat {
    fn new(interval_ms: u64) -> Self {
        let interval = Duration::from_millis((interval_ms as f64 * HEARTBEAT_RATIO) as u64);

        Self {
            interval,
            next: Instant::now() + interval,
        }
    }

    fn due(&self) -> bool {
        Instant::now() >= self.next
    }

    async fn send(&mut self, client: &mut WsClient) -> Result<()> {
        let nonce = rand::random::<u64>();
        client.send_json(&payload::build_heartbeat(nonce)).await?;
        self.next += self.interval;

        Ok(())
    }
}

struct Handshake {
    heartbeat: VoiceHeartbeat,
    ssrc: u32,
    ip: String,
    port: u16,
    modes: Vec<String>,
}

/// Waits for the server's Hello, identifies, and then waits for Ready. The two can arrive in
/// either order relative to each other on some servers, so both are collected before moving on.
/// Heartbeating starts as soon as the Hello delivers the interval.
async fn await_hello_and_ready(client: &mut WsClient, info: &ConnectionInfo) -> Result<Handshake> {
    let mut heartbeat: Option<VoiceHeartbeat> = None;
    let mut ready = None;

    while heartbeat.is_none() || ready.is_none() {
        if let Some(heartbeat) = heartbeat.as_mut() {
            if heartbeat.due() {
                heartbeat.send(client).await?;
            }
        }

        let Some(value) = client.recv_json().await? else { continue };

        match VoiceEvent::decode(value) {
            Ok(VoiceEvent::Hello {
                heartbeat_interval,
            }) => {
                client.send_json(&payload::build_identify(info)).await?;
                heartbeat = Some(VoiceHeartbeat::new(heartbeat_interval));
            },
            Ok(VoiceEvent::Ready {
                ssrc,
                ip,
                port,
                modes,
            }) => ready = Some((ssrc, ip, port, modes)),
            Ok(other) => trace!("[Voice] Ignoring frame during handshake: {other:?}"),
            Err(why) => warn!("[Voice] Undecodable frame during handshake: {why}"),
        }
    }

    match (heartbeat, ready) {
        (Some(heartbeat), Some((ssrc, ip, port, modes))) => Ok(Handshake {
            heartbeat,
            ssrc,
            ip,
            port,
            modes,
        }),
        _ => Err(Error::Voice(VoiceError::ExpectedHandshake)),
    }
}

async fn await_session_description(
    client: &mut WsClient,
    heartbeat: &mut VoiceHeartbeat,
) -> Result<Vec<u8>> {
    loop {
        if heartbeat.due() {
            heartbeat.send(client).await?;
        }

        let Some(value) = client.recv_json().await? else { continue };

        match VoiceEvent::decode(value) {
            Ok(VoiceEvent::SessionDescription {
                mode,
                secret_key,
            }) => {
                if mode != CRYPTO_MODE {
                    return Err(Error::Voice(VoiceError::VoiceModeUnavailable));
                }

                return Ok(secret_key);
            },
            Ok(other) => trace!("[Voice] Ignoring frame during handshake: {other:?}"),
            Err(why) => warn!("[Voice] Undecodable frame during handshake: {why}"),
        }
    }
}

/// Sends the IP discovery datagram and parses the server's answer.
async fn discover_external_address(udp: &UdpSocket, ssrc: u32) -> Result<(String, u16)> {
    udp.send(&discovery_request(ssrc)).await?;

    let mut response = [0u8; 74];
    let len = timeout(DISCOVERY_TIMEOUT, udp.recv(&mut response))
        .await
        .map_err(|_| VoiceError::DiscoveryTimeout)??;

    Ok(parse_discovery(&response[..len])?)
}

fn discovery_request(ssrc: u32) -> [u8; 70] {
    let mut request = [0u8; 70];
    BigEndian::write_u16(&mut request[0..2], 1);
    BigEndian::write_u16(&mut request[2..4], 70);
    BigEndian::write_u32(&mut request[4..8], ssrc);

    request
}

/// The discovery response carries the NUL-terminated external IP as ASCII starting at byte 4
/// and the external port as a big-endian u16 in the final two bytes.
fn parse_discovery(response: &[u8]) -> std::result::Result<(String, u16), VoiceError> {
    if response.len() < 70 {
        return Err(VoiceError::IllegalDiscoveryResponse);
    }

    let ip_field = &response[4..68];
    let nul = ip_field
        .iter()
        .position(|&b| b == 0)
        .ok_or(VoiceError::IllegalDiscoveryResponse)?;
    let ip = std::str::from_utf8(&ip_field[..nul])
        .map_err(|_| VoiceError::IllegalDiscoveryResponse)?
        .to_owned();

    if ip.is_empty() {
        return Err(VoiceError::IllegalDiscoveryResponse);
    }

    let port = BigEndian::read_u16(&response[68..70]);

    Ok((ip, port))
}

fn generate_url(endpoint: &str) -> Result<Url> {
    // Legacy voice endpoints advertise a bogus port 80.
    let endpoint = endpoint.strip_suffix(":80").unwrap_or(endpoint);

    Url::parse(&format!("wss://{endpoint}/?v={VOICE_GATEWAY_VERSION}"))
        .map_err(|_| Error::Voice(VoiceError::EndpointUrl))
}

/// Keeps the voice websocket alive: drains queued frames, heartbeats at the negotiated pace,
/// and tears the session down when the server stops acking or the connection drops.
async fn run_ws(
    mut client: WsClient,
    mut rx: Receiver<Value>,
    mut heartbeat: VoiceHeartbeat,
    destroyed: Arc<AtomicBool>,
) {
    let mut acks_missed: u8 = 0;

    loop {
        if destroyed.load(Ordering::Relaxed) {
            let _ = client.close(None).await;

            break;
        }

        loop {
            match rx.try_next() {
                Ok(Some(value)) => {
                    if let Err(why) = client.send_json(&value).await {
                        warn!("[Voice] Err sending frame: {why}");
                        destroyed.store(true, Ordering::SeqCst);
                    }
                },
                // The session handle was dropped.
                Ok(None) => {
                    destroyed.store(true, Ordering::SeqCst);

                    break;
                },
                Err(_) => break,
            }
        }

        if heartbeat.due() {
            if acks_missed >= ZOMBIE_THRESHOLD {
                warn!("[Voice] Gateway zombied; tearing session down");
                destroyed.store(true, Ordering::SeqCst);

                continue;
            }

            if let Err(why) = heartbeat.send(&mut client).await {
                warn!("[Voice] Err heartbeating: {why}");
                destroyed.store(true, Ordering::SeqCst);

                continue;
            }

            acks_missed += 1;
        }

        match client.recv_json().await {
            Ok(Some(value)) => match VoiceEvent::decode(value) {
                Ok(VoiceEvent::HeartbeatAck(_)) => acks_missed = 0,
                Ok(event) => trace!("[Voice] Received {event:?}"),
                Err(why) => warn!("[Voice] Undecodable frame: {why}"),
            },
            Ok(None) => {},
            Err(why) => {
                debug!("[Voice] Gateway connection ended: {why}");
                destroyed.store(true, Ordering::SeqCst);
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::id::UserId;

    fn info() -> ConnectionInfo {
        ConnectionInfo {
            guild_id: GuildId::new(81384788765712384),
            user_id: UserId::new(183558831338896385),
            session_id: "d4efdd52c3f71f73ab403e2854a6f0e3".to_owned(),
            token: "8b87a7c81b1bf7c6".to_owned(),
            endpoint: "us-west42.discord.media:443".to_owned(),
        }
    }

    fn session_over(udp: UdpSocket) -> VoiceSession {
        let cipher = XSalsa20Poly1305::new_from_slice(&[7u8; 32]).unwrap();
        let encoder = audiopus::coder::Encoder::new(
            audiopus::SampleRate::Hz48000,
            audiopus::Channels::Stereo,
            audiopus::Application::Audio,
        )
        .unwrap();
        let (ws_tx, _ws_rx) = mpsc::unbounded();

        VoiceSession {
            info: info(),
            udp: StdMutex::new(Some(Arc::new(udp))),
            ssrc: 1,
            ws_tx,
            packetizer: Mutex::new(Packetizer::new(cipher, 1)),
            encoder: Mutex::new(encoder),
            speaking: AtomicBool::new(false),
            destroyed: Arc::new(AtomicBool::new(false)),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeating_paces_from_the_hello() {
        let heartbeat = VoiceHeartbeat::new(40_000);

        // Sent at three quarters of the advertised interval, first one a full period after
        // the Hello that delivered it.
        assert_eq!(heartbeat.interval, Duration::from_secs(30));
        assert!(!heartbeat.due());

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(heartbeat.due());
    }

    #[tokio::test]
    async fn disconnect_closes_the_udp_transport() {
        let udp = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let session = session_over(udp);

        session.disconnect();

        assert!(!session.is_active());
        assert!(session.udp().is_none());
        assert!(matches!(
            session.send_audio(&[0u8; 10], true).await,
            Err(Error::Voice(VoiceError::Disconnected)),
        ));

        // A second disconnect is a no-op.
        session.disconnect();
    }

    #[test]
    fn discovery_request_layout() {
        let request = discovery_request(0x0102_0304);

        assert_eq!(&request[0..2], &[0, 1]);
        assert_eq!(&request[2..4], &[0, 70]);
        assert_eq!(&request[4..8], &[1, 2, 3, 4]);
        assert!(request[8..].iter().all(|&b| b == 0));
    }

    #[test]
    fn parse_discovery_reads_ip_and_port() {
        let mut response = [0u8; 70];
        response[4..13].copy_from_slice(b"9.8.7.6\0\0");
        BigEndian::write_u16(&mut response[68..70], 6000);

        let (ip, port) = parse_discovery(&response).unwrap();

        assert_eq!(ip, "9.8.7.6");
        assert_eq!(port, 6000);
    }

    #[test]
    fn parse_discovery_rejects_short_response() {
        assert!(matches!(
            parse_discovery(&[0u8; 69]),
            Err(VoiceError::IllegalDiscoveryResponse)
        ));
    }

    #[test]
    fn parse_discovery_rejects_empty_address() {
        let response = [0u8; 70];

        assert!(matches!(
            parse_discovery(&response),
            Err(VoiceError::IllegalDiscoveryResponse)
        ));
    }

    #[test]
    fn url_strips_legacy_port() {
        let url = generate_url("us-west42.discord.media:80").unwrap();

        assert_eq!(url.as_str(), "wss://us-west42.discord.media/?v=4");
    }

    #[test]
    fn url_keeps_real_ports() {
        let url = generate_url("us-west42.discord.media:443").unwrap();

        assert_eq!(url.as_str(), "wss://us-west42.discord.media/?v=4");
    }
}
