//! Gateway and voice gateway control events.

use crate::constants::{Opcode, VoiceOpcode};
use crate::internal::prelude::*;
use crate::model::payload::Payload;

/// A control event over the gateway connection.
///
/// Dispatch payloads are not interpreted here; they keep their raw event name and [`Value`].
#[derive(Clone, Debug)]
pub enum GatewayEvent {
    /// An event was dispatched. Carries the sequence number, event name, and raw payload.
    Dispatch {
        seq: u64,
        kind: String,
        data: Value,
    },
    /// A heartbeat was requested by the gateway.
    Heartbeat(u64),
    /// The gateway asks the client to reconnect (and resume) immediately.
    Reconnect,
    /// The session was invalidated; the flag indicates whether it is resumable.
    InvalidateSession(bool),
    /// Sent after connecting. Carries the heartbeat interval in milliseconds.
    Hello(u64),
    /// Acknowledgement of a sent heartbeat.
    HeartbeatAck,
}

impl GatewayEvent {
    /// Maps a decoded [`Payload`] onto a control event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] when a frame is missing a field its opcode requires, or when
    /// the opcode is one the gateway should never send.
    pub fn from_payload(payload: Payload) -> Result<Self> {
        Ok(match payload.op {
            Opcode::Dispatch => {
                let seq = payload
                    .s
                    .ok_or_else(|| Error::Decode("expected dispatch sequence", payload.d.clone()))?;
                let kind = payload
                    .t
                    .ok_or_else(|| Error::Decode("expected dispatch event name", payload.d.clone()))?;

                Self::Dispatch {
                    seq,
                    kind,
                    data: payload.d,
                }
            },
            Opcode::Heartbeat => {
                Self::Heartbeat(payload.d.as_u64().unwrap_or_default())
            },
            Opcode::Reconnect => Self::Reconnect,
            Opcode::InvalidSession => {
                Self::InvalidateSession(payload.d.as_bool().unwrap_or(false))
            },
            Opcode::Hello => {
                let interval = payload.d.get("heartbeat_interval").and_then(interval_ms);

                match interval {
                    Some(interval) => Self::Hello(interval),
                    None => return Err(Error::Decode("expected heartbeat_interval", payload.d)),
                }
            },
            Opcode::HeartbeatAck => Self::HeartbeatAck,
            _ => return Err(Error::Decode("unexpected opcode", payload.d)),
        })
    }
}

/// A control event over a voice gateway connection.
#[derive(Clone, Debug)]
pub enum VoiceEvent {
    /// Time to wait between sending heartbeats, in milliseconds.
    Hello {
        heartbeat_interval: u64,
    },
    /// The voice websocket handshake completed: where and how to send audio.
    Ready {
        ssrc: u32,
        ip: String,
        port: u16,
        modes: Vec<String>,
    },
    /// The encryption mode and secret key for the session.
    SessionDescription {
        mode: String,
        secret_key: Vec<u8>,
    },
    /// Acknowledgement of a sent heartbeat, echoing its nonce.
    HeartbeatAck(u64),
    /// Acknowledgement of a successful session resume.
    Resumed,
    /// Any other frame the library does not act on (speaking updates, client disconnects, ...).
    Unknown(VoiceOpcode, Value),
}

impl VoiceEvent {
    /// Decodes a voice gateway frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] when the opcode is missing or unknown, or a required field of
    /// an interpreted frame is absent.
    pub fn decode(value: Value) -> Result<Self> {
        let op = value
            .get("op")
            .and_then(Value::as_u64)
            .and_then(VoiceOpcode::from_num)
            .ok_or_else(|| Error::Decode("unexpected voice opcode", value.clone()))?;

        let d = value.get("d").cloned().unwrap_or(Value::Null);

        Ok(match op {
            VoiceOpcode::Hello => {
                let interval = d.get("heartbeat_interval").and_then(interval_ms);

                match interval {
                    Some(heartbeat_interval) => Self::Hello {
                        heartbeat_interval,
                    },
                    None => return Err(Error::Decode("expected heartbeat_interval", d)),
                }
            },
            VoiceOpcode::Ready => {
                let ssrc = d.get("ssrc").and_then(Value::as_u64);
                let ip = d.get("ip").and_then(Value::as_str);
                let port = d.get("port").and_then(Value::as_u64);

                let (Some(ssrc), Some(ip), Some(port)) = (ssrc, ip, port) else {
                    return Err(Error::Decode("invalid voice ready payload", d));
                };

                let modes = d
                    .get("modes")
                    .and_then(Value::as_array)
                    .map(|modes| {
                        modes.iter().filter_map(Value::as_str).map(ToOwned::to_owned).collect()
                    })
                    .unwrap_or_default();

                Self::Ready {
                    ssrc: ssrc as u32,
                    ip: ip.to_owned(),
                    port: port as u16,
                    modes,
                }
            },
            VoiceOpcode::SessionDescription => {
                let mode = d
                    .get("mode")
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::Decode("expected encryption mode", d.clone()))?
                    .to_owned();

                let secret_key = d
                    .get("secret_key")
                    .and_then(Value::as_array)
                    .ok_or_else(|| Error::Decode("expected secret_key", d.clone()))?
                    .iter()
                    .filter_map(Value::as_u64)
                    .map(|b| b as u8)
                    .collect();

                Self::SessionDescription {
                    mode,
                    secret_key,
                }
            },
            VoiceOpcode::HeartbeatAck => Self::HeartbeatAck(d.as_u64().unwrap_or_default()),
            VoiceOpcode::Resumed => Self::Resumed,
            other => Self::Unknown(other, d),
        })
    }
}

/// Heartbeat intervals are documented as integers but have been observed as floats.
fn interval_ms(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| value.as_f64().map(|f| f as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_carries_interval() {
        let payload = Payload::decode(r#"{"op":10,"d":{"heartbeat_interval":41250}}"#).unwrap();

        match GatewayEvent::from_payload(payload).unwrap() {
            GatewayEvent::Hello(interval) => assert_eq!(interval, 41_250),
            other => panic!("expected hello: {other:?}"),
        }
    }

    #[test]
    fn hello_accepts_float_interval() {
        let payload = Payload::decode(r#"{"op":10,"d":{"heartbeat_interval":41250.0}}"#).unwrap();

        match GatewayEvent::from_payload(payload).unwrap() {
            GatewayEvent::Hello(interval) => assert_eq!(interval, 41_250),
            other => panic!("expected hello: {other:?}"),
        }
    }

    #[test]
    fn dispatch_keeps_payload_opaque() {
        let text = r#"{"op":0,"s":3,"t":"GUILD_CREATE","d":{"id":"1","unknown_field":[1]}}"#;
        let payload = Payload::decode(text).unwrap();

        match GatewayEvent::from_payload(payload).unwrap() {
            GatewayEvent::Dispatch {
                seq,
                kind,
                data,
            } => {
                assert_eq!(seq, 3);
                assert_eq!(kind, "GUILD_CREATE");
                assert_eq!(data["unknown_field"][0], 1);
            },
            other => panic!("expected dispatch: {other:?}"),
        }
    }

    #[test]
    fn dispatch_without_sequence_is_a_decode_error() {
        let payload = Payload::decode(r#"{"op":0,"t":"READY","d":{}}"#).unwrap();
        assert!(GatewayEvent::from_payload(payload).is_err());
    }

    #[test]
    fn invalid_session_defaults_to_not_resumable() {
        let payload = Payload::decode(r#"{"op":9,"d":null}"#).unwrap();

        match GatewayEvent::from_payload(payload).unwrap() {
            GatewayEvent::InvalidateSession(resumable) => assert!(!resumable),
            other => panic!("expected invalidate session: {other:?}"),
        }
    }

    #[test]
    fn voice_ready_decodes() {
        let value = json!({
            "op": 2,
            "d": {
                "ssrc": 1234,
                "ip": "127.0.0.1",
                "port": 1234,
                "modes": ["xsalsa20_poly1305", "xsalsa20_poly1305_suffix"],
            },
        });

        match VoiceEvent::decode(value).unwrap() {
            VoiceEvent::Ready {
                ssrc,
                ip,
                port,
                modes,
            } => {
                assert_eq!(ssrc, 1234);
                assert_eq!(ip, "127.0.0.1");
                assert_eq!(port, 1234);
                assert!(modes.iter().any(|m| m == "xsalsa20_poly1305"));
            },
            other => panic!("expected ready: {other:?}"),
        }
    }

    #[test]
    fn voice_session_description_decodes_key() {
        let key: Vec<u8> = (0..32).collect();
        let value = json!({
            "op": 4,
            "d": {
                "mode": "xsalsa20_poly1305",
                "secret_key": key,
            },
        });

        match VoiceEvent::decode(value).unwrap() {
            VoiceEvent::SessionDescription {
                mode,
                secret_key,
            } => {
                assert_eq!(mode, "xsalsa20_poly1305");
                assert_eq!(secret_key, (0..32).collect::<Vec<u8>>());
            },
            other => panic!("expected session description: {other:?}"),
        }
    }
}
