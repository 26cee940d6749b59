//! The gateway frame envelope.

use crate::constants::Opcode;
use crate::gateway::GatewayError;
use crate::internal::prelude::*;

/// A single gateway frame, in either direction.
///
/// Every frame carries an opcode and a payload; dispatch frames additionally carry a sequence
/// number and an event name. The payload is kept as a raw [`Value`], since only control frames
/// are interpreted by the library itself.
#[derive(Clone, Debug)]
pub struct Payload {
    /// The frame's opcode.
    pub op: Opcode,
    /// The inner payload of the frame.
    pub d: Value,
    /// The sequence number, present on dispatch frames.
    pub s: Option<u64>,
    /// The event name, present on dispatch frames.
    pub t: Option<String>,
}

impl Payload {
    #[must_use]
    pub fn new(op: Opcode, d: Value) -> Self {
        Self {
            op,
            d,
            s: None,
            t: None,
        }
    }

    /// Decodes a frame received over the gateway.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if `text` is not valid JSON, and
    /// [`GatewayError::MalformedPayload`] if the envelope is not an object or its opcode is
    /// absent or unrecognized.
    pub fn decode(text: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(text)?)
    }

    /// Decodes a frame from an already-parsed JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::MalformedPayload`] under the same conditions as [`Self::decode`].
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut map) = value else {
            return Err(Error::Gateway(GatewayError::MalformedPayload));
        };

        let op = map
            .get("op")
            .and_then(Value::as_u64)
            .and_then(Opcode::from_num)
            .ok_or(Error::Gateway(GatewayError::MalformedPayload))?;

        let s = map.get("s").and_then(Value::as_u64);
        let t = map.get("t").and_then(Value::as_str).map(ToOwned::to_owned);
        let d = map.remove("d").unwrap_or(Value::Null);

        Ok(Self {
            op,
            d,
            s,
            t,
        })
    }

    /// Encodes the frame for sending. Outbound frames never carry `s` or `t` fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the payload cannot be serialized.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(&json!({
            "op": self.op.num(),
            "d": self.d,
        }))
        .map_err(From::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_dispatch_envelope() {
        let text = r#"{"op":0,"s":42,"t":"MESSAGE_CREATE","d":{"content":"hi"}}"#;
        let payload = Payload::decode(text).unwrap();

        assert_eq!(payload.op, Opcode::Dispatch);
        assert_eq!(payload.s, Some(42));
        assert_eq!(payload.t.as_deref(), Some("MESSAGE_CREATE"));
        assert_eq!(payload.d["content"], "hi");
    }

    #[test]
    fn decodes_control_envelope_without_seq() {
        let payload = Payload::decode(r#"{"op":11,"d":null}"#).unwrap();

        assert_eq!(payload.op, Opcode::HeartbeatAck);
        assert_eq!(payload.s, None);
        assert_eq!(payload.t, None);
        assert_eq!(payload.d, Value::Null);
    }

    #[test]
    fn rejects_missing_opcode() {
        let err = Payload::decode(r#"{"d":{}}"#).unwrap_err();
        assert!(matches!(err, Error::Gateway(GatewayError::MalformedPayload)));
    }

    #[test]
    fn rejects_unknown_opcode() {
        let err = Payload::decode(r#"{"op":255,"d":{}}"#).unwrap_err();
        assert!(matches!(err, Error::Gateway(GatewayError::MalformedPayload)));
    }

    #[test]
    fn rejects_non_object_envelope() {
        let err = Payload::decode("[1,2,3]").unwrap_err();
        assert!(matches!(err, Error::Gateway(GatewayError::MalformedPayload)));
    }

    #[test]
    fn encode_omits_sequence_and_name() {
        let mut payload = Payload::new(Opcode::Heartbeat, json!(212));
        payload.s = Some(7);
        payload.t = Some("IGNORED".to_owned());

        let encoded = payload.encode().unwrap();
        let value: Value = serde_json::from_str(&encoded).unwrap();

        assert_eq!(value["op"], 1);
        assert_eq!(value["d"], 212);
        assert!(value.get("s").is_none());
        assert!(value.get("t").is_none());
    }
}
