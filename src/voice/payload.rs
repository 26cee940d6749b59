//! Builders for the frames sent over a voice gateway connection.

use crate::constants::VoiceOpcode;
use crate::internal::prelude::*;
use crate::voice::constants::CRYPTO_MODE;
use crate::voice::{ConnectionInfo, SpeakingState};

pub fn build_identify(info: &ConnectionInfo) -> Value {
    json!({
        "op": VoiceOpcode::Identify.num(),
        "d": {
            "server_id": info.guild_id.to_string(),
            "session_id": &info.session_id,
            "token": &info.token,
            "user_id": info.user_id.to_string(),
        },
    })
}

pub fn build_heartbeat(nonce: u64) -> Value {
    json!({
        "op": VoiceOpcode::Heartbeat.num(),
        "d": nonce,
    })
}

pub fn build_select_protocol(address: &str, port: u16) -> Value {
    json!({
        "op": VoiceOpcode::SelectProtocol.num(),
        "d": {
            "protocol": "udp",
            "data": {
                "address": address,
                "port": port,
                "mode": CRYPTO_MODE,
            },
        },
    })
}

pub fn build_speaking(state: SpeakingState) -> Value {
    json!({
        "op": VoiceOpcode::Speaking.num(),
        "d": {
            "delay": 0,
            "speaking": state.bits(),
        },
    })
}

pub fn build_resume(info: &ConnectionInfo) -> Value {
    json!({
        "op": VoiceOpcode::Resume.num(),
        "d": {
            "server_id": info.guild_id.to_string(),
            "session_id": &info.session_id,
            "token": &info.token,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::id::{GuildId, UserId};

    fn info() -> ConnectionInfo {
        ConnectionInfo {
            guild_id: GuildId::new(81384788765712384),
            user_id: UserId::new(183558831338896385),
            session_id: "d4efdd52c3f71f73ab403e2854a6f0e3".to_owned(),
            token: "8b87a7c81b1bf7c6".to_owned(),
            endpoint: "us-west42.discord.media:443".to_owned(),
        }
    }

    #[test]
    fn identify_sends_ids_as_strings() {
        let value = build_identify(&info());

        assert_eq!(value["op"], 0);
        assert_eq!(value["d"]["server_id"], "81384788765712384");
        assert_eq!(value["d"]["user_id"], "183558831338896385");
        assert_eq!(value["d"]["session_id"], "d4efdd52c3f71f73ab403e2854a6f0e3");
    }

    #[test]
    fn select_protocol_carries_discovered_address() {
        let value = build_select_protocol("9.8.7.6", 6000);

        assert_eq!(value["op"], 1);
        assert_eq!(value["d"]["protocol"], "udp");
        assert_eq!(value["d"]["data"]["address"], "9.8.7.6");
        assert_eq!(value["d"]["data"]["port"], 6000);
        assert_eq!(value["d"]["data"]["mode"], "xsalsa20_poly1305");
    }

    #[test]
    fn speaking_sends_the_state_bits() {
        let value = build_speaking(SpeakingState::MICROPHONE);
        assert_eq!(value["op"], 5);
        assert_eq!(value["d"]["speaking"], 1);
        assert_eq!(value["d"]["delay"], 0);

        let value = build_speaking(SpeakingState::empty());
        assert_eq!(value["d"]["speaking"], 0);
    }
}
