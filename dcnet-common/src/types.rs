//! Wire schemas for the coordinator/participant protocol. Every message
//! is a UTF-8 JSON object carrying a `type` discriminator; `serde`'s
//! internally tagged representation gives us that for free.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::bigint::WireUint;

/// A hex-encoded opaque byte string, used for the handshake envelope fields.
/// Kept as a newtype (rather than bare `Vec<u8>`) so callers can't
/// accidentally pass a field through the wrong encoding.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct HexBytes(#[serde(with = "hex::serde")] pub Vec<u8>);

impl HexBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// The end-to-end encrypted handshake payload relayed, opaque, by the
/// coordinator. All fields are hex strings on the wire.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HandshakeEnvelope {
    pub session_key: HexBytes,
    pub ciphertext: HexBytes,
    pub cipher_nonce: HexBytes,
    pub tag: HexBytes,
}

/// Messages sent by a participant to the coordinator.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Join {
        group: String,
        participant: String,
        password: String,
    },
    SendToPeer {
        participant: String,
        message: serde_json::Value,
    },
    SendToPeerSecretHandshake {
        participant: String,
        message: HandshakeEnvelope,
    },
    SecretsGenerated {},
    AnonymousBroadcast {
        index: u64,
        message: WireUint,
    },
}

/// Messages sent by the coordinator to a participant.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Success {
        #[serde(skip_serializing_if = "Option::is_none")]
        active_participants: Option<Vec<String>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        all_participants: Option<Vec<String>>,
    },
    Error {
        description: String,
    },
    ActiveParticipantUpdate {
        active_participants: Vec<String>,
    },
    GenerateSecrets {},
    ReceiveFromPeer {
        from: String,
        message: serde_json::Value,
    },
    ReceiveFromPeerSecretHandshake {
        from: String,
        message: HandshakeEnvelope,
    },
    AnonymousBroadcastRequest {
        index: u64,
    },
    AnonymousBroadcast {
        index: u64,
        messages: HashMap<String, WireUint>,
    },
}

impl ServerMessage {
    pub fn success() -> Self {
        ServerMessage::Success {
            active_participants: None,
            all_participants: None,
        }
    }

    pub fn error(description: impl Into<String>) -> Self {
        ServerMessage::Error {
            description: description.into(),
        }
    }
}
