//! The participant-side protocol state machine: join bookkeeping, handshake
//! orchestration, per-round share emission, and result decoding. Pure and
//! synchronous — `comms` drives it from the websocket, `cli` drives it from
//! stdin; neither owns protocol state directly.

use std::collections::{HashMap, VecDeque};

use dcnet_common::types::{ClientMessage, ServerMessage};
use dcnet_common::WireUint;
use num_bigint::BigUint;
use rand::{CryptoRng, Rng, RngCore};
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::handshake::HandshakeState;
use crate::round::{self, ShareParams};

/// Things the engine wants the surrounding shell (CLI, logs) to know about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Joined {
        active_participants: Vec<String>,
    },
    ActiveParticipantsChanged(Vec<String>),
    HandshakeComplete,
    OwnMessageDelivered(String),
    PeerMessage(String),
    CollisionBackoff {
        rounds: u64,
    },
    Dropped {
        reason: String,
    },
}

pub struct ParticipantEngine {
    group: String,
    me: String,
    roster: Vec<String>,
    active_participants: Vec<String>,
    private_key: RsaPrivateKey,
    peer_public_keys: HashMap<String, RsaPublicKey>,
    handshake: Option<HandshakeState>,
    secrets_generated_sent: bool,

    send_queue: VecDeque<String>,
    collision_timeout: u64,
    sent_messages: HashMap<u64, BigUint>,
}

impl ParticipantEngine {
    pub fn new(
        group: String,
        me: String,
        roster: Vec<String>,
        private_key: RsaPrivateKey,
        peer_public_keys: HashMap<String, RsaPublicKey>,
    ) -> Self {
        Self {
            group,
            me,
            roster,
            active_participants: Vec::new(),
            private_key,
            peer_public_keys,
            handshake: None,
            secrets_generated_sent: false,
            send_queue: VecDeque::new(),
            collision_timeout: 0,
            sent_messages: HashMap::new(),
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn me(&self) -> &str {
        &self.me
    }

    /// The initial message to send once connected.
    pub fn join_message(&self, password: String) -> ClientMessage {
        ClientMessage::Join {
            group: self.group.clone(),
            participant: self.me.clone(),
            password,
        }
    }

    /// Queues plaintext for the next available round slot.
    pub fn queue_message(&mut self, text: String) {
        self.send_queue.push_back(text);
    }

    fn peers(&self) -> Vec<String> {
        self.roster.iter().filter(|p| **p != self.me).cloned().collect()
    }

    /// Dispatches one inbound coordinator message, returning whatever
    /// outbound replies and UI-facing events it produced.
    pub fn handle(
        &mut self,
        message: ServerMessage,
        rng: &mut (impl RngCore + CryptoRng),
    ) -> (Vec<ClientMessage>, Vec<EngineEvent>) {
        match message {
            ServerMessage::Success {
                active_participants,
                all_participants,
            } => {
                let mut events = Vec::new();
                if let Some(all) = all_participants {
                    self.roster = all;
                }
                if let Some(active) = active_participants {
                    self.active_participants = active.clone();
                    events.push(EngineEvent::Joined {
                        active_participants: active,
                    });
                }
                (Vec::new(), events)
            }
            ServerMessage::Error { description } => {
                (Vec::new(), vec![EngineEvent::Dropped { reason: description }])
            }
            ServerMessage::ActiveParticipantUpdate { active_participants } => {
                self.active_participants = active_participants.clone();
                (
                    Vec::new(),
                    vec![EngineEvent::ActiveParticipantsChanged(active_participants)],
                )
            }
            ServerMessage::GenerateSecrets {} => (self.start_handshake_window(rng), Vec::new()),
            ServerMessage::ReceiveFromPeer { message, .. } => {
                let text = message.as_str().map(str::to_string).unwrap_or_default();
                (Vec::new(), vec![EngineEvent::PeerMessage(text)])
            }
            ServerMessage::ReceiveFromPeerSecretHandshake { from, message } => {
                self.accept_handshake_envelope(&from, &message)
            }
            ServerMessage::AnonymousBroadcastRequest { index } => {
                (vec![self.build_round_share(index, rng)], Vec::new())
            }
            ServerMessage::AnonymousBroadcast { index, messages } => {
                let (reply, events) = self.decode_round(index, messages, rng);
                (reply.into_iter().collect(), events)
            }
        }
    }

    fn start_handshake_window(&mut self, rng: &mut (impl RngCore + CryptoRng)) -> Vec<ClientMessage> {
        self.secrets_generated_sent = false;
        match &mut self.handshake {
            Some(state) => state.restart(rng),
            None => {
                self.handshake = Some(HandshakeState::begin(
                    self.private_key.clone(),
                    self.peer_public_keys.clone(),
                    rng,
                ));
            }
        }
        let handshake = self.handshake.as_mut().expect("just initialized");
        self.peers()
            .into_iter()
            .filter_map(|peer| match handshake.outbound_envelope(&peer) {
                Ok(envelope) => Some(ClientMessage::SendToPeerSecretHandshake {
                    participant: peer,
                    message: envelope,
                }),
                Err(e) => {
                    tracing::warn!(%peer, error = %e, "failed to seal handshake envelope");
                    None
                }
            })
            .collect()
    }

    fn accept_handshake_envelope(
        &mut self,
        from: &str,
        envelope: &dcnet_common::HandshakeEnvelope,
    ) -> (Vec<ClientMessage>, Vec<EngineEvent>) {
        let Some(handshake) = self.handshake.as_mut() else {
            return (Vec::new(), Vec::new());
        };
        if let Err(e) = handshake.accept_inbound(from, envelope) {
            tracing::warn!(%from, error = %e, "dropping handshake envelope");
            return (Vec::new(), Vec::new());
        }

        let peers = self.peers();
        if !self.secrets_generated_sent && handshake.is_complete(&peers) {
            self.secrets_generated_sent = true;
            return (
                vec![ClientMessage::SecretsGenerated {}],
                vec![EngineEvent::HandshakeComplete],
            );
        }
        (Vec::new(), Vec::new())
    }

    fn share_params(&self) -> ShareParams {
        let n = self.handshake.as_ref().map(|h| h.n_secrets()).unwrap_or(0);
        ShareParams::new(n)
    }

    fn build_round_share(&mut self, index: u64, rng: &mut (impl RngCore + CryptoRng)) -> ClientMessage {
        let params = self.share_params();

        let attempting_send = !self.send_queue.is_empty() && self.collision_timeout == 0;
        let raw = if attempting_send {
            round::encode_message(self.send_queue.front().expect("checked non-empty"))
        } else {
            BigUint::from(0u8)
        };
        let padded = round::pad_message(raw, params, rng);
        // Only record a real attempt. Recording silent rounds too would make
        // every round we stayed quiet look, from decode_round's point of
        // view, like a send that got garbled the moment anyone else talked.
        if attempting_send {
            self.sent_messages.insert(index, padded.clone());
        }
        if self.collision_timeout > 0 {
            self.collision_timeout -= 1;
        }

        let mut masked = padded;
        if let Some(handshake) = &self.handshake {
            for secret in handshake.secrets().values() {
                let mask = dcnet_common::prg::derive_mask(secret, index, params.share_width());
                masked = (WireUint(masked) ^ mask).into();
            }
        }

        ClientMessage::AnonymousBroadcast {
            index,
            message: masked.into(),
        }
    }

    fn decode_round(
        &mut self,
        index: u64,
        messages: HashMap<String, WireUint>,
        rng: &mut (impl RngCore + CryptoRng),
    ) -> (Option<ClientMessage>, Vec<EngineEvent>) {
        use num_traits::Zero;

        let params = self.share_params();
        let expected_active = self.peers().len();
        if messages.len().saturating_sub(1) != expected_active {
            tracing::error!(
                index,
                got = messages.len(),
                expected = expected_active + 1,
                "round slot missing a roster member; abandoning decode"
            );
            return (None, Vec::new());
        }

        let aggregated = messages
            .into_values()
            .fold(BigUint::from(0u8), |acc, v| acc ^ BigUint::from(v));

        if aggregated.is_zero() {
            return (None, Vec::new());
        }

        if let Some(sent) = self.sent_messages.get(&index).cloned() {
            if sent == aggregated {
                self.send_queue.pop_front();
                let text = round::decode_message(&round::strip_padding(&sent, params).unwrap_or(sent));
                (None, vec![EngineEvent::OwnMessageDelivered(text)])
            } else {
                self.enter_collision_backoff(rng)
            }
        } else {
            match round::strip_padding(&aggregated, params) {
                Some(payload) => (None, vec![EngineEvent::PeerMessage(round::decode_message(&payload))]),
                None => (None, Vec::new()),
            }
        }
    }

    fn enter_collision_backoff(
        &mut self,
        rng: &mut (impl RngCore + CryptoRng),
    ) -> (Option<ClientMessage>, Vec<EngineEvent>) {
        let params = self.share_params();
        let p = params.padding_width().max(1);
        let rounds = rng.gen_range(0..p);
        self.collision_timeout = rounds;
        (None, vec![EngineEvent::CollisionBackoff { rounds }])
    }
}
