//! Pairwise secret establishment: drawing this participant's nonce for the
//! current handshake window, sealing it for each peer, and folding inbound
//! envelopes into the shared secret table.

use std::collections::{HashMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};

use dcnet_common::consts::HANDSHAKE_FRESHNESS_SECONDS;
use dcnet_common::crypto::{self, HandshakePayload};
use dcnet_common::{Error, HandshakeEnvelope, HexBytes, Result};
use num_bigint::{BigUint, RandBigInt};
use rand::{CryptoRng, RngCore};
use rsa::{RsaPrivateKey, RsaPublicKey};

const SEED_BITS: u64 = 256;

/// Tracks, for each peer, how many directions of the handshake have
/// completed: 0 = none, 1 = one direction, 2 = both confirmed.
pub struct HandshakeState {
    private_key: RsaPrivateKey,
    peer_keys: HashMap<String, RsaPublicKey>,
    own_nonce: BigUint,
    secrets: HashMap<String, BigUint>,
    progress: HashMap<String, u8>,
    received_from: HashSet<String>,
    sent_to: HashSet<String>,
}

impl HandshakeState {
    /// Starts a fresh handshake window: draws this participant's nonce once
    /// and reuses it for every peer in the roster during that window.
    pub fn begin(
        private_key: RsaPrivateKey,
        peer_keys: HashMap<String, RsaPublicKey>,
        rng: &mut (impl RngCore + CryptoRng),
    ) -> Self {
        let own_nonce = rng.gen_biguint(SEED_BITS);
        Self {
            private_key,
            peer_keys,
            own_nonce,
            secrets: HashMap::new(),
            progress: HashMap::new(),
            received_from: HashSet::new(),
            sent_to: HashSet::new(),
        }
    }

    /// Restarts the window with a fresh nonce, discarding all progress.
    /// Used when the roster membership changes after a disconnect, since
    /// stale partial secrets from the previous window can't be trusted.
    pub fn restart(&mut self, rng: &mut (impl RngCore + CryptoRng)) {
        self.own_nonce = rng.gen_biguint(SEED_BITS);
        self.secrets.clear();
        self.progress.clear();
        self.received_from.clear();
        self.sent_to.clear();
    }

    pub fn is_complete(&self, peers: &[String]) -> bool {
        peers.iter().all(|p| self.progress.get(p) == Some(&2))
    }

    pub fn n_secrets(&self) -> usize {
        self.secrets.len()
    }

    pub fn secret(&self, peer: &str) -> Option<&BigUint> {
        self.secrets.get(peer)
    }

    pub fn secrets(&self) -> &HashMap<String, BigUint> {
        &self.secrets
    }

    /// Builds the sealed envelope to send to `peer`, folding our own nonce
    /// into their running secret and bumping their progress counter.
    pub fn outbound_envelope(&mut self, peer: &str) -> Result<HandshakeEnvelope> {
        let public_key = self
            .peer_keys
            .get(peer)
            .ok_or_else(|| Error::Config(format!("no public key configured for peer {peer}")))?;

        let digest = crypto::seed_digest(&self.own_nonce);
        let signature = crypto::sign_digest(&self.private_key, &digest)?;
        let payload = HandshakePayload {
            timestamp: now_unix(),
            seed: self.own_nonce.clone(),
            signature: HexBytes::new(signature),
        };
        let envelope = crypto::seal_envelope(public_key, &payload)?;

        if self.sent_to.insert(peer.to_string()) {
            let current = self
                .secrets
                .remove(peer)
                .unwrap_or_else(|| BigUint::from(0u8));
            self.secrets.insert(peer.to_string(), current ^ &self.own_nonce);
            *self.progress.entry(peer.to_string()).or_insert(0) += 1;
        }
        Ok(envelope)
    }

    /// Opens and folds in an inbound envelope from `peer`. Drops (without
    /// error) envelopes that fail signature verification, carry a stale
    /// timestamp, or repeat a peer already accepted this window, since
    /// XOR-ing twice from the same peer would corrupt the shared secret.
    pub fn accept_inbound(&mut self, peer: &str, envelope: &HandshakeEnvelope) -> Result<()> {
        let public_key = self
            .peer_keys
            .get(peer)
            .ok_or_else(|| Error::Config(format!("no public key configured for peer {peer}")))?;

        let payload = crypto::open_envelope(&self.private_key, envelope)?;
        if !is_fresh(payload.timestamp) {
            return Err(Error::StaleTimestamp);
        }

        let digest = crypto::seed_digest(&payload.seed);
        crypto::verify_digest(public_key, &digest, &payload.signature.0)?;

        if !self.received_from.insert(peer.to_string()) {
            return Ok(());
        }
        let current = self
            .secrets
            .remove(peer)
            .unwrap_or_else(|| BigUint::from(0u8));
        self.secrets.insert(peer.to_string(), current ^ &payload.seed);
        *self.progress.entry(peer.to_string()).or_insert(0) += 1;
        Ok(())
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn is_fresh(timestamp: u64) -> bool {
    let now = now_unix();
    let delta = now.abs_diff(timestamp);
    delta < HANDSHAKE_FRESHNESS_SECONDS
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn keypair() -> (RsaPrivateKey, RsaPublicKey) {
        let private = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
        let public = RsaPublicKey::from(&private);
        (private, public)
    }

    #[test]
    fn two_peers_converge_on_the_same_symmetric_secret() {
        let (alice_sk, alice_pk) = keypair();
        let (bob_sk, bob_pk) = keypair();

        let mut alice = HandshakeState::begin(
            alice_sk,
            HashMap::from([("bob".to_string(), bob_pk.clone())]),
            &mut OsRng,
        );
        let mut bob = HandshakeState::begin(
            bob_sk,
            HashMap::from([("alice".to_string(), alice_pk.clone())]),
            &mut OsRng,
        );

        let to_bob = alice.outbound_envelope("bob").unwrap();
        let to_alice = bob.outbound_envelope("alice").unwrap();

        bob.accept_inbound("alice", &to_bob).unwrap();
        alice.accept_inbound("bob", &to_alice).unwrap();

        assert!(alice.is_complete(&["bob".to_string()]));
        assert!(bob.is_complete(&["alice".to_string()]));
        assert_eq!(alice.secret("bob"), bob.secret("alice"));
    }

    #[test]
    fn duplicate_inbound_envelope_does_not_corrupt_the_secret() {
        let (alice_sk, alice_pk) = keypair();
        let (bob_sk, bob_pk) = keypair();

        let mut alice = HandshakeState::begin(
            alice_sk,
            HashMap::from([("bob".to_string(), bob_pk)]),
            &mut OsRng,
        );
        let mut bob = HandshakeState::begin(
            bob_sk,
            HashMap::from([("alice".to_string(), alice_pk)]),
            &mut OsRng,
        );

        let to_bob = alice.outbound_envelope("bob").unwrap();
        bob.accept_inbound("alice", &to_bob).unwrap();
        let first = bob.secret("alice").cloned().unwrap();

        bob.accept_inbound("alice", &to_bob).unwrap();
        assert_eq!(bob.secret("alice"), Some(&first));
        assert_eq!(bob.progress.get("alice"), Some(&1));
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let (alice_sk, alice_pk) = keypair();
        let (bob_sk, bob_pk) = keypair();
        let mut bob = HandshakeState::begin(
            bob_sk,
            HashMap::from([("alice".to_string(), alice_pk)]),
            &mut OsRng,
        );

        let digest = crypto::seed_digest(&BigUint::from(7u64));
        let signature = crypto::sign_digest(&alice_sk, &digest).unwrap();
        let payload = HandshakePayload {
            timestamp: now_unix() - HANDSHAKE_FRESHNESS_SECONDS - 1,
            seed: BigUint::from(7u64),
            signature: HexBytes::new(signature),
        };
        let envelope = crypto::seal_envelope(&bob_pk, &payload).unwrap();
        let err = bob.accept_inbound("alice", &envelope).unwrap_err();
        assert!(matches!(err, Error::StaleTimestamp));
        assert!(bob.secret("alice").is_none());
    }
}
