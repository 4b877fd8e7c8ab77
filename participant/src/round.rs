//! Per-round share construction and result decoding: turning a text message
//! into a padded, masked wire value, and turning an aggregated XOR back into
//! either a decoded message or a detected collision.

use dcnet_common::{consts, WireUint};
use num_bigint::BigUint;
use rand::seq::index::sample;
use rand::{CryptoRng, RngCore};

/// Sizing derived from the number of other roster members this participant
/// holds a pairwise secret with.
#[derive(Clone, Copy, Debug)]
pub struct ShareParams {
    n_peers: usize,
}

impl ShareParams {
    pub fn new(n_peers: usize) -> Self {
        Self { n_peers }
    }

    pub fn padding_width(&self) -> u64 {
        consts::padding_width(self.n_peers)
    }

    pub fn padding_weight(&self) -> u64 {
        consts::padding_weight(self.padding_width())
    }

    pub fn share_width(&self) -> u64 {
        consts::share_width(self.padding_width())
    }
}

/// Packs `text` into a fixed-width little-endian integer, truncating or
/// zero-padding to exactly `PAYLOAD_BYTES`.
pub fn encode_message(text: &str) -> BigUint {
    let mut bytes = text.as_bytes().to_vec();
    bytes.truncate(consts::PAYLOAD_BYTES as usize);
    bytes.resize(consts::PAYLOAD_BYTES as usize, 0);
    BigUint::from_bytes_le(&bytes)
}

/// Unpacks a fixed-width payload back into a string, dropping the trailing
/// zero padding. Non-UTF-8 payloads (corrupted or colliding reconstructions)
/// decode to an empty string rather than panicking.
pub fn decode_message(payload: &BigUint) -> String {
    let bytes = WireUint(payload.clone()).to_bytes_le_fixed(consts::PAYLOAD_BYTES as usize);
    String::from_utf8(bytes)
        .map(|s| s.trim_end_matches('\0').to_string())
        .unwrap_or_default()
}

/// Shifts `raw` left by the padding width and scatters exactly `K` one bits
/// across the low `P` bits. Every non-silent sender's padding has the same
/// weight, so aggregated collisions are detectable without leaking which
/// slot actually had something to say.
pub fn pad_message(
    raw: BigUint,
    params: ShareParams,
    rng: &mut (impl RngCore + CryptoRng),
) -> BigUint {
    use num_traits::Zero;
    if raw.is_zero() {
        // Zero is the canonical "no content" marker; leave it unpadded so a
        // silent round decodes as silence rather than as a spurious collision.
        return raw;
    }
    let p = params.padding_width();
    let k = params.padding_weight();
    let mut padded = raw << p;
    for bit in sample(rng, p as usize, k as usize).iter() {
        padded.set_bit(bit as u64, true);
    }
    padded
}

/// Strips the collision pad back off an aggregated result. Returns `None`
/// when the low `P` bits don't carry exactly `K` set bits, which only
/// happens when two or more participants sent in the same round and their
/// pads canceled under XOR (a detected collision, not a decode failure).
pub fn strip_padding(aggregated: &BigUint, params: ShareParams) -> Option<BigUint> {
    let p = params.padding_width();
    let k = params.padding_weight();
    let mask = (BigUint::from(1u8) << p) - BigUint::from(1u8);
    let pad = aggregated & &mask;
    if WireUint(pad).count_ones() != k {
        return None;
    }
    Some(aggregated >> p)
}

/// What an aggregated share resolves to, once all masks have been XORed out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoundOutcome {
    /// Nobody transmitted this round.
    Silent,
    /// Exactly one participant transmitted, and it decoded cleanly.
    Message(String),
    /// Two or more participants transmitted in the same slot; the pad
    /// weight no longer checks out and the payload is unrecoverable.
    Collision,
}

/// Classifies a fully-aggregated (all masks removed) round result.
pub fn decode_round_result(aggregated: &BigUint, params: ShareParams) -> RoundOutcome {
    use num_traits::Zero;
    if aggregated.is_zero() {
        return RoundOutcome::Silent;
    }
    match strip_padding(aggregated, params) {
        Some(payload) => RoundOutcome::Message(decode_message(&payload)),
        None => RoundOutcome::Collision,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn message_round_trips_through_encode_decode() {
        let raw = encode_message("hello, group");
        assert_eq!(decode_message(&raw), "hello, group");
    }

    #[test]
    fn long_message_is_truncated_to_payload_width() {
        let text = "x".repeat(1000);
        let raw = encode_message(&text);
        let decoded = decode_message(&raw);
        assert_eq!(decoded.len(), consts::PAYLOAD_BYTES as usize);
    }

    #[test]
    fn padding_round_trips_when_alone() {
        let params = ShareParams::new(3);
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let raw = encode_message("hi");
        let padded = pad_message(raw.clone(), params, &mut rng);
        let stripped = strip_padding(&padded, params).expect("weight should match");
        assert_eq!(stripped, raw);
    }

    #[test]
    fn silent_round_decodes_as_silent_not_collision() {
        let params = ShareParams::new(2);
        let zero = BigUint::from(0u8);
        assert_eq!(decode_round_result(&zero, params), RoundOutcome::Silent);
    }

    #[test]
    fn lone_sender_decodes_as_message() {
        let params = ShareParams::new(3);
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let padded = pad_message(encode_message("hi"), params, &mut rng);
        assert_eq!(
            decode_round_result(&padded, params),
            RoundOutcome::Message("hi".to_string())
        );
    }

    #[test]
    fn two_senders_decode_as_collision() {
        let params = ShareParams::new(3);
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let a = pad_message(encode_message("a"), params, &mut rng);
        let b = pad_message(encode_message("b"), params, &mut rng);
        assert_eq!(decode_round_result(&(a ^ b), params), RoundOutcome::Collision);
    }
}
