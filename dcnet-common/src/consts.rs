//! Protocol-wide tunables. Shared by coordinator and
//! participant so both sides agree on them without negotiation.

/// Maximum payload bytes per round (`B`).
pub const PAYLOAD_BYTES: u64 = 280;

/// Handshake freshness window in seconds (`T`).
pub const HANDSHAKE_FRESHNESS_SECONDS: u64 = 300;

/// Reference round-pacing interval, in milliseconds.
pub const ROUND_PACING_MILLIS: u64 = 1000;

/// Collision padding width as a function of `N` (other roster peers).
/// The source inconsistently used `N+1` across iterations; this is
/// normalized on `2*N`.
pub fn padding_width(n: usize) -> u64 {
    2 * n as u64
}

/// Number of padding bits set to 1 (`K = P / 2`).
pub fn padding_weight(padding_width: u64) -> u64 {
    padding_width / 2
}

/// Full share width in bits (`W = 8*B + P`).
pub fn share_width(padding_width: u64) -> u64 {
    8 * PAYLOAD_BYTES + padding_width
}
