//! Wire encoding for the arbitrary-precision share values that flow through
//! `anonymous_broadcast`. `W = 8*B + P` bits routinely exceeds 64 bits, so we
//! never put these on the wire as JSON numbers; they travel as decimal strings
//! and are parsed into [`num_bigint::BigUint`] on arrival.

use num_bigint::BigUint;
use num_traits::Zero;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use std::ops::{BitXor, Shl, Shr};
use std::str::FromStr;

#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct WireUint(pub BigUint);

impl WireUint {
    pub fn zero() -> Self {
        Self(BigUint::zero())
    }

    pub fn is_zero(&self) -> bool {
        self.0 == BigUint::zero()
    }

    /// Interprets `bytes` as a little-endian unsigned integer.
    pub fn from_bytes_le(bytes: &[u8]) -> Self {
        Self(BigUint::from_bytes_le(bytes))
    }

    /// Serializes this value as exactly `len` little-endian bytes, truncating
    /// or zero-padding as needed. Used to recover a fixed-width payload after
    /// stripping the collision pad.
    pub fn to_bytes_le_fixed(&self, len: usize) -> Vec<u8> {
        let mut bytes = self.0.to_bytes_le();
        bytes.resize(len, 0);
        bytes
    }

    pub fn bit(&self, index: u64) -> bool {
        self.0.bit(index)
    }

    pub fn set_bit(&mut self, index: u64, value: bool) {
        self.0.set_bit(index, value)
    }

    /// Number of set bits, computed byte-by-byte since `BigUint` itself
    /// doesn't expose a popcount.
    pub fn count_ones(&self) -> u64 {
        self.0
            .to_bytes_le()
            .iter()
            .map(|b| b.count_ones() as u64)
            .sum()
    }
}

impl From<BigUint> for WireUint {
    fn from(v: BigUint) -> Self {
        Self(v)
    }
}

impl From<WireUint> for BigUint {
    fn from(v: WireUint) -> Self {
        v.0
    }
}

impl BitXor for WireUint {
    type Output = WireUint;
    fn bitxor(self, rhs: Self) -> Self::Output {
        WireUint(self.0 ^ rhs.0)
    }
}

impl BitXor<&WireUint> for &WireUint {
    type Output = WireUint;
    fn bitxor(self, rhs: &WireUint) -> Self::Output {
        WireUint(&self.0 ^ &rhs.0)
    }
}

impl Shl<u64> for WireUint {
    type Output = WireUint;
    fn shl(self, rhs: u64) -> Self::Output {
        WireUint(self.0 << rhs)
    }
}

impl Shr<u64> for WireUint {
    type Output = WireUint;
    fn shr(self, rhs: u64) -> Self::Output {
        WireUint(self.0 >> rhs)
    }
}

impl Serialize for WireUint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_str_radix(10))
    }
}

impl<'de> Deserialize<'de> for WireUint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        BigUint::from_str(&s)
            .map(WireUint)
            .map_err(|e| D::Error::custom(format!("invalid decimal integer: {e}")))
    }
}

impl std::fmt::Display for WireUint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
