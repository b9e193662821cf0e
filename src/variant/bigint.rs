//! Thin wrapper around `num_bigint::BigInt` for the `bigint` variant kind
//! (spec section 3.1). Arbitrary-precision integers are the one scalar kind
//! that can't be represented natively, so this crate leans on `num-bigint`
//! the way `r3e-network-neo-rs` does for its wide integer types.

use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};
use std::fmt;

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BigIntValue(BigInt);

impl BigIntValue {
    pub fn from_i64(n: i64) -> Self {
        BigIntValue(BigInt::from(n))
    }

    pub fn from_u64(n: u64) -> Self {
        BigIntValue(BigInt::from(n))
    }

    pub fn from_f64_truncated(n: f64) -> Self {
        BigIntValue(BigInt::from(n.trunc() as i128))
    }

    pub fn from_decimal_str(s: &str) -> Option<Self> {
        s.parse::<BigInt>().ok().map(BigIntValue)
    }

    /// Parses a hex string (optionally `0x`-prefixed) as used by the
    /// `BIGINT_HEX` serialization flag (spec section 6.3).
    pub fn from_hex_str(s: &str) -> Option<Self> {
        let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
        BigInt::parse_bytes(s.as_bytes(), 16).map(BigIntValue)
    }

    pub fn to_decimal_string(&self) -> String {
        self.0.to_string()
    }

    pub fn to_hex_string(&self) -> String {
        format!("{:x}", self.0)
    }

    pub fn to_i64(&self) -> Option<i64> {
        self.0.to_i64()
    }

    pub fn to_f64(&self) -> Option<f64> {
        self.0.to_f64()
    }

    pub fn is_negative(&self) -> bool {
        self.0 < BigInt::zero()
    }
}

impl fmt::Debug for BigIntValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BigInt({})", self.0)
    }
}
