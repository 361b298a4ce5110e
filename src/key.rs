//! Assignment keys: hexadecimal on the outside, decimal in URLs.

use std::fmt;

use crate::error::TstError;

/// Identifier of a server-side assignment.
///
/// Users type it and `tst.json` stores it as uppercase hex without padding;
/// the service's URL paths want the decimal form. The two representations
/// must round-trip exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignmentKey(u64);

impl AssignmentKey {
    /// Parse a key from its hexadecimal representation. An optional `0x`
    /// prefix is accepted.
    pub fn from_hex(raw: &str) -> Result<Self, TstError> {
        let digits = raw.trim();
        let digits = digits
            .strip_prefix("0x")
            .or_else(|| digits.strip_prefix("0X"))
            .unwrap_or(digits);
        u64::from_str_radix(digits, 16)
            .map(AssignmentKey)
            .map_err(|_| TstError::InvalidKey(raw.to_string()))
    }

    /// Decimal value used when building service URLs.
    pub fn decimal(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AssignmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.0)
    }
}
