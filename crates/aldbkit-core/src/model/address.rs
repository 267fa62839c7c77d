// ── Device addresses ──
//
// Insteon devices are identified by a 3-byte address. Every string that
// names a device is parsed into an `Address` at the boundary; malformed
// input never reaches the store.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Rejected address input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address is empty")]
    Empty,

    #[error("invalid address '{input}': expected six hex digits such as 1A.2B.3C")]
    Format { input: String },
}

/// A validated 3-byte device address.
///
/// Accepts `1A.2B.3C`, `1a2b3c` and `1A 2B 3C`. Displays as uppercase
/// dotted (`1A.2B.3C`); [`id`](Self::id) gives the compact lowercase form
/// the host uses for `device_address`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 3]);

impl Address {
    pub const fn new(bytes: [u8; 3]) -> Self {
        Self(bytes)
    }

    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(AddressError::Empty);
        }
        let invalid = || AddressError::Format {
            input: input.to_owned(),
        };
        if !trimmed.is_ascii() {
            return Err(invalid());
        }

        let digits = match trimmed.len() {
            6 => trimmed.to_owned(),
            8 => {
                let raw = trimmed.as_bytes();
                let sep = raw[2];
                if !matches!(sep, b'.' | b' ') || raw[5] != sep {
                    return Err(invalid());
                }
                format!("{}{}{}", &trimmed[0..2], &trimmed[3..5], &trimmed[6..8])
            }
            _ => return Err(invalid()),
        };

        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let mut bytes = [0u8; 3];
        for (slot, chunk) in bytes.iter_mut().zip(digits.as_bytes().chunks(2)) {
            let pair = std::str::from_utf8(chunk).map_err(|_| invalid())?;
            *slot = u8::from_str_radix(pair, 16).map_err(|_| invalid())?;
        }
        Ok(Self(bytes))
    }

    pub fn bytes(&self) -> [u8; 3] {
        self.0
    }

    /// Compact lowercase form (`1a2b3c`).
    pub fn id(&self) -> String {
        let [a, b, c] = self.0;
        format!("{a:02x}{b:02x}{c:02x}")
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.0;
        write!(f, "{a:02X}.{b:02X}.{c:02X}")
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_formats() {
        let expected = Address::new([0x1a, 0x2b, 0x3c]);
        assert_eq!(Address::parse("1A.2B.3C").unwrap(), expected);
        assert_eq!(Address::parse("1a2b3c").unwrap(), expected);
        assert_eq!(Address::parse("1A 2B 3C").unwrap(), expected);
        assert_eq!(Address::parse("  1a.2b.3c ").unwrap(), expected);
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(Address::parse(""), Err(AddressError::Empty));
        for bad in ["1A.2B", "1A.2B.3C.4D", "1A-2B-3C", "1A.2B 3C", "GG.HH.II", "+1.2B.3C", "1Ä2B3C"] {
            assert!(
                matches!(Address::parse(bad), Err(AddressError::Format { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn display_and_id() {
        let addr: Address = "0a0b0c".parse().unwrap();
        assert_eq!(addr.to_string(), "0A.0B.0C");
        assert_eq!(addr.id(), "0a0b0c");
    }

    #[test]
    fn serde_uses_dotted_string() {
        let addr = Address::new([0x44, 0x55, 0x66]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"44.55.66\"");
        let back: Address = serde_json::from_str("\"445566\"").unwrap();
        assert_eq!(back, addr);
        assert!(serde_json::from_str::<Address>("\"nope\"").is_err());
    }
}
