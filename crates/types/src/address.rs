use crate::{keccak256, Result, TypesError, H160};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A 20-byte account or contract address.
///
/// Displays in EIP-55 mixed-case form; parsing accepts all-lowercase,
/// all-uppercase and correctly checksummed input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(H160);

impl Address {
    pub const ZERO: Address = Address(H160::zero());

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Address(H160::from(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn checksum(&self) -> String {
        let lower = hex::encode(self.0.as_bytes());
        let hash = keccak256(lower.as_bytes());

        let mixed: String = lower
            .char_indices()
            .map(|(i, ch)| {
                let byte = hash[i / 2];
                let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
                if ch.is_ascii_alphabetic() && nibble >= 8 {
                    ch.to_ascii_uppercase()
                } else {
                    ch
                }
            })
            .collect();

        format!("0x{}", mixed)
    }
}

impl FromStr for Address {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self> {
        let body = s.strip_prefix("0x").unwrap_or(s);

        if body.len() != 40 {
            return Err(TypesError::InvalidLength {
                expected: 40,
                actual: body.len(),
            });
        }

        let decoded = hex::decode(body).map_err(|_| TypesError::InvalidHex(s.to_string()))?;
        let mut raw = [0u8; 20];
        raw.copy_from_slice(&decoded);
        let address = Address::from_bytes(raw);

        let has_lower = body.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = body.chars().any(|c| c.is_ascii_uppercase());
        if has_lower && has_upper && address.checksum()[2..] != *body {
            return Err(TypesError::InvalidChecksum);
        }

        Ok(address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.checksum())
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0.as_bytes()))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{:x}", self))
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl From<H160> for Address {
    fn from(hash: H160) -> Self {
        Address(hash)
    }
}

impl From<Address> for H160 {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Address::from_bytes(bytes)
    }
}
