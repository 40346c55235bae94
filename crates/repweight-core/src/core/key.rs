// crates/repweight-core/src/core/key.rs
// ============================================================================
// Module: Repweight Public Keys
// Description: Fixed-size 32-byte account identifiers and their storage codec.
// Purpose: Guarantee every key in the system is validated and content-equal.
// Dependencies: rand, serde, thiserror
// ============================================================================

//! ## Overview
//! [`PublicKey`] is the identity of an account and the target of
//! representative aggregation. Keys are validated at construction, compared
//! byte-for-byte, and hashed from their bytes, so they behave correctly as map
//! and set keys. The storage codec ([`encode_key`] / [`decode_key`]) is an
//! identity projection onto raw bytes; decoding re-validates because stored
//! data is untrusted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Length of a public key in bytes.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Lowercase hex alphabet used for display.
const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Public key construction errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// Input did not contain exactly [`PUBLIC_KEY_LEN`] bytes.
    #[error("public key has {actual} bytes instead of {PUBLIC_KEY_LEN}")]
    InvalidKeyLength {
        /// Number of bytes supplied.
        actual: usize,
    },
    /// Hex input contained a non-hex character.
    #[error("public key hex contains invalid character at offset {offset}")]
    InvalidKeyHex {
        /// Byte offset of the first invalid character.
        offset: usize,
    },
}

// ============================================================================
// SECTION: Public Key
// ============================================================================

/// 32-byte account identifier.
///
/// # Invariants
/// - Always exactly [`PUBLIC_KEY_LEN`] bytes.
/// - Equality, hashing, and ordering are functions of the bytes only.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey([u8; PUBLIC_KEY_LEN]);

impl PublicKey {
    /// Creates a key from an owned array; cannot fail.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Creates a key from a byte slice, copying it verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidKeyLength`] unless `bytes.len() == 32`.
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        let array: [u8; PUBLIC_KEY_LEN] = bytes.try_into().map_err(|_| {
            KeyError::InvalidKeyLength {
                actual: bytes.len(),
            }
        })?;
        Ok(Self(array))
    }

    /// Generates a key from the supplied random source.
    ///
    /// Intended for demo seed data; the key carries no secret material.
    pub fn random<R: RngCore + ?Sized>(rng: &mut R) -> Self {
        let mut bytes = [0_u8; PUBLIC_KEY_LEN];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Returns the raw key bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    /// Returns the key as a lowercase hex string.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex_encode(&self.0)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl TryFrom<&[u8]> for PublicKey {
    type Error = KeyError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Self::try_from_slice(value)
    }
}

impl From<[u8; PUBLIC_KEY_LEN]> for PublicKey {
    fn from(value: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self::from_bytes(value)
    }
}

impl FromStr for PublicKey {
    type Err = KeyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let text = value.trim();
        let digits = text.as_bytes();
        if digits.len() != PUBLIC_KEY_LEN * 2 {
            return Err(KeyError::InvalidKeyLength {
                actual: digits.len() / 2,
            });
        }
        let mut bytes = [0_u8; PUBLIC_KEY_LEN];
        for (index, pair) in digits.chunks_exact(2).enumerate() {
            let high = hex_value(pair[0]).ok_or(KeyError::InvalidKeyHex {
                offset: index * 2,
            })?;
            let low = hex_value(pair[1]).ok_or(KeyError::InvalidKeyHex {
                offset: index * 2 + 1,
            })?;
            bytes[index] = (high << 4) | low;
        }
        Ok(Self(bytes))
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// SECTION: Storage Codec
// ============================================================================

/// Encodes a key into its storage representation (the 32 raw bytes).
#[must_use]
pub fn encode_key(key: &PublicKey) -> Vec<u8> {
    key.0.to_vec()
}

/// Decodes a key from its storage representation.
///
/// # Errors
///
/// Returns [`KeyError::InvalidKeyLength`] when the stored value is not 32 bytes.
pub fn decode_key(bytes: &[u8]) -> Result<PublicKey, KeyError> {
    PublicKey::try_from_slice(bytes)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Encodes bytes as a lowercase hex string.
pub(crate) fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(char::from(HEX_DIGITS[usize::from(byte >> 4)]));
        out.push(char::from(HEX_DIGITS[usize::from(byte & 0x0f)]));
    }
    out
}

/// Maps an ASCII hex digit to its value.
const fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0' ..= b'9' => Some(digit - b'0'),
        b'a' ..= b'f' => Some(digit - b'a' + 10),
        b'A' ..= b'F' => Some(digit - b'A' + 10),
        _ => None,
    }
}
