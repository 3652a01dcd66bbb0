use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Length of a native (BLAKE3) digest in bytes.
pub const NATIVE_DIGEST_LEN: usize = 32;
/// Length of a git (SHA-1) digest in bytes.
pub const GIT_DIGEST_LEN: usize = 20;

/// Content-addressed identifier for any stored object.
///
/// Native stores produce 32-byte BLAKE3 digests; the git backend produces
/// 20-byte SHA-1 digests. Both are carried in the same fixed buffer so the
/// type stays `Copy`. Identical content always produces the same `ObjectId`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    len: u8,
    bytes: [u8; NATIVE_DIGEST_LEN],
}

impl ObjectId {
    /// Compute a native `ObjectId` from raw bytes (undomained BLAKE3).
    pub fn from_bytes(data: &[u8]) -> Self {
        Self::from_hash(*blake3::hash(data).as_bytes())
    }

    /// Create an `ObjectId` from a pre-computed 32-byte hash.
    pub fn from_hash(hash: [u8; NATIVE_DIGEST_LEN]) -> Self {
        Self {
            len: NATIVE_DIGEST_LEN as u8,
            bytes: hash,
        }
    }

    /// Create an `ObjectId` from a digest of either supported length.
    pub fn from_digest(digest: &[u8]) -> Result<Self, TypeError> {
        if digest.len() != NATIVE_DIGEST_LEN && digest.len() != GIT_DIGEST_LEN {
            return Err(TypeError::InvalidLength {
                actual: digest.len(),
            });
        }
        let mut bytes = [0u8; NATIVE_DIGEST_LEN];
        bytes[..digest.len()].copy_from_slice(digest);
        Ok(Self {
            len: digest.len() as u8,
            bytes,
        })
    }

    /// The null object ID (all zeros). Represents "no object".
    pub const fn null() -> Self {
        Self {
            len: NATIVE_DIGEST_LEN as u8,
            bytes: [0u8; NATIVE_DIGEST_LEN],
        }
    }

    /// Returns `true` if every digest byte is zero.
    pub fn is_null(&self) -> bool {
        self.as_bytes().iter().all(|b| *b == 0)
    }

    /// The digest bytes (20 or 32 of them).
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// Number of hex characters in the full representation.
    pub fn hex_len(&self) -> usize {
        self.len as usize * 2
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.bytes[..4])
    }

    /// The first `n` hex characters, clamped to the full length.
    pub fn hex_prefix(&self, n: usize) -> String {
        let mut hex = self.to_hex();
        hex.truncate(n);
        hex
    }

    /// Parse from a 40- or 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s.trim()).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::from_digest(&bytes)
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.short_hex())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::str::FromStr for ObjectId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; NATIVE_DIGEST_LEN]> for ObjectId {
    fn from(bytes: [u8; NATIVE_DIGEST_LEN]) -> Self {
        Self::from_hash(bytes)
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
