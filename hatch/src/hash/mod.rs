//! Hashing utilities.
//!
//! Content hashes double as object-store keys, so their string form
//! must be stable: lowercase hexadecimal with no algorithm prefix.

#[cfg(test)]
mod tests;

use displaydoc::Display;
use serde::{de, ser, Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::HatchResult;

/// Length of a SHA-256 hash in bytes.
const SHA256_LEN: usize = 32;

/// A hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Hash {
    /// An SHA-256 hash.
    Sha256([u8; SHA256_LEN]),
}

/// A hashing error.
#[derive(Debug, Display)]
pub enum Error {
    /// Invalid base16 hash: {0}
    InvalidBase16Hash(hex::FromHexError),

    /// Invalid length for hash string: Must be {expected} (hexadecimal), got {actual}.
    InvalidHashStringLength { expected: usize, actual: usize },
}

impl std::error::Error for Error {}

impl Hash {
    /// Convenience function to generate a SHA-256 hash from a slice.
    pub fn sha256_from_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self::Sha256(hasher.finalize().into())
    }

    /// Creates a SHA-256 hash from a finalized digest.
    pub fn sha256_from_digest(digest: &[u8]) -> HatchResult<Self> {
        let data: [u8; SHA256_LEN] = digest.try_into().map_err(|_| {
            Error::InvalidHashStringLength {
                expected: SHA256_LEN * 2,
                actual: digest.len() * 2,
            }
        })?;

        Ok(Self::Sha256(data))
    }

    /// Parses a hexadecimal SHA-256 hash.
    pub fn from_base16(s: &str) -> HatchResult<Self> {
        if s.len() != SHA256_LEN * 2 {
            return Err(Error::InvalidHashStringLength {
                expected: SHA256_LEN * 2,
                actual: s.len(),
            }
            .into());
        }

        let v = hex::decode(s).map_err(Error::InvalidBase16Hash)?;
        Self::sha256_from_digest(&v)
    }

    /// Returns the hash in hexadecimal format.
    ///
    /// This is the canonical representation of hashes in the database
    /// and the key of the object in the store.
    pub fn to_base16(&self) -> String {
        hex::encode(self.data())
    }

    fn data(&self) -> &[u8] {
        match self {
            Self::Sha256(d) => d,
        }
    }
}

impl<'de> Deserialize<'de> for Hash {
    /// Deserializes a hexadecimal hash string.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        use de::Error;

        String::deserialize(deserializer)
            .and_then(|s| Self::from_base16(&s).map_err(|e| Error::custom(e.to_string())))
    }
}

impl Serialize for Hash {
    /// Serializes a hash into a hexadecimal hash string.
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: ser::Serializer,
    {
        serializer.serialize_str(&self.to_base16())
    }
}
