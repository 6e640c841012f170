//! Upload identifiers.
//!
//! ## Format
//!
//! An upload ID is 16 bytes (128 bits) from the operating system's
//! CSPRNG, encoded as URL-safe Base64 without padding. This gives a
//! 22-character string over `A-Za-z0-9-_` that can be placed in URL
//! paths and headers verbatim.
//!
//! IDs are deliberately unrelated to the content hash of the upload:
//! two uploads of identical bytes share a blob but never an ID.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use rand::RngCore;
use regex::Regex;
use serde::{de, Deserialize, Serialize};

use crate::error::{HatchError, HatchResult};

/// Number of random bytes in an upload ID.
pub const ID_BYTES: usize = 16;

lazy_static! {
    static ref UPLOAD_ID_REGEX: Regex = Regex::new(r"^[A-Za-z0-9_-]{22}$").unwrap();
}

/// The opaque ID of an upload.
#[derive(Serialize, Clone, Debug, Hash, Eq, PartialEq)]
#[serde(transparent)]
pub struct UploadId(String);

impl UploadId {
    /// Generates a fresh random ID.
    pub fn generate() -> Self {
        let mut bytes = [0u8; ID_BYTES];
        OsRng.fill_bytes(&mut bytes);

        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Creates an upload ID from a potentially-invalid String.
    pub fn new(id: String) -> HatchResult<Self> {
        validate_upload_id(&id)?;
        Ok(Self(id))
    }

    /// Returns the string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl FromStr for UploadId {
    type Err = HatchError;

    fn from_str(id: &str) -> HatchResult<Self> {
        Self::new(id.to_owned())
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for UploadId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        use de::Error;

        String::deserialize(deserializer)
            .and_then(|s| Self::new(s).map_err(|e| Error::custom(e.to_string())))
    }
}

fn validate_upload_id(id: &str) -> HatchResult<()> {
    if UPLOAD_ID_REGEX.is_match(id) {
        Ok(())
    } else {
        Err(HatchError::InvalidUploadId { id: id.to_owned() })
    }
}
