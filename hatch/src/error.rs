//! Error handling.

use std::error::Error as StdError;
use std::io;

use displaydoc::Display;

pub type HatchResult<T> = Result<T, HatchError>;

/// An error.
#[derive(Debug, Display)]
pub enum HatchError {
    /// Invalid bucket "{name}"
    InvalidBucket { name: String },

    /// Invalid upload ID "{id}"
    InvalidUploadId { id: String },

    /// Hashing error: {0}
    HashError(super::hash::Error),

    /// I/O error: {error}.
    IoError { error: io::Error },
}

impl HatchError {
    pub fn name(&self) -> &'static str {
        match self {
            Self::InvalidBucket { .. } => "InvalidBucket",
            Self::InvalidUploadId { .. } => "InvalidUploadId",
            Self::HashError(_) => "HashError",
            Self::IoError { .. } => "IoError",
        }
    }
}

impl StdError for HatchError {}

impl From<io::Error> for HatchError {
    fn from(error: io::Error) -> Self {
        Self::IoError { error }
    }
}

impl From<super::hash::Error> for HatchError {
    fn from(error: super::hash::Error) -> Self {
        Self::HashError(error)
    }
}
