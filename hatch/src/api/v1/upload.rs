use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::bucket::Bucket;
use crate::hash::Hash;
use crate::id::UploadId;

/// A stored binary object.
///
/// Returned by the upload routes and `GET /_api/v1/uploads/:id`.
///
/// A *provisional* record is returned for project archives before the
/// server has finished processing them. It carries neither a content
/// hash nor a size, since neither is known until the archive has been
/// pruned and stored.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRecord {
    /// The opaque ID of the upload.
    pub id: UploadId,

    /// The bucket the object is stored in.
    pub bucket: Bucket,

    /// SHA-256 hash of the stored bytes.
    pub content_hash: Option<Hash>,

    /// The client-supplied file name.
    ///
    /// This is for display only.
    pub filename: String,

    /// The sniffed MIME type of the stored bytes.
    pub mime: String,

    /// ID of the user who uploaded the object.
    pub uploader_id: i64,

    /// When the upload was indexed, in seconds since the epoch.
    pub upload_timestamp: Option<i64>,

    /// Size of the stored object.
    pub size_bytes: Option<u64>,

    /// Width of the stored image.
    pub width: Option<u32>,

    /// Height of the stored image.
    pub height: Option<u32>,
}

/// A newly-created project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub id: i64,
    pub author: i64,
    pub title: String,
    pub description: String,
}

/// The result of `POST /uploads/project`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectUploadResult {
    pub project: ProjectInfo,

    /// The project archive.
    ///
    /// This is always provisional.
    pub file: UploadRecord,

    /// The project thumbnail.
    pub thumbnail: UploadRecord,
}

impl UploadRecord {
    /// Returns whether processing of this upload is still pending.
    pub fn is_provisional(&self) -> bool {
        self.content_hash.is_none()
    }
}
