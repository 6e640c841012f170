//! Object storage.
//!
//! Objects are addressed by a logical bucket and the hash of their
//! contents. Storing the same bytes twice is an overwrite of the same
//! object.

mod local;
mod s3;


use std::path::Path;

use tokio::io::AsyncRead;

use crate::error::ServerResult;
use hatch::bucket::Bucket;
use hatch::hash::Hash;

pub(crate) use self::local::{LocalBackend, LocalStorageConfig};
pub(crate) use self::s3::{S3Backend, S3StorageConfig};

/// A stored object being downloaded.
pub struct Download {
    /// The contents.
    pub stream: Box<dyn AsyncRead + Unpin + Send>,

    /// Size of the object in bytes.
    pub size: u64,
}

/// A storage backend.
///
/// Backends never retry. Errors are returned to the caller as-is.
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync + std::fmt::Debug {
    /// Uploads a local file, returning the size of the stored object.
    async fn put_file(
        &self,
        bucket: Bucket,
        key: &Hash,
        path: &Path,
        content_type: &str,
    ) -> ServerResult<u64>;

    /// Downloads an object.
    async fn get_file(&self, bucket: Bucket, key: &Hash) -> ServerResult<Download>;

    /// Returns the size of an object, or `None` if it doesn't exist.
    async fn stat_file(&self, bucket: Bucket, key: &Hash) -> ServerResult<Option<u64>>;
}
