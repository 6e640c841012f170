//! Local file storage.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::fs::{self, File};

use super::{Download, StorageBackend};
use crate::error::{ServerError, ServerResult};
use hatch::bucket::Bucket;
use hatch::hash::Hash;

#[derive(Debug)]
pub struct LocalBackend {
    config: LocalStorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalStorageConfig {
    /// The directory to store all files under.
    ///
    /// Each bucket is a subdirectory.
    pub(crate) path: PathBuf,
}

impl LocalBackend {
    pub async fn new(config: LocalStorageConfig) -> ServerResult<Self> {
        for bucket in Bucket::all() {
            fs::create_dir_all(config.path.join(bucket.as_str()))
                .await
                .map_err(ServerError::storage_error)?;
        }

        Ok(Self { config })
    }

    fn get_path(&self, bucket: Bucket, key: &Hash) -> PathBuf {
        self.config
            .path
            .join(bucket.as_str())
            .join(key.to_base16())
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    async fn put_file(
        &self,
        bucket: Bucket,
        key: &Hash,
        path: &Path,
        _content_type: &str,
    ) -> ServerResult<u64> {
        let dest = self.get_path(bucket, key);
        let dir = self.config.path.join(bucket.as_str());

        // Copy next to the destination, then rename over it
        let temp = tempfile::Builder::new()
            .prefix(".put-")
            .tempfile_in(&dir)
            .map_err(ServerError::storage_error)?
            .into_temp_path();

        fs::copy(path, &temp)
            .await
            .map_err(ServerError::storage_error)?;

        temp.persist(&dest).map_err(ServerError::storage_error)?;

        let metadata = fs::metadata(&dest)
            .await
            .map_err(ServerError::storage_error)?;

        tracing::debug!("Stored {:?} ({} bytes)", dest, metadata.len());

        Ok(metadata.len())
    }

    async fn get_file(&self, bucket: Bucket, key: &Hash) -> ServerResult<Download> {
        let file = File::open(self.get_path(bucket, key))
            .await
            .map_err(ServerError::storage_error)?;

        let size = file
            .metadata()
            .await
            .map_err(ServerError::storage_error)?
            .len();

        Ok(Download {
            stream: Box::new(file),
            size,
        })
    }

    async fn stat_file(&self, bucket: Bucket, key: &Hash) -> ServerResult<Option<u64>> {
        match fs::metadata(self.get_path(bucket, key)).await {
            Ok(metadata) => Ok(Some(metadata.len())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ServerError::storage_error(e)),
        }
    }
}
