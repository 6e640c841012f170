//! The ingestion pipeline.
//!
//! ## Images
//!
//! Images (profile pictures and thumbnails) are ingested while the
//! client waits:
//!
//! ```text
//! save ─► sniff ─► transcode ─► hash ─► put ─► index + link (one transaction)
//! ```
//!
//! ## Projects
//!
//! Project archives are validated while the client waits, then finished
//! in a detached task:
//!
//! ```text
//!           client waits              │            detached
//! save ─► sniff ─► inspect ─► record  │  probe assets ─► prune ─► hash ─► put ─► index
//! ```
//!
//! The client gets a provisional record without a content hash or size.
//! Nothing is indexed until the archive is stored, and failures after
//! the response only reach the `Reporter`. There are no retries.
//!
//! In both flows the scratch directory is owned by the flow and removed
//! when the flow ends, however it ends.

mod archive;
mod assets;
mod hasher;
mod report;
mod transcode;


use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use chrono::Utc;
use sea_orm::{DatabaseConnection, TransactionTrait};
use tempfile::TempDir;
use tokio::fs;
use tokio::io::AsyncRead;
use tokio::task::{self, JoinHandle};
use tracing::instrument;

use crate::config::IngestConfig;
use crate::database::HatchDatabase;
use crate::error::{ServerError, ServerResult};
use crate::storage::{Download, StorageBackend};
use archive::{ArchiveEntry, EntryKind};
use transcode::ProcessedImage;
use hatch::api::v1::upload::UploadRecord;
use hatch::bucket::Bucket;
use hatch::hash::Hash;
use hatch::id::UploadId;
use hatch::mime;

pub use assets::{AssetExistenceCache, AssetProbe, HttpAssetProbe};
pub use report::{Reporter, TracingReporter};

/// The ingestion pipeline.
#[derive(Debug)]
pub struct Ingestor {
    config: IngestConfig,
    database: DatabaseConnection,
    storage: Arc<Box<dyn StorageBackend>>,

    /// If unset, archives are never pruned.
    assets: Option<Arc<AssetExistenceCache>>,

    reporter: Arc<dyn Reporter>,
}

/// A project archive that passed validation.
///
/// Dropping it without completing removes the scratch directory and
/// leaves no trace.
#[derive(Debug)]
pub struct PendingProject {
    record: UploadRecord,
    scratch: TempDir,
    archive_path: PathBuf,

    /// Hash and size of the archive as uploaded.
    original: (Hash, u64),

    entries: Vec<ArchiveEntry>,
}

/// An image that was transcoded but not yet stored.
///
/// Dropping it removes the scratch directory.
#[derive(Debug)]
pub struct PendingImage {
    id: UploadId,
    bucket: Bucket,
    filename: String,
    uploader: i64,
    scratch: TempDir,
    processed: ProcessedImage,
    hash: Hash,
}

impl PendingProject {
    /// Returns the provisional record of the upload.
    pub fn record(&self) -> &UploadRecord {
        &self.record
    }
}

impl Ingestor {
    pub fn new(
        config: IngestConfig,
        database: DatabaseConnection,
        storage: Arc<Box<dyn StorageBackend>>,
        assets: Option<Arc<AssetExistenceCache>>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            config,
            database,
            storage,
            assets,
            reporter,
        }
    }

    /// Ingests an image.
    ///
    /// For profile pictures, the uploader's profile picture is pointed at
    /// the new upload. For thumbnails with a `project`, the project's
    /// thumbnail is, as long as the uploader is its author.
    #[instrument(skip_all, fields(bucket = %bucket, uploader = uploader))]
    pub async fn ingest_image<S>(
        &self,
        bucket: Bucket,
        stream: S,
        filename: String,
        uploader: i64,
        project: Option<i64>,
    ) -> ServerResult<UploadRecord>
    where
        S: AsyncRead + Unpin,
    {
        if let Some(project_id) = project {
            if bucket != Bucket::Thumbnails {
                return Err(ServerError::RequestError(anyhow!(
                    "Only thumbnails can be attached to projects"
                )));
            }

            let project = self.database.find_project(project_id).await?;
            if project.author != uploader {
                return Err(ServerError::Forbidden);
            }
        }

        let pending = self.stage_image(bucket, stream, filename, uploader).await?;
        self.commit_image(pending, project).await
    }

    /// Transcodes an image into scratch without storing it.
    pub async fn stage_image<S>(
        &self,
        bucket: Bucket,
        stream: S,
        filename: String,
        uploader: i64,
    ) -> ServerResult<PendingImage>
    where
        S: AsyncRead + Unpin,
    {
        if !bucket.holds_images() {
            return Err(ServerError::RequestError(anyhow!(
                "Bucket {} does not hold images",
                bucket
            )));
        }

        let scratch = self.new_scratch().await?;
        let original = scratch.path().join("original");

        hasher::save_upload(stream, &original).await?;

        let mime = sniff_mime(&hasher::read_prefix(&original).await?);
        if !mime::is_image(mime) {
            return Err(ServerError::UnsupportedFileType {
                mime: mime.to_owned(),
            });
        }

        let processed = {
            let output_dir = scratch.path().to_owned();
            let cap = self.config.max_image_dimension;

            task::spawn_blocking(move || transcode::process_image(&original, &output_dir, cap))
                .await
                .map_err(ServerError::scratch_error)??
        };

        let (hash, _) = hasher::hash_file(&processed.path).await?;

        Ok(PendingImage {
            id: UploadId::generate(),
            bucket,
            filename,
            uploader,
            scratch,
            processed,
            hash,
        })
    }

    /// Stores and indexes a staged image.
    ///
    /// See `ingest_image` for what `project` does. The author check is
    /// repeated inside the transaction.
    #[instrument(skip_all, fields(upload = %pending.id))]
    pub async fn commit_image(
        &self,
        pending: PendingImage,
        project: Option<i64>,
    ) -> ServerResult<UploadRecord> {
        let PendingImage {
            id,
            bucket,
            filename,
            uploader,
            scratch,
            processed,
            hash,
        } = pending;

        let size = self
            .storage
            .put_file(bucket, &hash, &processed.path, processed.mime)
            .await?;

        let record = UploadRecord {
            id,
            bucket,
            content_hash: Some(hash),
            filename,
            mime: processed.mime.to_owned(),
            uploader_id: uploader,
            upload_timestamp: Some(Utc::now().timestamp()),
            size_bytes: Some(size),
            width: Some(processed.width),
            height: Some(processed.height),
        };

        let txn = self
            .database
            .begin()
            .await
            .map_err(ServerError::database_error)?;

        txn.index_upload(&record).await?;

        match (bucket, project) {
            (Bucket::Pfps, _) => {
                txn.set_profile_picture(uploader, &record.id).await?;
            }
            (Bucket::Thumbnails, Some(project_id)) => {
                if !txn
                    .set_project_thumbnail(project_id, uploader, &record.id)
                    .await?
                {
                    return Err(ServerError::Forbidden);
                }
            }
            _ => {}
        }

        txn.commit().await.map_err(ServerError::database_error)?;
        drop(scratch);

        tracing::info!(
            "Ingested image {} ({}, {}x{}, {} bytes)",
            record.id,
            record.mime,
            processed.width,
            processed.height,
            size
        );

        Ok(record)
    }

    /// Ingests a project archive.
    ///
    /// Returns the provisional record along with the handle of the task
    /// completing the upload. The task needs not be awaited.
    pub async fn ingest_project<S>(
        self: &Arc<Self>,
        stream: S,
        filename: String,
        uploader: i64,
    ) -> ServerResult<(UploadRecord, JoinHandle<()>)>
    where
        S: AsyncRead + Unpin,
    {
        let pending = self.stage_project(stream, filename, uploader).await?;
        let record = pending.record().clone();

        Ok((record, self.spawn_completion(pending)))
    }

    /// Validates a project archive.
    ///
    /// Nothing is stored or indexed. Use `spawn_completion` to finish
    /// the upload.
    #[instrument(skip_all, fields(uploader = uploader))]
    pub async fn stage_project<S>(
        &self,
        stream: S,
        filename: String,
        uploader: i64,
    ) -> ServerResult<PendingProject>
    where
        S: AsyncRead + Unpin,
    {
        let id = UploadId::generate();
        let scratch = self.new_scratch().await?;
        let archive_path = scratch.path().join("original");

        let original = hasher::save_upload(stream, &archive_path).await?;

        let mime = sniff_mime(&hasher::read_prefix(&archive_path).await?);
        if mime != mime::ZIP {
            return Err(ServerError::UnsupportedFileType {
                mime: mime.to_owned(),
            });
        }

        let entries = {
            let path = archive_path.clone();
            let max_asset_size = self.config.max_asset_size;

            task::spawn_blocking(move || archive::inspect(&path, max_asset_size))
                .await
                .map_err(ServerError::scratch_error)??
        };

        let record = UploadRecord {
            id,
            bucket: Bucket::Projects,
            content_hash: None,
            filename,
            mime: mime::ZIP.to_owned(),
            uploader_id: uploader,
            upload_timestamp: None,
            size_bytes: None,
            width: None,
            height: None,
        };

        tracing::debug!(
            "Staged project {} with {} entries",
            record.id,
            entries.len()
        );

        Ok(PendingProject {
            record,
            scratch,
            archive_path,
            original,
            entries,
        })
    }

    /// Completes a staged project in a detached task.
    ///
    /// Failures are sent to the reporter.
    pub fn spawn_completion(self: &Arc<Self>, pending: PendingProject) -> JoinHandle<()> {
        let ingestor = self.clone();

        tokio::spawn(async move {
            let id = pending.record.id.clone();

            match ingestor.complete_project(pending).await {
                Ok(record) => {
                    tracing::info!(
                        "Ingested project {} ({} bytes)",
                        record.id,
                        record.size_bytes.unwrap_or_default()
                    );
                }
                Err(e) => {
                    ingestor
                        .reporter
                        .report(&e, &format!("completing project upload {}", id));
                }
            }
        })
    }

    #[instrument(skip_all, fields(upload = %pending.record.id))]
    async fn complete_project(&self, pending: PendingProject) -> ServerResult<UploadRecord> {
        let PendingProject {
            mut record,
            scratch,
            archive_path,
            original,
            entries,
        } = pending;

        let confirmed = match &self.assets {
            Some(assets) => {
                let names = entries
                    .iter()
                    .filter(|e| e.kind == EntryKind::Asset)
                    .map(|e| e.name.as_str());

                assets.confirmed(names).await
            }
            None => HashSet::new(),
        };

        let mut pruned = false;
        if !confirmed.is_empty() {
            let path = archive_path.clone();
            let res = task::spawn_blocking(move || archive::prune(&path, &confirmed))
                .await
                .map_err(ServerError::scratch_error)
                .and_then(|r| r);

            // Pruning only saves space, so carry on with the full archive
            match res {
                Ok(removed) => {
                    tracing::debug!("Pruned {} external assets", removed);
                    pruned = removed > 0;
                }
                Err(e) => {
                    self.reporter
                        .report(&e, &format!("pruning project upload {}", record.id));
                }
            }
        }

        let (hash, _) = if pruned {
            hasher::hash_file(&archive_path).await?
        } else {
            original
        };

        let size = self
            .storage
            .put_file(Bucket::Projects, &hash, &archive_path, mime::ZIP)
            .await?;

        record.content_hash = Some(hash);
        record.size_bytes = Some(size);
        record.upload_timestamp = Some(Utc::now().timestamp());

        let txn = self
            .database
            .begin()
            .await
            .map_err(ServerError::database_error)?;

        txn.index_upload(&record).await?;
        txn.commit().await.map_err(ServerError::database_error)?;

        drop(scratch);

        Ok(record)
    }

    /// Downloads a stored object.
    pub async fn get_object(&self, bucket: Bucket, key: &Hash) -> ServerResult<Download> {
        self.storage.get_file(bucket, key).await
    }

    /// Returns the record of an indexed upload.
    pub async fn get_file_record(&self, id: &UploadId) -> ServerResult<UploadRecord> {
        self.database.find_upload(id).await?.to_record()
    }

    /// Creates a scratch directory for one upload.
    async fn new_scratch(&self) -> ServerResult<TempDir> {
        let parent = self.config.scratch_dir();
        fs::create_dir_all(&parent)
            .await
            .map_err(ServerError::scratch_error)?;

        tempfile::Builder::new()
            .prefix("ingest-")
            .tempdir_in(&parent)
            .map_err(ServerError::scratch_error)
    }
}

/// Identifies the type of a file from its first bytes.
///
/// Only the bytes are consulted, never the client's claims.
pub fn sniff_mime(prefix: &[u8]) -> &'static str {
    // Local file header, or the end of central directory of an empty archive
    if prefix.starts_with(b"PK\x03\x04") || prefix.starts_with(b"PK\x05\x06") {
        return mime::ZIP;
    }

    match ::image::guess_format(prefix) {
        Ok(format) => format.to_mime_type(),
        Err(_) => mime::OCTET_STREAM,
    }
}
