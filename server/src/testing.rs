//! Utilities for testing.

use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::database::entity::user::{self, UserModel};
use crate::database::migration::Migrator;
use crate::error::{ServerError, ServerResult};
use crate::ingest::{AssetProbe, Reporter};
use crate::storage::{Download, LocalBackend, LocalStorageConfig, StorageBackend};
use hatch::bucket::Bucket;
use hatch::hash::Hash;
use hatch::testing::fake_token;

/// Creates a migrated SQLite database under `dir`.
pub async fn test_database(dir: &Path) -> DatabaseConnection {
    let url = format!("sqlite://{}?mode=rwc", dir.join("server.db").display());
    let db = Database::connect(&url).await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    db
}

/// Creates a user whose token is `fake_token(name)`.
pub async fn insert_user(
    db: &DatabaseConnection,
    name: &str,
    banned: bool,
    verified: bool,
) -> UserModel {
    let (_, token_hash) = fake_token(name);

    user::ActiveModel {
        name: Set(name.to_string()),
        token_hash: Set(token_hash),
        banned: Set(banned),
        verified: Set(verified),
        profile_picture: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

/// Writes a deflated ZIP archive.
pub fn write_archive(path: &Path, entries: &[(&str, Vec<u8>)]) {
    let mut writer = ZipWriter::new(File::create(path).unwrap());
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, data) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }

    writer.finish().unwrap();
}

/// Returns the names of the entries in an archive, in order.
pub fn archive_names(data: &[u8]) -> Vec<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data)).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index_raw(i).unwrap().name().to_owned())
        .collect()
}

/// Returns a PNG with a horizontal gradient.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });

    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// Local storage that counts the objects written to it.
#[derive(Debug)]
pub struct CountingStorage {
    inner: LocalBackend,
    puts: Arc<AtomicUsize>,
}

impl CountingStorage {
    pub async fn new(path: &Path) -> (Self, Arc<AtomicUsize>) {
        let inner = LocalBackend::new(LocalStorageConfig {
            path: path.to_owned(),
        })
        .await
        .unwrap();

        let puts = Arc::new(AtomicUsize::new(0));

        (
            Self {
                inner,
                puts: puts.clone(),
            },
            puts,
        )
    }
}

#[async_trait]
impl StorageBackend for CountingStorage {
    async fn put_file(
        &self,
        bucket: Bucket,
        key: &Hash,
        path: &Path,
        content_type: &str,
    ) -> ServerResult<u64> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put_file(bucket, key, path, content_type).await
    }

    async fn get_file(&self, bucket: Bucket, key: &Hash) -> ServerResult<Download> {
        self.inner.get_file(bucket, key).await
    }

    async fn stat_file(&self, bucket: Bucket, key: &Hash) -> ServerResult<Option<u64>> {
        self.inner.stat_file(bucket, key).await
    }
}

/// Storage that rejects every write and holds nothing.
#[derive(Debug)]
pub struct FailingStorage;

#[async_trait]
impl StorageBackend for FailingStorage {
    async fn put_file(
        &self,
        _bucket: Bucket,
        _key: &Hash,
        _path: &Path,
        _content_type: &str,
    ) -> ServerResult<u64> {
        Err(ServerError::StorageError(anyhow::anyhow!("Bucket is gone")))
    }

    async fn get_file(&self, _bucket: Bucket, _key: &Hash) -> ServerResult<Download> {
        Err(ServerError::NoSuchUpload)
    }

    async fn stat_file(&self, _bucket: Bucket, _key: &Hash) -> ServerResult<Option<u64>> {
        Ok(None)
    }
}

/// An answer from a `ScriptedProbe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeAnswer {
    Exists,
    Missing,
    Fail,
}

/// An asset probe that answers from a script.
///
/// Each name answers with its scripted answers in order, then with the
/// default answer.
#[derive(Debug)]
pub struct ScriptedProbe {
    default: ProbeAnswer,
    scripts: Mutex<HashMap<String, VecDeque<ProbeAnswer>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedProbe {
    pub fn new(default: ProbeAnswer) -> Self {
        Self {
            default,
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn script(&self, name: &str, answers: &[ProbeAnswer]) {
        self.scripts
            .lock()
            .unwrap()
            .insert(name.to_string(), answers.iter().copied().collect());
    }

    pub fn calls(&self, name: &str) -> usize {
        self.calls.lock().unwrap().get(name).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl AssetProbe for ScriptedProbe {
    async fn probe(&self, name: &str) -> ServerResult<bool> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default() += 1;

        let answer = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(name)
            .and_then(|answers| answers.pop_front())
            .unwrap_or(self.default);

        match answer {
            ProbeAnswer::Exists => Ok(true),
            ProbeAnswer::Missing => Ok(false),
            ProbeAnswer::Fail => Err(ServerError::AssetProbeError(anyhow::anyhow!(
                "Connection refused"
            ))),
        }
    }
}

/// A reporter that remembers what it was told.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<(String, String)>>,
}

impl RecordingReporter {
    /// Returns the reported error names with their contexts.
    pub fn events(&self) -> Vec<(String, String)> {
        self.events.lock().unwrap().clone()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, error: &ServerError, context: &str) {
        self.events
            .lock()
            .unwrap()
            .push((error.name().to_string(), context.to_string()));
    }
}
