//! Project archive inspection and pruning.
//!
//! Archives are ZIP files. Only the central directory is read when
//! listing entries; entry bodies are never decompressed, and pruning
//! copies the remaining entries verbatim.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use zip::result::ZipError;
use zip::{ZipArchive, ZipWriter};

use crate::error::{ServerError, ServerResult};

/// Name of the project manifest.
///
/// The manifest is never pruned.
pub const MANIFEST_NAME: &str = "project.json";

/// Extensions of entries treated as assets.
const ASSET_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".bmp", ".mp3", ".wav", ".ogg",
];

/// The kind of an archive entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// The project manifest.
    Manifest,

    /// An image or sound referenced by the manifest.
    Asset,

    /// Anything else.
    ///
    /// These are kept in the archive but not validated.
    Other,
}

/// An entry in the table of contents of an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,

    /// Uncompressed size of the entry.
    pub size: u64,

    pub kind: EntryKind,
}

impl EntryKind {
    pub fn classify(name: &str) -> Self {
        if name == MANIFEST_NAME {
            return Self::Manifest;
        }

        let lower = name.to_ascii_lowercase();
        if ASSET_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
            Self::Asset
        } else {
            Self::Other
        }
    }
}

/// Lists the entries of an archive, enforcing the asset size ceiling.
///
/// Listing stops at the first asset larger than `max_asset_size`, which
/// fails with `AssetTooLarge`. Entries that are not assets are never
/// size-checked.
pub fn inspect(path: &Path, max_asset_size: u64) -> ServerResult<Vec<ArchiveEntry>> {
    let file = File::open(path).map_err(ServerError::scratch_error)?;
    let mut archive = ZipArchive::new(BufReader::new(file)).map_err(archive_error)?;

    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let entry = archive.by_index_raw(i).map_err(archive_error)?;

        if entry.is_dir() {
            continue;
        }

        let name = entry.name().to_owned();
        let size = entry.size();
        let kind = EntryKind::classify(&name);

        if kind == EntryKind::Asset && size > max_asset_size {
            return Err(ServerError::AssetTooLarge { name, size });
        }

        entries.push(ArchiveEntry { name, size, kind });
    }

    Ok(entries)
}

/// Removes entries from an archive in place.
///
/// The manifest is kept even if it is named in `remove`. The archive is
/// rewritten to a sibling file that replaces the original only once it
/// is complete, so on failure the original is left untouched. Returns
/// the number of entries removed.
pub fn prune(path: &Path, remove: &HashSet<String>) -> ServerResult<usize> {
    let dir = path.parent().ok_or_else(|| {
        ServerError::ScratchIoError(anyhow::anyhow!("Archive {:?} has no parent", path))
    })?;

    let source = File::open(path).map_err(ServerError::scratch_error)?;
    let mut archive = ZipArchive::new(BufReader::new(source)).map_err(archive_error)?;

    let pruned = tempfile::Builder::new()
        .prefix(".pruned-")
        .tempfile_in(dir)
        .map_err(ServerError::scratch_error)?;

    let mut writer = ZipWriter::new(BufWriter::new(
        pruned.reopen().map_err(ServerError::scratch_error)?,
    ));

    let mut removed = 0;
    for i in 0..archive.len() {
        let entry = archive.by_index_raw(i).map_err(archive_error)?;

        if entry.name() != MANIFEST_NAME && remove.contains(entry.name()) {
            removed += 1;
            continue;
        }

        writer.raw_copy_file(entry).map_err(archive_error)?;
    }

    let mut inner = writer.finish().map_err(archive_error)?;
    std::io::Write::flush(&mut inner).map_err(ServerError::scratch_error)?;
    drop(inner);

    pruned
        .persist(path)
        .map_err(|e| ServerError::scratch_error(e.error))?;

    Ok(removed)
}

fn archive_error(e: ZipError) -> ServerError {
    match e {
        ZipError::Io(e) => ServerError::scratch_error(e),
        e => ServerError::request_error(e),
    }
}
