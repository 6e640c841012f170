//! Content hashing and scratch files.

use std::io;
use std::path::Path;

use tokio::fs::File;
use tokio::io::AsyncRead;

use crate::error::{ServerError, ServerResult};
use hatch::hash::Hash;
use hatch::stream::copy_sha256;

/// Number of bytes read for MIME sniffing.
const SNIFF_LEN: usize = 512;

/// Saves an upload stream to a scratch file, returning its hash and size.
pub async fn save_upload<S>(stream: S, path: &Path) -> ServerResult<(Hash, u64)>
where
    S: AsyncRead + Unpin,
{
    let mut file = File::create(path)
        .await
        .map_err(ServerError::scratch_error)?;

    let (hash, size) = copy_sha256(stream, &mut file)
        .await
        .map_err(from_stream_error)?;

    Ok((hash, size as u64))
}

/// Hashes a file.
///
/// The result only depends on the contents.
pub async fn hash_file(path: &Path) -> ServerResult<(Hash, u64)> {
    let file = File::open(path)
        .await
        .map_err(ServerError::scratch_error)?;

    let (hash, size) = copy_sha256(file, &mut tokio::io::sink())
        .await
        .map_err(ServerError::scratch_error)?;

    Ok((hash, size as u64))
}

/// Reads the first bytes of a file for sniffing.
pub async fn read_prefix(path: &Path) -> ServerResult<Vec<u8>> {
    use tokio::io::AsyncReadExt;

    let file = File::open(path)
        .await
        .map_err(ServerError::scratch_error)?;

    let mut prefix = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64)
        .read_to_end(&mut prefix)
        .await
        .map_err(ServerError::scratch_error)?;

    Ok(prefix)
}

/// Converts an error from copying an upload stream.
///
/// Upload streams may carry a `ServerError` (for example when the
/// request body is too large), which is passed through. Anything else
/// is a scratch I/O error.
fn from_stream_error(e: io::Error) -> ServerError {
    if !e.get_ref().map_or(false, |inner| inner.is::<ServerError>()) {
        return ServerError::scratch_error(e);
    }

    match e.into_inner().map(|inner| inner.downcast::<ServerError>()) {
        Some(Ok(inner)) => *inner,
        _ => ServerError::InternalServerError,
    }
}
