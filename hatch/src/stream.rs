//! Stream utilities.

use std::io::{Error as IoError, ErrorKind as IoErrorKind};
use std::marker::Unpin;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use digest::{Digest, Output as DigestOutput};
use sha2::Sha256;
use tokio::io::{self, AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::OnceCell;

use crate::hash::Hash;

/// Stream filter that hashes the bytes that have been read.
///
/// The hash is finalized when EOF is reached.
pub struct StreamHasher<R: AsyncRead + Unpin, D: Digest + Unpin> {
    inner: R,
    digest: Option<D>,
    bytes_read: usize,
    finalized: Arc<OnceCell<(DigestOutput<D>, usize)>>,
}

impl<R: AsyncRead + Unpin, D: Digest + Unpin> StreamHasher<R, D> {
    pub fn new(inner: R, digest: D) -> (Self, Arc<OnceCell<(DigestOutput<D>, usize)>>) {
        let finalized = Arc::new(OnceCell::new());

        (
            Self {
                inner,
                digest: Some(digest),
                bytes_read: 0,
                finalized: finalized.clone(),
            },
            finalized,
        )
    }
}

impl<R: AsyncRead + Unpin, D: Digest + Unpin> AsyncRead for StreamHasher<R, D> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<tokio::io::Result<()>> {
        let old_filled = buf.filled().len();
        let r = Pin::new(&mut self.inner).poll_read(cx, buf);
        let read_len = buf.filled().len() - old_filled;

        match r {
            Poll::Ready(Ok(())) => {
                if read_len == 0 {
                    // EOF
                    if let Some(digest) = self.digest.take() {
                        let bytes_read = self.bytes_read;
                        let _ = self.finalized.set((digest.finalize(), bytes_read));
                    }
                } else if let Some(digest) = self.digest.as_mut() {
                    let filled = buf.filled();
                    digest.update(&filled[filled.len() - read_len..]);
                    self.bytes_read += read_len;
                } else {
                    return Poll::Ready(Err(IoError::new(
                        IoErrorKind::Other,
                        "Stream has data after EOF",
                    )));
                }
            }
            Poll::Ready(Err(_)) => {}
            Poll::Pending => {}
        }

        r
    }
}

/// Copies a stream into a writer, returning the SHA-256 hash and size of the bytes copied.
///
/// The writer is flushed before returning.
pub async fn copy_sha256<R, W>(reader: R, writer: &mut W) -> io::Result<(Hash, usize)>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + ?Sized,
{
    use tokio::io::AsyncWriteExt;

    let (mut stream, finalized) = StreamHasher::new(reader, Sha256::new());
    io::copy(&mut stream, writer).await?;
    writer.flush().await?;

    let (digest, size) = finalized
        .get()
        .ok_or_else(|| IoError::new(IoErrorKind::UnexpectedEof, "Hash wasn't finalized"))?;

    let hash = Hash::sha256_from_digest(digest.as_slice())
        .map_err(|e| IoError::new(IoErrorKind::InvalidData, e.to_string()))?;

    Ok((hash, *size))
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::AsyncReadExt;
    use tokio_test::block_on;

    #[test]
    fn test_stream_hasher() {
        let expected = b"hello world";
        let expected_sha256 =
            hex::decode("b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9")
                .unwrap();

        let (mut read, finalized) = StreamHasher::new(expected.as_slice(), sha2::Sha256::new());
        assert!(finalized.get().is_none());

        // force multiple reads
        let mut buf = vec![0u8; 100];
        let mut bytes_read = 0;
        bytes_read += block_on(read.read(&mut buf[bytes_read..bytes_read + 5])).unwrap();
        bytes_read += block_on(read.read(&mut buf[bytes_read..bytes_read + 5])).unwrap();
        bytes_read += block_on(read.read(&mut buf[bytes_read..bytes_read + 5])).unwrap();
        bytes_read += block_on(read.read(&mut buf[bytes_read..bytes_read + 5])).unwrap();

        assert_eq!(expected.len(), bytes_read);
        assert_eq!(expected, &buf[..bytes_read]);

        let (hash, count) = finalized.get().expect("Hash wasn't finalized");

        assert_eq!(expected_sha256.as_slice(), hash.as_slice());
        assert_eq!(expected.len(), *count);
    }

    #[test]
    fn test_copy_sha256() {
        let data = crate::testing::get_fake_data(100_000);
        let mut out = Vec::new();

        let (hash, size) = block_on(copy_sha256(data.as_slice(), &mut out)).unwrap();

        assert_eq!(data.len(), size);
        assert_eq!(data, out);
        assert_eq!(Hash::sha256_from_bytes(&data), hash);
    }

    #[test]
    fn test_copy_sha256_empty() {
        let mut out = Vec::new();
        let (hash, size) = block_on(copy_sha256(&b""[..], &mut out)).unwrap();

        assert_eq!(0, size);
        assert_eq!(
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
            hash.to_base16()
        );
    }
}
