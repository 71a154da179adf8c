use async_compression::Level;
use async_compression::tokio::bufread::BrotliDecoder;
use async_compression::tokio::write::BrotliEncoder;
use tokio::io::{AsyncBufRead, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Format tag written ahead of every compressed bundle.
pub const MAGIC_ID: &[u8; 4] = b"EZBR";

const BROTLI_QUALITY: i32 = 6;

/// Returns true when `header` starts with [`MAGIC_ID`].
pub fn is_compressed(header: &[u8]) -> bool {
    header.starts_with(MAGIC_ID)
}

/// Write [`MAGIC_ID`] followed by a brotli stream of everything read from `reader`.
///
/// Data is streamed in chunks; the raw bundle is never held in memory here.
/// Returns the number of uncompressed bytes consumed.
pub async fn compress<R, W>(reader: &mut R, writer: &mut W) -> Result<u64, CompressError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(MAGIC_ID)
        .await
        .map_err(|e| CompressError::WriteMagic { source: e })?;

    let mut encoder = BrotliEncoder::with_quality(writer, Level::Precise(BROTLI_QUALITY));
    let consumed = tokio::io::copy(reader, &mut encoder)
        .await
        .map_err(|e| CompressError::Compress { source: e })?;
    encoder
        .shutdown()
        .await
        .map_err(|e| CompressError::Compress { source: e })?;

    tracing::debug!(bytes = consumed, "compressed bundle");
    Ok(consumed)
}

/// Inverse of [`compress`]: checks the tag, then inflates into `writer`.
pub async fn decompress<R, W>(reader: &mut R, writer: &mut W) -> Result<u64, CompressError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut magic = [0u8; 4];
    reader
        .read_exact(&mut magic)
        .await
        .map_err(|e| CompressError::ReadMagic { source: e })?;
    if !is_compressed(&magic) {
        return Err(CompressError::UnknownFormat { found: magic });
    }

    let mut decoder = BrotliDecoder::new(reader);
    let written = tokio::io::copy(&mut decoder, writer)
        .await
        .map_err(|e| CompressError::Decompress { source: e })?;
    writer
        .flush()
        .await
        .map_err(|e| CompressError::Decompress { source: e })?;
    Ok(written)
}

#[derive(Debug, thiserror::Error)]
pub enum CompressError {
    #[error("failed to write format tag")]
    WriteMagic { source: std::io::Error },

    #[error("failed to compress bundle")]
    Compress { source: std::io::Error },

    #[error("failed to read format tag")]
    ReadMagic { source: std::io::Error },

    #[error("unknown bundle format tag {found:?}")]
    UnknownFormat { found: [u8; 4] },

    #[error("failed to decompress bundle")]
    Decompress { source: std::io::Error },
}
