//! Streaming MD5 content fingerprint.

use std::path::Path;

use mediasort_core::ContentFingerprint;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

use crate::OrganizeError;

const CHUNK_SIZE: usize = 64 * 1024;

/// Hash `path` in fixed-size chunks. The token is checked between chunks.
pub async fn fingerprint(
    path: &Path,
    cancel: &CancellationToken,
) -> Result<ContentFingerprint, OrganizeError> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut ctx = md5::Context::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut size: i64 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(OrganizeError::Cancelled);
        }
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        ctx.consume(&buf[..n]);
        size += n as i64;
    }

    Ok(ContentFingerprint::new(ctx.compute().0, size))
}
