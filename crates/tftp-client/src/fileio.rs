//! Local file adapter: open for read/write, bounded reads, exact writes.
//!
//! Closes the underlying handle on `Drop`, so every exit path from the
//! Transfer Engine releases the file whether or not `close` was called
//! explicitly.

use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{Result, TftpClientError};
use crate::DEFAULT_BLOCK_SIZE;

pub struct FileHandle {
    file: Option<File>,
}

impl FileHandle {
    pub async fn open_read(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .await
            .map_err(|e| TftpClientError::FileOpen(format!("{}: {e}", path.display())))?;
        Ok(Self { file: Some(file) })
    }

    /// Creates the file if absent, truncating it if present.
    pub async fn open_write(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .await
            .map_err(|e| TftpClientError::FileOpen(format!("{}: {e}", path.display())))?;
        Ok(Self { file: Some(file) })
    }

    /// Reads up to 512 bytes. Returns `Ok(0)` only at genuine end-of-file;
    /// any I/O fault is reported as `FileRead`.
    pub async fn read_block(&mut self) -> Result<Vec<u8>> {
        let file = self.file.as_mut().ok_or(TftpClientError::InvalidState)?;
        let mut buf = vec![0u8; DEFAULT_BLOCK_SIZE];
        let mut total = 0;
        while total < buf.len() {
            let n = file
                .read(&mut buf[total..])
                .await
                .map_err(|_| TftpClientError::FileRead)?;
            if n == 0 {
                break;
            }
            total += n;
        }
        buf.truncate(total);
        Ok(buf)
    }

    /// Writes `bytes` in full; a short write surfaces as `FileWrite`.
    pub async fn write_block(&mut self, bytes: &[u8]) -> Result<()> {
        let file = self.file.as_mut().ok_or(TftpClientError::InvalidState)?;
        file.write_all(bytes)
            .await
            .map_err(|_| TftpClientError::FileWrite)?;
        Ok(())
    }

    /// Idempotent: a second call is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush().await.map_err(|_| TftpClientError::FileWrite)?;
        }
        Ok(())
    }
}
