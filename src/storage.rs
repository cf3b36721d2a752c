//! Byte storage: the only place this crate touches the filesystem.
//!
//! Both functions consult the [`IoContext`] flag — async mode goes through
//! `tokio::fs` and suspends at the I/O boundary, blocking mode goes through
//! `std::fs`. Storage failures propagate unchanged; nothing here retries.

use std::path::Path;

use tokio::task::JoinHandle;

use crate::context::IoContext;
use crate::error::Result;

/// The result of a write operation.
#[derive(Debug)]
pub enum WriteOutcome {
    /// The write completed; this many bytes are on storage.
    Written(u64),
    /// The in-memory sentinel was used: here are the encoded bytes, storage
    /// was not touched.
    Bytes(Vec<u8>),
    /// A delayed write: the storage write runs as a background task and this
    /// handle resolves to the byte count once it finishes.
    Pending(JoinHandle<Result<u64>>),
}

impl WriteOutcome {
    /// Wait for completion and return the byte count (for [`Bytes`], the
    /// length of the returned buffer).
    ///
    /// [`Bytes`]: WriteOutcome::Bytes
    pub async fn resolve(self) -> Result<u64> {
        match self {
            Self::Written(count) => Ok(count),
            Self::Bytes(data) => Ok(data.len() as u64),
            Self::Pending(handle) => handle.await?,
        }
    }

    /// The encoded bytes, when the in-memory sentinel was used.
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Self::Bytes(data) => Some(data),
            _ => None,
        }
    }
}

/// Read a file's raw bytes, suspending only in async mode.
pub async fn read_binary(path: &Path, ctx: &IoContext) -> Result<Vec<u8>> {
    if ctx.async_mode()? {
        Ok(tokio::fs::read(path).await?)
    } else {
        Ok(std::fs::read(path)?)
    }
}

/// Write raw bytes to a file, optionally setting Unix permission bits.
///
/// With `delayed` set in async mode, the write is spawned as a background
/// task and [`WriteOutcome::Pending`] is returned immediately. In blocking
/// mode a set `delayed` flag silently degrades to a completed synchronous
/// write — there is no scheduler to park the work on.
pub async fn write_binary(
    path: &Path,
    data: Vec<u8>,
    file_mode: Option<u32>,
    delayed: bool,
    ctx: &IoContext,
) -> Result<WriteOutcome> {
    let async_mode = ctx.async_mode()?;

    if async_mode && delayed {
        let path = path.to_path_buf();
        log::debug!("scheduling delayed write of {} bytes to {}", data.len(), path.display());
        let handle = tokio::spawn(async move { put_async(&path, &data, file_mode).await });
        return Ok(WriteOutcome::Pending(handle));
    }

    let count = if async_mode {
        put_async(path, &data, file_mode).await?
    } else {
        put_blocking(path, &data, file_mode)?
    };
    Ok(WriteOutcome::Written(count))
}

async fn put_async(path: &Path, data: &[u8], file_mode: Option<u32>) -> Result<u64> {
    tokio::fs::write(path, data).await?;
    if let Some(mode) = file_mode {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
        }
        #[cfg(not(unix))]
        log::debug!("ignoring file mode {mode:o} on non-unix platform");
    }
    Ok(data.len() as u64)
}

fn put_blocking(path: &Path, data: &[u8], file_mode: Option<u32>) -> Result<u64> {
    std::fs::write(path, data)?;
    if let Some(mode) = file_mode {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
        }
        #[cfg(not(unix))]
        log::debug!("ignoring file mode {mode:o} on non-unix platform");
    }
    Ok(data.len() as u64)
}
