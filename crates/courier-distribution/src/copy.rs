//! Copy primitive shared by the backup and distribute stages.
//!
//! Two object-storage adapters on the same physical store copy server-side.
//! Everything else is streamed through the process: the source's read
//! handle into the destination's write handle, falling back to whole-object
//! reads and writes on backends without streaming access. Handles are
//! released exactly once through their guards on every exit path.

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use courier_vfs::{CreateFlags, Fs, Opened, ProviderKind, ReadHandle, WriteHandle, path};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{DistributionError, DistributionResult};

/// Await `future` unless `cancel` fires first.
///
/// # Errors
///
/// Returns [`DistributionError::Cancelled`] when the token fires first.
pub async fn cancellable<F>(cancel: &CancellationToken, future: F) -> DistributionResult<F::Output>
where
    F: Future,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(DistributionError::Cancelled),
        output = future => Ok(output),
    }
}

/// Whether a copy between the adapters can stay inside the object store.
#[must_use]
pub fn is_server_side(source: &Arc<dyn Fs>, target: &Arc<dyn Fs>) -> bool {
    source.provider() == ProviderKind::ObjectStorage
        && target.provider() == ProviderKind::ObjectStorage
        && (Arc::ptr_eq(source, target) || source.storage_identity() == target.storage_identity())
}

/// Copy `src_path` on `source` to `dst_path` on `target`, returning the
/// number of bytes written.
///
/// # Errors
///
/// Returns [`DistributionError::OpenFailed`] or
/// [`DistributionError::CreateFailed`] when either side cannot be opened,
/// [`DistributionError::TransferFailed`] when moving bytes fails and
/// [`DistributionError::Cancelled`] when `cancel` fires.
pub async fn copy_file(
    source: &Arc<dyn Fs>,
    target: &Arc<dyn Fs>,
    src_path: &str,
    dst_path: &str,
    cancel: &CancellationToken,
) -> DistributionResult<u64> {
    if Arc::ptr_eq(source, target) && src_path == dst_path {
        return Ok(0);
    }

    if is_server_side(source, target) {
        cancellable(cancel, source.copy(src_path, dst_path))
            .await?
            .map_err(|err| DistributionError::Storage {
                operation: "copy",
                path: dst_path.to_string(),
                source: err,
            })?;
        let size = match cancellable(cancel, source.stat(dst_path)).await? {
            Ok(info) => info.size,
            Err(err) => {
                debug!(path = dst_path, error = %err, "size of server-side copy unavailable");
                0
            }
        };
        info!(source = src_path, target = dst_path, bytes = size, "copied file server-side");
        return Ok(size);
    }

    let reader = open_source(source, src_path, cancel).await?;
    ensure_parent(target, dst_path, cancel).await?;
    let writer = match cancellable(cancel, target.create(dst_path, CreateFlags::default())).await? {
        Ok(opened) => Some(opened),
        Err(err) if target.is_not_supported(&err) => None,
        Err(err) => {
            return Err(DistributionError::CreateFailed {
                path: dst_path.to_string(),
                source: err,
            });
        }
    };

    let bytes = match (reader, writer) {
        (Reader::Stream(mut reader), Some(mut writer)) => {
            let copied = cancellable(cancel, stream(&mut reader.handle, &mut writer.handle))
                .await?
                .map_err(|err| transfer_failed(dst_path, err))?;
            reader.release.release();
            writer.release.release();
            copied
        }
        (Reader::Stream(mut reader), None) => {
            let mut buffer = Vec::new();
            cancellable(cancel, reader.handle.read_to_end(&mut buffer))
                .await?
                .map_err(|err| transfer_failed(src_path, err))?;
            reader.release.release();
            write_whole(target, dst_path, Bytes::from(buffer), cancel).await?
        }
        (Reader::Whole(data), Some(mut writer)) => {
            let length = data.len() as u64;
            cancellable(cancel, write_stream(&mut writer.handle, &data))
                .await?
                .map_err(|err| transfer_failed(dst_path, err))?;
            writer.release.release();
            length
        }
        (Reader::Whole(data), None) => write_whole(target, dst_path, data, cancel).await?,
    };

    info!(source = src_path, target = dst_path, bytes, "copied file");
    Ok(bytes)
}

/// Create the parent directory of `name` when the backend has real
/// directories and the parent is missing.
///
/// # Errors
///
/// Returns [`DistributionError::Storage`] when the parent cannot be
/// inspected or created.
pub async fn ensure_parent(
    fs: &Arc<dyn Fs>,
    name: &str,
    cancel: &CancellationToken,
) -> DistributionResult<()> {
    if fs.has_virtual_folders() {
        return Ok(());
    }
    let parent = path::parent(name);
    match cancellable(cancel, fs.stat(&parent)).await? {
        Ok(_) => Ok(()),
        Err(err) if fs.is_not_exist(&err) => cancellable(cancel, fs.mkdir_all(&parent))
            .await?
            .map_err(|source| DistributionError::Storage {
                operation: "mkdir_all",
                path: parent,
                source,
            }),
        Err(source) => Err(DistributionError::Storage {
            operation: "stat",
            path: parent,
            source,
        }),
    }
}

enum Reader {
    Stream(Opened<ReadHandle>),
    Whole(Bytes),
}

async fn open_source(
    fs: &Arc<dyn Fs>,
    name: &str,
    cancel: &CancellationToken,
) -> DistributionResult<Reader> {
    match cancellable(cancel, fs.open(name, 0)).await? {
        Ok(opened) => Ok(Reader::Stream(opened)),
        Err(err) if fs.is_not_supported(&err) => cancellable(cancel, fs.read_all(name))
            .await?
            .map(Reader::Whole)
            .map_err(|source| DistributionError::OpenFailed {
                path: name.to_string(),
                source,
            }),
        Err(source) => Err(DistributionError::OpenFailed {
            path: name.to_string(),
            source,
        }),
    }
}

async fn stream(reader: &mut ReadHandle, writer: &mut WriteHandle) -> std::io::Result<u64> {
    let copied = tokio::io::copy(reader, writer).await?;
    writer.shutdown().await?;
    Ok(copied)
}

async fn write_stream(writer: &mut WriteHandle, data: &[u8]) -> std::io::Result<()> {
    writer.write_all(data).await?;
    writer.shutdown().await
}

async fn write_whole(
    fs: &Arc<dyn Fs>,
    name: &str,
    data: Bytes,
    cancel: &CancellationToken,
) -> DistributionResult<u64> {
    let length = data.len() as u64;
    cancellable(cancel, fs.write_all(name, data))
        .await?
        .map_err(|source| DistributionError::CreateFailed {
            path: name.to_string(),
            source,
        })?;
    Ok(length)
}

fn transfer_failed(path: &str, source: std::io::Error) -> DistributionError {
    DistributionError::TransferFailed {
        path: path.to_string(),
        source,
    }
}
