//! The storage adapter contract.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{VfsError, VfsResult};
use crate::handle::{Opened, ReadHandle, WriteHandle};
use crate::info::FileInfo;
use crate::storage::{ProviderKind, StorageIdentity};

/// Flags for [`Fs::create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateFlags {
    /// Discard existing contents.
    pub truncate: bool,
    /// Append to existing contents.
    pub append: bool,
}

impl Default for CreateFlags {
    fn default() -> Self {
        Self {
            truncate: true,
            append: false,
        }
    }
}

/// Uniform operations every storage backend implements.
///
/// Paths passed to the file operations are backend-native, as produced by
/// [`Fs::resolve_path`]. Operations a backend cannot perform return
/// [`VfsError::Unsupported`] so callers branch on capability, not on backend
/// identity.
#[async_trait]
pub trait Fs: Send + Sync + fmt::Debug {
    /// Adapter name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Connection the adapter was opened for.
    fn connection_id(&self) -> &str;

    /// Stable identifier of the underlying store.
    fn storage_id(&self) -> String;

    /// Backend technology.
    fn provider(&self) -> ProviderKind;

    /// Identity of the physical store.
    fn storage_identity(&self) -> StorageIdentity;

    /// Metadata for `name`, following links.
    async fn stat(&self, name: &str) -> VfsResult<FileInfo>;

    /// Metadata for `name` without following links.
    async fn lstat(&self, name: &str) -> VfsResult<FileInfo>;

    /// Open `name` for reading starting at `offset`.
    async fn open(&self, name: &str, offset: u64) -> VfsResult<Opened<ReadHandle>>;

    /// Open `name` for writing.
    async fn create(&self, name: &str, flags: CreateFlags) -> VfsResult<Opened<WriteHandle>>;

    /// Remove a file, or an empty directory when `is_dir` is set.
    async fn remove(&self, name: &str, is_dir: bool) -> VfsResult<()>;

    /// Move `source` to `target`.
    async fn rename(&self, source: &str, target: &str) -> VfsResult<()>;

    /// Copy `source` to `target` inside this store. Identical paths succeed
    /// without touching the backend.
    async fn copy(&self, source: &str, target: &str) -> VfsResult<()>;

    /// Create a link at `target` pointing to `source`.
    async fn symlink(&self, source: &str, target: &str) -> VfsResult<()>;

    /// Path a link points to.
    async fn readlink(&self, name: &str) -> VfsResult<String>;

    /// Create one directory.
    async fn mkdir(&self, name: &str) -> VfsResult<()>;

    /// Create a directory and any missing parents.
    async fn mkdir_all(&self, name: &str) -> VfsResult<()>;

    /// List the entries of a directory.
    async fn read_dir(&self, name: &str) -> VfsResult<Vec<FileInfo>>;

    /// Resize a file.
    async fn truncate(&self, name: &str, size: u64) -> VfsResult<()>;

    /// Read a whole file into memory.
    async fn read_all(&self, name: &str) -> VfsResult<Bytes>;

    /// Replace a whole file with `data`.
    async fn write_all(&self, name: &str, data: Bytes) -> VfsResult<()>;

    /// Translate a virtual path into a backend-native path.
    fn resolve_path(&self, virtual_path: &str) -> VfsResult<String>;

    /// Translate a backend-native path back into a virtual path.
    fn get_relative_path(&self, name: &str) -> String;

    /// Whether `err` means the path does not exist.
    fn is_not_exist(&self, err: &VfsError) -> bool;

    /// Whether `err` means access was refused.
    fn is_permission(&self, err: &VfsError) -> bool;

    /// Whether `err` is the capability-gap error.
    fn is_not_supported(&self, err: &VfsError) -> bool {
        err.is_unsupported()
    }

    /// Whether interrupted uploads can resume at an offset.
    fn is_upload_resume_supported(&self) -> bool;

    /// Whether uploads can be written to a temporary name and renamed.
    fn is_atomic_upload_supported(&self) -> bool;

    /// Whether directories exist only as key prefixes.
    fn has_virtual_folders(&self) -> bool;
}
