//! Flat object-store client seam and the filesystem emulation built on it.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::error::VfsResult;
use crate::storage::ObjectStorageConfig;

mod fs;
mod memory;
mod oss;

pub use fs::ObjectFs;
pub use memory::{MemoryConnector, MemoryObjectStore};
pub use oss::{OssClient, OssConnector};

/// Default page size used when walking a prefix for deletion.
pub const LIST_PAGE_SIZE: u32 = 1_000;

/// Metadata returned for a single object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Object key.
    pub key: String,
    /// Content length in bytes.
    pub size: u64,
    /// Last modification time.
    pub last_modified: DateTime<Utc>,
}

/// Parameters of a prefix listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    /// Only keys starting with this prefix are returned.
    pub prefix: String,
    /// Continue after this key.
    pub marker: Option<String>,
    /// Maximum number of keys in one page.
    pub max_keys: u32,
}

impl ListRequest {
    /// First page of `prefix`.
    #[must_use]
    pub fn new(prefix: impl Into<String>, max_keys: u32) -> Self {
        Self {
            prefix: prefix.into(),
            marker: None,
            max_keys,
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectListing {
    /// Objects on this page, in key order.
    pub objects: Vec<ObjectMeta>,
    /// Whether more pages follow.
    pub is_truncated: bool,
    /// Marker for the next page.
    pub next_marker: Option<String>,
}

/// How a server-side copy treats the source's user metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataDirective {
    /// Keep the source metadata.
    Copy,
    /// Replace metadata with the request's.
    Replace,
}

impl MetadataDirective {
    /// Header value for the directive.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Copy => "COPY",
            Self::Replace => "REPLACE",
        }
    }
}

/// Key/blob operations against one bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync + fmt::Debug {
    /// Whether the bucket is reachable.
    async fn bucket_exists(&self) -> VfsResult<bool>;

    /// Metadata for `key`, resolving links.
    async fn head_object(&self, key: &str) -> VfsResult<ObjectMeta>;

    /// One page of keys under a prefix.
    async fn list_objects(&self, request: &ListRequest) -> VfsResult<ObjectListing>;

    /// Store `body` at `key`.
    async fn put_object(&self, key: &str, body: Bytes) -> VfsResult<()>;

    /// Read the body of `key`, resolving links.
    async fn get_object(&self, key: &str) -> VfsResult<Bytes>;

    /// Delete `key`. Deleting a missing key succeeds.
    async fn delete_object(&self, key: &str) -> VfsResult<()>;

    /// Delete a batch of keys, returning the keys that could not be deleted.
    async fn delete_objects(&self, keys: &[String], quiet: bool) -> VfsResult<Vec<String>>;

    /// Server-side copy from `source` to `target`.
    async fn copy_object(
        &self,
        source: &str,
        target: &str,
        directive: MetadataDirective,
    ) -> VfsResult<()>;

    /// Create a link object at `link` pointing to `target`.
    async fn put_symlink(&self, link: &str, target: &str, forbid_overwrite: bool)
    -> VfsResult<()>;

    /// Target key of the link at `link`.
    async fn get_symlink(&self, link: &str) -> VfsResult<String>;
}

/// Produces object-store clients for account configurations.
pub trait ObjectStoreConnector: Send + Sync + fmt::Debug {
    /// Client bound to the configuration's bucket and credentials.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration cannot produce a client.
    fn connect(&self, config: &ObjectStorageConfig) -> VfsResult<Arc<dyn ObjectStore>>;
}
