//! Hierarchical filesystem emulated on a flat object store.
//!
//! Native paths are rooted, `/`-separated and already include the account's
//! key prefix (`/alice/in/report.csv`); object keys are the same string
//! without the leading separator. Directories exist implicitly whenever a
//! key lives under `path + "/"`, or explicitly as a zero-length marker
//! object whose key ends in `/`.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::{LIST_PAGE_SIZE, ListRequest, MetadataDirective, ObjectStore};
use crate::error::{VfsError, VfsResult};
use crate::fs::{CreateFlags, Fs};
use crate::handle::{Opened, ReadHandle, WriteHandle};
use crate::info::FileInfo;
use crate::path;
use crate::storage::{ObjectStorageConfig, ProviderKind, StorageIdentity};

const NAME: &str = "ossfs";
const CONTENTS_PROBE_KEYS: u32 = 2;

/// Object-storage adapter.
#[derive(Debug, Clone)]
pub struct ObjectFs {
    connection_id: String,
    mount_path: String,
    key_prefix: String,
    config: ObjectStorageConfig,
    store: Arc<dyn ObjectStore>,
    page_size: u32,
}

impl ObjectFs {
    /// Adapter for `config`, talking to the bucket through `store`.
    #[must_use]
    pub fn new(
        connection_id: impl Into<String>,
        config: ObjectStorageConfig,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        let key_prefix = config.normalized_prefix();
        Self {
            connection_id: connection_id.into(),
            mount_path: String::new(),
            key_prefix,
            config,
            store,
            page_size: LIST_PAGE_SIZE,
        }
    }

    /// Walk prefixes `page_size` keys at a time when deleting.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Expose the adapter under a virtual mount prefix.
    #[must_use]
    pub fn with_mount_path(mut self, mount_path: impl Into<String>) -> Self {
        self.mount_path = path::clean(&mount_path.into());
        if self.mount_path == "/" || self.mount_path == "." {
            self.mount_path.clear();
        }
        self
    }

    /// Normalised key prefix (`alice/`), empty when unset.
    #[must_use]
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// Storage configuration of the adapter.
    #[must_use]
    pub const fn config(&self) -> &ObjectStorageConfig {
        &self.config
    }

    fn object_key(name: &str) -> &str {
        name.trim_start_matches('/')
    }

    fn is_prefix_root(&self, name: &str) -> bool {
        !self.key_prefix.is_empty() && format!("/{}", self.key_prefix) == format!("{name}/")
    }

    async fn has_contents(&self, name: &str) -> VfsResult<bool> {
        let mut prefix = Self::object_key(name).to_string();
        if !prefix.ends_with('/') {
            prefix.push('/');
        }
        let listing = self
            .store
            .list_objects(&ListRequest::new(prefix.clone(), CONTENTS_PROBE_KEYS))
            .await?;
        Ok(listing.objects.iter().any(|object| object.key != prefix))
    }

    async fn delete_prefix(&self, prefix: &str) -> VfsResult<()> {
        let mut request = ListRequest::new(prefix, self.page_size);
        loop {
            let listing = self.store.list_objects(&request).await?;
            let keys: Vec<String> = listing
                .objects
                .into_iter()
                .map(|object| object.key)
                .collect();
            if !keys.is_empty() {
                let failed = self.store.delete_objects(&keys, true).await?;
                if let Some(first) = failed.first() {
                    return Err(VfsError::backend(
                        "delete_objects",
                        first.as_str(),
                        None,
                        None,
                        &format!("{} keys under {prefix} were not deleted", failed.len()),
                    ));
                }
            }
            if !listing.is_truncated {
                return Ok(());
            }
            match listing.next_marker {
                Some(marker) => request.marker = Some(marker),
                None => match keys.last() {
                    Some(last) => request.marker = Some(last.clone()),
                    None => return Ok(()),
                },
            }
        }
    }

    fn synthetic_dir(name: &str) -> FileInfo {
        FileInfo::directory(path::base(name), DateTime::<Utc>::UNIX_EPOCH)
    }
}

#[async_trait]
impl Fs for ObjectFs {
    fn name(&self) -> &'static str {
        NAME
    }

    fn connection_id(&self) -> &str {
        &self.connection_id
    }

    fn storage_id(&self) -> String {
        let endpoint = self.config.endpoint.trim_end_matches('/');
        if endpoint.is_empty() {
            format!("oss://{}", self.config.bucket)
        } else {
            format!("oss://{endpoint}/{}", self.config.bucket)
        }
    }

    fn provider(&self) -> ProviderKind {
        ProviderKind::ObjectStorage
    }

    fn storage_identity(&self) -> StorageIdentity {
        self.config.identity()
    }

    async fn stat(&self, name: &str) -> VfsResult<FileInfo> {
        if name.is_empty() || name == "/" || name == "." {
            if self.store.bucket_exists().await? {
                return Ok(Self::synthetic_dir(name));
            }
            return Err(VfsError::NotFound {
                operation: "stat",
                path: name.to_string(),
            });
        }
        if self.is_prefix_root(name) {
            return Ok(Self::synthetic_dir(name));
        }

        let key = Self::object_key(name);
        match self.store.head_object(key).await {
            Ok(meta) => return Ok(FileInfo::file(path::base(name), meta.size, meta.last_modified)),
            Err(err) if self.is_not_exist(&err) => {}
            Err(err) => return Err(err),
        }

        if self.has_contents(name).await? {
            return Ok(Self::synthetic_dir(name));
        }

        match self.store.head_object(&format!("{key}/")).await {
            Ok(meta) => Ok(FileInfo::directory(path::base(name), meta.last_modified)),
            Err(err) if self.is_not_exist(&err) => Err(VfsError::NotFound {
                operation: "stat",
                path: name.to_string(),
            }),
            Err(err) => Err(err),
        }
    }

    async fn lstat(&self, name: &str) -> VfsResult<FileInfo> {
        self.stat(name).await
    }

    async fn open(&self, _name: &str, _offset: u64) -> VfsResult<Opened<ReadHandle>> {
        Err(VfsError::unsupported("open", NAME))
    }

    async fn create(&self, _name: &str, _flags: CreateFlags) -> VfsResult<Opened<WriteHandle>> {
        Err(VfsError::unsupported("create", NAME))
    }

    async fn remove(&self, name: &str, is_dir: bool) -> VfsResult<()> {
        let mut key = Self::object_key(name).to_string();
        if is_dir {
            if self.has_contents(name).await? {
                return Err(VfsError::DirectoryNotEmpty {
                    operation: "remove",
                    path: name.to_string(),
                });
            }
            if !key.ends_with('/') {
                key.push('/');
            }
            self.delete_prefix(&key).await?;
        }
        self.store.delete_object(&key).await
    }

    async fn rename(&self, source: &str, target: &str) -> VfsResult<()> {
        if source == target {
            return Ok(());
        }
        let info = self.stat(source).await?;
        if info.is_dir() {
            return Err(VfsError::IsDirectory {
                operation: "rename",
                path: source.to_string(),
            });
        }
        self.copy(source, target).await?;
        self.remove(source, false).await
    }

    async fn copy(&self, source: &str, target: &str) -> VfsResult<()> {
        if source == target {
            return Ok(());
        }
        let info = self.stat(source).await?;
        if info.is_dir() {
            return Err(VfsError::IsDirectory {
                operation: "copy",
                path: source.to_string(),
            });
        }
        debug!(source, target, bucket = %self.config.bucket, "server-side copy");
        self.store
            .copy_object(
                Self::object_key(source),
                Self::object_key(target),
                MetadataDirective::Replace,
            )
            .await
    }

    async fn symlink(&self, source: &str, target: &str) -> VfsResult<()> {
        if source == target {
            return Ok(());
        }
        self.store
            .put_symlink(Self::object_key(target), Self::object_key(source), true)
            .await
    }

    async fn readlink(&self, name: &str) -> VfsResult<String> {
        let target = self.store.get_symlink(Self::object_key(name)).await?;
        Ok(format!("/{target}"))
    }

    async fn mkdir(&self, name: &str) -> VfsResult<()> {
        match self.stat(name).await {
            Ok(_) => return Ok(()),
            Err(err) if self.is_not_exist(&err) => {}
            Err(err) => return Err(err),
        }
        let key = format!("{}/", Self::object_key(name).trim_end_matches('/'));
        self.store.put_object(&key, Bytes::new()).await
    }

    async fn mkdir_all(&self, _name: &str) -> VfsResult<()> {
        Ok(())
    }

    async fn read_dir(&self, _name: &str) -> VfsResult<Vec<FileInfo>> {
        Err(VfsError::unsupported("read_dir", NAME))
    }

    async fn truncate(&self, _name: &str, _size: u64) -> VfsResult<()> {
        Err(VfsError::unsupported("truncate", NAME))
    }

    async fn read_all(&self, name: &str) -> VfsResult<Bytes> {
        self.store.get_object(Self::object_key(name)).await
    }

    async fn write_all(&self, name: &str, data: Bytes) -> VfsResult<()> {
        self.store.put_object(Self::object_key(name), data).await
    }

    fn resolve_path(&self, virtual_path: &str) -> VfsResult<String> {
        let mut relative = virtual_path;
        if !self.mount_path.is_empty() {
            relative = relative.strip_prefix(&self.mount_path).unwrap_or(relative);
        }
        let relative = if path::is_abs(relative) {
            relative.to_string()
        } else {
            path::clean(&format!("/{relative}"))
        };
        Ok(path::join(&["/", self.key_prefix.as_str(), relative.as_str()]))
    }

    fn get_relative_path(&self, name: &str) -> String {
        let mut relative = path::clean(name);
        if relative == "." {
            relative.clear();
        }
        if !path::is_abs(&relative) {
            relative = format!("/{relative}");
        }
        if !self.key_prefix.is_empty() {
            let rooted_prefix = format!("/{}", self.key_prefix);
            if !relative.starts_with(&rooted_prefix) {
                relative = "/".to_string();
            }
            let rest = relative.strip_prefix(&rooted_prefix).unwrap_or(&relative);
            relative = path::clean(&format!("/{rest}"));
        }
        if self.mount_path.is_empty() {
            relative
        } else {
            path::join(&[self.mount_path.as_str(), relative.as_str()])
        }
    }

    fn is_not_exist(&self, err: &VfsError) -> bool {
        match err {
            VfsError::NotFound { .. } => true,
            VfsError::Backend { .. } => {
                matches!(err.code(), Some("NoSuchKey" | "NoSuchBucket"))
                    || err.to_string().contains("404")
            }
            _ => false,
        }
    }

    fn is_permission(&self, err: &VfsError) -> bool {
        match err {
            VfsError::PermissionDenied { .. } => true,
            _ => err.to_string().contains("403"),
        }
    }

    fn is_upload_resume_supported(&self) -> bool {
        false
    }

    fn is_atomic_upload_supported(&self) -> bool {
        false
    }

    fn has_virtual_folders(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::MemoryObjectStore;
    use anyhow::Result;

    fn config(prefix: &str) -> ObjectStorageConfig {
        ObjectStorageConfig {
            bucket: "media".to_string(),
            endpoint: "oss-cn-hangzhou.aliyuncs.com".to_string(),
            access_key: "ak".to_string(),
            access_secret: "sk".to_string(),
            key_prefix: prefix.to_string(),
            ..ObjectStorageConfig::default()
        }
    }

    fn adapter(prefix: &str) -> (ObjectFs, Arc<MemoryObjectStore>) {
        let store = Arc::new(MemoryObjectStore::new("media"));
        let fs = ObjectFs::new("conn", config(prefix), store.clone());
        (fs, store)
    }

    #[tokio::test]
    async fn stat_reports_roots_files_and_implicit_directories() -> Result<()> {
        let (fs, store) = adapter("alice/");
        store.insert("alice/in/report.csv", Bytes::from_static(b"a,b"));

        assert!(fs.stat("/").await?.is_dir());
        assert!(fs.stat("/alice").await?.is_dir());
        assert!(fs.stat("/alice/in").await?.is_dir());

        let file = fs.stat("/alice/in/report.csv").await?;
        assert!(!file.is_dir());
        assert_eq!(file.size, 3);
        assert_eq!(file.name, "report.csv");

        let err = fs.stat("/alice/out").await.expect_err("nothing under out");
        assert!(fs.is_not_exist(&err));
        Ok(())
    }

    #[tokio::test]
    async fn prefix_root_is_a_directory_even_when_empty() -> Result<()> {
        let (fs, store) = adapter("alice/");
        assert!(fs.stat("/alice").await?.is_dir());
        assert_eq!(store.request_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_bucket_root_is_not_found() {
        let (fs, store) = adapter("");
        store.set_present(false);
        let err = fs.stat("/").await.expect_err("bucket is gone");
        assert!(fs.is_not_exist(&err));
    }

    #[tokio::test]
    async fn mkdir_writes_a_marker_that_stat_finds() -> Result<()> {
        let (fs, store) = adapter("alice/");
        fs.mkdir("/alice/empty").await?;
        assert!(store.contains("alice/empty/"));
        assert!(fs.stat("/alice/empty").await?.is_dir());

        let before = store.request_count();
        fs.mkdir("/alice/empty").await?;
        assert!(store.request_count() > before);
        assert_eq!(store.keys(), vec!["alice/empty/".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn recursive_remove_refuses_non_empty_directories() -> Result<()> {
        let (fs, store) = adapter("alice/");
        fs.mkdir("/alice/box").await?;
        store.insert("alice/box/item.csv", Bytes::from_static(b"1"));

        let err = fs
            .remove("/alice/box", true)
            .await
            .expect_err("non-empty directories stay");
        assert!(matches!(err, VfsError::DirectoryNotEmpty { .. }));
        assert!(store.contains("alice/box/item.csv"));

        fs.remove("/alice/box/item.csv", false).await?;
        fs.remove("/alice/box", true).await?;
        assert!(store.keys().is_empty());
        Ok(())
    }

    fn seeded(count: usize) -> (ObjectFs, Arc<MemoryObjectStore>) {
        let (fs, store) = adapter("");
        for index in 0..count {
            store.insert(format!("box/{index}.csv"), Bytes::from_static(b"1"));
        }
        store.insert("keep.csv", Bytes::from_static(b"1"));
        (fs.with_page_size(2), store)
    }

    #[tokio::test]
    async fn prefix_deletion_follows_next_markers_across_pages() -> Result<()> {
        let (fs, store) = seeded(5);
        fs.delete_prefix("box/").await?;

        assert_eq!(store.keys(), vec!["keep.csv".to_string()]);
        // Three listings, each followed by one batch delete.
        assert_eq!(store.request_count(), 6);
        Ok(())
    }

    #[tokio::test]
    async fn prefix_deletion_resumes_after_the_last_key_without_markers() -> Result<()> {
        let (fs, store) = seeded(5);
        store.set_omit_next_marker(true);
        fs.delete_prefix("box/").await?;

        assert_eq!(store.keys(), vec!["keep.csv".to_string()]);
        assert_eq!(store.request_count(), 6);
        Ok(())
    }

    #[tokio::test]
    async fn prefix_deletion_reports_keys_left_behind() -> Result<()> {
        let (fs, store) = seeded(5);
        store.pin("box/3.csv");

        let err = fs
            .delete_prefix("box/")
            .await
            .expect_err("a pinned key survives the batch");
        assert!(matches!(
            &err,
            VfsError::Backend { operation: "delete_objects", key, .. } if key == "box/3.csv"
        ));
        assert!(!store.contains("box/2.csv"));
        assert!(store.contains("box/3.csv"));
        assert!(store.contains("box/4.csv"));
        Ok(())
    }

    #[tokio::test]
    async fn copy_and_rename_reject_directories() -> Result<()> {
        let (fs, store) = adapter("");
        store.insert("dir/file", Bytes::from_static(b"1"));
        let err = fs.copy("/dir", "/other").await.expect_err("dir copy");
        assert!(matches!(err, VfsError::IsDirectory { .. }));
        let err = fs.rename("/dir", "/other").await.expect_err("dir rename");
        assert!(matches!(err, VfsError::IsDirectory { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn rename_is_copy_then_remove() -> Result<()> {
        let (fs, store) = adapter("");
        store.insert("a.csv", Bytes::from_static(b"1,2"));
        fs.rename("/a.csv", "/b.csv").await?;
        assert_eq!(store.keys(), vec!["b.csv".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn copy_to_self_never_reaches_the_backend() -> Result<()> {
        let (fs, store) = adapter("alice/");
        fs.copy("/alice/a.csv", "/alice/a.csv").await?;
        fs.symlink("/alice/a.csv", "/alice/a.csv").await?;
        fs.rename("/alice/a.csv", "/alice/a.csv").await?;
        assert_eq!(store.request_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn symlink_forbids_overwrite_and_reads_back() -> Result<()> {
        let (fs, store) = adapter("");
        store.insert("alice/BAK/report.csv", Bytes::from_static(b"x"));
        fs.symlink("/alice/BAK/report.csv", "/bob/in/report.csv")
            .await?;
        assert_eq!(
            store.link_target("bob/in/report.csv").as_deref(),
            Some("alice/BAK/report.csv")
        );
        assert_eq!(
            fs.readlink("/bob/in/report.csv").await?,
            "/alice/BAK/report.csv"
        );
        let err = fs
            .symlink("/alice/BAK/report.csv", "/bob/in/report.csv")
            .await
            .expect_err("existing link target");
        assert_eq!(err.code(), Some("FileAlreadyExists"));
        Ok(())
    }

    #[tokio::test]
    async fn streaming_and_listing_operations_are_unsupported() {
        let (fs, _) = adapter("");
        let err = fs.open("/a", 0).await.expect_err("open");
        assert!(fs.is_not_supported(&err));
        let err = fs
            .create("/a", CreateFlags::default())
            .await
            .expect_err("create");
        assert!(fs.is_not_supported(&err));
        let err = fs.truncate("/a", 0).await.expect_err("truncate");
        assert!(fs.is_not_supported(&err));
        let err = fs.read_dir("/").await.expect_err("read_dir");
        assert!(fs.is_not_supported(&err));
        assert!(fs.mkdir_all("/a/b/c").await.is_ok());
    }

    #[test]
    fn path_resolution_applies_mount_and_prefix() {
        let (fs, _) = adapter("alice/");
        let fs = fs.with_mount_path("/oss");
        assert_eq!(
            fs.resolve_path("/oss/in/report.csv").ok().as_deref(),
            Some("/alice/in/report.csv")
        );
        assert_eq!(fs.resolve_path("in/../x").ok().as_deref(), Some("/alice/x"));
        assert_eq!(fs.get_relative_path("/alice/in/report.csv"), "/oss/in/report.csv");
        assert_eq!(fs.get_relative_path("/bob/in/report.csv"), "/oss");
        assert_eq!(fs.get_relative_path("."), "/oss");
    }

    #[test]
    fn classifiers_match_codes_and_status_markers() {
        let (fs, _) = adapter("");
        let missing = VfsError::backend("head_object", "k", None, Some("NoSuchBucket".into()), "");
        assert!(fs.is_not_exist(&missing));
        let status_only = VfsError::backend("head_object", "k", Some(404), None, "");
        assert!(fs.is_not_exist(&status_only));
        let denied = VfsError::backend("put_object", "k", Some(403), Some("AccessDenied".into()), "");
        assert!(fs.is_permission(&denied));
        assert!(!fs.is_not_exist(&denied));
    }

    #[test]
    fn storage_id_names_endpoint_and_bucket() {
        let (fs, _) = adapter("");
        assert_eq!(fs.storage_id(), "oss://oss-cn-hangzhou.aliyuncs.com/media");
        assert!(fs.has_virtual_folders());
        assert!(!fs.is_upload_resume_supported());
        assert!(!fs.is_atomic_upload_supported());
    }
}
