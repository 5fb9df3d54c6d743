//! In-memory object store with the observable semantics of a real bucket.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::{
    ListRequest, MetadataDirective, ObjectListing, ObjectMeta, ObjectStore, ObjectStoreConnector,
};
use crate::error::{VfsError, VfsResult};
use crate::storage::ObjectStorageConfig;

#[derive(Debug, Clone)]
enum Entry {
    Blob {
        data: Bytes,
        modified: DateTime<Utc>,
    },
    Link {
        target: String,
        modified: DateTime<Utc>,
    },
}

/// Ordered in-memory bucket.
///
/// Every trait call counts as one request, which lets callers prove that an
/// operation never reached the backend.
#[derive(Debug)]
pub struct MemoryObjectStore {
    bucket: String,
    objects: RwLock<BTreeMap<String, Entry>>,
    requests: AtomicU64,
    present: AtomicBool,
    deny_writes: AtomicBool,
    pinned: Mutex<BTreeSet<String>>,
    omit_next_marker: AtomicBool,
}

impl MemoryObjectStore {
    /// Empty, reachable bucket.
    #[must_use]
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: RwLock::new(BTreeMap::new()),
            requests: AtomicU64::new(0),
            present: AtomicBool::new(true),
            deny_writes: AtomicBool::new(false),
            pinned: Mutex::new(BTreeSet::new()),
            omit_next_marker: AtomicBool::new(false),
        }
    }

    /// Bucket name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Number of trait calls served so far.
    #[must_use]
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }

    /// Make the bucket unreachable (or reachable again).
    pub fn set_present(&self, present: bool) {
        self.present.store(present, Ordering::SeqCst);
    }

    /// Reject every mutating call with `403 AccessDenied`.
    pub fn set_deny_writes(&self, deny: bool) {
        self.deny_writes.store(deny, Ordering::SeqCst);
    }

    /// Make batch deletes report `key` as failed and leave it in place.
    pub fn pin(&self, key: impl Into<String>) {
        self.pinned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into());
    }

    /// Leave `NextMarker` out of truncated listings, as buckets listed
    /// without a delimiter may.
    pub fn set_omit_next_marker(&self, omit: bool) {
        self.omit_next_marker.store(omit, Ordering::SeqCst);
    }

    /// Whether a key exists, without counting a request.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    /// Link target stored at `key`, without counting a request.
    #[must_use]
    pub fn link_target(&self, key: &str) -> Option<String> {
        match self.read().get(key) {
            Some(Entry::Link { target, .. }) => Some(target.clone()),
            _ => None,
        }
    }

    /// Every key in order, without counting a request.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    /// Seed an object without counting a request.
    pub fn insert(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        self.write().insert(
            key.into(),
            Entry::Blob {
                data: data.into(),
                modified: Utc::now(),
            },
        );
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Entry>> {
        self.objects.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, Entry>> {
        self.objects.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self, operation: &'static str, key: &str) -> VfsResult<()> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.present.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(VfsError::backend(
                operation,
                key,
                Some(404),
                Some("NoSuchBucket".to_string()),
                "The specified bucket does not exist.",
            ))
        }
    }

    fn begin_write(&self, operation: &'static str, key: &str) -> VfsResult<()> {
        self.begin(operation, key)?;
        if self.deny_writes.load(Ordering::SeqCst) {
            return Err(VfsError::backend(
                operation,
                key,
                Some(403),
                Some("AccessDenied".to_string()),
                "You have no right to access this object.",
            ));
        }
        Ok(())
    }

    fn resolve(
        objects: &BTreeMap<String, Entry>,
        operation: &'static str,
        key: &str,
    ) -> VfsResult<(Bytes, DateTime<Utc>)> {
        match objects.get(key) {
            Some(Entry::Blob { data, modified }) => Ok((data.clone(), *modified)),
            Some(Entry::Link { target, .. }) => match objects.get(target) {
                Some(Entry::Blob { data, modified }) => Ok((data.clone(), *modified)),
                _ => Err(no_such_key(operation, target)),
            },
            None => Err(no_such_key(operation, key)),
        }
    }
}

fn no_such_key(operation: &'static str, key: &str) -> VfsError {
    VfsError::backend(
        operation,
        key,
        Some(404),
        Some("NoSuchKey".to_string()),
        "The specified key does not exist.",
    )
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn bucket_exists(&self) -> VfsResult<bool> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(self.present.load(Ordering::SeqCst))
    }

    async fn head_object(&self, key: &str) -> VfsResult<ObjectMeta> {
        self.begin("head_object", key)?;
        let objects = self.read();
        let (data, modified) = Self::resolve(&objects, "head_object", key)?;
        Ok(ObjectMeta {
            key: key.to_string(),
            size: data.len() as u64,
            last_modified: modified,
        })
    }

    async fn list_objects(&self, request: &ListRequest) -> VfsResult<ObjectListing> {
        self.begin("list_objects", &request.prefix)?;
        let objects = self.read();
        let limit = usize::try_from(request.max_keys).unwrap_or(usize::MAX).max(1);
        let mut page = objects
            .iter()
            .filter(|(key, _)| key.starts_with(&request.prefix))
            .filter(|(key, _)| {
                request
                    .marker
                    .as_deref()
                    .is_none_or(|marker| key.as_str() > marker)
            })
            .map(|(key, entry)| {
                let (size, last_modified) = match entry {
                    Entry::Blob { data, modified } => (data.len() as u64, *modified),
                    Entry::Link { modified, .. } => (0, *modified),
                };
                ObjectMeta {
                    key: key.clone(),
                    size,
                    last_modified,
                }
            })
            .take(limit + 1)
            .collect::<Vec<_>>();

        let is_truncated = page.len() > limit;
        page.truncate(limit);
        let next_marker = if is_truncated && !self.omit_next_marker.load(Ordering::SeqCst) {
            page.last().map(|meta| meta.key.clone())
        } else {
            None
        };
        Ok(ObjectListing {
            objects: page,
            is_truncated,
            next_marker,
        })
    }

    async fn put_object(&self, key: &str, body: Bytes) -> VfsResult<()> {
        self.begin_write("put_object", key)?;
        self.write().insert(
            key.to_string(),
            Entry::Blob {
                data: body,
                modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get_object(&self, key: &str) -> VfsResult<Bytes> {
        self.begin("get_object", key)?;
        let objects = self.read();
        Self::resolve(&objects, "get_object", key).map(|(data, _)| data)
    }

    async fn delete_object(&self, key: &str) -> VfsResult<()> {
        self.begin_write("delete_object", key)?;
        self.write().remove(key);
        Ok(())
    }

    async fn delete_objects(&self, keys: &[String], _quiet: bool) -> VfsResult<Vec<String>> {
        self.begin_write("delete_objects", keys.first().map_or("", String::as_str))?;
        let pinned = self.pinned.lock().unwrap_or_else(PoisonError::into_inner);
        let mut objects = self.write();
        let mut failed = Vec::new();
        for key in keys {
            if pinned.contains(key) {
                failed.push(key.clone());
            } else {
                objects.remove(key);
            }
        }
        Ok(failed)
    }

    async fn copy_object(
        &self,
        source: &str,
        target: &str,
        _directive: MetadataDirective,
    ) -> VfsResult<()> {
        self.begin_write("copy_object", target)?;
        let mut objects = self.write();
        let (data, _) = Self::resolve(&objects, "copy_object", source)?;
        objects.insert(
            target.to_string(),
            Entry::Blob {
                data,
                modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn put_symlink(
        &self,
        link: &str,
        target: &str,
        forbid_overwrite: bool,
    ) -> VfsResult<()> {
        self.begin_write("put_symlink", link)?;
        let mut objects = self.write();
        if forbid_overwrite && objects.contains_key(link) {
            return Err(VfsError::backend(
                "put_symlink",
                link,
                Some(409),
                Some("FileAlreadyExists".to_string()),
                "The object you specified already exists and can not be overwritten.",
            ));
        }
        objects.insert(
            link.to_string(),
            Entry::Link {
                target: target.to_string(),
                modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get_symlink(&self, link: &str) -> VfsResult<String> {
        self.begin("get_symlink", link)?;
        match self.read().get(link) {
            Some(Entry::Link { target, .. }) => Ok(target.clone()),
            Some(Entry::Blob { .. }) => Err(VfsError::backend(
                "get_symlink",
                link,
                Some(400),
                Some("NotSymlink".to_string()),
                "The specified object is not a symlink.",
            )),
            None => Err(no_such_key("get_symlink", link)),
        }
    }
}

/// Hands out one shared [`MemoryObjectStore`] per endpoint and bucket.
///
/// Accounts that differ only in credentials see the same data, the way two
/// access keys on one real bucket would.
#[derive(Debug, Default)]
pub struct MemoryConnector {
    stores: Mutex<HashMap<(String, String), Arc<MemoryObjectStore>>>,
}

impl MemoryConnector {
    /// Connector with no buckets yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store for `endpoint`/`bucket`, created on first use.
    #[must_use]
    pub fn store(&self, endpoint: &str, bucket: &str) -> Arc<MemoryObjectStore> {
        let mut stores = self.stores.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            stores
                .entry((endpoint.to_string(), bucket.to_string()))
                .or_insert_with(|| Arc::new(MemoryObjectStore::new(bucket))),
        )
    }
}

impl ObjectStoreConnector for MemoryConnector {
    fn connect(&self, config: &ObjectStorageConfig) -> VfsResult<Arc<dyn ObjectStore>> {
        if config.bucket.is_empty() {
            return Err(VfsError::InvalidPath {
                operation: "connect",
                path: String::new(),
                reason: "bucket is required",
            });
        }
        let store: Arc<dyn ObjectStore> = self.store(&config.endpoint, &config.bucket);
        Ok(store)
    }
}
