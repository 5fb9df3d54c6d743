//! Hands out storage adapters per account configuration.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::error::VfsResult;
use crate::fs::Fs;
use crate::object::{ObjectFs, ObjectStoreConnector};
use crate::osfs::OsFs;
use crate::storage::{ObjectStorageConfig, ObjectStorageDefaults, StorageConfig, StorageIdentity};

type CacheKey = (StorageIdentity, String);

/// Caches adapters so accounts on one physical store share an instance.
///
/// Local accounts all receive the same host-rooted adapter. Object-storage
/// accounts receive one adapter per storage identity and key prefix.
pub struct StorageRegistry {
    local: Arc<dyn Fs>,
    connector: Arc<dyn ObjectStoreConnector>,
    defaults: Option<ObjectStorageDefaults>,
    objects: Mutex<HashMap<CacheKey, Arc<dyn Fs>>>,
}

impl fmt::Debug for StorageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cached = self
            .objects
            .lock()
            .map_or(0, |objects| objects.len());
        f.debug_struct("StorageRegistry")
            .field("connector", &self.connector)
            .field("cached_object_adapters", &cached)
            .finish_non_exhaustive()
    }
}

impl StorageRegistry {
    /// Registry creating object-store clients through `connector`.
    #[must_use]
    pub fn new(connector: Arc<dyn ObjectStoreConnector>) -> Self {
        Self {
            local: Arc::new(OsFs::new("distribution", "/")),
            connector,
            defaults: None,
            objects: Mutex::new(HashMap::new()),
        }
    }

    /// Fill accounts' missing object-store credentials from `defaults`.
    #[must_use]
    pub fn with_defaults(mut self, defaults: Option<ObjectStorageDefaults>) -> Self {
        self.defaults = defaults;
        self
    }

    /// Object-storage configuration after applying process defaults.
    #[must_use]
    pub fn effective_object_config(&self, config: &ObjectStorageConfig) -> ObjectStorageConfig {
        config.clone().with_defaults(self.defaults.as_ref())
    }

    /// Storage configuration after applying process defaults.
    #[must_use]
    pub fn effective_config(&self, config: &StorageConfig) -> StorageConfig {
        match config {
            StorageConfig::Local => StorageConfig::Local,
            StorageConfig::ObjectStorage(object) => {
                StorageConfig::ObjectStorage(self.effective_object_config(object))
            }
        }
    }

    /// Adapter for an account's storage configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when an object-store client cannot be created.
    pub fn adapter(&self, config: &StorageConfig) -> VfsResult<Arc<dyn Fs>> {
        let object = match config {
            StorageConfig::Local => return Ok(Arc::clone(&self.local)),
            StorageConfig::ObjectStorage(object) => self.effective_object_config(object),
        };

        let key = (object.identity(), object.normalized_prefix());
        let mut objects = self.objects.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = objects.get(&key) {
            return Ok(Arc::clone(existing));
        }

        let store = self.connector.connect(&object)?;
        debug!(bucket = %object.bucket, endpoint = %object.endpoint, "object storage adapter created");
        let adapter: Arc<dyn Fs> = Arc::new(ObjectFs::new("distribution", object, store));
        objects.insert(key, Arc::clone(&adapter));
        Ok(adapter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::MemoryConnector;

    fn object(bucket: &str, access_key: &str, prefix: &str) -> StorageConfig {
        StorageConfig::ObjectStorage(ObjectStorageConfig {
            bucket: bucket.to_string(),
            endpoint: "oss.example.com".to_string(),
            access_key: access_key.to_string(),
            access_secret: "sk".to_string(),
            key_prefix: prefix.to_string(),
            ..ObjectStorageConfig::default()
        })
    }

    #[test]
    fn accounts_on_one_store_share_an_adapter() -> anyhow::Result<()> {
        let registry = StorageRegistry::new(Arc::new(MemoryConnector::new()));
        let first = registry.adapter(&object("media", "ak", "alice/"))?;
        let again = registry.adapter(&object("media", "ak", "/alice"))?;
        assert!(Arc::ptr_eq(&first, &again));

        let other_key = registry.adapter(&object("media", "ak2", "alice/"))?;
        assert!(!Arc::ptr_eq(&first, &other_key));

        let local = registry.adapter(&StorageConfig::Local)?;
        assert!(Arc::ptr_eq(&local, &registry.adapter(&StorageConfig::Local)?));
        Ok(())
    }

    #[test]
    fn defaults_complete_partial_accounts() {
        let registry = StorageRegistry::new(Arc::new(MemoryConnector::new())).with_defaults(Some(
            ObjectStorageDefaults {
                endpoint: "oss-cn-hangzhou.aliyuncs.com".to_string(),
                access_key: "public".to_string(),
                access_secret: "public-secret".to_string(),
                ..ObjectStorageDefaults::default()
            },
        ));
        let effective = registry.effective_config(&StorageConfig::ObjectStorage(
            ObjectStorageConfig {
                bucket: "media".to_string(),
                ..ObjectStorageConfig::default()
            },
        ));
        let StorageConfig::ObjectStorage(config) = effective else {
            unreachable!("object storage stays object storage");
        };
        assert_eq!(config.access_key, "public");
        assert_eq!(config.endpoint, "oss-cn-hangzhou.aliyuncs.com");
    }
}
