//! Account storage configuration and the identity used to compare stores.

use serde::{Deserialize, Serialize};

/// Backend technology behind an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Hierarchical local filesystem.
    Local,
    /// Flat object store.
    ObjectStorage,
}

impl ProviderKind {
    /// Short label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::ObjectStorage => "oss",
        }
    }
}

/// Per-account storage configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Files live under the account's home directory.
    #[default]
    Local,
    /// Files live in an object-store bucket under a key prefix.
    ObjectStorage(ObjectStorageConfig),
}

impl StorageConfig {
    /// Backend kind of this configuration.
    #[must_use]
    pub const fn provider(&self) -> ProviderKind {
        match self {
            Self::Local => ProviderKind::Local,
            Self::ObjectStorage(_) => ProviderKind::ObjectStorage,
        }
    }

    /// Identity used to decide whether two accounts share a physical store.
    #[must_use]
    pub fn identity(&self) -> StorageIdentity {
        match self {
            Self::Local => StorageIdentity {
                provider: ProviderKind::Local,
                bucket: String::new(),
                endpoint: String::new(),
                access_key: String::new(),
            },
            Self::ObjectStorage(config) => config.identity(),
        }
    }

    /// Whether both configurations point at the same physical store.
    #[must_use]
    pub fn same_store(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

/// Object-store connection settings for one account.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectStorageConfig {
    /// Bucket holding the account's objects.
    pub bucket: String,
    /// Service endpoint host, optionally with scheme.
    pub endpoint: String,
    /// Region label.
    pub region: String,
    /// Access key id.
    pub access_key: String,
    /// Access key secret.
    pub access_secret: String,
    /// Key prefix under which the account's objects live.
    pub key_prefix: String,
}

impl ObjectStorageConfig {
    /// Identity derived from bucket, endpoint and access key.
    #[must_use]
    pub fn identity(&self) -> StorageIdentity {
        StorageIdentity {
            provider: ProviderKind::ObjectStorage,
            bucket: self.bucket.clone(),
            endpoint: self.endpoint.clone(),
            access_key: self.access_key.clone(),
        }
    }

    /// Key prefix without a leading separator and with a trailing one.
    ///
    /// Empty prefixes stay empty.
    #[must_use]
    pub fn normalized_prefix(&self) -> String {
        let trimmed = self.key_prefix.trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("{trimmed}/")
        }
    }

    /// Fill unset connection fields from process-wide defaults.
    #[must_use]
    pub fn with_defaults(mut self, defaults: Option<&ObjectStorageDefaults>) -> Self {
        let Some(defaults) = defaults else {
            return self;
        };
        if self.endpoint.is_empty() {
            self.endpoint.clone_from(&defaults.endpoint);
        }
        if self.region.is_empty() {
            self.region.clone_from(&defaults.region);
        }
        if self.access_key.is_empty() && self.access_secret.is_empty() {
            self.access_key.clone_from(&defaults.access_key);
            self.access_secret.clone_from(&defaults.access_secret);
        }
        self
    }
}

/// Process-wide object-store credentials used when an account omits its own.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectStorageDefaults {
    /// Service endpoint host.
    pub endpoint: String,
    /// Region label.
    pub region: String,
    /// Access key id.
    pub access_key: String,
    /// Access key secret.
    pub access_secret: String,
}

/// Key deciding whether two storage configurations are one physical store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageIdentity {
    /// Backend kind.
    pub provider: ProviderKind,
    /// Bucket name; empty for local storage.
    pub bucket: String,
    /// Endpoint; empty for local storage.
    pub endpoint: String,
    /// Access key; empty for local storage.
    pub access_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oss(bucket: &str, endpoint: &str, access_key: &str) -> StorageConfig {
        StorageConfig::ObjectStorage(ObjectStorageConfig {
            bucket: bucket.to_string(),
            endpoint: endpoint.to_string(),
            access_key: access_key.to_string(),
            access_secret: "secret".to_string(),
            key_prefix: "alice/".to_string(),
            ..ObjectStorageConfig::default()
        })
    }

    #[test]
    fn local_accounts_always_share_a_store() {
        assert!(StorageConfig::Local.same_store(&StorageConfig::Local));
        assert!(!StorageConfig::Local.same_store(&oss("b", "e", "k")));
    }

    #[test]
    fn object_identity_requires_bucket_endpoint_and_key() {
        let base = oss("bucket", "oss.example.com", "ak");
        assert!(base.same_store(&oss("bucket", "oss.example.com", "ak")));
        assert!(!base.same_store(&oss("other", "oss.example.com", "ak")));
        assert!(!base.same_store(&oss("bucket", "oss2.example.com", "ak")));
        assert!(!base.same_store(&oss("bucket", "oss.example.com", "ak2")));
    }

    #[test]
    fn secret_and_prefix_do_not_affect_identity() {
        let StorageConfig::ObjectStorage(mut config) = oss("b", "e", "k") else {
            unreachable!("fixture is object storage");
        };
        let before = config.identity();
        config.access_secret = "rotated".to_string();
        config.key_prefix = "bob/".to_string();
        assert_eq!(before, config.identity());
    }

    #[test]
    fn prefix_normalisation() {
        let mut config = ObjectStorageConfig::default();
        assert_eq!(config.normalized_prefix(), "");
        config.key_prefix = "/alice".to_string();
        assert_eq!(config.normalized_prefix(), "alice/");
        config.key_prefix = "tenants/alice/".to_string();
        assert_eq!(config.normalized_prefix(), "tenants/alice/");
    }

    #[test]
    fn defaults_fill_only_missing_fields() {
        let defaults = ObjectStorageDefaults {
            endpoint: "oss-cn-hangzhou.aliyuncs.com".to_string(),
            region: "cn-hangzhou".to_string(),
            access_key: "public-ak".to_string(),
            access_secret: "public-sk".to_string(),
        };
        let config = ObjectStorageConfig {
            bucket: "b".to_string(),
            access_key: "own".to_string(),
            access_secret: "own-secret".to_string(),
            ..ObjectStorageConfig::default()
        }
        .with_defaults(Some(&defaults));
        assert_eq!(config.endpoint, "oss-cn-hangzhou.aliyuncs.com");
        assert_eq!(config.access_key, "own");
        assert_eq!(config.access_secret, "own-secret");
    }

    #[test]
    fn storage_config_deserialises_tagged() -> anyhow::Result<()> {
        let local: StorageConfig = serde_json::from_str(r#"{"provider":"local"}"#)?;
        assert_eq!(local, StorageConfig::Local);
        let object: StorageConfig = serde_json::from_str(
            r#"{"provider":"object_storage","bucket":"b","key_prefix":"alice/"}"#,
        )?;
        assert_eq!(object.provider(), ProviderKind::ObjectStorage);
        Ok(())
    }
}
