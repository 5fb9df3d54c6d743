//! Accounts, rules, registries and engine configs for tests.

use std::sync::Arc;

use courier_config::{
    Account, DestinationBinding, DirectoryDocument, DistributionConfig, Rule, SourceBinding,
    StaticDirectory, TransferMode,
};
use courier_events::FileEvent;
use courier_vfs::{MemoryConnector, ObjectStorageConfig, StorageConfig, StorageRegistry};
use tempfile::TempDir;

/// Address recorded by engines built from [`enabled_config`].
pub const MACHINE_ADDR: &str = "10.0.0.5";

/// Fresh temporary directory removed on drop.
///
/// # Errors
///
/// Returns an error when the directory cannot be created.
pub fn temp_dir() -> anyhow::Result<TempDir> {
    Ok(tempfile::Builder::new().prefix("courier-").tempdir()?)
}

/// Filesystem account rooted at `home`.
#[must_use]
pub fn local_account(name: &str, home: &str) -> Account {
    Account {
        username: name.to_string(),
        home_dir: home.to_string(),
        storage: StorageConfig::Local,
    }
}

/// Object-storage account under `prefix` in `bucket` at `endpoint`.
#[must_use]
pub fn object_account(
    name: &str,
    bucket: &str,
    endpoint: &str,
    access_key: &str,
    prefix: &str,
) -> Account {
    Account {
        username: name.to_string(),
        home_dir: format!("/{name}"),
        storage: StorageConfig::ObjectStorage(ObjectStorageConfig {
            bucket: bucket.to_string(),
            endpoint: endpoint.to_string(),
            access_key: access_key.to_string(),
            access_secret: format!("{access_key}-secret"),
            key_prefix: prefix.to_string(),
            ..ObjectStorageConfig::default()
        }),
    }
}

/// Destination delivering to `user` under `relative_path`.
#[must_use]
pub fn destination(user: &str, relative_path: &str) -> DestinationBinding {
    DestinationBinding {
        local_user: user.to_string(),
        relative_path: relative_path.to_string(),
        ..DestinationBinding::default()
    }
}

/// Local-to-mix rule owned by `owner` with every optional stage off and no
/// destinations.
#[must_use]
pub fn rule(id: i64, owner: &str, pattern: &str) -> Rule {
    Rule {
        id,
        code: format!("rule-{id}"),
        pattern: pattern.to_string(),
        mode: TransferMode::LocalToMix,
        osn: SourceBinding {
            local_user: owner.to_string(),
            ..SourceBinding::default()
        },
        ..Rule::default()
    }
}

/// Upload event for `user` with the virtual path equal to `path`.
#[must_use]
pub fn upload_event(user: &str, path: &str, size: u64) -> FileEvent {
    FileEvent::upload(user, path, size)
}

/// Validated directory serving `accounts` and `rules`.
///
/// # Errors
///
/// Returns an error when a rule fails validation or a username repeats.
pub fn directory(accounts: Vec<Account>, rules: Vec<Rule>) -> anyhow::Result<Arc<StaticDirectory>> {
    Ok(Arc::new(StaticDirectory::from_document(
        DirectoryDocument { accounts, rules },
    )?))
}

/// Registry backed by in-memory buckets, plus the connector to inspect them.
#[must_use]
pub fn memory_registry() -> (Arc<MemoryConnector>, Arc<StorageRegistry>) {
    let connector = Arc::new(MemoryConnector::new());
    let registry = Arc::new(StorageRegistry::new(connector.clone()));
    (connector, registry)
}

/// Enabled engine configuration with a `timeout_secs` deadline.
#[must_use]
pub fn enabled_config(timeout_secs: u64) -> DistributionConfig {
    DistributionConfig {
        enabled: true,
        timeout_secs,
        machine_addr: MACHINE_ADDR.to_string(),
        ..DistributionConfig::default()
    }
}
