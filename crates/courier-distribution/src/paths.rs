//! Backend-specific path derivation for backups and destinations.
//!
//! Object-storage accounts place files under their key prefix; filesystem
//! accounts place them under their home directory. The trailing segments are
//! always the relative path and the original base name.

use courier_config::Account;
use courier_vfs::{StorageConfig, path};

/// Path segment backups are written under.
pub const BACKUP_SEGMENT: &str = "BAK";

/// Native path of `file_name` under `relative` in `account`'s storage.
#[must_use]
pub fn account_path(account: &Account, relative: &str, file_name: &str) -> String {
    match &account.storage {
        StorageConfig::Local => path::join(&[account.home_dir.as_str(), relative, file_name]),
        StorageConfig::ObjectStorage(config) => {
            path::join(&["/", config.key_prefix.as_str(), relative, file_name])
        }
    }
}

/// Native path of the backup copy of `file_name` in `account`'s storage.
#[must_use]
pub fn backup_path(account: &Account, file_name: &str) -> String {
    account_path(account, BACKUP_SEGMENT, file_name)
}
