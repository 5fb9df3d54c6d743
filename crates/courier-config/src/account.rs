//! Local accounts and their storage.

use std::sync::Arc;

use courier_vfs::{Fs, StorageConfig, StorageRegistry, VfsResult};
use serde::{Deserialize, Serialize};

/// A local account known to the file server.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Account {
    /// Login name.
    pub username: String,
    /// Home directory for filesystem-backed accounts.
    pub home_dir: String,
    /// Storage backend configuration.
    pub storage: StorageConfig,
}

impl Account {
    /// Storage adapter serving this account.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend client cannot be created.
    pub fn filesystem(&self, registry: &StorageRegistry) -> VfsResult<Arc<dyn Fs>> {
        registry.adapter(&self.storage)
    }
}
