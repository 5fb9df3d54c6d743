//! Engine configuration model.

use courier_vfs::ObjectStorageDefaults;
use serde::{Deserialize, Serialize};

use crate::defaults::{
    DEFAULT_INTAKE_CAPACITY, DEFAULT_LOG_LEVEL, DEFAULT_OSS_REQUEST_TIMEOUT_SECS,
    DEFAULT_TIMEOUT_SECS,
};

/// Process-level configuration consumed by the distribution engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionConfig {
    /// Master switch; a disabled engine refuses to start.
    pub enabled: bool,
    /// Per-task deadline in seconds.
    pub timeout_secs: u64,
    /// Address of this worker, recorded in every transaction log.
    pub machine_addr: String,
    /// Capacity of the intake queue.
    pub intake_capacity: usize,
    /// Per-backend connection settings.
    pub backends: BackendSettings,
    /// Logging options.
    pub logging: LoggingSettings,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            machine_addr: String::new(),
            intake_capacity: DEFAULT_INTAKE_CAPACITY,
            backends: BackendSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// Connection settings keyed by backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// Process-wide object-store credentials.
    pub oss: Option<OssSettings>,
}

/// Process-wide object-store connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OssSettings {
    /// Service endpoint host.
    pub endpoint: String,
    /// Region label.
    pub region: String,
    /// Access key id.
    pub access_key: String,
    /// Access key secret.
    pub access_secret: String,
    /// HTTP request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for OssSettings {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            region: String::new(),
            access_key: String::new(),
            access_secret: String::new(),
            request_timeout_secs: DEFAULT_OSS_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl OssSettings {
    /// Credentials applied to accounts that omit their own.
    #[must_use]
    pub fn defaults(&self) -> ObjectStorageDefaults {
        ObjectStorageDefaults {
            endpoint: self.endpoint.clone(),
            region: self.region.clone(),
            access_key: self.access_key.clone(),
            access_secret: self.access_secret.clone(),
        }
    }
}

/// Logging options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Level directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Output format; inferred from the build profile when unset.
    pub format: Option<LogFormatSetting>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            format: None,
        }
    }
}

/// Configured log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormatSetting {
    /// Structured JSON lines.
    Json,
    /// Human-readable output.
    Pretty,
}
