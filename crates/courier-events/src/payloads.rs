//! File events delivered by the protocol layer and bus event payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::log::TransactionLog;

/// Identifier assigned to each event emitted on the bus.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring.
pub const DEFAULT_REPLAY_CAPACITY: usize = 1_024;

/// Kind of file operation that completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileAction {
    /// A file was uploaded.
    #[default]
    Upload,
    /// A file was downloaded.
    Download,
    /// A file was deleted.
    Delete,
    /// A file was renamed.
    Rename,
    /// A file was copied.
    Copy,
    /// A directory was created.
    Mkdir,
    /// A directory was removed.
    Rmdir,
    /// Any other action.
    #[serde(other)]
    Other,
}

/// Immutable snapshot of a completed file operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEvent {
    /// Operation kind.
    #[serde(default)]
    pub action: FileAction,
    /// Acting username.
    #[serde(default)]
    pub username: String,
    /// Backend-native source path.
    #[serde(default)]
    pub path: String,
    /// Backend-native target path for rename and copy events.
    #[serde(default)]
    pub target_path: Option<String>,
    /// Virtual source path as seen by the client.
    #[serde(default)]
    pub virtual_path: String,
    /// Virtual target path for rename and copy events.
    #[serde(default)]
    pub virtual_target_path: Option<String>,
    /// File size in bytes.
    #[serde(default)]
    pub file_size: u64,
    /// Backend the source lives on.
    #[serde(default)]
    pub fs_provider: String,
    /// Bucket for object-storage sources.
    #[serde(default)]
    pub bucket: Option<String>,
    /// Endpoint for object-storage sources.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Client address.
    #[serde(default)]
    pub ip: String,
    /// Protocol session identifier.
    #[serde(default)]
    pub session_id: String,
    /// When the operation completed.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl FileEvent {
    /// Upload event for `username` at `path`; the virtual path defaults to
    /// the native path.
    #[must_use]
    pub fn upload(username: impl Into<String>, path: impl Into<String>, file_size: u64) -> Self {
        let path = path.into();
        Self {
            action: FileAction::Upload,
            username: username.into(),
            virtual_path: path.clone(),
            path,
            target_path: None,
            virtual_target_path: None,
            file_size,
            fs_provider: "local".to_string(),
            bucket: None,
            endpoint: None,
            ip: String::new(),
            session_id: String::new(),
            timestamp: Utc::now(),
        }
    }

    /// Override the virtual path.
    #[must_use]
    pub fn with_virtual_path(mut self, virtual_path: impl Into<String>) -> Self {
        self.virtual_path = virtual_path.into();
        self
    }
}

/// Typed events published while distributing files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A task started for a file event.
    DistributionStarted {
        /// Transaction identifier.
        transaction_id: Uuid,
        /// Acting username.
        username: String,
        /// Source path.
        path: String,
    },
    /// A pipeline stage recorded its outcome.
    DistributionProgress {
        /// Transaction identifier.
        transaction_id: Uuid,
        /// Stage label.
        stage: String,
        /// Stage status label.
        status: String,
    },
    /// A task reached its terminal state.
    DistributionFinished {
        /// Complete transaction log.
        log: Box<TransactionLog>,
    },
}

impl Event {
    /// Machine-friendly discriminator.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::DistributionStarted { .. } => "distribution_started",
            Self::DistributionProgress { .. } => "distribution_progress",
            Self::DistributionFinished { .. } => "distribution_finished",
        }
    }
}

/// Metadata wrapper around events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    /// Sequential identifier.
    pub id: EventId,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
    /// Payload.
    pub event: Event,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_json_events_fill_defaults() -> anyhow::Result<()> {
        let event: FileEvent = serde_json::from_str(
            r#"{"username":"alice","path":"/home/alice/report.csv","file_size":1024,"action":"chmod"}"#,
        )?;
        assert_eq!(event.action, FileAction::Other);
        assert_eq!(event.file_size, 1024);
        assert!(event.virtual_path.is_empty());
        assert!(event.target_path.is_none());
        Ok(())
    }
}
