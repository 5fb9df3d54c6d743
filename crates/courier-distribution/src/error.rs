//! # Design
//!
//! - Constant-message errors for every pipeline failure, with the context
//!   (paths, account names, operations) kept in fields.
//! - Storage and collaborator errors are preserved as sources; the text a
//!   transaction log stores is the message plus its source chain.

use std::error::Error as StdError;

use courier_config::ConfigError;
use courier_vfs::VfsError;
use thiserror::Error;

/// Result alias for distribution operations.
pub type DistributionResult<T> = Result<T, DistributionError>;

/// Errors produced while scheduling or running a distribution task.
#[derive(Debug, Error)]
pub enum DistributionError {
    /// The engine is administratively disabled.
    #[error("distribution is disabled")]
    ConfigDisabled,
    /// The engine configuration failed validation.
    #[error("invalid distribution configuration")]
    InvalidConfig {
        /// Validation failure.
        #[source]
        source: ConfigError,
    },
    /// The event carried no username.
    #[error("event has no username")]
    NoUsername,
    /// No rule pattern matched the file name.
    #[error("no rule matches the file")]
    NoMatch {
        /// Acting username.
        username: String,
        /// Lowercased base name that was matched.
        file_name: String,
    },
    /// A rule or account collaborator failed.
    #[error("configuration provider failed")]
    Provider {
        /// Collaborator call that failed.
        operation: &'static str,
        /// Provider error.
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    /// The provider knows no account by this name.
    #[error("account not found")]
    AccountNotFound {
        /// Requested account name.
        name: String,
    },
    /// The event carried no source path.
    #[error("source path is empty")]
    EmptySourcePath,
    /// The source cannot be stat'ed or is a directory.
    #[error("source is missing or is a directory")]
    SourceMissingOrIsDirectory {
        /// Source path.
        path: String,
        /// Storage error when the stat failed.
        #[source]
        source: Option<VfsError>,
    },
    /// The matched rule does not ask for a backup.
    #[error("backup disabled for rule")]
    BackupDisabled,
    /// Writing the backup copy failed.
    #[error("backup failed")]
    BackupFailed {
        /// Backup path.
        path: String,
        /// Copy failure.
        #[source]
        source: Box<DistributionError>,
    },
    /// The matched rule names no destinations.
    #[error("rule has no destinations")]
    NoDestinations {
        /// Rule identifier.
        rule_id: i64,
    },
    /// A destination account or adapter could not be resolved.
    #[error("destination could not be resolved")]
    DestinationResolution {
        /// Destination account name.
        account: String,
        /// Resolution failure.
        #[source]
        source: Box<DistributionError>,
    },
    /// The source could not be opened for reading.
    #[error("failed to open file for reading")]
    OpenFailed {
        /// Source path.
        path: String,
        /// Storage error.
        #[source]
        source: VfsError,
    },
    /// The destination could not be created.
    #[error("failed to create file")]
    CreateFailed {
        /// Destination path.
        path: String,
        /// Storage error.
        #[source]
        source: VfsError,
    },
    /// Moving bytes between opened handles failed.
    #[error("byte transfer failed")]
    TransferFailed {
        /// Destination path.
        path: String,
        /// IO error.
        #[source]
        source: std::io::Error,
    },
    /// Copying to a destination failed.
    #[error("copy failed")]
    CopyFailed {
        /// Destination path.
        path: String,
        /// Copy failure.
        #[source]
        source: Box<DistributionError>,
    },
    /// Creating a destination link failed.
    #[error("symlink failed")]
    SymlinkFailed {
        /// Link path.
        path: String,
        /// Storage error.
        #[source]
        source: VfsError,
    },
    /// Removing the source failed.
    #[error("delete failed")]
    DeleteFailed {
        /// Source path.
        path: String,
        /// Storage error.
        #[source]
        source: VfsError,
    },
    /// The operation is a documented extension point.
    #[error("operation not supported")]
    Unsupported {
        /// Operation that was requested.
        operation: &'static str,
    },
    /// No transfer implementation exists for the rule's mode.
    #[error("transfer mode not supported")]
    UnsupportedMode {
        /// Mode label.
        mode: &'static str,
    },
    /// A stage ran before the stage it depends on.
    #[error("pipeline stage ran out of order")]
    StageOutOfOrder {
        /// Stage that was invoked.
        stage: &'static str,
    },
    /// A storage call failed outside the named stage errors.
    #[error("storage operation failed")]
    Storage {
        /// Storage operation.
        operation: &'static str,
        /// Path involved.
        path: String,
        /// Storage error.
        #[source]
        source: VfsError,
    },
    /// The task's cancellation token fired.
    #[error("task cancelled")]
    Cancelled,
    /// The task ran past its deadline.
    #[error("task deadline of {timeout_secs}s exceeded")]
    DeadlineExceeded {
        /// Configured deadline.
        timeout_secs: u64,
    },
    /// The task did not stop within the grace period after cancellation.
    #[error("task did not stop after cancellation")]
    Unresponsive,
    /// The task panicked.
    #[error("task panicked: {message}")]
    Panicked {
        /// Panic payload text.
        message: String,
    },
    /// The intake queue is at capacity.
    #[error("intake queue is full")]
    QueueFull,
    /// The engine no longer accepts events.
    #[error("distribution engine is shut down")]
    Closed,
}

impl DistributionError {
    /// Wrap a collaborator failure.
    #[must_use]
    pub fn provider(operation: &'static str, source: anyhow::Error) -> Self {
        Self::Provider {
            operation,
            source: source.into(),
        }
    }

    /// Whether the error is the cancellation signal rather than a failure.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Error message followed by its source chain, joined with `": "`.
#[must_use]
pub fn describe(err: &(dyn StdError + 'static)) -> String {
    let mut text = err.to_string();
    let mut current = err.source();
    while let Some(source) = current {
        text.push_str(": ");
        text.push_str(&source.to_string());
        current = source.source();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_joins_the_source_chain() {
        let err = DistributionError::CopyFailed {
            path: "/srv/bob/in/report.csv".to_string(),
            source: Box::new(DistributionError::CreateFailed {
                path: "/srv/bob/in/report.csv".to_string(),
                source: VfsError::unsupported("create", "ossfs"),
            }),
        };
        let text = describe(&err);
        assert!(text.starts_with("copy failed: failed to create file: "));
        assert_eq!(text.matches(": ").count(), 2);
    }

    #[test]
    fn provider_errors_keep_the_collaborator_message() {
        let err = DistributionError::provider("rules_for_user", anyhow::anyhow!("database offline"));
        assert_eq!(
            describe(&err),
            "configuration provider failed: database offline"
        );
        assert!(!err.is_cancelled());
        assert!(DistributionError::Cancelled.is_cancelled());
    }
}
