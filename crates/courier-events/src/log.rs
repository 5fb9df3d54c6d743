//! Per-task transaction log.
//!
//! Every pipeline stage writes exactly one outcome here before the task
//! proceeds or aborts. Timestamps are epoch milliseconds drawn from a clock
//! that never runs backwards within one log.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome label of a finished task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutcome {
    /// Every attempted stage succeeded.
    Completed,
    /// The task aborted or a stage recorded an error.
    Failed,
    /// The deadline elapsed before the task finished.
    TimedOut,
}

impl TaskOutcome {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        }
    }
}

/// Rule resolution outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleMatchRecord {
    /// Matched rule id.
    pub rule_id: Option<i64>,
    /// Matched rule code.
    pub code: Option<String>,
    /// Matched pattern.
    pub pattern: Option<String>,
    /// Transfer mode of the matched rule.
    pub mode: Option<String>,
    /// When matching finished.
    pub at: Option<i64>,
    /// Failure description.
    pub error: Option<String>,
}

/// Source check outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRecord {
    /// Source path that was checked.
    pub path: String,
    /// Source size observed by the check.
    pub size: u64,
    /// When the check finished.
    pub at: Option<i64>,
    /// Failure description.
    pub error: Option<String>,
}

/// Backup outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    /// Whether the rule asked for a backup.
    pub enabled: bool,
    /// Path that was backed up.
    pub source_path: String,
    /// Where the backup was written.
    pub target_path: String,
    /// Bytes written to the backup.
    pub size: u64,
    /// When the backup stage finished.
    pub at: Option<i64>,
    /// Failure description, including the disabled marker.
    pub error: Option<String>,
}

/// Outcome for one destination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationRecord {
    /// Destination account name.
    pub account: String,
    /// Resolved target path.
    pub path: String,
    /// Backend kind of the destination.
    pub provider: String,
    /// Worker address that performed the transfer.
    pub addr: String,
    /// Whether a link was created instead of a copy.
    pub linked: bool,
    /// Bytes transferred.
    pub bytes: u64,
    /// When the destination was handled.
    pub at: i64,
    /// Failure description.
    pub error: Option<String>,
}

/// Source deletion outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRecord {
    /// Whether the rule asked for deletion.
    pub enabled: bool,
    /// Path that was removed.
    pub path: String,
    /// When the delete stage finished.
    pub at: Option<i64>,
    /// Failure description.
    pub error: Option<String>,
}

/// Everything observable about one distribution task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionLog {
    /// Transaction identifier.
    pub transaction_id: Uuid,
    /// Acting username.
    pub username: String,
    /// Base name of the file.
    pub file_name: String,
    /// Source path of the file.
    pub file_path: String,
    /// File size from the event.
    pub file_size: u64,
    /// Address of the worker that ran the task.
    pub addr: String,
    /// Task start.
    pub started_at: i64,
    /// Task end.
    pub ended_at: Option<i64>,
    /// Rule resolution.
    pub rule_match: RuleMatchRecord,
    /// Source check.
    pub check: CheckRecord,
    /// Backup stage.
    pub backup: BackupRecord,
    /// One record per attempted destination.
    pub hsn: Vec<DestinationRecord>,
    /// Delete stage.
    pub delete: DeleteRecord,
    /// Error that aborted the task.
    pub error: Option<String>,
    /// Whether the deadline elapsed.
    pub timed_out: bool,
    #[serde(skip)]
    clock: i64,
}

impl TransactionLog {
    /// Start a log now.
    #[must_use]
    pub fn begin(
        username: impl Into<String>,
        file_name: impl Into<String>,
        file_path: impl Into<String>,
        file_size: u64,
        addr: impl Into<String>,
    ) -> Self {
        let started_at = Utc::now().timestamp_millis();
        Self {
            transaction_id: Uuid::new_v4(),
            username: username.into(),
            file_name: file_name.into(),
            file_path: file_path.into(),
            file_size,
            addr: addr.into(),
            started_at,
            ended_at: None,
            rule_match: RuleMatchRecord::default(),
            check: CheckRecord::default(),
            backup: BackupRecord::default(),
            hsn: Vec::new(),
            delete: DeleteRecord::default(),
            error: None,
            timed_out: false,
            clock: started_at,
        }
    }

    /// Current time, clamped so it never precedes an earlier stamp.
    pub fn stamp(&mut self) -> i64 {
        self.clock = Utc::now().timestamp_millis().max(self.clock);
        self.clock
    }

    /// Record the error that aborted the task. The first error wins.
    pub fn abort(&mut self, error: impl Into<String>) {
        if self.error.is_none() {
            self.error = Some(error.into());
        }
    }

    /// Stamp the end of the task.
    pub fn finish(&mut self) {
        if self.ended_at.is_none() {
            self.ended_at = Some(self.stamp());
        }
    }

    /// Outcome label derived from the recorded stages.
    #[must_use]
    pub fn outcome(&self) -> TaskOutcome {
        if self.timed_out {
            return TaskOutcome::TimedOut;
        }
        let backup_failed = self.backup.enabled && self.backup.error.is_some();
        let destination_failed = self.hsn.iter().any(|record| record.error.is_some());
        let delete_failed = self.delete.enabled && self.delete.error.is_some();
        if self.error.is_some() || backup_failed || destination_failed || delete_failed {
            TaskOutcome::Failed
        } else {
            TaskOutcome::Completed
        }
    }

    /// Stage timestamps in pipeline order, skipping stages that did not run.
    #[must_use]
    pub fn stage_timeline(&self) -> Vec<i64> {
        let mut timeline = vec![self.started_at];
        timeline.extend(self.rule_match.at);
        timeline.extend(self.check.at);
        timeline.extend(self.backup.at);
        timeline.extend(self.hsn.iter().map(|record| record.at));
        timeline.extend(self.delete.at);
        timeline.extend(self.ended_at);
        timeline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log() -> TransactionLog {
        TransactionLog::begin("alice", "report.csv", "/home/alice/report.csv", 1024, "10.0.0.5")
    }

    #[test]
    fn stamps_never_run_backwards() {
        let mut log = log();
        log.clock = log.started_at + 60_000;
        let first = log.stamp();
        let second = log.stamp();
        assert!(first >= log.started_at + 60_000);
        assert!(second >= first);
    }

    #[test]
    fn first_abort_error_wins() {
        let mut log = log();
        log.abort("no matching rule");
        log.abort("later failure");
        assert_eq!(log.error.as_deref(), Some("no matching rule"));
        assert_eq!(log.outcome(), TaskOutcome::Failed);
    }

    #[test]
    fn disabled_backup_does_not_fail_the_outcome() {
        let mut log = log();
        log.backup.error = Some("backup disabled".to_string());
        log.finish();
        assert_eq!(log.outcome(), TaskOutcome::Completed);

        log.hsn.push(DestinationRecord {
            error: Some("copy failed".to_string()),
            ..DestinationRecord::default()
        });
        assert_eq!(log.outcome(), TaskOutcome::Failed);

        log.timed_out = true;
        assert_eq!(log.outcome(), TaskOutcome::TimedOut);
    }

    #[test]
    fn timeline_is_sorted_for_a_full_run() {
        let mut log = log();
        log.rule_match.at = Some(log.stamp());
        log.check.at = Some(log.stamp());
        log.backup.at = Some(log.stamp());
        let at = log.stamp();
        log.hsn.push(DestinationRecord {
            at,
            ..DestinationRecord::default()
        });
        log.delete.at = Some(log.stamp());
        log.finish();
        let timeline = log.stage_timeline();
        assert_eq!(timeline.len(), 7);
        assert!(timeline.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn serialises_without_the_internal_clock() -> anyhow::Result<()> {
        let value = serde_json::to_value(log())?;
        assert!(value.get("clock").is_none());
        assert_eq!(value["file_name"], "report.csv");
        Ok(())
    }
}
