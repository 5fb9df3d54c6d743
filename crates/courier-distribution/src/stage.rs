//! Pipeline stage labels shared by progress events and metrics.

/// Stages of a distribution task, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageKind {
    /// Rule resolution for the event.
    RuleMatch,
    /// Source existence check.
    Check,
    /// Backup copy.
    Backup,
    /// Delivery to every destination.
    Distribute,
    /// Source removal.
    Delete,
}

impl StageKind {
    /// Every stage in pipeline order.
    pub const ALL: [Self; 5] = [
        Self::RuleMatch,
        Self::Check,
        Self::Backup,
        Self::Distribute,
        Self::Delete,
    ];

    /// Label used in events and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RuleMatch => "rule_match",
            Self::Check => "check",
            Self::Backup => "backup",
            Self::Distribute => "distribute",
            Self::Delete => "delete",
        }
    }
}

/// Outcome a stage recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageStatus {
    /// The stage succeeded.
    Completed,
    /// The stage recorded an error.
    Failed,
    /// The rule turned the stage off.
    Skipped,
}

impl StageStatus {
    /// Label used in events and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_follow_pipeline_order() {
        let labels: Vec<&str> = StageKind::ALL.iter().map(|stage| stage.as_str()).collect();
        assert_eq!(
            labels,
            ["rule_match", "check", "backup", "distribute", "delete"]
        );
        assert_eq!(StageStatus::Skipped.as_str(), "skipped");
    }
}
