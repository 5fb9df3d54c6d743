//! Where transaction logs and progress go.

use std::fmt;

use courier_events::{Event, EventBus, TransactionLog};
use courier_telemetry::Metrics;
use tracing::{debug, info};
use uuid::Uuid;

use crate::stage::{StageKind, StageStatus};

/// Tracing target of the per-task transaction records.
pub const TRANSACTION_TARGET: &str = "courier::transaction";

/// Receives task lifecycle notifications.
///
/// `finished` is called exactly once per task, after the worker has stopped.
pub trait LogSink: Send + Sync + fmt::Debug {
    /// A task was armed for an event.
    fn started(&self, _log: &TransactionLog) {}

    /// A stage recorded its outcome.
    fn progress(&self, _transaction_id: Uuid, _stage: StageKind, _status: StageStatus) {}

    /// The intake queue changed depth.
    fn queue_depth(&self, _depth: usize) {}

    /// A task reached its terminal state with the given outcome label.
    fn finished(&self, log: &TransactionLog, outcome: &'static str);
}

/// Default sink: structured logs, bus events and metrics.
#[derive(Debug, Clone)]
pub struct TracingSink {
    events: EventBus,
    metrics: Metrics,
}

impl TracingSink {
    /// Sink publishing on `events` and recording into `metrics`.
    #[must_use]
    pub const fn new(events: EventBus, metrics: Metrics) -> Self {
        Self { events, metrics }
    }

    /// Bus the sink publishes on.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Metrics the sink records into.
    #[must_use]
    pub const fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

impl LogSink for TracingSink {
    fn started(&self, log: &TransactionLog) {
        self.metrics.task_started();
        self.events.publish(Event::DistributionStarted {
            transaction_id: log.transaction_id,
            username: log.username.clone(),
            path: log.file_path.clone(),
        });
    }

    fn progress(&self, transaction_id: Uuid, stage: StageKind, status: StageStatus) {
        debug!(%transaction_id, stage = stage.as_str(), status = status.as_str(), "stage finished");
        self.metrics.record_stage(stage.as_str(), status.as_str());
        self.events.publish(Event::DistributionProgress {
            transaction_id,
            stage: stage.as_str().to_string(),
            status: status.as_str().to_string(),
        });
    }

    fn queue_depth(&self, depth: usize) {
        self.metrics
            .set_queue_depth(i64::try_from(depth).unwrap_or(i64::MAX));
    }

    fn finished(&self, log: &TransactionLog, outcome: &'static str) {
        let record = serde_json::to_string(log)
            .unwrap_or_else(|err| format!("{{\"serialization_error\":\"{err}\"}}"));
        info!(
            target: TRANSACTION_TARGET,
            transaction_id = %log.transaction_id,
            username = %log.username,
            file = %log.file_path,
            outcome,
            log = %record,
            "distribution finished"
        );

        let transferred = log.backup.size + log.hsn.iter().map(|entry| entry.bytes).sum::<u64>();
        self.metrics.add_bytes_copied(transferred);
        self.metrics.record_task(outcome);
        self.metrics.task_finished();
        self.events.publish(Event::DistributionFinished {
            log: Box::new(log.clone()),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_events::DestinationRecord;

    #[tokio::test]
    async fn finished_tasks_reach_bus_and_metrics() -> anyhow::Result<()> {
        let sink = TracingSink::new(EventBus::with_capacity(16), Metrics::new()?);
        let mut stream = sink.events().subscribe(None);
        let mut log =
            TransactionLog::begin("alice", "report.csv", "/home/alice/report.csv", 4, "10.0.0.5");
        log.backup.size = 4;
        log.hsn.push(DestinationRecord {
            account: "bob".to_string(),
            bytes: 4,
            ..DestinationRecord::default()
        });

        sink.started(&log);
        sink.progress(log.transaction_id, StageKind::Check, StageStatus::Completed);
        log.finish();
        sink.finished(&log, log.outcome().as_str());

        let kinds = [
            stream.next().await.map(|envelope| envelope.event.kind()),
            stream.next().await.map(|envelope| envelope.event.kind()),
            stream.next().await.map(|envelope| envelope.event.kind()),
        ];
        assert_eq!(
            kinds,
            [
                Some("distribution_started"),
                Some("distribution_progress"),
                Some("distribution_finished"),
            ]
        );

        let snapshot = sink.metrics().snapshot();
        assert_eq!(snapshot.tasks_completed, 1);
        assert_eq!(snapshot.tasks_in_flight, 0);
        assert_eq!(snapshot.bytes_copied_total, 8);
        Ok(())
    }
}
