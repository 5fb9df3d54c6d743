//! One distribution task per file event, and the supervisor that bounds it.

use std::sync::Arc;
use std::time::Duration;

use courier_config::{AccountProvider, RuleProvider};
use courier_events::{FileEvent, TransactionLog};
use courier_telemetry::OUTCOME_PANICKED;
use courier_vfs::{StorageRegistry, path};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};
use uuid::Uuid;

use crate::copy::cancellable;
use crate::engine::Collaborators;
use crate::error::{DistributionError, describe};
use crate::matcher::match_rule;
use crate::sink::LogSink;
use crate::stage::{StageKind, StageStatus};
use crate::transfer::{TransferInput, transfer_for};

/// Time a cancelled worker gets to return its partial log.
const CANCEL_GRACE: Duration = Duration::from_secs(5);

/// Shared, read-only state every task runs against.
#[derive(Debug)]
pub struct TaskContext {
    collaborators: Collaborators,
    machine_addr: String,
    sink: Arc<dyn LogSink>,
}

impl TaskContext {
    /// Context for tasks on the worker at `machine_addr`.
    #[must_use]
    pub fn new(
        collaborators: Collaborators,
        machine_addr: impl Into<String>,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            collaborators,
            machine_addr: machine_addr.into(),
            sink,
        }
    }

    /// Rule lookup collaborator.
    #[must_use]
    pub fn rules(&self) -> &dyn RuleProvider {
        self.collaborators.rules.as_ref()
    }

    /// Account lookup collaborator.
    #[must_use]
    pub fn accounts(&self) -> &dyn AccountProvider {
        self.collaborators.accounts.as_ref()
    }

    /// Storage adapter registry.
    #[must_use]
    pub fn registry(&self) -> &StorageRegistry {
        &self.collaborators.registry
    }

    /// Address recorded as the originating worker.
    #[must_use]
    pub fn machine_addr(&self) -> &str {
        &self.machine_addr
    }

    /// Sink receiving lifecycle notifications.
    #[must_use]
    pub fn sink(&self) -> &dyn LogSink {
        self.sink.as_ref()
    }

    /// Report a stage outcome to the sink.
    pub fn progress(&self, transaction_id: Uuid, stage: StageKind, status: StageStatus) {
        self.sink.progress(transaction_id, stage, status);
    }
}

/// Matches one event to its rule and runs the rule's transfer.
#[derive(Debug)]
pub struct DistributionTask {
    context: Arc<TaskContext>,
    event: FileEvent,
}

impl DistributionTask {
    /// Task for `event`.
    #[must_use]
    pub const fn new(context: Arc<TaskContext>, event: FileEvent) -> Self {
        Self { context, event }
    }

    /// Empty log for the task's event.
    #[must_use]
    pub fn begin_log(&self) -> TransactionLog {
        TransactionLog::begin(
            &self.event.username,
            path::base(&self.event.path),
            &self.event.path,
            self.event.file_size,
            self.context.machine_addr(),
        )
    }

    /// Run every stage into `log` and return it.
    ///
    /// Stops at the next storage call once `cancel` fires; the partial log is
    /// still returned.
    pub async fn run(self, mut log: TransactionLog, cancel: CancellationToken) -> TransactionLog {
        let virtual_path = if self.event.virtual_path.is_empty() {
            self.event.path.as_str()
        } else {
            self.event.virtual_path.as_str()
        };
        let matched = cancellable(
            &cancel,
            match_rule(
                self.context.rules(),
                &self.event.username,
                virtual_path,
                &mut log,
            ),
        )
        .await;
        let rule = match matched {
            Ok(Ok(rule)) => {
                self.context
                    .progress(log.transaction_id, StageKind::RuleMatch, StageStatus::Completed);
                rule
            }
            Ok(Err(err)) => {
                self.context
                    .progress(log.transaction_id, StageKind::RuleMatch, StageStatus::Failed);
                log.abort(describe(&err));
                return log;
            }
            Err(_) => return log,
        };

        let input = TransferInput {
            context: Arc::clone(&self.context),
            event: self.event,
            rule,
            cancel,
        };
        match transfer_for(input) {
            Ok(mut transfer) => transfer.run(&mut log).await,
            Err(err) => log.abort(describe(&err)),
        }
        log
    }
}

/// Run `event` under a deadline of `timeout` and hand the final log to the
/// sink.
///
/// The deadline is armed here, when the task starts. When it elapses the
/// worker is cancelled and joined, so the logged record is exactly what the
/// worker managed to do.
pub(crate) async fn supervise(context: Arc<TaskContext>, event: FileEvent, timeout: Duration) {
    supervise_within(context, event, timeout, CANCEL_GRACE).await;
}

async fn supervise_within(
    context: Arc<TaskContext>,
    event: FileEvent,
    timeout: Duration,
    grace: Duration,
) {
    let task = DistributionTask::new(Arc::clone(&context), event);
    let log = task.begin_log();
    let skeleton = log.clone();
    context.sink().started(&log);

    let cancel = CancellationToken::new();
    let mut worker = tokio::spawn(task.run(log, cancel.clone()));

    let (mut log, panicked) = tokio::select! {
        joined = &mut worker => settle(joined, &skeleton),
        () = tokio::time::sleep(timeout) => {
            cancel.cancel();
            let (mut log, panicked) = match tokio::time::timeout(grace, &mut worker).await {
                Ok(joined) => settle(joined, &skeleton),
                Err(_) => {
                    worker.abort();
                    let mut log = skeleton.clone();
                    log.abort(describe(&DistributionError::Unresponsive));
                    (log, false)
                }
            };
            warn!(transaction_id = %log.transaction_id, file = %log.file_path, "distribution deadline exceeded");
            expire(&mut log, timeout);
            (log, panicked)
        }
    };

    log.finish();
    let outcome = if panicked {
        OUTCOME_PANICKED
    } else {
        log.outcome().as_str()
    };
    context.sink().finished(&log, outcome);
}

/// Mark `log` as timed out. The deadline leads the top-level error and any
/// earlier error follows it.
fn expire(log: &mut TransactionLog, timeout: Duration) {
    let deadline = describe(&DistributionError::DeadlineExceeded {
        timeout_secs: timeout.as_secs(),
    });
    log.timed_out = true;
    log.error = Some(match log.error.take() {
        Some(earlier) => format!("{deadline}: {earlier}"),
        None => deadline,
    });
}

fn settle(
    joined: Result<TransactionLog, JoinError>,
    skeleton: &TransactionLog,
) -> (TransactionLog, bool) {
    match joined {
        Ok(log) => (log, false),
        Err(err) => {
            let panicked = err.is_panic();
            let cause = if panicked {
                DistributionError::Panicked {
                    message: panic_message(err),
                }
            } else {
                DistributionError::Cancelled
            };
            let mut log = skeleton.clone();
            error!(transaction_id = %log.transaction_id, error = %cause, "distribution task died");
            log.abort(describe(&cause));
            (log, panicked)
        }
    }
}

fn panic_message(err: JoinError) -> String {
    match err.try_into_panic() {
        Ok(payload) => payload
            .downcast_ref::<&str>()
            .map(|message| (*message).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string()),
        Err(err) => err.to_string(),
    }
}
