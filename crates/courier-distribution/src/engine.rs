//! Intake queue, dispatcher and engine lifecycle.
//!
//! # Design
//!
//! - One bounded FIFO queue; `submit` waits for room, `try_submit` reports a
//!   full queue instead.
//! - A single dispatcher drains the queue and spawns one supervised task per
//!   event. It never waits on a task, and a task failure never reaches it.
//! - Shutdown closes intake, drains what was queued and waits for every
//!   in-flight task to log.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use courier_config::{AccountProvider, DistributionConfig, RuleProvider, validate_config};
use courier_events::FileEvent;
use courier_vfs::StorageRegistry;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::error::{DistributionError, DistributionResult};
use crate::sink::LogSink;
use crate::task::{TaskContext, supervise};

/// External collaborators the pipeline consults.
#[derive(Clone)]
pub struct Collaborators {
    /// Rule lookup.
    pub rules: Arc<dyn RuleProvider>,
    /// Account lookup.
    pub accounts: Arc<dyn AccountProvider>,
    /// Storage adapter factory.
    pub registry: Arc<StorageRegistry>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Running distribution engine.
#[derive(Debug)]
pub struct DistributionEngine {
    intake: mpsc::Sender<FileEvent>,
    dispatcher: JoinHandle<()>,
    sink: Arc<dyn LogSink>,
}

impl DistributionEngine {
    /// Validate `config`, create the intake queue and spawn the dispatcher.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`DistributionError::ConfigDisabled`] when distribution is
    /// turned off and [`DistributionError::InvalidConfig`] when validation
    /// fails. No queue exists in either case.
    pub fn start(
        config: &DistributionConfig,
        collaborators: Collaborators,
        sink: Arc<dyn LogSink>,
    ) -> DistributionResult<Self> {
        if !config.enabled {
            return Err(DistributionError::ConfigDisabled);
        }
        validate_config(config).map_err(|source| DistributionError::InvalidConfig { source })?;

        let (intake, queue) = mpsc::channel(config.intake_capacity);
        let context = Arc::new(TaskContext::new(
            collaborators,
            config.machine_addr.clone(),
            Arc::clone(&sink),
        ));
        let timeout = Duration::from_secs(config.timeout_secs);
        let dispatcher = tokio::spawn(dispatch(queue, context, timeout));
        info!(
            capacity = config.intake_capacity,
            timeout_secs = config.timeout_secs,
            machine_addr = %config.machine_addr,
            "distribution engine started"
        );
        Ok(Self {
            intake,
            dispatcher,
            sink,
        })
    }

    /// Enqueue `event`, waiting while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`DistributionError::Closed`] when the dispatcher has stopped.
    pub async fn submit(&self, event: FileEvent) -> DistributionResult<()> {
        self.intake
            .send(event)
            .await
            .map_err(|_| DistributionError::Closed)?;
        self.sink.queue_depth(self.queue_depth());
        Ok(())
    }

    /// Enqueue `event` without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`DistributionError::QueueFull`] when the queue is at capacity
    /// and [`DistributionError::Closed`] when the dispatcher has stopped.
    pub fn try_submit(&self, event: FileEvent) -> DistributionResult<()> {
        self.intake.try_send(event).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => DistributionError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => DistributionError::Closed,
        })?;
        self.sink.queue_depth(self.queue_depth());
        Ok(())
    }

    /// Events waiting for the dispatcher.
    #[must_use]
    pub fn queue_depth(&self) -> usize {
        self.intake.max_capacity() - self.intake.capacity()
    }

    /// Close intake, dispatch what is queued and wait for every task.
    pub async fn shutdown(self) {
        let Self {
            intake, dispatcher, ..
        } = self;
        drop(intake);
        if let Err(err) = dispatcher.await {
            warn!(error = %err, "distribution dispatcher stopped abnormally");
        }
        info!("distribution engine stopped");
    }
}

async fn dispatch(
    mut queue: mpsc::Receiver<FileEvent>,
    context: Arc<TaskContext>,
    timeout: Duration,
) {
    let tracker = TaskTracker::new();
    while let Some(event) = queue.recv().await {
        context.sink().queue_depth(queue.len());
        debug!(username = %event.username, path = %event.path, "dispatching file event");
        tracker.spawn(supervise(Arc::clone(&context), event, timeout));
    }
    tracker.close();
    debug!(in_flight = tracker.len(), "intake closed, waiting for tasks");
    tracker.wait().await;
}
