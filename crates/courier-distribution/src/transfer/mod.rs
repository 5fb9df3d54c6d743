//! Transfer implementations, one per rule mode.
//!
//! # Design
//!
//! - A [`Transfer`] owns the state carried between its stages (resolved
//!   source account, backup path) and writes each stage's outcome into the
//!   transaction log.
//! - [`Transfer::run`] drives the stages in order and decides which failures
//!   abort the task. Per-destination failures never abort; delete failures
//!   are recorded on the delete record only.
//! - [`transfer_for`] is the factory keyed by [`TransferMode`]; modes without
//!   an implementation are reported as unsupported.

mod local_to_mix;

use std::sync::Arc;

use async_trait::async_trait;
use courier_config::{Rule, TransferMode};
use courier_events::{FileEvent, TransactionLog};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{DistributionError, DistributionResult, describe};
use crate::task::TaskContext;

pub use local_to_mix::LocalToMix;

/// Everything a transfer needs for one matched event.
#[derive(Debug, Clone)]
pub struct TransferInput {
    /// Shared task state.
    pub context: Arc<TaskContext>,
    /// Event being distributed.
    pub event: FileEvent,
    /// Rule the event matched.
    pub rule: Rule,
    /// Fires when the task's deadline elapses.
    pub cancel: CancellationToken,
}

/// The four pipeline stages of one transfer mode.
#[async_trait]
pub trait Transfer: Send {
    /// Mode this transfer implements.
    fn mode(&self) -> TransferMode;

    /// Confirm the source exists and is a file.
    async fn check(&mut self, log: &mut TransactionLog) -> DistributionResult<()>;

    /// Copy the source under the backup segment when the rule asks for it.
    async fn backup(&mut self, log: &mut TransactionLog) -> DistributionResult<()>;

    /// Deliver to every destination, recording each outcome.
    async fn distribute(&mut self, log: &mut TransactionLog) -> DistributionResult<()>;

    /// Remove the source when the rule asks for it.
    async fn delete(&mut self, log: &mut TransactionLog) -> DistributionResult<()>;

    /// Cancellation token of the running task.
    fn cancel_token(&self) -> &CancellationToken;

    /// Run every stage in order.
    ///
    /// Check, backup and distribute failures set the log's top-level error
    /// and stop the pipeline. Cancellation stops it silently; the supervisor
    /// records the deadline.
    async fn run(&mut self, log: &mut TransactionLog) {
        if let Err(err) = self.stages(log).await {
            if err.is_cancelled() {
                debug!(transaction_id = %log.transaction_id, "transfer stopped by cancellation");
            } else {
                log.abort(describe(&err));
            }
        }
    }

    /// Check, backup, distribute and delete, stopping at the first error.
    async fn stages(&mut self, log: &mut TransactionLog) -> DistributionResult<()> {
        self.check(log).await?;
        self.checkpoint()?;
        self.backup(log).await?;
        self.checkpoint()?;
        self.distribute(log).await?;
        self.checkpoint()?;
        if let Err(err) = self.delete(log).await {
            if err.is_cancelled() {
                return Err(err);
            }
            debug!(transaction_id = %log.transaction_id, error = %err, "delete failure recorded");
        }
        Ok(())
    }

    /// Fail with [`DistributionError::Cancelled`] once the token has fired.
    fn checkpoint(&self) -> DistributionResult<()> {
        if self.cancel_token().is_cancelled() {
            return Err(DistributionError::Cancelled);
        }
        Ok(())
    }
}

/// Transfer implementing `input.rule.mode`.
///
/// # Errors
///
/// Returns [`DistributionError::UnsupportedMode`] for modes without an
/// implementation.
pub fn transfer_for(input: TransferInput) -> DistributionResult<Box<dyn Transfer>> {
    match input.rule.mode {
        TransferMode::LocalToMix => Ok(Box::new(LocalToMix::new(input))),
        mode => Err(DistributionError::UnsupportedMode {
            mode: mode.as_str(),
        }),
    }
}
