//! File distribution pipeline and the engine that schedules it.
//!
//! # Design
//! - `DistributionEngine` owns a bounded intake queue and a single dispatcher
//!   that spawns one supervised task per file event.
//! - A task matches the event against the owner's rules, then hands the
//!   matched rule to the `Transfer` implementation for its mode, which runs
//!   check, backup, distribute and delete in order.
//! - Every stage writes its outcome into the task's `TransactionLog`; the log
//!   reaches the `LogSink` exactly once, whatever happened.
//! - Deadlines are enforced through a `CancellationToken` raced against every
//!   storage call; the supervisor cancels, joins the worker, then logs.
#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::multiple_crate_versions)]

pub mod account;
pub mod copy;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod paths;
pub mod sink;
pub mod stage;
pub mod task;
pub mod transfer;

pub use account::resolve_local_account;
pub use copy::copy_file;
pub use engine::{Collaborators, DistributionEngine};
pub use error::{DistributionError, DistributionResult, describe};
pub use matcher::match_rule;
pub use paths::{BACKUP_SEGMENT, account_path, backup_path};
pub use sink::{LogSink, TRANSACTION_TARGET, TracingSink};
pub use stage::{StageKind, StageStatus};
pub use task::{DistributionTask, TaskContext};
pub use transfer::{LocalToMix, Transfer, TransferInput, transfer_for};
