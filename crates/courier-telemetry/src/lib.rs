//! Logging and metrics for the distribution engine.
//!
//! # Design
//! - `init_logging` installs one global tracing subscriber (JSON or pretty).
//! - `Metrics` owns a private Prometheus registry with the engine's task,
//!   stage, queue and byte counters.
#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::multiple_crate_versions)]

pub mod error;
pub mod init;
pub mod metrics;

pub use error::{Result, TelemetryError};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging};
pub use metrics::{Metrics, MetricsSnapshot, OUTCOME_PANICKED};
