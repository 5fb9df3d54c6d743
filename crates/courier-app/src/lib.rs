#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Courier application bootstrap wiring.
//!
//! Layout: `bootstrap.rs` (configuration, engine and stdin intake), `error.rs`
//! (application errors).

/// Application bootstrap and environment loading.
pub mod bootstrap;
/// Application-level errors.
pub mod error;

pub use bootstrap::{ENV_CONFIG, ENV_DIRECTORY, IntakeSummary, run_app};
pub use error::{AppError, AppResult};
