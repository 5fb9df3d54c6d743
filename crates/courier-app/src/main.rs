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

//! Binary entrypoint: reads file events from stdin and distributes them.

use courier_app::{AppResult, run_app};

/// Bootstraps the distribution engine and blocks until intake ends.
#[tokio::main]
async fn main() -> AppResult<()> {
    run_app().await
}
