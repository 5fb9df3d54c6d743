//! Configuration surface of the distribution engine.
//!
//! # Design
//! - `DistributionConfig` is the process-level engine configuration loaded
//!   from YAML or JSON with environment overrides.
//! - Rules and accounts are read through the `RuleProvider` and
//!   `AccountProvider` traits; `StaticDirectory` is the file-backed provider.
//! - Validation runs at load time so the pipeline only sees consistent rules.
#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::multiple_crate_versions)]

pub mod account;
pub mod defaults;
pub mod directory;
pub mod error;
pub mod loader;
pub mod model;
pub mod rule;
pub mod validate;

pub use account::Account;
pub use directory::{AccountProvider, DirectoryDocument, RuleProvider, StaticDirectory};
pub use error::{ConfigError, ConfigResult};
pub use loader::{apply_env_overrides, load_config, load_directory, parse_document};
pub use model::{BackendSettings, DistributionConfig, LogFormatSetting, LoggingSettings, OssSettings};
pub use rule::{
    DestinationBinding, RemoteProtocol, RemoteUser, Rule, SourceBinding, TransferMode,
};
pub use validate::{validate_config, validate_rule};
