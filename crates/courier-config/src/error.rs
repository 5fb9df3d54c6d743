//! # Design
//!
//! - Constant error messages; context travels in fields.
//! - Rule validation failures name the rule id and the offending field.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration file could not be read.
    #[error("configuration io failure")]
    Io {
        /// Operation that failed.
        operation: &'static str,
        /// File involved.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// A YAML document failed to parse.
    #[error("configuration yaml parse failure")]
    Yaml {
        /// File involved.
        path: PathBuf,
        /// Underlying parse error.
        source: serde_yaml::Error,
    },
    /// A JSON document failed to parse.
    #[error("configuration json parse failure")]
    Json {
        /// File involved.
        path: PathBuf,
        /// Underlying parse error.
        source: serde_json::Error,
    },
    /// The file extension names no supported format.
    #[error("unsupported configuration format")]
    UnsupportedFormat {
        /// File involved.
        path: PathBuf,
    },
    /// An engine configuration field is invalid.
    #[error("invalid configuration field")]
    InvalidField {
        /// Section containing the field.
        section: &'static str,
        /// Field that failed validation.
        field: &'static str,
        /// Offending value when available.
        value: Option<String>,
        /// Static reason for the failure.
        reason: &'static str,
    },
    /// A rule is internally inconsistent.
    #[error("invalid rule")]
    InvalidRule {
        /// Identifier of the rule.
        rule_id: i64,
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
    },
    /// An environment override could not be parsed.
    #[error("invalid environment override")]
    InvalidEnv {
        /// Variable name.
        name: &'static str,
        /// Offending value.
        value: String,
    },
    /// Two accounts share a username.
    #[error("duplicate account")]
    DuplicateAccount {
        /// Username that appears twice.
        username: String,
    },
}
