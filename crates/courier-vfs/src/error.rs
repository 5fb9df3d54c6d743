//! # Design
//!
//! - One error type shared by every storage adapter so callers can branch on
//!   capability (`Unsupported`) and existence (`NotFound`) uniformly.
//! - Backend failures keep the HTTP status and service error code; the
//!   rendered message carries the `HTTP <status>` marker some classifiers
//!   match on.

use std::io;

use thiserror::Error;

/// Result type for storage adapter operations.
pub type VfsResult<T> = Result<T, VfsError>;

/// Errors produced by storage adapters.
#[derive(Debug, Error)]
pub enum VfsError {
    /// The path does not exist on the backend.
    #[error("path not found")]
    NotFound {
        /// Operation that observed the missing path.
        operation: &'static str,
        /// Backend-native path.
        path: String,
    },
    /// The backend refused access to the path.
    #[error("permission denied")]
    PermissionDenied {
        /// Operation that was refused.
        operation: &'static str,
        /// Backend-native path.
        path: String,
    },
    /// The backend cannot perform this operation at all.
    #[error("operation not supported")]
    Unsupported {
        /// Operation that is unsupported.
        operation: &'static str,
        /// Adapter name reporting the gap.
        backend: &'static str,
    },
    /// A file operation was attempted on a directory.
    #[error("path is a directory")]
    IsDirectory {
        /// Operation that rejected the directory.
        operation: &'static str,
        /// Backend-native path.
        path: String,
    },
    /// A directory still has children.
    #[error("directory not empty")]
    DirectoryNotEmpty {
        /// Operation that rejected the directory.
        operation: &'static str,
        /// Backend-native path.
        path: String,
    },
    /// The target already exists and overwriting was forbidden.
    #[error("path already exists")]
    AlreadyExists {
        /// Operation that refused to overwrite.
        operation: &'static str,
        /// Backend-native path.
        path: String,
    },
    /// A path could not be interpreted.
    #[error("invalid path")]
    InvalidPath {
        /// Operation that rejected the path.
        operation: &'static str,
        /// Offending path.
        path: String,
        /// Static reason for the rejection.
        reason: &'static str,
    },
    /// Local IO failures.
    #[error("storage io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: String,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The object store answered with an error.
    #[error("object store {operation} failed: {message}")]
    Backend {
        /// Operation that was rejected.
        operation: &'static str,
        /// Object key involved.
        key: String,
        /// HTTP status when the failure came from a response.
        status: Option<u16>,
        /// Service error code (`NoSuchKey`, `AccessDenied`, ...).
        code: Option<String>,
        /// Rendered failure description.
        message: String,
    },
    /// The request never produced a response.
    #[error("object store transport failure")]
    Transport {
        /// Operation that failed.
        operation: &'static str,
        /// Underlying HTTP client error.
        source: reqwest::Error,
    },
    /// A response body could not be decoded.
    #[error("object store response decode failure")]
    Decode {
        /// Operation whose response was malformed.
        operation: &'static str,
        /// Underlying XML error.
        source: quick_xml::DeError,
    },
    /// A response header or attribute carried an unexpected value.
    #[error("invalid object metadata")]
    InvalidMetadata {
        /// Operation that read the metadata.
        operation: &'static str,
        /// Metadata field that failed to parse.
        field: &'static str,
        /// Offending value.
        value: String,
    },
}

impl VfsError {
    /// Wrap an IO error, promoting the kinds callers branch on.
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<String>, source: io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            io::ErrorKind::NotFound => Self::NotFound { operation, path },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { operation, path },
            io::ErrorKind::Unsupported => Self::Unsupported {
                operation,
                backend: "osfs",
            },
            _ => Self::Io {
                operation,
                path,
                source,
            },
        }
    }

    /// Build a backend error from a response status and optional service code.
    #[must_use]
    pub fn backend(
        operation: &'static str,
        key: impl Into<String>,
        status: Option<u16>,
        code: Option<String>,
        detail: &str,
    ) -> Self {
        let mut message = String::new();
        if let Some(status) = status {
            message.push_str(&format!("HTTP {status}"));
        }
        if let Some(code) = code.as_deref() {
            if !message.is_empty() {
                message.push(' ');
            }
            message.push_str(code);
        }
        if !detail.is_empty() {
            if !message.is_empty() {
                message.push_str(": ");
            }
            message.push_str(detail);
        }
        Self::Backend {
            operation,
            key: key.into(),
            status,
            code,
            message,
        }
    }

    /// Shorthand for [`VfsError::Unsupported`].
    #[must_use]
    pub const fn unsupported(operation: &'static str, backend: &'static str) -> Self {
        Self::Unsupported { operation, backend }
    }

    /// Service error code, when the backend reported one.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Backend { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Whether this is the distinguished capability-gap error.
    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_promote_classified_kinds() {
        let err = VfsError::io("stat", "/x", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, VfsError::NotFound { operation: "stat", .. }));

        let err = VfsError::io("open", "/x", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, VfsError::PermissionDenied { .. }));

        let err = VfsError::io("open", "/x", io::Error::other("boom"));
        assert!(matches!(err, VfsError::Io { .. }));
    }

    #[test]
    fn backend_message_carries_status_and_code() {
        let err = VfsError::backend(
            "head_object",
            "a/b",
            Some(404),
            Some("NoSuchKey".to_string()),
            "The specified key does not exist.",
        );
        assert_eq!(
            err.to_string(),
            "object store head_object failed: HTTP 404 NoSuchKey: The specified key does not exist."
        );
        assert_eq!(err.code(), Some("NoSuchKey"));

        let bare = VfsError::backend("head_object", "a", Some(403), None, "");
        assert_eq!(bare.to_string(), "object store head_object failed: HTTP 403");
    }
}
