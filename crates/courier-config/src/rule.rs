//! Distribution rules and their source/destination bindings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How files move for a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferMode {
    /// Local accounts to local or object-storage accounts.
    #[default]
    LocalToMix,
    /// Local account to a remote endpoint.
    RemoteUpload,
    /// Remote endpoint to a local account.
    RemoteDownload,
}

impl TransferMode {
    /// Label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LocalToMix => "local_to_mix",
            Self::RemoteUpload => "remote_upload",
            Self::RemoteDownload => "remote_download",
        }
    }
}

/// A configured distribution rule.
///
/// `pattern` is a glob matched case-insensitively against the base name of
/// an event's virtual path.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Rule {
    /// Rule identifier.
    pub id: i64,
    /// Free-form rule code.
    pub code: String,
    /// Glob over the file base name.
    pub pattern: String,
    /// Copy the source into the owner's `BAK` area before distributing.
    pub backup: bool,
    /// Transfer mode.
    pub mode: TransferMode,
    /// Remove the source after distribution.
    pub rm_source: bool,
    /// Link instead of copying when the destination shares the source store.
    pub symlink: bool,
    /// Operator notes.
    pub additional_info: String,
    /// Creator.
    pub created_by: String,
    /// Creation time.
    pub created_at: Option<DateTime<Utc>>,
    /// Last editor.
    pub updated_by: String,
    /// Last edit time.
    pub updated_at: Option<DateTime<Utc>>,
    /// Source binding.
    pub osn: SourceBinding,
    /// Destination bindings, processed in order.
    pub hsn: Vec<DestinationBinding>,
}

/// Where a rule's files come from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceBinding {
    /// Binding identifier.
    pub id: i64,
    /// Local account owning the source files.
    pub local_user: String,
    /// Free-form code.
    pub code: String,
    /// Path below the account root.
    pub relative_path: String,
    /// Absolute path recorded by the operator, informational.
    pub absolute_path: String,
    /// Remote peer for remote transfer modes.
    pub remote_user: Option<RemoteUser>,
}

/// Where a rule delivers a file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationBinding {
    /// Binding identifier.
    pub id: i64,
    /// Local account receiving the file.
    pub local_user: String,
    /// Free-form code.
    pub code: String,
    /// Directory below the account root receiving the file.
    pub relative_path: String,
    /// Absolute path recorded by the operator, informational.
    pub absolute_path: String,
    /// Remote peer for remote transfer modes.
    pub remote_user: Option<RemoteUser>,
}

impl DestinationBinding {
    /// Name recorded in logs for this destination.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if !self.local_user.is_empty() {
            return &self.local_user;
        }
        self.remote_user
            .as_ref()
            .map_or("", |remote| remote.username.as_str())
    }
}

/// Protocol spoken by a remote peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteProtocol {
    /// SSH file transfer.
    #[default]
    Sftp,
    /// Plain FTP.
    Ftp,
}

/// A remote peer reachable by the remote transfer modes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteUser {
    /// Identifier.
    pub id: i64,
    /// Login name on the peer.
    pub username: String,
    /// `host:port` of the peer.
    pub endpoint: String,
    /// Protocol.
    pub protocol: RemoteProtocol,
    /// Creator.
    pub created_by: String,
    /// Creation time.
    pub created_at: Option<DateTime<Utc>>,
    /// Last editor.
    pub updated_by: String,
    /// Last edit time.
    pub updated_at: Option<DateTime<Utc>>,
}

impl RemoteUser {
    /// Host part of the endpoint.
    #[must_use]
    pub fn remote_ip(&self) -> &str {
        let endpoint = self.endpoint.as_str();
        if let Some(rest) = endpoint.strip_prefix('[') {
            return rest.split(']').next().unwrap_or(rest);
        }
        match endpoint.split_once(':') {
            Some((host, port)) if !port.contains(':') => host,
            _ => endpoint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(endpoint: &str) -> RemoteUser {
        RemoteUser {
            endpoint: endpoint.to_string(),
            ..RemoteUser::default()
        }
    }

    #[test]
    fn remote_ip_strips_the_port() {
        assert_eq!(remote("10.0.0.7:22").remote_ip(), "10.0.0.7");
        assert_eq!(remote("sftp.example.com").remote_ip(), "sftp.example.com");
        assert_eq!(remote("[fe80::1]:2121").remote_ip(), "fe80::1");
        assert_eq!(remote("fe80::1").remote_ip(), "fe80::1");
        assert_eq!(remote("").remote_ip(), "");
    }

    #[test]
    fn destination_name_falls_back_to_remote_user() {
        let binding = DestinationBinding {
            remote_user: Some(RemoteUser {
                username: "partner".to_string(),
                ..RemoteUser::default()
            }),
            ..DestinationBinding::default()
        };
        assert_eq!(binding.display_name(), "partner");
    }

    #[test]
    fn transfer_mode_uses_snake_case() -> anyhow::Result<()> {
        let mode: TransferMode = serde_json::from_str("\"remote_download\"")?;
        assert_eq!(mode, TransferMode::RemoteDownload);
        assert_eq!(TransferMode::default().as_str(), "local_to_mix");
        Ok(())
    }
}
