//! File metadata returned by `stat`-style operations.

use chrono::{DateTime, Utc};

/// Kind of entry a path resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Regular file or object.
    File,
    /// Real or emulated directory.
    Directory,
    /// Symbolic link (only reported by `lstat` on backends that expose links).
    Symlink,
}

/// Metadata for a single path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Base name of the path.
    pub name: String,
    /// Size in bytes; zero for directories.
    pub size: u64,
    /// Last modification time.
    pub modified: DateTime<Utc>,
    /// Entry kind.
    pub kind: FileKind,
}

impl FileInfo {
    /// Metadata for a regular file.
    #[must_use]
    pub fn file(name: impl Into<String>, size: u64, modified: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            size,
            modified,
            kind: FileKind::File,
        }
    }

    /// Metadata for a directory.
    #[must_use]
    pub fn directory(name: impl Into<String>, modified: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            size: 0,
            modified,
            kind: FileKind::Directory,
        }
    }

    /// Whether the entry is a directory.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    /// Whether the entry is a symbolic link.
    #[must_use]
    pub fn is_symlink(&self) -> bool {
        self.kind == FileKind::Symlink
    }
}

impl From<(String, &std::fs::Metadata)> for FileInfo {
    fn from((name, metadata): (String, &std::fs::Metadata)) -> Self {
        let modified = metadata
            .modified()
            .map_or(DateTime::<Utc>::UNIX_EPOCH, DateTime::<Utc>::from);
        let kind = if metadata.file_type().is_symlink() {
            FileKind::Symlink
        } else if metadata.is_dir() {
            FileKind::Directory
        } else {
            FileKind::File
        };
        Self {
            name,
            size: if kind == FileKind::Directory {
                0
            } else {
                metadata.len()
            },
            modified,
            kind,
        }
    }
}
