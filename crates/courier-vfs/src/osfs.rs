//! Local filesystem adapter.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncSeekExt;

use crate::error::{VfsError, VfsResult};
use crate::fs::{CreateFlags, Fs};
use crate::handle::{Opened, ReadHandle, WriteHandle};
use crate::info::FileInfo;
use crate::path;
use crate::storage::{ProviderKind, StorageConfig, StorageIdentity};

const NAME: &str = "osfs";

/// Adapter over the host filesystem, rooted at a directory.
///
/// Native paths are absolute host paths; virtual paths resolve beneath
/// `root`, optionally behind a mount prefix.
#[derive(Debug, Clone)]
pub struct OsFs {
    connection_id: String,
    root: String,
    mount_path: String,
}

impl OsFs {
    /// Adapter rooted at `root`.
    #[must_use]
    pub fn new(connection_id: impl Into<String>, root: impl AsRef<Path>) -> Self {
        Self {
            connection_id: connection_id.into(),
            root: path::clean(&root.as_ref().to_string_lossy()),
            mount_path: String::new(),
        }
    }

    /// Expose the adapter under a virtual mount prefix.
    #[must_use]
    pub fn with_mount_path(mut self, mount_path: impl Into<String>) -> Self {
        self.mount_path = path::clean(&mount_path.into());
        if self.mount_path == "/" || self.mount_path == "." {
            self.mount_path.clear();
        }
        self
    }

    /// Root directory of the adapter.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }
}

fn base_name(name: &str) -> String {
    path::base(name)
}

#[async_trait]
impl Fs for OsFs {
    fn name(&self) -> &'static str {
        NAME
    }

    fn connection_id(&self) -> &str {
        &self.connection_id
    }

    fn storage_id(&self) -> String {
        format!("file://{}", self.root)
    }

    fn provider(&self) -> ProviderKind {
        ProviderKind::Local
    }

    fn storage_identity(&self) -> StorageIdentity {
        StorageConfig::Local.identity()
    }

    async fn stat(&self, name: &str) -> VfsResult<FileInfo> {
        let metadata = fs::metadata(name)
            .await
            .map_err(|err| VfsError::io("stat", name, err))?;
        Ok(FileInfo::from((base_name(name), &metadata)))
    }

    async fn lstat(&self, name: &str) -> VfsResult<FileInfo> {
        let metadata = fs::symlink_metadata(name)
            .await
            .map_err(|err| VfsError::io("lstat", name, err))?;
        Ok(FileInfo::from((base_name(name), &metadata)))
    }

    async fn open(&self, name: &str, offset: u64) -> VfsResult<Opened<ReadHandle>> {
        let mut file = fs::File::open(name)
            .await
            .map_err(|err| VfsError::io("open", name, err))?;
        if offset > 0 {
            file.seek(SeekFrom::Start(offset))
                .await
                .map_err(|err| VfsError::io("seek", name, err))?;
        }
        Ok(Opened::direct(ReadHandle::File(file)))
    }

    async fn create(&self, name: &str, flags: CreateFlags) -> VfsResult<Opened<WriteHandle>> {
        let mut options = OpenOptions::new();
        options.write(true).create(true);
        if flags.append {
            options.append(true);
        } else if flags.truncate {
            options.truncate(true);
        }
        let file = options
            .open(name)
            .await
            .map_err(|err| VfsError::io("create", name, err))?;
        Ok(Opened::direct(WriteHandle::File(file)))
    }

    async fn remove(&self, name: &str, is_dir: bool) -> VfsResult<()> {
        let result = if is_dir {
            fs::remove_dir(name).await
        } else {
            fs::remove_file(name).await
        };
        result.map_err(|err| VfsError::io("remove", name, err))
    }

    async fn rename(&self, source: &str, target: &str) -> VfsResult<()> {
        if source == target {
            return Ok(());
        }
        fs::rename(source, target)
            .await
            .map_err(|err| VfsError::io("rename", source, err))
    }

    async fn copy(&self, source: &str, target: &str) -> VfsResult<()> {
        if source == target {
            return Ok(());
        }
        let info = self.stat(source).await?;
        if info.is_dir() {
            return Err(VfsError::IsDirectory {
                operation: "copy",
                path: source.to_string(),
            });
        }
        fs::copy(source, target)
            .await
            .map(|_| ())
            .map_err(|err| VfsError::io("copy", target, err))
    }

    async fn symlink(&self, source: &str, target: &str) -> VfsResult<()> {
        if source == target {
            return Ok(());
        }
        #[cfg(unix)]
        {
            fs::symlink(source, target)
                .await
                .map_err(|err| VfsError::io("symlink", target, err))
        }
        #[cfg(not(unix))]
        {
            Err(VfsError::unsupported("symlink", NAME))
        }
    }

    async fn readlink(&self, name: &str) -> VfsResult<String> {
        let target: PathBuf = fs::read_link(name)
            .await
            .map_err(|err| VfsError::io("readlink", name, err))?;
        Ok(target.to_string_lossy().into_owned())
    }

    async fn mkdir(&self, name: &str) -> VfsResult<()> {
        fs::create_dir(name)
            .await
            .map_err(|err| VfsError::io("mkdir", name, err))
    }

    async fn mkdir_all(&self, name: &str) -> VfsResult<()> {
        fs::create_dir_all(name)
            .await
            .map_err(|err| VfsError::io("mkdir_all", name, err))
    }

    async fn read_dir(&self, name: &str) -> VfsResult<Vec<FileInfo>> {
        let mut entries = fs::read_dir(name)
            .await
            .map_err(|err| VfsError::io("read_dir", name, err))?;
        let mut infos = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| VfsError::io("read_dir", name, err))?
        {
            let metadata = entry
                .metadata()
                .await
                .map_err(|err| VfsError::io("read_dir", name, err))?;
            let entry_name = entry.file_name().to_string_lossy().into_owned();
            infos.push(FileInfo::from((entry_name, &metadata)));
        }
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }

    async fn truncate(&self, name: &str, size: u64) -> VfsResult<()> {
        let file = OpenOptions::new()
            .write(true)
            .open(name)
            .await
            .map_err(|err| VfsError::io("truncate", name, err))?;
        file.set_len(size)
            .await
            .map_err(|err| VfsError::io("truncate", name, err))
    }

    async fn read_all(&self, name: &str) -> VfsResult<Bytes> {
        fs::read(name)
            .await
            .map(Bytes::from)
            .map_err(|err| VfsError::io("read_all", name, err))
    }

    async fn write_all(&self, name: &str, data: Bytes) -> VfsResult<()> {
        fs::write(name, &data)
            .await
            .map_err(|err| VfsError::io("write_all", name, err))
    }

    fn resolve_path(&self, virtual_path: &str) -> VfsResult<String> {
        let mut relative = virtual_path;
        if !self.mount_path.is_empty() {
            relative = relative.strip_prefix(&self.mount_path).unwrap_or(relative);
        }
        let cleaned = path::clean(&format!("/{relative}"));
        Ok(path::join(&[self.root.as_str(), cleaned.as_str()]))
    }

    fn get_relative_path(&self, name: &str) -> String {
        let cleaned = path::clean(name);
        let relative = if self.root == "/" {
            cleaned
        } else {
            match cleaned.strip_prefix(&self.root) {
                Some(rest) if rest.is_empty() || rest.starts_with('/') => {
                    path::clean(&format!("/{rest}"))
                }
                _ => "/".to_string(),
            }
        };
        if self.mount_path.is_empty() {
            relative
        } else {
            path::join(&[self.mount_path.as_str(), relative.as_str()])
        }
    }

    fn is_not_exist(&self, err: &VfsError) -> bool {
        matches!(err, VfsError::NotFound { .. })
    }

    fn is_permission(&self, err: &VfsError) -> bool {
        matches!(err, VfsError::PermissionDenied { .. })
    }

    fn is_upload_resume_supported(&self) -> bool {
        true
    }

    fn is_atomic_upload_supported(&self) -> bool {
        true
    }

    fn has_virtual_folders(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn adapter(root: &Path) -> OsFs {
        OsFs::new("conn-1", root)
    }

    fn native(root: &Path, name: &str) -> String {
        root.join(name).to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn create_then_open_at_offset() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let fs = adapter(temp.path());
        let target = native(temp.path(), "payload.bin");

        let mut opened = fs.create(&target, CreateFlags::default()).await?;
        opened.handle.write_all(b"hello world").await?;
        opened.handle.shutdown().await?;
        opened.release.release();

        let mut reader = fs.open(&target, 6).await?;
        let mut tail = String::new();
        reader.handle.read_to_string(&mut tail).await?;
        assert_eq!(tail, "world");
        assert_eq!(fs.stat(&target).await?.size, 11);
        Ok(())
    }

    #[tokio::test]
    async fn missing_paths_classify_as_not_exist() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let fs = adapter(temp.path());
        let err = fs
            .stat(&native(temp.path(), "absent"))
            .await
            .expect_err("absent path must not stat");
        assert!(fs.is_not_exist(&err));
        assert!(!fs.is_permission(&err));
        Ok(())
    }

    #[tokio::test]
    async fn copy_refuses_directories_and_ignores_self_copy() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let fs = adapter(temp.path());
        let dir = native(temp.path(), "dir");
        fs.mkdir(&dir).await?;
        let err = fs
            .copy(&dir, &native(temp.path(), "copy"))
            .await
            .expect_err("directories are not copied");
        assert!(matches!(err, VfsError::IsDirectory { .. }));

        let absent = native(temp.path(), "absent");
        fs.copy(&absent, &absent).await?;
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlink_and_readlink_round_trip() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let fs = adapter(temp.path());
        let source = native(temp.path(), "source.txt");
        let link = native(temp.path(), "link.txt");
        fs.write_all(&source, Bytes::from_static(b"data")).await?;
        fs.symlink(&source, &link).await?;

        assert_eq!(fs.readlink(&link).await?, source);
        assert!(fs.lstat(&link).await?.is_symlink());
        assert_eq!(fs.stat(&link).await?.size, 4);
        Ok(())
    }

    #[tokio::test]
    async fn read_dir_lists_sorted_entries() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let fs = adapter(temp.path());
        let root = temp.path().to_string_lossy().into_owned();
        fs.write_all(&native(temp.path(), "b.txt"), Bytes::from_static(b"b"))
            .await?;
        fs.mkdir_all(&native(temp.path(), "a/nested")).await?;

        let names: Vec<String> = fs
            .read_dir(&root)
            .await?
            .into_iter()
            .map(|info| info.name)
            .collect();
        assert_eq!(names, vec!["a".to_string(), "b.txt".to_string()]);
        Ok(())
    }

    #[test]
    fn path_resolution_round_trips_through_mount() {
        let fs = OsFs::new("conn", "/srv/alice").with_mount_path("/vdir");
        assert_eq!(
            fs.resolve_path("/vdir/in/report.csv").ok().as_deref(),
            Some("/srv/alice/in/report.csv")
        );
        assert_eq!(fs.resolve_path("../../etc").ok().as_deref(), Some("/srv/alice/etc"));
        assert_eq!(fs.get_relative_path("/srv/alice/in/report.csv"), "/vdir/in/report.csv");
        assert_eq!(fs.get_relative_path("/srv/other"), "/vdir");
        assert_eq!(fs.storage_id(), "file:///srv/alice");
    }
}
