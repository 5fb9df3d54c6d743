//! Storage adapters for the distribution engine.
//!
//! Every backend implements the [`Fs`] contract so the pipeline can stat,
//! copy, link and remove files without knowing what sits underneath. Two
//! adapters ship here: [`OsFs`] over the local filesystem and [`ObjectFs`],
//! which emulates a hierarchical filesystem on a flat object store.
#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::multiple_crate_versions)]

pub mod error;
pub mod fs;
pub mod handle;
pub mod info;
pub mod object;
pub mod osfs;
pub mod path;
pub mod registry;
pub mod storage;

pub use error::{VfsError, VfsResult};
pub use fs::{CreateFlags, Fs};
pub use handle::{Opened, ReadHandle, ReleaseGuard, WriteHandle};
pub use info::{FileInfo, FileKind};
pub use object::{
    MemoryConnector, MemoryObjectStore, MetadataDirective, ObjectFs, ObjectStore,
    ObjectStoreConnector, OssClient, OssConnector,
};
pub use osfs::OsFs;
pub use registry::StorageRegistry;
pub use storage::{
    ObjectStorageConfig, ObjectStorageDefaults, ProviderKind, StorageConfig, StorageIdentity,
};
