//! Filesystem operations trait.

use async_trait::async_trait;
use std::path::PathBuf;

use super::VfsResult;
use super::types::{DirEntry, FileAttr, OpenFlags};
use crate::identity::Identity;

/// Name-based filesystem operations on behalf of an identity.
///
/// Names are logical, `/`-separated and relative to the identity's jail
/// base; implementations map them to physical paths. Errors for names that
/// cannot be mapped look like ordinary misses.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Map a logical name to its physical path.
    async fn resolve(&self, identity: &Identity, name: &str) -> VfsResult<PathBuf>;

    /// Create a single directory.
    async fn mkdir(&self, identity: &Identity, name: &str, perm: u32) -> VfsResult<()>;

    /// Open (and maybe create) a file.
    async fn open_file(
        &self,
        identity: &Identity,
        name: &str,
        flags: OpenFlags,
        perm: u32,
    ) -> VfsResult<tokio::fs::File>;

    /// Remove a file or a directory tree.
    async fn remove_all(&self, identity: &Identity, name: &str) -> VfsResult<()>;

    /// Rename a file or directory.
    async fn rename(&self, identity: &Identity, from: &str, to: &str) -> VfsResult<()>;

    /// Get attributes, following symlinks.
    async fn stat(&self, identity: &Identity, name: &str) -> VfsResult<FileAttr>;

    /// List a directory.
    async fn read_dir(&self, identity: &Identity, name: &str) -> VfsResult<Vec<DirEntry>>;
}
