//! Jailed filesystem.
//!
//! Every logical name is resolved against the caller's jail base (the base
//! directory, or the user's subdir below it) using lexical cleaning only.
//! Each call reads one config snapshot up front and uses it throughout, so a
//! reload in the middle of a request never mixes two configs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;

use super::error::{VfsError, VfsResult};
use super::ops::FileSystem;
use super::path::{base_name, clean_logical, join_clean};
use super::types::{DirEntry, FileAttr, OpenFlags};
use crate::audit::{AuditEvent, AuditSink, TracingAudit};
use crate::config::{Config, ConfigStore};
use crate::deny;
use crate::identity::Identity;

/// Filesystem rooted at the configured base directory, confined per identity.
pub struct JailedFs {
    store: Arc<ConfigStore>,
    audit: Arc<dyn AuditSink>,
}

impl JailedFs {
    /// Jailed filesystem reporting audit events through `tracing`.
    pub fn new(store: Arc<ConfigStore>) -> Self {
        Self::with_audit(store, Arc::new(TracingAudit))
    }

    pub fn with_audit(store: Arc<ConfigStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    /// Physical path for `name` under `config`.
    fn resolve_in(config: &Config, identity: &Identity, name: &str) -> VfsResult<PathBuf> {
        if name.contains('\0') {
            return Err(VfsError::not_found(name.replace('\0', "\\0")));
        }
        if std::path::MAIN_SEPARATOR != '/' && name.contains(std::path::MAIN_SEPARATOR) {
            return Err(VfsError::not_found(name));
        }

        let Some(base) = config.jail_base(identity) else {
            tracing::warn!(user = identity.display_name(), name, "user is no longer configured");
            return Err(VfsError::not_found(name));
        };
        Ok(join_clean(&base, &clean_logical(name)))
    }

    fn is_jail_root(config: &Config, identity: &Identity, path: &Path) -> bool {
        config.jail_base(identity).is_some_and(|base| path == base)
    }
}

#[async_trait]
impl FileSystem for JailedFs {
    async fn resolve(&self, identity: &Identity, name: &str) -> VfsResult<PathBuf> {
        Self::resolve_in(&self.store.current(), identity, name)
    }

    async fn mkdir(&self, identity: &Identity, name: &str, perm: u32) -> VfsResult<()> {
        let config = self.store.current();
        let path = Self::resolve_in(&config, identity, name)?;

        if deny::matches(&config.deny.create.directory, &base_name(&path))? {
            tracing::debug!(name, user = identity.display_name(), "directory creation denied");
            return Err(VfsError::action_denied("mkdir", name));
        }

        let mut builder = fs::DirBuilder::new();
        #[cfg(unix)]
        builder.mode(perm);
        #[cfg(not(unix))]
        let _ = perm;
        builder.create(&path).await?;

        if config.log.create {
            self.audit.record(&AuditEvent::DirectoryCreated {
                path,
                user: identity.display_name().to_string(),
            });
        }
        Ok(())
    }

    async fn open_file(
        &self,
        identity: &Identity,
        name: &str,
        flags: OpenFlags,
        perm: u32,
    ) -> VfsResult<fs::File> {
        let config = self.store.current();
        let path = Self::resolve_in(&config, identity, name)?;

        if flags.creates() && deny::matches(&config.deny.create.file, &base_name(&path))? {
            tracing::debug!(name, user = identity.display_name(), "file creation denied");
            return Err(VfsError::action_denied("create", name));
        }

        let file = flags.to_open_options(perm).open(&path).await?;

        if config.log.read {
            self.audit.record(&AuditEvent::FileOpened {
                path,
                user: identity.display_name().to_string(),
            });
        }
        Ok(file)
    }

    async fn remove_all(&self, identity: &Identity, name: &str) -> VfsResult<()> {
        let config = self.store.current();
        let path = Self::resolve_in(&config, identity, name)?;
        if Self::is_jail_root(&config, identity, &path) {
            return Err(VfsError::invalid_operation(name));
        }

        let meta = match fs::symlink_metadata(&path).await {
            Ok(meta) => Some(meta),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        match meta {
            Some(meta) if meta.is_dir() => fs::remove_dir_all(&path).await?,
            Some(_) => fs::remove_file(&path).await?,
            // Nothing there is already the requested end state.
            None => {}
        }

        if config.log.delete {
            self.audit.record(&AuditEvent::Removed {
                path,
                user: identity.display_name().to_string(),
            });
        }
        Ok(())
    }

    async fn rename(&self, identity: &Identity, from: &str, to: &str) -> VfsResult<()> {
        let config = self.store.current();
        let old_path = Self::resolve_in(&config, identity, from)?;
        let new_path = Self::resolve_in(&config, identity, to)?;
        if Self::is_jail_root(&config, identity, &old_path) || Self::is_jail_root(&config, identity, &new_path) {
            return Err(VfsError::invalid_operation(format!("{from} -> {to}")));
        }

        fs::rename(&old_path, &new_path).await?;

        if config.log.update {
            self.audit.record(&AuditEvent::Renamed {
                old_path,
                new_path,
                user: identity.display_name().to_string(),
            });
        }
        Ok(())
    }

    async fn stat(&self, identity: &Identity, name: &str) -> VfsResult<FileAttr> {
        let path = self.resolve(identity, name).await?;
        let meta = fs::metadata(&path).await?;
        Ok(FileAttr::from(&meta))
    }

    async fn read_dir(&self, identity: &Identity, name: &str) -> VfsResult<Vec<DirEntry>> {
        let path = self.resolve(identity, name).await?;
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&path).await?;

        while let Some(entry) = dir.next_entry().await? {
            let file_type = entry.file_type().await?;
            entries.push(DirEntry::from_std(
                entry.file_name().to_string_lossy().into_owned(),
                file_type,
            ));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}
