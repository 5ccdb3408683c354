//! Post-operation audit events.
//!
//! The jailed filesystem reports successful mutations (and opens) here when
//! the matching logging flag is on. Sinks only observe; they cannot fail the
//! operation.

use std::path::PathBuf;

/// Operation class, one per logging flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Create,
    Read,
    Update,
    Delete,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Read => "read",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        }
    }
}

/// A successful filesystem operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditEvent {
    /// A directory was created.
    DirectoryCreated { path: PathBuf, user: String },
    /// A file was opened (with any access mode).
    FileOpened { path: PathBuf, user: String },
    /// A file or directory tree was removed.
    Removed { path: PathBuf, user: String },
    /// A file or directory was renamed.
    Renamed {
        old_path: PathBuf,
        new_path: PathBuf,
        user: String,
    },
}

impl AuditEvent {
    pub fn kind(&self) -> OperationKind {
        match self {
            AuditEvent::DirectoryCreated { .. } => OperationKind::Create,
            AuditEvent::FileOpened { .. } => OperationKind::Read,
            AuditEvent::Removed { .. } => OperationKind::Delete,
            AuditEvent::Renamed { .. } => OperationKind::Update,
        }
    }

    pub fn user(&self) -> &str {
        match self {
            AuditEvent::DirectoryCreated { user, .. }
            | AuditEvent::FileOpened { user, .. }
            | AuditEvent::Removed { user, .. }
            | AuditEvent::Renamed { user, .. } => user,
        }
    }
}

/// Receiver of audit events.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent);
}

/// Default sink: one `info` event per operation with structured fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAudit;

impl AuditSink for TracingAudit {
    fn record(&self, event: &AuditEvent) {
        let op = event.kind().as_str();
        let user = event.user();
        match event {
            AuditEvent::DirectoryCreated { path, .. } => {
                tracing::info!(op, path = %path.display(), user, "Created directory");
            }
            AuditEvent::FileOpened { path, .. } => {
                tracing::info!(op, path = %path.display(), user, "Opened file");
            }
            AuditEvent::Removed { path, .. } => {
                tracing::info!(op, path = %path.display(), user, "Deleted file or directory");
            }
            AuditEvent::Renamed { old_path, new_path, .. } => {
                tracing::info!(
                    op,
                    old_path = %old_path.display(),
                    new_path = %new_path.display(),
                    user,
                    "Renamed file or directory"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_matches_flag() {
        let user = String::from("alice");
        let path = PathBuf::from("/tmp/a");
        let events = [
            (
                AuditEvent::DirectoryCreated { path: path.clone(), user: user.clone() },
                OperationKind::Create,
            ),
            (
                AuditEvent::FileOpened { path: path.clone(), user: user.clone() },
                OperationKind::Read,
            ),
            (
                AuditEvent::Removed { path: path.clone(), user: user.clone() },
                OperationKind::Delete,
            ),
            (
                AuditEvent::Renamed {
                    old_path: path.clone(),
                    new_path: path.join("b"),
                    user: user.clone(),
                },
                OperationKind::Update,
            ),
        ];
        for (event, kind) in events {
            assert_eq!(event.kind(), kind);
            assert_eq!(event.user(), "alice");
            assert!(!event.kind().as_str().is_empty());
        }
    }
}
