//! # burrow-kernel
//!
//! Access-control core for the burrow file server.
//!
//! Every request passes through the same pipeline:
//! - Credentials are checked against the live [`Config`] ([`credentials`])
//! - An [`Identity`] is attached to the request
//! - Names are resolved into the identity's jail by [`JailedFs`]
//! - Creation is checked against the deny globs ([`deny`])
//! - Successful operations are reported to an [`AuditSink`]
//!
//! The live config sits in a [`ConfigStore`] and can be reconciled against
//! an edited file at any time without disturbing requests in flight.

pub mod audit;
pub mod config;
pub mod credentials;
pub mod deny;
pub mod identity;
pub mod vfs;

pub use audit::{AuditEvent, AuditSink, OperationKind, TracingAudit};
pub use config::{Config, ConfigChange, ConfigError, ConfigFormat, ConfigStore, ConfigWatcherHandle, UserInfo};
pub use identity::Identity;
pub use vfs::{DirEntry, FileAttr, FileSystem, FileType, JailedFs, OpenFlags, VfsError, VfsResult};
