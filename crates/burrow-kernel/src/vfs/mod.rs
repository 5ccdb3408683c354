//! Jailed virtual filesystem.
//!
//! - [`FileSystem`] - Name-based operations on behalf of an [`Identity`](crate::identity::Identity)
//! - [`JailedFs`] - Local filesystem confined to the configured base directory
//!
//! ## Design Decisions
//!
//! - **Lexical jail**: Names are cleaned as `/`-rooted paths before being
//!   joined to the jail base, so `..` clamps at the root. The filesystem is
//!   never consulted to decide containment.
//! - **One snapshot per call**: Each operation reads the live config once and
//!   uses it for resolution, deny checks and audit flags.

mod error;
mod jail;
mod ops;
pub mod path;
mod types;

pub use error::{VfsError, VfsResult};
pub use jail::JailedFs;
pub use ops::FileSystem;
pub use types::{DirEntry, FileAttr, FileType, OpenFlags};
