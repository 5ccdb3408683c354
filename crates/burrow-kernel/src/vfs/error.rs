//! VFS error types.

use std::io;
use thiserror::Error;

use crate::deny::DenyError;

/// VFS error type.
///
/// Jail rejections (embedded NUL, separator smuggling) surface as
/// [`VfsError::NotFound`] and root mutations as [`VfsError::InvalidOperation`],
/// so callers cannot tell a jail boundary apart from an ordinary miss.
#[derive(Debug, Error)]
pub enum VfsError {
    /// File or directory not found, or a name that cannot be resolved.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation not permitted on this target (e.g. the jail root).
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Creation refused by the deny policy.
    #[error("{action} {path}, action denied")]
    ActionDenied { action: &'static str, path: String },

    /// A deny pattern in the configuration is malformed.
    #[error("deny policy error: {0}")]
    Policy(#[from] DenyError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl VfsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an InvalidOperation error.
    pub fn invalid_operation(path: impl Into<String>) -> Self {
        Self::InvalidOperation(path.into())
    }

    /// Create an ActionDenied error.
    pub fn action_denied(action: &'static str, path: impl Into<String>) -> Self {
        Self::ActionDenied {
            action,
            path: path.into(),
        }
    }

    /// True for anything a client should see as "does not exist".
    pub fn is_not_found(&self) -> bool {
        match self {
            VfsError::NotFound(_) => true,
            VfsError::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Convert VfsError to std::io::Error for compatibility.
impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        match e {
            VfsError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            VfsError::InvalidOperation(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            denied @ VfsError::ActionDenied { .. } => {
                io::Error::new(io::ErrorKind::PermissionDenied, denied.to_string())
            }
            VfsError::Policy(e) => io::Error::other(e),
            VfsError::Io(e) => e,
        }
    }
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;
