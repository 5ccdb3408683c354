//! Server error types and handling

use std::io;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use burrow_kernel::VfsError;

/// Server result type
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors answered to a client.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Vfs(#[from] VfsError),

    /// Request path does not start with the configured prefix.
    #[error("path outside of prefix: {0}")]
    OutsidePrefix(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// Parent collection missing for PUT, MKCOL or MOVE.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    /// `Overwrite: F` and the destination exists.
    #[error("destination exists: {0}")]
    DestinationExists(String),

    #[error("method not allowed")]
    MethodNotAllowed,

    /// A request got past the authentication gate without an identity.
    #[error("request has no identity")]
    MissingIdentity,
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Vfs(e) => vfs_status(e),
            ServerError::OutsidePrefix(_) => StatusCode::NOT_FOUND,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Conflict(_) => StatusCode::CONFLICT,
            ServerError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServerError::DestinationExists(_) => StatusCode::PRECONDITION_FAILED,
            ServerError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ServerError::MissingIdentity => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn vfs_status(e: &VfsError) -> StatusCode {
    match e {
        VfsError::NotFound(_) => StatusCode::NOT_FOUND,
        VfsError::InvalidOperation(_) => StatusCode::BAD_REQUEST,
        VfsError::ActionDenied { .. } => StatusCode::FORBIDDEN,
        VfsError::Policy(_) => StatusCode::INTERNAL_SERVER_ERROR,
        VfsError::Io(e) => match e.kind() {
            io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
            io::ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
            io::ErrorKind::AlreadyExists => StatusCode::METHOD_NOT_ALLOWED,
            io::ErrorKind::IsADirectory | io::ErrorKind::NotADirectory => StatusCode::CONFLICT,
            io::ErrorKind::DirectoryNotEmpty => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Only the status line goes back; messages can carry physical paths.
        let body = status.canonical_reason().unwrap_or("Error");
        (status, body).into_response()
    }
}

/// Errors that stop the server from starting.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("can't bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("can't load TLS material from {path}: {source}")]
    TlsMaterial {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid TLS configuration: {0}")]
    Tls(#[from] rustls::Error),

    #[error("server error: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vfs_status_mapping() {
        assert_eq!(ServerError::from(VfsError::not_found("x")).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ServerError::from(VfsError::invalid_operation("")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServerError::from(VfsError::action_denied("mkdir", ".git")).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServerError::from(VfsError::Io(io::Error::from(io::ErrorKind::NotFound))).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServerError::from(VfsError::Io(io::Error::other("disk on fire"))).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_response_hides_message() {
        let response = ServerError::Forbidden("/srv/secret/path".into()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
