//! Authentication gate
//!
//! Runs before the file engine on every request. The outcome is either an
//! [`Identity`] attached to the request extensions or a `401` that never
//! reaches the filesystem.

use std::net::SocketAddr;

use axum::async_trait;
use axum::extract::{ConnectInfo, FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use burrow_kernel::{Identity, credentials};

use crate::cors::is_preflight;
use crate::error::ServerError;
use crate::state::AppState;

/// Username and password from a `Basic` authorization header.
#[derive(PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl BasicCredentials {
    /// Parse the `Authorization` header. Anything malformed is `None`.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
        let (scheme, encoded) = value.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }
        let decoded = STANDARD.decode(encoded.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, password) = decoded.split_once(':')?;
        Some(Self {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

/// Authentication middleware
pub async fn auth_gate(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let config = state.store.current();

    if is_preflight(req.method(), req.headers(), &config.cors) {
        return StatusCode::NO_CONTENT.into_response();
    }

    let remote = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    if !config.authentication_needed(remote.map(|addr| addr.ip())) {
        req.extensions_mut().insert(Identity::anonymous());
        return next.run(req).await;
    }

    let Some(creds) = BasicCredentials::from_headers(req.headers()) else {
        return unauthorized(&config.realm);
    };
    let address = remote.map(|addr| addr.to_string()).unwrap_or_default();

    // Hashing is CPU-bound; verify on the blocking pool. Unknown users pay
    // the same cost so response time doesn't reveal which names exist.
    let stored = config.users.get(&creds.username).map(|user| user.password.clone());
    let known = stored.is_some();
    let password = creds.password.clone();
    let verified = tokio::task::spawn_blocking(move || match stored {
        Some(hash) => credentials::verify(&hash, password.as_bytes()),
        None => credentials::verify_absent(password.as_bytes()),
    })
    .await
    .unwrap_or(false);

    if !known {
        tracing::warn!(user = %creds.username, address = %address, "User not found");
        return unauthorized(&config.realm);
    }
    if !verified {
        tracing::info!(user = %creds.username, address = %address, "Invalid password");
        return unauthorized(&config.realm);
    }

    tracing::debug!(user = %creds.username, address = %address, "Authenticated");
    req.extensions_mut().insert(Identity::authenticated(creds.username));
    next.run(req).await
}

fn unauthorized(realm: &str) -> Response {
    let challenge = HeaderValue::from_str(&format!("Basic realm=\"{}\"", realm.replace('"', "'")))
        .unwrap_or_else(|_| HeaderValue::from_static("Basic"));
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, challenge)],
        "Unauthorized",
    )
        .into_response()
}

/// The identity the authentication gate attached to this request.
///
/// Missing identity is a wiring bug and answers `500`; it is never
/// treated as anonymous.
#[derive(Debug, Clone)]
pub struct RequestIdentity(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for RequestIdentity
where
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(RequestIdentity)
            .ok_or(ServerError::MissingIdentity)
    }
}
