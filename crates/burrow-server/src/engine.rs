//! File-method engine.
//!
//! Maps a small set of HTTP methods onto the jailed filesystem:
//!
//! | Method    | Effect                                   | Success       |
//! |-----------|------------------------------------------|---------------|
//! | `GET`     | file contents, or a listing for a dir    | 200           |
//! | `HEAD`    | as `GET` without a body                  | 200           |
//! | `PUT`     | create or replace a file                 | 201 / 204     |
//! | `DELETE`  | remove a file or directory tree          | 204           |
//! | `MKCOL`   | create one directory                     | 201           |
//! | `MOVE`    | rename to the `Destination` header       | 201 / 204     |
//! | `OPTIONS` | `Allow` header                           | 200           |
//!
//! Anything else is `405`.

use std::io;
use std::pin::pin;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use burrow_kernel::config::LogConfig;
use burrow_kernel::{FileSystem, Identity, OpenFlags, OperationKind, VfsError};
use futures::TryStreamExt;
use percent_encoding::percent_decode_str;
use tokio::io::AsyncWriteExt;
use tokio_util::io::{ReaderStream, StreamReader};

use crate::auth::RequestIdentity;
use crate::constants::{ALLOWED_METHODS, DIR_PERM, FILE_PERM};
use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

/// Handler for every request that made it past the authentication gate.
pub async fn dispatch(
    State(state): State<AppState>,
    RequestIdentity(identity): RequestIdentity,
    req: Request,
) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match serve(&state, &identity, req).await {
        Ok(response) => response,
        Err(e) => {
            if error_logged(&state.store.current().log, &method) {
                tracing::error!(
                    method = %method,
                    path = %path,
                    user = identity.display_name(),
                    error = %e,
                    "Request failed"
                );
            }
            e.into_response()
        }
    }
}

/// The logging switch a method's failures fall under, if any.
fn operation_kind(method: &Method) -> Option<OperationKind> {
    match method.as_str() {
        "GET" | "HEAD" => Some(OperationKind::Read),
        "PUT" | "MKCOL" => Some(OperationKind::Create),
        "MOVE" => Some(OperationKind::Update),
        "DELETE" => Some(OperationKind::Delete),
        _ => None,
    }
}

/// Failures are logged only when both `log.error` and the method's own
/// switch are on.
fn error_logged(log: &LogConfig, method: &Method) -> bool {
    log.error && operation_kind(method).is_some_and(|kind| log.enabled(kind))
}

async fn serve(state: &AppState, identity: &Identity, req: Request) -> ServerResult<Response> {
    let prefix = state.store.current().prefix.clone();
    let name = logical_name(&prefix, req.uri().path())?;
    let fs = state.fs.as_ref();

    match req.method().as_str() {
        "GET" => get(fs, identity, &name, true).await,
        "HEAD" => get(fs, identity, &name, false).await,
        "PUT" => put(fs, identity, &name, req.into_body()).await,
        "DELETE" => delete(fs, identity, &name).await,
        "MKCOL" => mkcol(fs, identity, &name).await,
        "MOVE" => {
            let destination = destination_name(&prefix, req.headers())?;
            let overwrite = overwrite_allowed(req.headers())?;
            move_to(fs, identity, &name, &destination, overwrite).await
        }
        "OPTIONS" => Ok(([(header::ALLOW, ALLOWED_METHODS)], StatusCode::OK).into_response()),
        _ => Err(ServerError::MethodNotAllowed),
    }
}

/// Logical name for a request path: percent-decoded, with `prefix` removed.
pub fn logical_name(prefix: &str, raw_path: &str) -> ServerResult<String> {
    let decoded = percent_decode_str(raw_path)
        .decode_utf8()
        .map_err(|_| ServerError::BadRequest("path is not valid UTF-8".into()))?;

    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return Ok(decoded.into_owned());
    }
    match decoded.strip_prefix(prefix) {
        Some("") => Ok("/".to_string()),
        Some(rest) if rest.starts_with('/') => Ok(rest.to_string()),
        _ => Err(ServerError::OutsidePrefix(decoded.into_owned())),
    }
}

fn destination_name(prefix: &str, headers: &HeaderMap) -> ServerResult<String> {
    let raw = headers
        .get("destination")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ServerError::BadRequest("missing Destination header".into()))?;

    let uri: Uri = raw
        .parse()
        .map_err(|_| ServerError::BadRequest(format!("malformed Destination {raw:?}")))?;
    logical_name(prefix, uri.path())
}

fn overwrite_allowed(headers: &HeaderMap) -> ServerResult<bool> {
    match headers.get("overwrite").map(HeaderValue::as_bytes) {
        None | Some(b"T") | Some(b"t") => Ok(true),
        Some(b"F") | Some(b"f") => Ok(false),
        Some(_) => Err(ServerError::BadRequest("Overwrite must be T or F".into())),
    }
}

async fn exists(fs: &dyn FileSystem, identity: &Identity, name: &str) -> ServerResult<bool> {
    match fs.stat(identity, name).await {
        Ok(_) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Parent collection missing shows up as not-found from the filesystem.
fn missing_parent(e: VfsError, name: &str) -> ServerError {
    if e.is_not_found() {
        ServerError::Conflict(name.to_string())
    } else {
        e.into()
    }
}

async fn get(fs: &dyn FileSystem, identity: &Identity, name: &str, with_body: bool) -> ServerResult<Response> {
    let attr = fs.stat(identity, name).await?;

    if attr.is_dir() {
        let mut listing = String::new();
        for entry in fs.read_dir(identity, name).await? {
            listing.push_str(&entry.name);
            if entry.kind.is_dir() {
                listing.push('/');
            }
            listing.push('\n');
        }
        let len = listing.len();
        let body = if with_body { Body::from(listing) } else { Body::empty() };
        return Ok((
            [
                (header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8")),
                (header::CONTENT_LENGTH, HeaderValue::from(len)),
            ],
            body,
        )
            .into_response());
    }

    let body = if with_body {
        let file = fs.open_file(identity, name, OpenFlags::read(), 0).await?;
        Body::from_stream(ReaderStream::new(file))
    } else {
        Body::empty()
    };
    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/octet-stream")),
            (header::CONTENT_LENGTH, HeaderValue::from(attr.size)),
        ],
        body,
    )
        .into_response())
}

async fn put(fs: &dyn FileSystem, identity: &Identity, name: &str, body: Body) -> ServerResult<Response> {
    let existed = exists(fs, identity, name).await?;

    let mut file = fs
        .open_file(identity, name, OpenFlags::create_truncate(), FILE_PERM)
        .await
        .map_err(|e| missing_parent(e, name))?;

    let reader = StreamReader::new(body.into_data_stream().map_err(io::Error::other));
    let mut reader = pin!(reader);
    tokio::io::copy(&mut reader, &mut file).await.map_err(VfsError::from)?;
    file.flush().await.map_err(VfsError::from)?;

    Ok(if existed { StatusCode::NO_CONTENT } else { StatusCode::CREATED }.into_response())
}

async fn delete(fs: &dyn FileSystem, identity: &Identity, name: &str) -> ServerResult<Response> {
    if !exists(fs, identity, name).await? {
        return Err(VfsError::not_found(name).into());
    }
    fs.remove_all(identity, name).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn mkcol(fs: &dyn FileSystem, identity: &Identity, name: &str) -> ServerResult<Response> {
    fs.mkdir(identity, name, DIR_PERM)
        .await
        .map_err(|e| missing_parent(e, name))?;
    Ok(StatusCode::CREATED.into_response())
}

async fn move_to(
    fs: &dyn FileSystem,
    identity: &Identity,
    from: &str,
    to: &str,
    overwrite: bool,
) -> ServerResult<Response> {
    if fs.resolve(identity, from).await? == fs.resolve(identity, to).await? {
        return Err(ServerError::Forbidden("source and destination are the same".into()));
    }
    if !exists(fs, identity, from).await? {
        return Err(VfsError::not_found(from).into());
    }

    let replaced = exists(fs, identity, to).await?;
    if replaced {
        if !overwrite {
            return Err(ServerError::DestinationExists(to.to_string()));
        }
        fs.remove_all(identity, to).await?;
    }

    fs.rename(identity, from, to)
        .await
        .map_err(|e| missing_parent(e, to))?;

    Ok(if replaced { StatusCode::NO_CONTENT } else { StatusCode::CREATED }.into_response())
}
