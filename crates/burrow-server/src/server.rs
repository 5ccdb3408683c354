//! Router assembly and listeners.

use std::fs::File;
use std::future::Future;
use std::io::{self, BufReader, Seek};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::extract::ConnectInfo;
use axum::middleware::from_fn_with_state;
use burrow_kernel::config::TlsConfig;
use hyper_util::rt::{TokioExecutor, TokioIo};
use rustls::{Certificate, PrivateKey, ServerConfig};
use rustls_pemfile::{certs, pkcs8_private_keys, rsa_private_keys};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::error::StartupError;
use crate::state::AppState;
use crate::{auth, cors, engine};

/// Build the full application: engine behind the auth gate, CORS headers,
/// request tracing, and panic recovery outermost.
pub fn router(state: AppState) -> Router {
    Router::new()
        .fallback(engine::dispatch)
        .layer(from_fn_with_state(state.clone(), auth::auth_gate))
        .layer(from_fn_with_state(state.clone(), cors::cors_headers))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .with_state(state)
}

/// Serve until `shutdown` resolves, over TLS when the config has it.
pub async fn run<F>(state: AppState, shutdown: F) -> Result<(), StartupError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let config = state.store.current();
    let addr = config.bind_addr();
    let app = router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| StartupError::Bind {
            addr: addr.clone(),
            source,
        })?;

    match &config.tls {
        Some(tls) => {
            let acceptor = TlsAcceptor::from(Arc::new(build_tls_config(tls)?));
            tracing::info!(address = %addr, prefix = %config.prefix, "Server is starting and listening (https)");
            serve_tls(listener, acceptor, app, shutdown).await
        }
        None => {
            tracing::info!(address = %addr, prefix = %config.prefix, "Server is starting and listening (http)");
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(shutdown)
                .await?;
            Ok(())
        }
    }
}

async fn serve_tls<F>(listener: TcpListener, acceptor: TlsAcceptor, app: Router, shutdown: F) -> Result<(), StartupError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let mut shutdown = std::pin::pin!(shutdown);

    loop {
        let (stream, remote) = tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    continue;
                }
            },
        };

        let acceptor = acceptor.clone();
        let app = app.clone();
        tokio::spawn(async move {
            let stream = match acceptor.accept(stream).await {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::debug!(remote = %remote, error = %e, "TLS handshake failed");
                    return;
                }
            };

            let service = hyper::service::service_fn(move |mut req: hyper::Request<hyper::body::Incoming>| {
                req.extensions_mut().insert(ConnectInfo(remote));
                app.clone().oneshot(req)
            });

            if let Err(e) = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                tracing::debug!(remote = %remote, error = %e, "connection closed with error");
            }
        });
    }

    tracing::info!("Server stopped accepting connections");
    Ok(())
}

fn build_tls_config(tls: &TlsConfig) -> Result<ServerConfig, StartupError> {
    let certs = load_certs(&tls.cert_file).map_err(|source| StartupError::TlsMaterial {
        path: tls.cert_file.display().to_string(),
        source,
    })?;
    let key = load_key(&tls.key_file).map_err(|source| StartupError::TlsMaterial {
        path: tls.key_file.display().to_string(),
        source,
    })?;

    let mut config = ServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
    Ok(config)
}

fn load_certs(path: &Path) -> io::Result<Vec<Certificate>> {
    let mut reader = BufReader::new(File::open(path)?);
    let certs: Vec<Certificate> = certs(&mut reader)?.into_iter().map(Certificate).collect();
    if certs.is_empty() {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "no certificates found"));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> io::Result<PrivateKey> {
    let mut reader = BufReader::new(File::open(path)?);
    if let Some(key) = pkcs8_private_keys(&mut reader)?.pop() {
        return Ok(PrivateKey(key));
    }
    reader.rewind()?;
    rsa_private_keys(&mut reader)?
        .pop()
        .map(PrivateKey)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "no private key found"))
}
