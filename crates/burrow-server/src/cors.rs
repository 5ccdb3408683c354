//! CORS response headers.

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, Method, header};
use axum::middleware::Next;
use axum::response::Response;
use burrow_kernel::config::CorsConfig;

use crate::state::AppState;

/// Whether `req` is a pre-flight for the configured origin.
pub fn is_preflight(method: &Method, headers: &HeaderMap, cors: &CorsConfig) -> bool {
    if method != Method::OPTIONS || !headers.contains_key(header::ACCESS_CONTROL_REQUEST_METHOD) {
        return false;
    }
    headers
        .get(header::ORIGIN)
        .and_then(|origin| origin.to_str().ok())
        .is_some_and(|origin| cors.allows(origin))
}

/// Add the CORS headers to every response when an origin is configured.
pub async fn cors_headers(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let config = state.store.current();
    let mut response = next.run(req).await;
    if !config.cors.enabled() {
        return response;
    }

    let headers = response.headers_mut();
    match HeaderValue::from_str(&config.cors.origin) {
        Ok(origin) => {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        }
        Err(e) => {
            tracing::warn!(origin = %config.cors.origin, error = %e, "cors origin is not a valid header value");
            return response;
        }
    }
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
    headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("*"));
    if config.cors.credentials {
        headers.insert(header::ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cors(origin: &str) -> CorsConfig {
        CorsConfig {
            origin: origin.to_string(),
            credentials: false,
        }
    }

    fn preflight_headers(origin: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ORIGIN, HeaderValue::from_str(origin).unwrap());
        headers.insert(header::ACCESS_CONTROL_REQUEST_METHOD, HeaderValue::from_static("PUT"));
        headers
    }

    #[test]
    fn test_preflight_matches_origin() {
        let headers = preflight_headers("https://app.example.com");
        assert!(is_preflight(&Method::OPTIONS, &headers, &cors("https://app.example.com")));
        assert!(is_preflight(&Method::OPTIONS, &headers, &cors("*")));
        assert!(!is_preflight(&Method::OPTIONS, &headers, &cors("https://other.example.com")));
        assert!(!is_preflight(&Method::OPTIONS, &headers, &cors("")));
        assert!(!is_preflight(&Method::GET, &headers, &cors("*")));
    }

    #[test]
    fn test_plain_options_is_not_preflight() {
        let mut headers = HeaderMap::new();
        headers.insert(header::ORIGIN, HeaderValue::from_static("https://app.example.com"));
        assert!(!is_preflight(&Method::OPTIONS, &headers, &cors("*")));
    }
}
