//! CORS 预检路由
//!
//! `OPTIONS /{*path}` 由本处理器完全控制响应头，不经过引擎的 CORS 层。

use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CONTENT_TYPE, ORIGIN,
};
use http::{HeaderMap, HeaderValue, StatusCode};

use crate::engine::Route;

pub const ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
pub const ALLOW_HEADERS: &str = "Content-Type, Authorization";

/// `"*"` in the allow-list matches any origin.
pub fn origin_allowed(origins: &[String], origin: &str) -> bool {
    origins.iter().any(|allowed| allowed == "*" || allowed == origin)
}

pub fn preflight_route(origins: Vec<String>) -> Route {
    let origins: Arc<[String]> = origins.into();
    Route::options("/{*path}", move |headers: HeaderMap| {
        let origins = origins.clone();
        async move { preflight_response(&origins, &headers) }
    })
    .without_auth()
    .cors(false)
}

fn preflight_response(origins: &[String], headers: &HeaderMap) -> Response {
    let mut response = (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/plain; charset=utf-8")],
        "success",
    )
        .into_response();

    let out = response.headers_mut();
    // Echo the literal origin, never `*`.
    if let Some(origin) = headers
        .get(ORIGIN)
        .filter(|o| o.to_str().is_ok_and(|o| !o.is_empty() && origin_allowed(origins, o)))
    {
        out.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
    }
    out.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    out.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origins(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn with_origin(origin: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ORIGIN, HeaderValue::from_str(origin).unwrap());
        headers
    }

    #[test]
    fn test_origin_matching() {
        assert!(origin_allowed(&origins(&["https://a.com"]), "https://a.com"));
        assert!(!origin_allowed(&origins(&["https://a.com"]), "https://b.com"));
        assert!(origin_allowed(&origins(&["*"]), "https://b.com"));
        assert!(!origin_allowed(&[], "https://b.com"));
    }

    #[test]
    fn test_wildcard_echoes_literal_origin() {
        let response = preflight_response(&origins(&["*"]), &with_origin("https://x.io"));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://x.io"
        );
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_METHODS], ALLOW_METHODS);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_HEADERS], ALLOW_HEADERS);
    }

    #[test]
    fn test_missing_origin_still_succeeds() {
        let response = preflight_response(&origins(&["*"]), &HeaderMap::new());
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_METHODS], ALLOW_METHODS);
    }
}
