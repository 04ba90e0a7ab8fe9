//! JSON 路由清单
//!
//! 每个 `.json` 文件是一个路由数组，每条路由返回固定响应：
//!
//! ```json
//! [
//!   { "method": "GET", "path": "/extfile/test", "auth": false, "body": "This is a test." },
//!   { "method": "POST", "path": "/echo", "status": 201, "body": { "ok": true } }
//! ]
//! ```
//!
//! | 字段 | 默认 | 说明 |
//! |------|------|------|
//! | auth | 继承默认策略 | `false` 关闭认证 |
//! | status | 200 | 响应状态码 |
//! | body | - | 字符串按文本返回，其余按 JSON 返回 |
//! | content_type | 按 body 推断 | 覆盖 Content-Type |

use std::fs;
use std::path::Path;
use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use super::loader::ModuleLoader;
use crate::core::{Result, ServerError};
use crate::engine::Route;

#[derive(Debug, Clone, Deserialize)]
pub struct RouteDefinition {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub auth: Option<bool>,
    #[serde(default)]
    pub status: Option<u16>,
    pub body: Value,
    #[serde(default)]
    pub content_type: Option<String>,
}

#[derive(Debug)]
struct StaticResponse {
    status: StatusCode,
    content_type: HeaderValue,
    body: String,
}

impl StaticResponse {
    fn render(&self) -> Response {
        (
            self.status,
            [(CONTENT_TYPE, self.content_type.clone())],
            self.body.clone(),
        )
            .into_response()
    }
}

impl RouteDefinition {
    fn into_route(self, file: &str) -> Result<Route> {
        let invalid = |reason: String| ServerError::RouteModule {
            file: file.to_string(),
            reason,
        };

        let method = Method::from_bytes(self.method.to_ascii_uppercase().as_bytes())
            .map_err(|e| invalid(format!("{}: {e}", self.method)))?;
        let status = StatusCode::from_u16(self.status.unwrap_or(200))
            .map_err(|e| invalid(e.to_string()))?;

        let (body, default_type) = match self.body {
            Value::String(text) => (text, "text/plain; charset=utf-8"),
            other => (other.to_string(), "application/json"),
        };
        let content_type = match self.content_type {
            Some(ct) => HeaderValue::from_str(&ct).map_err(|e| invalid(e.to_string()))?,
            None => HeaderValue::from_static(default_type),
        };

        let response = Arc::new(StaticResponse {
            status,
            content_type,
            body,
        });
        let route = Route::new(method, self.path, move || {
            let response = response.clone();
            async move { response.render() }
        })?;

        Ok(match self.auth {
            Some(false) => route.without_auth(),
            _ => route,
        })
    }
}

/// Loader for `.json` route manifests.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRouteLoader;

impl ModuleLoader for JsonRouteLoader {
    fn suffix(&self) -> &str {
        ".json"
    }

    fn load(&self, path: &Path) -> Result<Vec<Route>> {
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let text = fs::read_to_string(path).map_err(|e| ServerError::RouteModule {
            file: file.clone(),
            reason: e.to_string(),
        })?;
        let definitions: Vec<RouteDefinition> =
            serde_json::from_str(&text).map_err(|e| ServerError::RouteModule {
                file: file.clone(),
                reason: e.to_string(),
            })?;

        definitions
            .into_iter()
            .map(|definition| definition.into_route(&file))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RouteAuth;

    fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_manifest_becomes_routes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "routes.json",
            r#"[
                { "method": "get", "path": "/extfile/test", "auth": false, "body": "This is a test." },
                { "method": "POST", "path": "/items", "status": 201, "body": { "ok": true } }
            ]"#,
        );

        let routes = JsonRouteLoader.load(&path).unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].method(), &Method::GET);
        assert_eq!(routes[0].path(), "/extfile/test");
        assert_eq!(routes[0].route_options().auth, RouteAuth::Disabled);
        assert_eq!(routes[1].method(), &Method::POST);
        assert_eq!(routes[1].route_options().auth, RouteAuth::Default);
    }

    #[test]
    fn test_invalid_manifest_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "broken.json", "{ not json");

        match JsonRouteLoader.load(&path).unwrap_err() {
            ServerError::RouteModule { file, .. } => assert_eq!(file, "broken.json"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_status_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "status.json",
            r#"[{ "method": "GET", "path": "/x", "status": 42, "body": "" }]"#,
        );
        assert!(matches!(
            JsonRouteLoader.load(&path),
            Err(ServerError::RouteModule { .. })
        ));
    }
}
