#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use http::Method;
use launchpad::logging::LogEntry;
use launchpad::{PartialConfig, Server, Transport};
use parking_lot::Mutex;
use tempfile::TempDir;

pub const SECRET: &str = "6ba6161c-62e9-4cd7-9f6e-c6f6bf88557d";

/// Transport that keeps every message in memory.
#[derive(Debug, Clone, Default)]
pub struct CaptureTransport {
    lines: Arc<Mutex<Vec<String>>>,
}

impl CaptureTransport {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

impl Transport for CaptureTransport {
    fn name(&self) -> &str {
        "capture"
    }

    fn write(&self, entry: &LogEntry) -> std::io::Result<()> {
        self.lines.lock().push(entry.message.clone());
        Ok(())
    }
}

/// Test-mode options writing log files into `dir`, console disabled.
pub fn test_options(dir: &Path) -> PartialConfig {
    PartialConfig {
        log_directory: Some(dir.to_path_buf()),
        log_default_console_transport: Some(false),
        test_mode: Some(true),
        ..Default::default()
    }
}

/// Configure and start a test-mode server. Keep the returned directory alive
/// as long as the server.
pub async fn ready(options: impl FnOnce(PartialConfig) -> PartialConfig) -> (Server, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let mut server = Server::new(options(test_options(dir.path())));
    server.configure().await.expect("configure failed");
    server.start_server().await.expect("start failed");
    (server, dir)
}

pub fn request(method: Method, path: &str) -> http::Request<Body> {
    http::Request::builder()
        .method(method)
        .uri(path)
        .body(Body::empty())
        .expect("Failed to build request")
}

pub fn get(path: &str) -> http::Request<Body> {
    request(Method::GET, path)
}

pub fn options_with_origin(path: &str, origin: &str) -> http::Request<Body> {
    http::Request::builder()
        .method(Method::OPTIONS)
        .uri(path)
        .header(http::header::ORIGIN, origin)
        .body(Body::empty())
        .expect("Failed to build request")
}

pub fn get_with_token(path: &str, token: &str) -> http::Request<Body> {
    http::Request::builder()
        .uri(path)
        .header(http::header::AUTHORIZATION, token)
        .body(Body::empty())
        .expect("Failed to build request")
}

pub fn sign(claims: &serde_json::Value) -> String {
    jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
        claims,
        &jsonwebtoken::EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("Failed to sign token")
}
