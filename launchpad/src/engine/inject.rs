use axum::body::Bytes;
use http::{HeaderMap, StatusCode};
use serde_json::Value;

/// Fully buffered response from [`ServerCore::inject`](super::ServerCore::inject).
#[derive(Debug, Clone)]
pub struct InjectedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl InjectedResponse {
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Body as text (lossy UTF-8).
    pub fn payload(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json(&self) -> serde_json::Result<Value> {
        serde_json::from_slice(&self.body)
    }
}
