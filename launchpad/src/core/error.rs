use std::path::PathBuf;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::logging::ChannelKind;

/// 启动阶段错误
///
/// 配置错误在 `configure()` 时同步返回；协作方错误 (引擎、插件、目录扫描)
/// 原样向上传播，不做重试。
#[derive(Error, Debug)]
pub enum ServerError {
    // ========== Configuration ==========
    #[error(
        "JWT Auth secret must be provided if auth is enabled. Set config.auth_enabled = false or provide a value for config.auth_secret."
    )]
    MissingAuthSecret,

    #[error("{} logger has no transports", .0.label())]
    EmptyChannel(ChannelKind),

    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("Unknown authentication strategy: {0}")]
    UnknownAuthStrategy(String),

    // ========== Collaborators ==========
    #[error("Invalid route path {0:?}: paths must start with '/'")]
    InvalidRoutePath(String),

    #[error("Route conflict: {method} {path} is already registered")]
    RouteConflict { method: http::Method, path: String },

    #[error("Unsupported route method: {0}")]
    UnsupportedMethod(http::Method),

    #[error("Authentication strategy {0} already registered")]
    DuplicateAuthStrategy(String),

    #[error("Plugin {0} already registered")]
    PluginAlreadyRegistered(String),

    #[error("Failed to read route directory {}: {source}", .path.display())]
    RouteDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid route module {file}: {reason}")]
    RouteModule { file: String, reason: String },

    #[error("Failed to open log transport: {0}")]
    Logging(#[source] std::io::Error),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(String),

    #[error("Inject failed: {0}")]
    Inject(String),

    // ========== Lifecycle ==========
    #[error("Server is already configured")]
    AlreadyConfigured,

    #[error("Server must be configured before it can start")]
    NotConfigured,

    #[error("Server has already been started")]
    AlreadyStarted,

    #[error("Server configuration failed earlier; discard this instance")]
    Unusable,
}

impl ServerError {
    /// Whether the error belongs to the configuration class (bad input, not a
    /// failing collaborator).
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ServerError::MissingAuthSecret
                | ServerError::EmptyChannel(_)
                | ServerError::InvalidLogLevel(_)
                | ServerError::UnknownAuthStrategy(_)
        )
    }
}

/// Boom-style error body used for every response this crate generates itself
/// (404 fallback, auth rejections).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub error: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status_code: status.as_u16(),
            error: status.canonical_reason().unwrap_or("Unknown").to_string(),
            message: message.into(),
        }
    }
}

impl IntoResponse for ErrorBody {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// Fallback handler for unmatched paths and unmatched methods.
pub async fn not_found() -> ErrorBody {
    ErrorBody::new(StatusCode::NOT_FOUND, "Not Found")
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_channel_messages() {
        assert_eq!(
            ServerError::EmptyChannel(ChannelKind::Application).to_string(),
            "Default logger has no transports"
        );
        assert_eq!(
            ServerError::EmptyChannel(ChannelKind::Trace).to_string(),
            "Trace logger has no transports"
        );
        assert_eq!(
            ServerError::EmptyChannel(ChannelKind::Activity).to_string(),
            "Activity logger has no transports"
        );
    }

    #[test]
    fn test_configuration_class() {
        assert!(ServerError::MissingAuthSecret.is_configuration());
        assert!(!ServerError::AlreadyConfigured.is_configuration());
        assert!(!ServerError::Serve("boom".into()).is_configuration());
    }

    #[test]
    fn test_error_body_shape() {
        let body = ErrorBody::new(StatusCode::UNAUTHORIZED, "Missing authentication");
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["statusCode"], 401);
        assert_eq!(value["error"], "Unauthorized");
        assert_eq!(value["message"], "Missing authentication");
    }
}
