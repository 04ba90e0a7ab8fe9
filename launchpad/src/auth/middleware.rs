//! 认证中间件
//!
//! 按路由挂载：只有需要认证的路由才会包一层 [`authenticate`]，
//! 认证成功后将 [`Credentials`] 注入请求扩展。

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http::StatusCode;
use http::request::Parts;
use serde_json::Value;
use thiserror::Error;

use crate::core::ErrorBody;
use crate::security_log;

/// 已认证的请求身份，可在处理器中通过 `axum::Extension<Credentials>` 获取
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    /// 认证策略名称 (如 `"jwt"`)
    pub scheme: String,
    /// 解码后的 claims，或校验回调返回的替代凭据
    pub value: Value,
}

/// 认证失败原因 (全部映射为 401)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthRejection {
    #[error("Missing authentication")]
    MissingToken,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    ExpiredToken,

    #[error("Invalid credentials")]
    InvalidCredentials,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let message = match &self {
            AuthRejection::InvalidToken(_) => "Invalid token".to_string(),
            other => other.to_string(),
        };
        let mut response = ErrorBody::new(StatusCode::UNAUTHORIZED, message).into_response();
        response.headers_mut().insert(
            http::header::WWW_AUTHENTICATE,
            http::HeaderValue::from_static("Bearer"),
        );
        response
    }
}

/// 可插拔认证策略
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    fn scheme(&self) -> &str;

    async fn authenticate(&self, parts: &Parts) -> Result<Credentials, AuthRejection>;
}

/// 认证中间件
///
/// | 结果 | 行为 |
/// |------|------|
/// | 认证成功 | 注入 [`Credentials`]，继续处理 |
/// | 无令牌 / 令牌无效 / 过期 / 校验失败 | 401，记录 security 日志 |
pub async fn authenticate(
    State(strategy): State<Arc<dyn AuthStrategy>>,
    req: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = req.into_parts();

    match strategy.authenticate(&parts).await {
        Ok(credentials) => {
            parts.extensions.insert(credentials);
            next.run(Request::from_parts(parts, body)).await
        }
        Err(rejection) => {
            security_log!(
                WARN,
                "auth_failed",
                scheme = strategy.scheme(),
                path = parts.uri.path(),
                reason = %rejection
            );
            rejection.into_response()
        }
    }
}
