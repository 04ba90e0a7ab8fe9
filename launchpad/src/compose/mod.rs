//! 功能组装 (FeatureComposer)
//!
//! 按固定顺序应用各项功能，每项由各自的配置开关控制：
//!
//! | # | 步骤 | 开关 | 依赖 |
//! |---|------|------|------|
//! | 1 | 认证配置校验 | 总是 | - |
//! | 2 | 日志通道 | 总是 | - |
//! | 3 | 默认路由 `GET /` | default_route | - |
//! | 4 | CORS 预检路由 | cors | - |
//! | 5 | 追踪日志扩展 | log_auto_trace_logging | 2 |
//! | 6 | JWT 认证 (默认策略) | auth_enabled | 1 |
//! | 7 | 状态监控插件 | status_monitor | - |
//!
//! 只有步骤 1、2 会中止组装。

pub mod cors;

use std::sync::Arc;

use axum::response::Response;

use crate::auth::{JWT_STRATEGY, JwtStrategy};
use crate::core::{Config, Result, ServerError};
use crate::engine::{Extension, RequestSummary, Route, ServerCore};
use crate::logging::build_loggers;
use crate::monitor::StatusMonitor;

pub use cors::{ALLOW_HEADERS, ALLOW_METHODS, origin_allowed, preflight_route};

/// Apply every enabled feature to `core`, in order.
pub async fn apply_features(config: &Config, core: &mut ServerCore) -> Result<()> {
    validate_auth(config)?;
    attach_loggers(config, core)?;

    if config.default_route {
        default_route(core)?;
    }
    if config.cors {
        core.route([preflight_route(config.cors_origins.clone())])?;
        tracing::debug!(origins = ?config.cors_origins, "CORS preflight route registered");
    }
    if config.log_auto_trace_logging {
        trace_extension(core);
    }
    if config.auth_enabled {
        jwt_auth(config, core)?;
    }
    if config.status_monitor {
        core.register(StatusMonitor::new()).await?;
    }
    Ok(())
}

/// Auth enabled requires a non-empty secret.
pub fn validate_auth(config: &Config) -> Result<()> {
    if config.auth_enabled && config.auth_secret.as_deref().is_none_or(str::is_empty) {
        return Err(ServerError::MissingAuthSecret);
    }
    Ok(())
}

fn attach_loggers(config: &Config, core: &mut ServerCore) -> Result<()> {
    let loggers = build_loggers(config)?;
    core.state_mut().set_loggers(loggers);
    Ok(())
}

fn default_route(core: &mut ServerCore) -> Result<()> {
    core.route([Route::get("/", || async { "hello" }).without_auth()])
}

fn trace_extension(core: &mut ServerCore) {
    let Some(trace) = core.state().trace_logger().cloned() else {
        tracing::warn!("Trace logging requested before loggers were attached");
        return;
    };

    core.ext(Extension::on_pre_response(
        move |summary: Arc<RequestSummary>, response: Response| {
            trace.debug(format!("{} {}", summary.path, summary.headers_json()));
            async move { response }
        },
    ));
}

fn jwt_auth(config: &Config, core: &mut ServerCore) -> Result<()> {
    let secret = config
        .auth_secret
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(ServerError::MissingAuthSecret)?;

    let strategy = JwtStrategy::new(secret, config.auth_validate.clone());
    core.auth_strategy(JWT_STRATEGY, Arc::new(strategy))?;
    core.auth_default(JWT_STRATEGY)
}
