//! Launchpad - 配置驱动的 HTTP 服务器引导层
//!
//! # 架构概述
//!
//! 调用方提供一份可选字段的配置，`configure()` 按固定顺序组装各项功能：
//!
//! - **配置** (`core::config`): 两阶段配置，`merge` 是唯一的转换路径
//! - **日志** (`logging`): logger / traceLogger / activityLogger 三个通道
//! - **引擎** (`engine`): axum 路由表、扩展点、插件、进程内 `inject`
//! - **认证** (`auth`): HS256 JWT 策略 + 调用方校验回调
//! - **组装** (`compose`): 默认路由、CORS 预检、追踪日志、认证、状态监控
//! - **路由加载** (`routes`): 从目录加载路由清单
//!
//! # 模块结构
//!
//! ```text
//! launchpad/src/
//! ├── core/          # 配置、状态、生命周期、错误
//! ├── logging/       # 日志通道与传输
//! ├── engine/        # 路由、扩展、插件
//! ├── auth/          # JWT 认证
//! ├── compose/       # 功能组装
//! ├── monitor/       # 状态监控插件
//! ├── routes/        # 路由目录加载
//! └── cache.rs       # 内存缓存
//! ```
//!
//! # 示例
//!
//! ```no_run
//! use launchpad::{PartialConfig, Route, Server};
//!
//! # async fn run() -> launchpad::Result<()> {
//! let mut server = Server::new(PartialConfig {
//!     port: Some(8080),
//!     cors_origins: Some(vec!["https://example.com".into()]),
//!     ..Default::default()
//! });
//! server.configure().await?;
//! server.register_additional_routes([Route::get("/ping", || async { "pong" }).without_auth()])?;
//! server.start_server().await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod cache;
pub mod compose;
pub mod core;
pub mod engine;
pub mod logging;
pub mod monitor;
pub mod routes;

// Re-export 公共类型
pub use auth::{AuthStrategy, Credentials, JwtStrategy, TokenValidator, ValidationOutcome};
pub use cache::MemoryCache;
pub use crate::core::{Config, PartialConfig, Phase, Result, Server, ServerError, ServerState, merge};
pub use engine::{
    Extension, ExtPoint, InjectedResponse, Plugin, PluginRegistration, PluginScope,
    RequestSummary, Route, RouteAuth, ServerCore,
};
pub use logging::{LogChannel, Loggers, Transport};
pub use monitor::StatusMonitor;
