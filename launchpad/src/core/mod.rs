//! 核心模块 - 服务器配置、状态、生命周期和错误定义
//!
//! # 模块结构
//!
//! - [`Config`] / [`PartialConfig`] - 服务器配置 (两阶段)
//! - [`ServerState`] - 服务器状态
//! - [`Server`] - 生命周期
//! - [`ServerError`] - 服务器错误

pub mod config;
pub mod error;
pub mod server;
pub mod state;

pub use config::{
    CacheConfig, CacheEngine, Config, EngineOptions, EngineRouteOptions, PartialConfig, merge,
};
pub use error::{ErrorBody, Result, ServerError, not_found};
pub use server::{Phase, Server};
pub use state::ServerState;
