//! 认证模块
//!
//! - [`AuthStrategy`] - 可插拔认证策略
//! - [`JwtStrategy`] - HS256 JWT 策略
//! - [`TokenValidator`] - 调用方提供的 claims 校验回调
//! - [`authenticate`] - 按路由挂载的认证中间件

pub mod jwt;
pub mod middleware;

pub use jwt::{
    AcceptAll, FnValidator, JWT_STRATEGY, JwtStrategy, TokenValidator, ValidationOutcome,
    validate_with,
};
pub use middleware::{AuthRejection, AuthStrategy, Credentials, authenticate};
