//! 服务器配置
//!
//! 两阶段配置：调用方提供 [`PartialConfig`] (所有字段可选)，经 [`merge`]
//! 覆盖到内置默认值上得到 [`Config`]。下游组件只接受 [`Config`]。
//!
//! | 字段 | 默认值 | 说明 |
//! |------|--------|------|
//! | host | 0.0.0.0 | 监听地址 |
//! | port | 3000 | 监听端口 |
//! | cors | true | 注册 CORS 预检路由 |
//! | cors_origins | [] | 允许的 Origin 列表 (`*` 匹配任意) |
//! | default_route | true | `GET /` 返回 `hello` |
//! | status_monitor | true | 注册状态监控插件 |
//! | auth_enabled | false | 启用 JWT 认证 |
//! | log_directory | ./logs | 日志目录 |
//! | log_level | debug | 共享日志级别 |

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::auth::{AcceptAll, TokenValidator};
use crate::logging::Transport;

/// Caching engine selection carried into the engine options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub name: String,
    pub engine: CacheEngine,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CacheEngine {
    Memory { max_entries: usize },
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: "memory".to_string(),
            engine: CacheEngine::Memory {
                max_entries: 10_000,
            },
        }
    }
}

/// Raw engine options (escape hatch).
///
/// `host`/`port` win over the typed fields when set. `routes` is merged key by
/// key so that a caller-supplied `routes.cors` survives next to other keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub routes: EngineRouteOptions,
    pub compression: Option<bool>,
}

/// Route defaults applied by the engine to every route.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineRouteOptions {
    pub cors: Option<bool>,
    pub body_limit: Option<usize>,
    pub timeout_ms: Option<u64>,
}

impl EngineOptions {
    fn overlay(self, over: EngineOptions) -> Self {
        Self {
            host: over.host.or(self.host),
            port: over.port.or(self.port),
            routes: self.routes.overlay(over.routes),
            compression: over.compression.or(self.compression),
        }
    }
}

impl EngineRouteOptions {
    fn overlay(self, over: EngineRouteOptions) -> Self {
        Self {
            cors: over.cors.or(self.cors),
            body_limit: over.body_limit.or(self.body_limit),
            timeout_ms: over.timeout_ms.or(self.timeout_ms),
        }
    }
}

/// Fully resolved configuration. Only produced by [`merge`].
#[derive(Debug, Clone)]
pub struct Config {
    // network
    pub host: String,
    pub port: u16,
    pub cors: bool,
    pub cors_origins: Vec<String>,

    // routes
    pub default_route: bool,

    // auth
    pub auth_enabled: bool,
    pub auth_secret: Option<String>,
    pub auth_validate: Arc<dyn TokenValidator>,

    // logging
    pub log_directory: PathBuf,
    pub log_json: bool,
    pub log_level: String,
    pub log_default_file_transport: bool,
    pub log_default_console_transport: bool,
    pub log_default_trace_transport: bool,
    pub log_default_activity_transport: bool,
    pub log_auto_trace_logging: bool,
    pub log_additional_logger_transports: Vec<Arc<dyn Transport>>,
    pub log_additional_trace_transports: Vec<Arc<dyn Transport>>,
    pub log_additional_activity_transports: Vec<Arc<dyn Transport>>,

    // monitoring
    pub status_monitor: bool,

    // engine
    pub cache: CacheConfig,
    pub engine: EngineOptions,

    /// `start_server()` skips binding a socket; `inject()` still works.
    pub test_mode: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            cors: true,
            cors_origins: Vec::new(),
            default_route: true,
            auth_enabled: false,
            auth_secret: None,
            auth_validate: Arc::new(AcceptAll),
            log_directory: PathBuf::from("./logs"),
            log_json: true,
            log_level: "debug".to_string(),
            log_default_file_transport: true,
            log_default_console_transport: true,
            log_default_trace_transport: true,
            log_default_activity_transport: true,
            log_auto_trace_logging: true,
            log_additional_logger_transports: Vec::new(),
            log_additional_trace_transports: Vec::new(),
            log_additional_activity_transports: Vec::new(),
            status_monitor: true,
            cache: CacheConfig::default(),
            engine: EngineOptions::default(),
            test_mode: false,
        }
    }
}

impl Config {
    /// Merge `partial` over the built-in defaults.
    pub fn from_partial(partial: PartialConfig) -> Self {
        merge(Config::default(), partial)
    }
}

/// Caller-supplied configuration; every field optional.
///
/// Transports and the token validator are not deserializable and are set
/// through the builder methods.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PartialConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub cors: Option<bool>,
    pub cors_origins: Option<Vec<String>>,
    pub default_route: Option<bool>,
    pub auth_enabled: Option<bool>,
    pub auth_secret: Option<String>,
    #[serde(skip)]
    pub auth_validate: Option<Arc<dyn TokenValidator>>,
    pub log_directory: Option<PathBuf>,
    pub log_json: Option<bool>,
    pub log_level: Option<String>,
    pub log_default_file_transport: Option<bool>,
    pub log_default_console_transport: Option<bool>,
    pub log_default_trace_transport: Option<bool>,
    pub log_default_activity_transport: Option<bool>,
    pub log_auto_trace_logging: Option<bool>,
    #[serde(skip)]
    pub log_additional_logger_transports: Option<Vec<Arc<dyn Transport>>>,
    #[serde(skip)]
    pub log_additional_trace_transports: Option<Vec<Arc<dyn Transport>>>,
    #[serde(skip)]
    pub log_additional_activity_transports: Option<Vec<Arc<dyn Transport>>>,
    pub status_monitor: Option<bool>,
    pub cache: Option<CacheConfig>,
    pub engine: Option<EngineOptions>,
    pub test_mode: Option<bool>,
}

impl PartialConfig {
    /// Options from environment variables; unset or unparsable values stay
    /// `None` so the defaults apply.
    ///
    /// | 变量 | 字段 |
    /// |------|------|
    /// | HOST / PORT | host / port |
    /// | CORS / CORS_ORIGINS | cors / cors_origins (逗号分隔) |
    /// | AUTH_ENABLED / AUTH_SECRET | auth_enabled / auth_secret |
    /// | LOG_DIR / LOG_LEVEL / LOG_JSON | log_directory / log_level / log_json |
    pub fn from_env() -> Self {
        fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
            std::env::var(key).ok().and_then(|v| v.parse().ok())
        }

        Self {
            host: std::env::var("HOST").ok(),
            port: parsed("PORT"),
            cors: parsed("CORS"),
            cors_origins: std::env::var("CORS_ORIGINS").ok().map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            }),
            auth_enabled: parsed("AUTH_ENABLED"),
            auth_secret: std::env::var("AUTH_SECRET").ok(),
            log_directory: std::env::var("LOG_DIR").ok().map(PathBuf::from),
            log_level: std::env::var("LOG_LEVEL").ok(),
            log_json: parsed("LOG_JSON"),
            ..Default::default()
        }
    }

    pub fn auth_validate(mut self, validator: impl TokenValidator + 'static) -> Self {
        self.auth_validate = Some(Arc::new(validator));
        self
    }

    pub fn additional_logger_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.log_additional_logger_transports
            .get_or_insert_with(Vec::new)
            .push(Arc::new(transport));
        self
    }

    pub fn additional_trace_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.log_additional_trace_transports
            .get_or_insert_with(Vec::new)
            .push(Arc::new(transport));
        self
    }

    pub fn additional_activity_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.log_additional_activity_transports
            .get_or_insert_with(Vec::new)
            .push(Arc::new(transport));
        self
    }
}

/// Overlay `partial` on `defaults`, field by field.
///
/// Pure and deterministic. Does not validate: invalid combinations surface
/// when features are applied.
pub fn merge(defaults: Config, partial: PartialConfig) -> Config {
    Config {
        host: partial.host.unwrap_or(defaults.host),
        port: partial.port.unwrap_or(defaults.port),
        cors: partial.cors.unwrap_or(defaults.cors),
        cors_origins: partial.cors_origins.unwrap_or(defaults.cors_origins),
        default_route: partial.default_route.unwrap_or(defaults.default_route),
        auth_enabled: partial.auth_enabled.unwrap_or(defaults.auth_enabled),
        auth_secret: partial.auth_secret.or(defaults.auth_secret),
        auth_validate: partial.auth_validate.unwrap_or(defaults.auth_validate),
        log_directory: partial.log_directory.unwrap_or(defaults.log_directory),
        log_json: partial.log_json.unwrap_or(defaults.log_json),
        log_level: partial.log_level.unwrap_or(defaults.log_level),
        log_default_file_transport: partial
            .log_default_file_transport
            .unwrap_or(defaults.log_default_file_transport),
        log_default_console_transport: partial
            .log_default_console_transport
            .unwrap_or(defaults.log_default_console_transport),
        log_default_trace_transport: partial
            .log_default_trace_transport
            .unwrap_or(defaults.log_default_trace_transport),
        log_default_activity_transport: partial
            .log_default_activity_transport
            .unwrap_or(defaults.log_default_activity_transport),
        log_auto_trace_logging: partial
            .log_auto_trace_logging
            .unwrap_or(defaults.log_auto_trace_logging),
        log_additional_logger_transports: partial
            .log_additional_logger_transports
            .unwrap_or(defaults.log_additional_logger_transports),
        log_additional_trace_transports: partial
            .log_additional_trace_transports
            .unwrap_or(defaults.log_additional_trace_transports),
        log_additional_activity_transports: partial
            .log_additional_activity_transports
            .unwrap_or(defaults.log_additional_activity_transports),
        status_monitor: partial.status_monitor.unwrap_or(defaults.status_monitor),
        cache: partial.cache.unwrap_or(defaults.cache),
        engine: match partial.engine {
            Some(engine) => defaults.engine.overlay(engine),
            None => defaults.engine,
        },
        test_mode: partial.test_mode.unwrap_or(defaults.test_mode),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_survive_empty_partial() {
        let config = Config::from_partial(PartialConfig::default());
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert!(config.cors);
        assert!(config.cors_origins.is_empty());
        assert!(config.default_route);
        assert!(config.status_monitor);
        assert!(!config.auth_enabled);
        assert!(config.auth_secret.is_none());
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_directory, PathBuf::from("./logs"));
        assert_eq!(config.cache.name, "memory");
        assert!(!config.test_mode);
    }

    #[test]
    fn test_partial_overrides_top_level_fields() {
        let partial = PartialConfig {
            port: Some(8080),
            cors_origins: Some(vec!["https://test.com".into()]),
            log_level: Some("warn".into()),
            cache: Some(CacheConfig {
                name: "test".into(),
                ..CacheConfig::default()
            }),
            ..Default::default()
        };

        let config = Config::from_partial(partial);
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.cors_origins, vec!["https://test.com".to_string()]);
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.cache.name, "test");
    }

    #[test]
    fn test_engine_routes_merged_key_by_key() {
        let defaults = Config {
            engine: EngineOptions {
                routes: EngineRouteOptions {
                    cors: Some(true),
                    ..Default::default()
                },
                ..Default::default()
            },
            ..Config::default()
        };
        let partial = PartialConfig {
            engine: Some(EngineOptions {
                port: Some(4000),
                routes: EngineRouteOptions {
                    body_limit: Some(1024),
                    ..Default::default()
                },
                ..Default::default()
            }),
            ..Default::default()
        };

        let config = merge(defaults, partial);
        assert_eq!(config.engine.routes.cors, Some(true));
        assert_eq!(config.engine.routes.body_limit, Some(1024));
        assert_eq!(config.engine.port, Some(4000));
    }

    #[test]
    fn test_merge_does_not_validate() {
        let partial = PartialConfig {
            auth_enabled: Some(true),
            log_level: Some("loud".into()),
            ..Default::default()
        };
        let config = Config::from_partial(partial);
        assert!(config.auth_enabled);
        assert!(config.auth_secret.is_none());
        assert_eq!(config.log_level, "loud");
    }

    #[test]
    fn test_partial_deserializes_from_json() {
        let partial: PartialConfig = serde_json::from_str(
            r#"{
                "port": 9000,
                "cors_origins": ["*"],
                "engine": { "routes": { "cors": false } }
            }"#,
        )
        .unwrap();
        let config = Config::from_partial(partial);
        assert_eq!(config.port, 9000);
        assert_eq!(config.cors_origins, vec!["*".to_string()]);
        assert_eq!(config.engine.routes.cors, Some(false));
        assert!(config.cors);
    }
}
