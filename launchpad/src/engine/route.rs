//! 路由定义
//!
//! 一条路由 = 方法 + 路径 + 处理器 + 路由选项 (认证 / CORS)。
//! 路径使用 axum 语法：`/users/{id}`、`/{*path}`。

use std::fmt;

use axum::handler::Handler;
use axum::routing::{self, MethodFilter, MethodRouter};
use http::Method;

use crate::core::{Result, ServerError, ServerState};

/// 路由认证选项
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RouteAuth {
    /// 使用服务器默认策略 (未设置默认策略时不认证)
    #[default]
    Default,
    /// 显式关闭认证
    Disabled,
    /// 使用指定名称的策略
    Strategy(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteOptions {
    pub auth: RouteAuth,
    /// `None` 时沿用引擎的路由默认值
    pub cors: Option<bool>,
}

#[derive(Clone)]
pub struct Route {
    method: Method,
    path: String,
    endpoint: MethodRouter<ServerState>,
    options: RouteOptions,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

macro_rules! method_constructor {
    ($name:ident, $method:ident) => {
        pub fn $name<H, T>(path: impl Into<String>, handler: H) -> Self
        where
            H: Handler<T, ServerState>,
            T: 'static,
        {
            Self::from_parts(Method::$method, path.into(), routing::$name(handler))
        }
    };
}

impl Route {
    /// Route for an arbitrary method. Methods without an axum filter
    /// (e.g. `CONNECT` extensions) are rejected.
    pub fn new<H, T>(method: Method, path: impl Into<String>, handler: H) -> Result<Self>
    where
        H: Handler<T, ServerState>,
        T: 'static,
    {
        let filter = MethodFilter::try_from(method.clone())
            .map_err(|_| ServerError::UnsupportedMethod(method.clone()))?;
        Ok(Self::from_parts(
            method,
            path.into(),
            routing::on(filter, handler),
        ))
    }

    method_constructor!(get, GET);
    method_constructor!(post, POST);
    method_constructor!(put, PUT);
    method_constructor!(patch, PATCH);
    method_constructor!(delete, DELETE);
    method_constructor!(options, OPTIONS);

    fn from_parts(method: Method, path: String, endpoint: MethodRouter<ServerState>) -> Self {
        Self {
            method,
            path,
            endpoint,
            options: RouteOptions::default(),
        }
    }

    pub fn auth(mut self, auth: RouteAuth) -> Self {
        self.options.auth = auth;
        self
    }

    pub fn without_auth(self) -> Self {
        self.auth(RouteAuth::Disabled)
    }

    pub fn cors(mut self, enabled: bool) -> Self {
        self.options.cors = Some(enabled);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn route_options(&self) -> &RouteOptions {
        &self.options
    }

    pub(crate) fn endpoint(&self) -> MethodRouter<ServerState> {
        self.endpoint.clone()
    }

    /// Prepend a plugin prefix. `"/api"` + `"/"` yields `"/api"`.
    pub(crate) fn with_prefix(mut self, prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches('/');
        if prefix.is_empty() {
            return self;
        }
        self.path = if self.path == "/" {
            prefix.to_string()
        } else {
            format!("{prefix}{}", self.path)
        };
        self
    }

    /// For `…/{*name}` routes, the prefix the wildcard hangs off (`""` at root).
    pub(crate) fn catch_all_prefix(&self) -> Option<&str> {
        let (prefix, last) = self.path.rsplit_once('/')?;
        (last.starts_with("{*") && last.ends_with('}')).then_some(prefix)
    }

    /// Path with parameter names erased, used to detect routes axum would
    /// treat as the same path.
    pub(crate) fn shape(&self) -> String {
        path_shape(&self.path)
    }
}

/// Reject paths axum's router would refuse to build.
///
/// Parameters must fill a whole segment (`{name}` / `{*name}`), the
/// catch-all must be the last segment and the legacy `:name` form is not
/// accepted.
pub(crate) fn validate_path(path: &str) -> Result<()> {
    let invalid = || ServerError::InvalidRoutePath(path.to_string());

    let Some(rest) = path.strip_prefix('/') else {
        return Err(invalid());
    };
    let segments: Vec<&str> = rest.split('/').collect();
    let last = segments.len() - 1;

    for (i, segment) in segments.iter().enumerate() {
        if segment.starts_with(':') {
            return Err(invalid());
        }
        if !segment.contains(['{', '}']) {
            continue;
        }
        let name = segment
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .ok_or_else(invalid)?;
        let (catch_all, name) = match name.strip_prefix('*') {
            Some(name) => (true, name),
            None => (false, name),
        };
        if name.is_empty() || name.contains(['{', '}', '*', ':']) {
            return Err(invalid());
        }
        if catch_all && i != last {
            return Err(invalid());
        }
    }
    Ok(())
}

pub(crate) fn path_shape(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if segment.starts_with("{*") && segment.ends_with('}') {
                "{*}"
            } else if segment.starts_with('{') && segment.ends_with('}') {
                "{}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
