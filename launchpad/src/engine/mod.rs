//! HTTP 引擎核心 (ServerCore)
//!
//! 路由表 + 扩展链 + 认证策略表。axum `Router` 在首次使用时由路由表构建并缓存，
//! 任何修改 (`route` / `ext` / `auth_*` / `register`) 都会使缓存失效，
//! 因此路由级认证总是反映当前的默认策略。
//!
//! # 路由语义
//!
//! | 情况 | 结果 |
//! |------|------|
//! | 路径不存在 | 404 JSON |
//! | 路径存在但方法不匹配 | 404 JSON |
//! | 同方法同路径重复注册 | `ServerError::RouteConflict` |
//! | `…/{*name}` 通配路由 | 同方法下覆盖前缀本身及前缀下所有未注册该方法的具体路径 |
//! | 非法路径 (`:id`、中间的 `{*rest}`、括号不匹配) | `ServerError::InvalidRoutePath`，注册时返回 |
//! | `OPTIONS` 路由 | 不挂 CORS 层，由处理器自己响应 |

mod extension;
mod inject;
mod plugin;
mod route;

pub use extension::{Extension, ExtPoint, RequestHook, RequestSummary, ResponseHook};
pub use inject::InjectedResponse;
pub use plugin::{Plugin, PluginRegistration, PluginScope};
pub use route::{Route, RouteAuth, RouteOptions};

use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::MethodRouter;
use http::{HeaderValue, Method, StatusCode, header};
use http_body_util::BodyExt;
use parking_lot::RwLock;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;

use crate::auth::{AuthStrategy, authenticate};
use crate::cache::MemoryCache;
use crate::core::{CacheConfig, Config, Result, ServerError, ServerState, not_found};
use extension::{ExtensionChain, run_extensions, run_pre_handler};

/// Methods advertised by the per-route CORS layer.
const CORS_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::OPTIONS,
];

/// Engine construction options resolved from [`Config`].
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub host: String,
    pub port: u16,
    /// Per-route CORS default.
    pub cors: bool,
    pub cors_origins: Vec<String>,
    pub cache: CacheConfig,
    pub body_limit: Option<usize>,
    pub timeout: Option<Duration>,
    pub compression: bool,
}

impl EngineSettings {
    /// Typed fields first, then the raw engine options on top.
    pub fn from_config(config: &Config) -> Self {
        let engine = &config.engine;
        Self {
            host: engine.host.clone().unwrap_or_else(|| config.host.clone()),
            port: engine.port.unwrap_or(config.port),
            cors: engine.routes.cors.unwrap_or(config.cors),
            cors_origins: config.cors_origins.clone(),
            cache: config.cache.clone(),
            body_limit: engine.routes.body_limit,
            timeout: engine.routes.timeout_ms.map(Duration::from_millis),
            compression: engine.compression.unwrap_or(false),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub struct ServerCore {
    settings: EngineSettings,
    state: ServerState,
    routes: Vec<Route>,
    extensions: ExtensionChain,
    strategies: HashMap<String, Arc<dyn AuthStrategy>>,
    default_strategy: Option<String>,
    plugins: HashSet<String>,
    app: RwLock<Option<Router>>,
}

impl std::fmt::Debug for ServerCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerCore")
            .field("settings", &self.settings)
            .field("routes", &self.routes)
            .field("extensions", &self.extensions.len())
            .field("strategies", &self.strategies.keys().collect::<Vec<_>>())
            .field("default_strategy", &self.default_strategy)
            .field("plugins", &self.plugins)
            .finish_non_exhaustive()
    }
}

impl ServerCore {
    pub fn create(config: &Config) -> Self {
        let settings = EngineSettings::from_config(config);
        let state = ServerState::new(MemoryCache::from_config(&settings.cache));
        Self {
            settings,
            state,
            routes: Vec::new(),
            extensions: ExtensionChain::default(),
            strategies: HashMap::new(),
            default_strategy: None,
            plugins: HashSet::new(),
            app: RwLock::new(None),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn state(&self) -> &ServerState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut ServerState {
        self.invalidate();
        &mut self.state
    }

    /// Registered `(method, path)` pairs in registration order.
    pub fn routes(&self) -> impl Iterator<Item = (&Method, &str)> {
        self.routes.iter().map(|r| (r.method(), r.path()))
    }

    pub fn plugins(&self) -> impl Iterator<Item = &str> {
        self.plugins.iter().map(String::as_str)
    }

    /// Add routes. The whole batch is rejected if any route is invalid.
    pub fn route(&mut self, routes: impl IntoIterator<Item = Route>) -> Result<()> {
        let accepted = self.check_routes(&[], routes)?;

        for route in &accepted {
            tracing::debug!(method = %route.method(), path = %route.path(), "Route registered");
        }
        self.routes.extend(accepted);
        self.invalidate();
        Ok(())
    }

    /// Validate a batch against the registered routes plus `pending`.
    pub(crate) fn check_routes(
        &self,
        pending: &[Route],
        routes: impl IntoIterator<Item = Route>,
    ) -> Result<Vec<Route>> {
        let mut accepted: Vec<Route> = Vec::new();
        for route in routes {
            route::validate_path(route.path())?;
            let shape = route.shape();
            let conflict = self
                .routes
                .iter()
                .chain(pending)
                .chain(accepted.iter())
                .any(|existing| {
                    existing.shape() == shape
                        && (existing.method() == route.method() || existing.path() != route.path())
                });
            if conflict {
                return Err(ServerError::RouteConflict {
                    method: route.method().clone(),
                    path: route.path().to_string(),
                });
            }
            accepted.push(route);
        }
        Ok(accepted)
    }

    /// Run a plugin's registration. Its routes and extensions are staged
    /// and committed only when the plugin returns `Ok`.
    pub async fn register(&mut self, registration: impl Into<PluginRegistration>) -> Result<()> {
        let registration = registration.into();
        let name = registration.name().to_string();
        if self.plugins.contains(&name) {
            return Err(ServerError::PluginAlreadyRegistered(name));
        }
        if let Some(prefix) = registration.prefix.as_deref().filter(|p| !p.starts_with('/')) {
            return Err(ServerError::InvalidRoutePath(prefix.to_string()));
        }

        let plugin = registration.plugin.clone();
        let mut scope = PluginScope::new(self, registration.prefix.clone());
        let outcome = plugin.register(&mut scope).await;
        let (routes, extensions) = scope.into_staged();
        if let Err(e) = outcome {
            tracing::warn!(plugin = %name, error = %e, "Plugin registration failed");
            return Err(e);
        }

        self.route(routes)?;
        for extension in extensions {
            self.ext(extension);
        }
        tracing::debug!(plugin = %name, prefix = ?registration.prefix, "Plugin registered");
        self.plugins.insert(name);
        self.invalidate();
        Ok(())
    }

    pub fn ext(&mut self, extension: Extension) {
        tracing::debug!(point = ?extension.point(), "Extension registered");
        self.extensions.push(extension);
        self.invalidate();
    }

    pub fn auth_strategy(
        &mut self,
        name: impl Into<String>,
        strategy: Arc<dyn AuthStrategy>,
    ) -> Result<()> {
        let name = name.into();
        if self.strategies.contains_key(&name) {
            return Err(ServerError::DuplicateAuthStrategy(name));
        }
        self.strategies.insert(name, strategy);
        self.invalidate();
        Ok(())
    }

    /// Make `name` the strategy for every route that does not opt out.
    pub fn auth_default(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if !self.strategies.contains_key(&name) {
            return Err(ServerError::UnknownAuthStrategy(name));
        }
        self.default_strategy = Some(name);
        self.invalidate();
        Ok(())
    }

    pub fn default_strategy(&self) -> Option<&str> {
        self.default_strategy.as_deref()
    }

    /// The built application router (cached until the next mutation).
    pub fn router(&self) -> Result<Router> {
        if let Some(app) = self.app.read().as_ref() {
            return Ok(app.clone());
        }
        let app = self.build()?;
        *self.app.write() = Some(app.clone());
        Ok(app)
    }

    /// Run one request through the full stack without a socket.
    pub async fn inject(&self, request: http::Request<Body>) -> Result<InjectedResponse> {
        let router = self.router()?;
        let response = match router.oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };

        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| ServerError::Inject(e.to_string()))?
            .to_bytes();

        Ok(InjectedResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }

    /// Bind the configured address and serve in a background task.
    pub async fn start(&self) -> Result<RunningServer> {
        let router = self.router()?;
        let addr = self.settings.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        let task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(signal.cancelled_owned())
                .await
        });

        Ok(RunningServer {
            local_addr,
            shutdown,
            task,
        })
    }

    fn invalidate(&mut self) {
        *self.app.get_mut() = None;
    }

    fn build(&self) -> Result<Router> {
        let mut endpoints: BTreeMap<String, (MethodRouter<ServerState>, HashSet<Method>)> =
            BTreeMap::new();

        for route in &self.routes {
            let endpoint = self.layered(route)?;
            merge_endpoint(&mut endpoints, route.path().to_string(), route.method(), endpoint);
        }

        // Longest prefix first so nested catch-alls win over outer ones.
        let mut catch_alls: Vec<(&Route, &str)> = self
            .routes
            .iter()
            .filter_map(|r| r.catch_all_prefix().map(|prefix| (r, prefix)))
            .collect();
        catch_alls.sort_by(|a, b| b.1.len().cmp(&a.1.len()));

        for (route, prefix) in catch_alls {
            let own = if prefix.is_empty() { "/" } else { prefix };
            let nested = format!("{prefix}/");
            let mut targets: Vec<String> = endpoints
                .keys()
                .filter(|path| {
                    path.as_str() != route.path() && (path.as_str() == own || path.starts_with(&nested))
                })
                .cloned()
                .collect();
            if !endpoints.contains_key(own) {
                targets.push(own.to_string());
            }

            for target in targets {
                let covered = endpoints
                    .get(&target)
                    .is_some_and(|(_, methods)| methods.contains(route.method()));
                if !covered {
                    merge_endpoint(&mut endpoints, target, route.method(), self.layered(route)?);
                }
            }
        }

        let mut router = Router::<ServerState>::new();
        for (path, (endpoint, _)) in endpoints {
            router = router.route(&path, endpoint);
        }
        let mut router = router
            .fallback(not_found)
            .method_not_allowed_fallback(not_found);

        if let Some(limit) = self.settings.body_limit {
            router = router.layer(DefaultBodyLimit::max(limit));
        }
        if let Some(timeout) = self.settings.timeout {
            router = router.layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                timeout,
            ));
        }
        if self.settings.compression {
            router = router.layer(CompressionLayer::new());
        }
        if self.extensions.has_outer() {
            router = router.layer(middleware::from_fn_with_state(
                Arc::new(self.extensions.clone()),
                run_extensions,
            ));
        }

        Ok(router.with_state(self.state.clone()))
    }

    /// Route endpoint wrapped in its pre-handler, auth and CORS layers
    /// (innermost first).
    fn layered(&self, route: &Route) -> Result<MethodRouter<ServerState>> {
        let mut endpoint = route.endpoint();

        if let Some(hooks) = self.extensions.pre_handler() {
            endpoint = endpoint.route_layer(middleware::from_fn_with_state(hooks, run_pre_handler));
        }
        if let Some(strategy) = self.strategy_for(route)? {
            endpoint = endpoint.route_layer(middleware::from_fn_with_state(strategy, authenticate));
        }
        // OPTIONS handlers answer for themselves; the CORS layer would
        // swallow them as preflights.
        if route.method() != Method::OPTIONS
            && route.route_options().cors.unwrap_or(self.settings.cors)
        {
            endpoint = endpoint.route_layer(self.cors_layer());
        }

        Ok(endpoint)
    }

    fn strategy_for(&self, route: &Route) -> Result<Option<Arc<dyn AuthStrategy>>> {
        let name = match &route.route_options().auth {
            RouteAuth::Disabled => return Ok(None),
            RouteAuth::Default => match &self.default_strategy {
                Some(name) => name,
                None => return Ok(None),
            },
            RouteAuth::Strategy(name) => name,
        };
        self.strategies
            .get(name)
            .cloned()
            .map(Some)
            .ok_or_else(|| ServerError::UnknownAuthStrategy(name.clone()))
    }

    fn cors_layer(&self) -> CorsLayer {
        let origins = &self.settings.cors_origins;
        let allow_origin = if origins.is_empty() || origins.iter().any(|o| o == "*") {
            AllowOrigin::mirror_request()
        } else {
            AllowOrigin::list(
                origins
                    .iter()
                    .filter_map(|o| HeaderValue::from_str(o).ok()),
            )
        };

        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods(CORS_METHODS)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    }
}

fn merge_endpoint(
    endpoints: &mut BTreeMap<String, (MethodRouter<ServerState>, HashSet<Method>)>,
    path: String,
    method: &Method,
    endpoint: MethodRouter<ServerState>,
) {
    match endpoints.remove(&path) {
        Some((existing, mut methods)) => {
            methods.insert(method.clone());
            endpoints.insert(path, (existing.merge(endpoint), methods));
        }
        None => {
            endpoints.insert(path, (endpoint, HashSet::from([method.clone()])));
        }
    }
}

/// Handle to a listening server.
#[derive(Debug)]
pub struct RunningServer {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<std::io::Result<()>>,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn stop(self) -> Result<()> {
        self.shutdown.cancel();
        self.task
            .await
            .map_err(|e| ServerError::Serve(e.to_string()))?
            .map_err(|e| ServerError::Serve(e.to_string()))
    }
}
