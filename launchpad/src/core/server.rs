//! Server Implementation
//!
//! 服务器生命周期
//!
//! ```text
//! Unconfigured ──configure()──▶ Configured ──start_server()──▶ Listening
//!       │                            │                         (test_mode: TestReady)
//!       └──── configure() 失败 ──▶ Failed (实例不可再用)
//! ```
//!
//! - Configured 之后仍可追加路由、插件、扩展
//! - Listening 之后拒绝任何修改
//! - TestReady 不绑定端口，`inject()` 照常可用

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::body::Body;

use crate::compose::apply_features;
use crate::core::{Config, PartialConfig, Result, ServerError, ServerState};
use crate::engine::{
    Extension, InjectedResponse, PluginRegistration, Route, RunningServer, ServerCore,
};
use crate::logging::LogChannel;
use crate::routes::{DirectoryRouteSource, JsonRouteLoader, RouteSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unconfigured,
    Configured,
    Listening,
    TestReady,
    Failed,
}

/// HTTP Server
#[derive(Debug)]
pub struct Server {
    config: Config,
    core: ServerCore,
    phase: Phase,
    running: Option<RunningServer>,
}

impl Server {
    pub fn new(options: PartialConfig) -> Self {
        Self::with_config(Config::from_partial(options))
    }

    pub fn with_config(config: Config) -> Self {
        let core = ServerCore::create(&config);
        Self {
            config,
            core,
            phase: Phase::Unconfigured,
            running: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn core(&self) -> &ServerCore {
        &self.core
    }

    pub fn core_mut(&mut self) -> Result<&mut ServerCore> {
        self.ensure_mutable()?;
        Ok(&mut self.core)
    }

    pub fn state(&self) -> &ServerState {
        self.core.state()
    }

    /// Apply every enabled feature. Runs once per instance.
    pub async fn configure(&mut self) -> Result<()> {
        match self.phase {
            Phase::Unconfigured => {}
            Phase::Failed => return Err(ServerError::Unusable),
            _ => return Err(ServerError::AlreadyConfigured),
        }

        match apply_features(&self.config, &mut self.core).await {
            Ok(()) => {
                self.phase = Phase::Configured;
                tracing::info!(
                    auth = self.config.auth_enabled,
                    cors = self.config.cors,
                    status_monitor = self.config.status_monitor,
                    "Server configured"
                );
                Ok(())
            }
            Err(e) => {
                self.phase = Phase::Failed;
                tracing::error!(error = %e, "Server configuration failed");
                Err(e)
            }
        }
    }

    pub fn register_additional_routes(
        &mut self,
        routes: impl IntoIterator<Item = Route>,
    ) -> Result<()> {
        self.ensure_mutable()?;
        self.core.route(routes)
    }

    /// Load every `.json` route manifest in `dir`.
    pub fn register_routes_from_directory(&mut self, dir: impl AsRef<Path>) -> Result<()> {
        self.register_routes_from(&DirectoryRouteSource::new(JsonRouteLoader), dir)
    }

    /// Register every module `source` lists in `dir`. All modules are
    /// validated first; one bad module leaves the server untouched.
    pub fn register_routes_from(
        &mut self,
        source: &dyn RouteSource,
        dir: impl AsRef<Path>,
    ) -> Result<()> {
        self.ensure_mutable()?;
        let dir = dir.as_ref();

        let mut staged: Vec<Route> = Vec::new();
        let mut names = Vec::new();
        for module in source.list_modules(dir)? {
            let accepted = self.core.check_routes(&staged, module.routes)?;
            staged.extend(accepted);
            names.push(module.name);
        }
        self.core.route(staged)?;

        for name in names {
            let message = format!("Added {name} to the API routes.");
            match self.app_logger() {
                Some(logger) => logger.info(message),
                None => tracing::info!("{message}"),
            }
        }
        Ok(())
    }

    pub async fn register_additional_plugin(
        &mut self,
        registration: impl Into<PluginRegistration>,
    ) -> Result<()> {
        self.ensure_mutable()?;
        self.core.register(registration).await
    }

    pub fn register_extension(&mut self, extension: Extension) -> Result<()> {
        self.ensure_mutable()?;
        self.core.ext(extension);
        Ok(())
    }

    /// Begin listening (or, in test mode, just mark the server ready).
    pub async fn start_server(&mut self) -> Result<()> {
        match self.phase {
            Phase::Configured => {}
            Phase::Unconfigured => return Err(ServerError::NotConfigured),
            Phase::Failed => return Err(ServerError::Unusable),
            Phase::Listening | Phase::TestReady => return Err(ServerError::AlreadyStarted),
        }

        if self.config.test_mode {
            // Build now so route errors surface at start, not on first inject.
            self.core.router()?;
            self.phase = Phase::TestReady;
            return Ok(());
        }

        let running = self.core.start().await?;
        let message = format!("Server running at: http://{}", running.local_addr());
        match self.app_logger() {
            Some(logger) => logger.info(message),
            None => tracing::info!("{message}"),
        }
        self.running = Some(running);
        self.phase = Phase::Listening;
        Ok(())
    }

    /// Graceful shutdown. No-op when the server never bound a socket.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(running) = self.running.take() {
            running.stop().await?;
            tracing::info!("Server stopped");
        }
        Ok(())
    }

    pub async fn inject(&self, request: http::Request<Body>) -> Result<InjectedResponse> {
        if self.phase == Phase::Failed {
            return Err(ServerError::Unusable);
        }
        self.core.inject(request).await
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(RunningServer::local_addr)
    }

    pub fn app_logger(&self) -> Option<&Arc<LogChannel>> {
        self.core.state().logger()
    }

    pub fn app_trace_logger(&self) -> Option<&Arc<LogChannel>> {
        self.core.state().trace_logger()
    }

    pub fn app_activity_logger(&self) -> Option<&Arc<LogChannel>> {
        self.core.state().activity_logger()
    }

    fn ensure_mutable(&self) -> Result<()> {
        match self.phase {
            Phase::Failed => Err(ServerError::Unusable),
            Phase::Listening => Err(ServerError::AlreadyStarted),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_options(dir: &Path) -> PartialConfig {
        PartialConfig {
            log_directory: Some(dir.to_path_buf()),
            log_default_console_transport: Some(false),
            test_mode: Some(true),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_phases() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = Server::new(test_options(dir.path()));
        assert_eq!(server.phase(), Phase::Unconfigured);
        assert!(matches!(
            server.start_server().await,
            Err(ServerError::NotConfigured)
        ));

        server.configure().await.unwrap();
        assert_eq!(server.phase(), Phase::Configured);
        assert!(matches!(
            server.configure().await,
            Err(ServerError::AlreadyConfigured)
        ));

        server.start_server().await.unwrap();
        assert_eq!(server.phase(), Phase::TestReady);
        assert!(server.local_addr().is_none());
        assert!(matches!(
            server.start_server().await,
            Err(ServerError::AlreadyStarted)
        ));
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_configure_makes_instance_unusable() {
        let mut server = Server::new(PartialConfig {
            auth_enabled: Some(true),
            test_mode: Some(true),
            ..Default::default()
        });

        assert!(matches!(
            server.configure().await,
            Err(ServerError::MissingAuthSecret)
        ));
        assert_eq!(server.phase(), Phase::Failed);
        assert!(matches!(server.configure().await, Err(ServerError::Unusable)));
        assert!(matches!(server.start_server().await, Err(ServerError::Unusable)));
        assert!(matches!(
            server.register_additional_routes([Route::get("/x", || async { "" })]),
            Err(ServerError::Unusable)
        ));
        assert!(server.app_logger().is_none());
    }

    #[tokio::test]
    async fn test_loggers_attached_after_configure() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = Server::new(test_options(dir.path()));
        assert!(server.app_logger().is_none());

        server.configure().await.unwrap();
        assert!(server.app_logger().is_some());
        assert!(server.app_trace_logger().is_some());
        assert!(server.app_activity_logger().is_some());
    }
}
