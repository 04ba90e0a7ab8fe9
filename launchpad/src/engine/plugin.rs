//! 插件机制
//!
//! 插件拿到一个 [`PluginScope`]，通过它注册路由与扩展。
//! 注册时可指定路径前缀，作用于该插件注册的全部路由。

use std::sync::Arc;

use async_trait::async_trait;

use super::{Extension, Route, ServerCore};
use crate::core::{Result, ServerState};

#[async_trait]
pub trait Plugin: Send + Sync {
    /// Unique plugin name; registering the same name twice fails.
    fn name(&self) -> &str;

    async fn register(&self, scope: &mut PluginScope<'_>) -> Result<()>;
}

/// A plugin plus its registration options.
#[derive(Clone)]
pub struct PluginRegistration {
    pub(crate) plugin: Arc<dyn Plugin>,
    pub(crate) prefix: Option<String>,
}

impl std::fmt::Debug for PluginRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistration")
            .field("plugin", &self.plugin.name())
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl PluginRegistration {
    pub fn new(plugin: impl Plugin + 'static) -> Self {
        Self::from_arc(Arc::new(plugin))
    }

    pub fn from_arc(plugin: Arc<dyn Plugin>) -> Self {
        Self {
            plugin,
            prefix: None,
        }
    }

    /// Path prefix applied to every route the plugin registers.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn name(&self) -> &str {
        self.plugin.name()
    }
}

impl<P: Plugin + 'static> From<P> for PluginRegistration {
    fn from(plugin: P) -> Self {
        Self::new(plugin)
    }
}

/// Registration view of the engine handed to a plugin.
///
/// Routes and extensions are staged here; the engine commits them once the
/// plugin's `register` returns `Ok`.
pub struct PluginScope<'a> {
    core: &'a mut ServerCore,
    prefix: Option<String>,
    routes: Vec<Route>,
    extensions: Vec<Extension>,
}

impl<'a> PluginScope<'a> {
    pub(crate) fn new(core: &'a mut ServerCore, prefix: Option<String>) -> Self {
        Self {
            core,
            prefix,
            routes: Vec::new(),
            extensions: Vec::new(),
        }
    }

    /// Add routes under the plugin prefix. Validated right away against the
    /// engine and the routes this plugin already staged.
    pub fn route(&mut self, routes: impl IntoIterator<Item = Route>) -> Result<()> {
        let prefix = self.prefix.as_deref().unwrap_or("");
        let routes = routes.into_iter().map(|r| r.with_prefix(prefix));
        let accepted = self.core.check_routes(&self.routes, routes)?;
        self.routes.extend(accepted);
        Ok(())
    }

    pub fn ext(&mut self, extension: Extension) {
        self.extensions.push(extension);
    }

    pub fn state(&self) -> &ServerState {
        self.core.state()
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub(crate) fn into_staged(self) -> (Vec<Route>, Vec<Extension>) {
        (self.routes, self.extensions)
    }
}
