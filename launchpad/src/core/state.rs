use std::sync::Arc;

use crate::cache::MemoryCache;
use crate::logging::{LogChannel, Loggers};

/// 服务器应用状态 - 每个服务器实例独有
///
/// 在 `configure()` 期间写入一次 (日志通道)，之后对请求处理器只读。
/// 通过 axum `State` 注入处理器，内部均为 `Arc`，克隆成本极低。
///
/// | 字段 | 说明 |
/// |------|------|
/// | loggers | logger / traceLogger / activityLogger 三个通道 |
/// | cache | 内存缓存引擎 |
#[derive(Clone, Debug)]
pub struct ServerState {
    loggers: Option<Loggers>,
    cache: MemoryCache,
}

impl ServerState {
    pub fn new(cache: MemoryCache) -> Self {
        Self {
            loggers: None,
            cache,
        }
    }

    pub(crate) fn set_loggers(&mut self, loggers: Loggers) {
        self.loggers = Some(loggers);
    }

    /// 全部日志通道 (configure 之前为 None)
    pub fn loggers(&self) -> Option<&Loggers> {
        self.loggers.as_ref()
    }

    /// 应用日志通道
    pub fn logger(&self) -> Option<&Arc<LogChannel>> {
        self.loggers.as_ref().map(|l| &l.logger)
    }

    /// 追踪日志通道
    pub fn trace_logger(&self) -> Option<&Arc<LogChannel>> {
        self.loggers.as_ref().map(|l| &l.trace_logger)
    }

    /// 活动日志通道
    pub fn activity_logger(&self) -> Option<&Arc<LogChannel>> {
        self.loggers.as_ref().map(|l| &l.activity_logger)
    }

    /// 内存缓存
    pub fn cache(&self) -> &MemoryCache {
        &self.cache
    }
}
