//! 状态监控插件
//!
//! - `OnPreResponse` 扩展统计请求数、按状态码分类计数与平均响应时间
//! - `GET /status` (免认证) 返回运行时长、进程内存 / CPU 与请求统计

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use axum::Json;
use axum::response::Response;
use parking_lot::Mutex;
use serde::Serialize;
use sysinfo::{Pid, ProcessesToUpdate, System};

use crate::core::Result;
use crate::engine::{Extension, Plugin, PluginScope, RequestSummary, Route};

pub const STATUS_MONITOR_PLUGIN: &str = "status-monitor";

/// Request counters shared between the extension and the status route.
#[derive(Debug, Default)]
struct RequestStats {
    total: AtomicU64,
    /// 1xx .. 5xx
    by_class: [AtomicU64; 5],
    response_micros: AtomicU64,
}

impl RequestStats {
    fn record(&self, status: u16, elapsed_micros: u64) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.response_micros
            .fetch_add(elapsed_micros, Ordering::Relaxed);
        if let Some(counter) = (status / 100)
            .checked_sub(1)
            .and_then(|idx| self.by_class.get(idx as usize))
        {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn snapshot(&self) -> RequestSnapshot {
        let total = self.total.load(Ordering::Relaxed);
        let micros = self.response_micros.load(Ordering::Relaxed);
        let class = |idx: usize| self.by_class[idx].load(Ordering::Relaxed);
        RequestSnapshot {
            total,
            status_1xx: class(0),
            status_2xx: class(1),
            status_3xx: class(2),
            status_4xx: class(3),
            status_5xx: class(4),
            mean_response_ms: if total == 0 {
                0.0
            } else {
                micros as f64 / total as f64 / 1000.0
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSnapshot {
    pub total: u64,
    #[serde(rename = "1xx")]
    pub status_1xx: u64,
    #[serde(rename = "2xx")]
    pub status_2xx: u64,
    #[serde(rename = "3xx")]
    pub status_3xx: u64,
    #[serde(rename = "4xx")]
    pub status_4xx: u64,
    #[serde(rename = "5xx")]
    pub status_5xx: u64,
    pub mean_response_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSnapshot {
    pub pid: Option<u32>,
    /// Resident memory in bytes.
    pub memory: u64,
    pub cpu_usage: f32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub status: &'static str,
    pub uptime_secs: u64,
    pub process: ProcessSnapshot,
    pub requests: RequestSnapshot,
}

#[derive(Debug)]
struct MonitorState {
    started_at: Instant,
    stats: RequestStats,
    system: Mutex<System>,
    pid: Option<Pid>,
}

impl MonitorState {
    fn process(&self) -> ProcessSnapshot {
        let Some(pid) = self.pid else {
            return ProcessSnapshot {
                pid: None,
                memory: 0,
                cpu_usage: 0.0,
            };
        };

        let mut system = self.system.lock();
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        let (memory, cpu_usage) = system
            .process(pid)
            .map(|p| (p.memory(), p.cpu_usage()))
            .unwrap_or_default();

        ProcessSnapshot {
            pid: Some(pid.as_u32()),
            memory,
            cpu_usage,
        }
    }

    fn report(&self) -> StatusReport {
        StatusReport {
            status: "ok",
            uptime_secs: self.started_at.elapsed().as_secs(),
            process: self.process(),
            requests: self.stats.snapshot(),
        }
    }
}

/// Built-in monitoring plugin.
#[derive(Debug, Clone)]
pub struct StatusMonitor {
    state: Arc<MonitorState>,
}

impl Default for StatusMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusMonitor {
    pub fn new() -> Self {
        let pid = sysinfo::get_current_pid()
            .inspect_err(|e| tracing::warn!(error = %e, "Cannot resolve current pid"))
            .ok();
        Self {
            state: Arc::new(MonitorState {
                started_at: Instant::now(),
                stats: RequestStats::default(),
                system: Mutex::new(System::new()),
                pid,
            }),
        }
    }

    pub fn report(&self) -> StatusReport {
        self.state.report()
    }
}

#[async_trait]
impl Plugin for StatusMonitor {
    fn name(&self) -> &str {
        STATUS_MONITOR_PLUGIN
    }

    async fn register(&self, scope: &mut PluginScope<'_>) -> Result<()> {
        let state = self.state.clone();
        scope.ext(Extension::on_pre_response(
            move |summary: Arc<RequestSummary>, response: Response| {
                let elapsed = summary.received_at.elapsed().as_micros();
                state
                    .stats
                    .record(response.status().as_u16(), u64::try_from(elapsed).unwrap_or(u64::MAX));
                async move { response }
            },
        ));

        let state = self.state.clone();
        scope.route([Route::get("/status", move || {
            let state = state.clone();
            async move { Json(state.report()) }
        })
        .without_auth()])
    }
}
