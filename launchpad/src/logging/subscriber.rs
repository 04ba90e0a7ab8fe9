//! Process diagnostics
//!
//! Installs the global `tracing` subscriber used for the crate's own
//! diagnostics (startup steps, auth failures, transport errors). This is
//! separate from the per-server [`LogChannel`](super::LogChannel)s, which never
//! touch global state.
//!
//! - Console output, pretty or JSON
//! - Optional daily rotating `server` file
//! - Optional daily rotating `security` file (target `"security"` only)

use std::fs;
use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, prelude::*};

/// Initialize the global subscriber.
///
/// `RUST_LOG` wins over `level` when set.
///
/// # Examples
/// ```no_run
/// // Development setup (console only)
/// launchpad::logging::init_logger("debug", false, None)?;
///
/// // Production setup (console + files)
/// launchpad::logging::init_logger("info", true, Some(std::path::Path::new("./logs")))?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn init_logger(level: &str, json_format: bool, log_dir: Option<&Path>) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console_layer = if json_format {
        fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    let file_layers = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;

            let server_log = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("server")
                .filename_suffix("log")
                .build(dir)?;
            let server_layer = fmt::layer()
                .json()
                .with_target(true)
                .with_writer(std::sync::Mutex::new(server_log))
                .with_filter(tracing_subscriber::filter::filter_fn(|meta| {
                    meta.target() != "security"
                }));

            let security_log = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("security")
                .filename_suffix("log")
                .build(dir)?;
            let security_layer = fmt::layer()
                .json()
                .with_target(true)
                .with_writer(std::sync::Mutex::new(security_log))
                .with_filter(tracing_subscriber::filter::filter_fn(|meta| {
                    meta.target() == "security"
                }));

            Some(server_layer.and_then(security_layer))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layers)
        .try_init()?;

    Ok(())
}

/// Security event helper, routed to the `security` target.
///
/// # Examples
/// ```ignore
/// security_log!(WARN, "auth_failed", path = "/orders", reason = "expired");
/// ```
#[macro_export]
macro_rules! security_log {
    (WARN, $event:expr, $($arg:tt)*) => {
        tracing::warn!(
            target: "security",
            event = $event,
            timestamp = chrono::Local::now().to_rfc3339(),
            $($arg)*
        );
    };
    (INFO, $event:expr, $($arg:tt)*) => {
        tracing::info!(
            target: "security",
            event = $event,
            timestamp = chrono::Local::now().to_rfc3339(),
            $($arg)*
        );
    };
}
