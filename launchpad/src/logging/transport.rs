//! Log transports
//!
//! A transport is an output sink for [`LogEntry`] values. Each transport
//! serializes its own writes, so a single instance can be shared by every
//! request handled concurrently.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

/// One log record as handed to every transport of a channel.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub channel: &'static str,
    pub message: String,
}

impl LogEntry {
    pub fn new(channel: &'static str, level: Level, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            channel,
            message: message.into(),
        }
    }

    /// `{"timestamp":..,"level":..,"channel":..,"message":..}`
    pub fn to_json_line(&self) -> String {
        #[derive(Serialize)]
        struct Line<'a> {
            timestamp: String,
            level: &'a str,
            channel: &'a str,
            message: &'a str,
        }

        let line = Line {
            timestamp: self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            level: level_name(self.level),
            channel: self.channel,
            message: &self.message,
        };
        serde_json::to_string(&line).unwrap_or_else(|_| self.to_text_line())
    }

    /// `2024-01-01T00:00:00.000Z DEBUG [trace] message`
    pub fn to_text_line(&self) -> String {
        format!(
            "{} {:>5} [{}] {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.level,
            self.channel,
            self.message
        )
    }
}

pub(crate) fn level_name(level: Level) -> &'static str {
    match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    }
}

/// Output sink contract.
pub trait Transport: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Own threshold. `None` means the channel's shared level applies.
    fn level(&self) -> Option<Level> {
        None
    }

    fn write(&self, entry: &LogEntry) -> std::io::Result<()>;
}

/// Daily rotating file transport.
///
/// Writes `{dir}/{prefix}.YYYY-MM-DD.log`, creating the directory tree.
pub struct FileTransport {
    name: String,
    path: PathBuf,
    level: Option<Level>,
    json: bool,
    appender: Mutex<RollingFileAppender>,
}

impl FileTransport {
    pub fn daily(dir: &Path, prefix: &str, json: bool) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;

        let appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(prefix)
            .filename_suffix("log")
            .build(dir)
            .map_err(std::io::Error::other)?;

        Ok(Self {
            name: format!("file:{prefix}"),
            path: dir.to_path_buf(),
            level: None,
            json,
            appender: Mutex::new(appender),
        })
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    pub fn directory(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for FileTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileTransport")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("level", &self.level)
            .field("json", &self.json)
            .finish()
    }
}

impl Transport for FileTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn level(&self) -> Option<Level> {
        self.level
    }

    fn write(&self, entry: &LogEntry) -> std::io::Result<()> {
        let line = if self.json {
            entry.to_json_line()
        } else {
            entry.to_text_line()
        };
        let mut appender = self.appender.lock();
        writeln!(appender, "{line}")?;
        appender.flush()
    }
}

/// Human-readable stdout transport.
#[derive(Debug, Default)]
pub struct ConsoleTransport {
    level: Option<Level>,
}

impl ConsoleTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }
}

impl Transport for ConsoleTransport {
    fn name(&self) -> &str {
        "console"
    }

    fn level(&self) -> Option<Level> {
        self.level
    }

    fn write(&self, entry: &LogEntry) -> std::io::Result<()> {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        writeln!(out, "{}", entry.to_text_line())
    }
}
