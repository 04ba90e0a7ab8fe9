use std::fmt;
use std::sync::Arc;

use tracing::Level;

use super::transport::{LogEntry, Transport};

/// The three well-known logging channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Application,
    Trace,
    Activity,
}

impl ChannelKind {
    /// Label used in error messages ("Default logger has no transports").
    pub fn label(self) -> &'static str {
        match self {
            ChannelKind::Application => "Default",
            ChannelKind::Trace => "Trace",
            ChannelKind::Activity => "Activity",
        }
    }

    /// File prefix and channel tag written with every entry.
    pub fn file_stem(self) -> &'static str {
        match self {
            ChannelKind::Application => "app",
            ChannelKind::Trace => "trace",
            ChannelKind::Activity => "activity",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_stem())
    }
}

/// A transport together with the level it was resolved to.
#[derive(Debug, Clone)]
pub struct BoundTransport {
    transport: Arc<dyn Transport>,
    level: Level,
}

impl BoundTransport {
    pub fn new(transport: Arc<dyn Transport>, shared_level: Level) -> Self {
        let level = transport.level().unwrap_or(shared_level);
        Self { transport, level }
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn name(&self) -> &str {
        self.transport.name()
    }

    fn accepts(&self, level: Level) -> bool {
        // tracing orders TRACE > DEBUG > INFO > WARN > ERROR
        level <= self.level
    }
}

/// Named logger aggregating one or more transports.
#[derive(Debug)]
pub struct LogChannel {
    kind: ChannelKind,
    transports: Vec<BoundTransport>,
}

impl LogChannel {
    pub(crate) fn new(kind: ChannelKind, transports: Vec<BoundTransport>) -> Self {
        Self { kind, transports }
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn transports(&self) -> &[BoundTransport] {
        &self.transports
    }

    /// Write to every transport whose level admits `level`.
    ///
    /// Never fails: a transport error is reported through `tracing` and the
    /// remaining transports still receive the entry.
    pub fn log(&self, level: Level, message: impl Into<String>) {
        let entry = LogEntry::new(self.kind.file_stem(), level, message);
        for bound in self.transports.iter().filter(|t| t.accepts(level)) {
            if let Err(e) = bound.transport.write(&entry) {
                tracing::warn!(
                    channel = %self.kind,
                    transport = bound.name(),
                    error = %e,
                    "Log transport write failed"
                );
            }
        }
    }

    pub fn trace(&self, message: impl Into<String>) {
        self.log(Level::TRACE, message);
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(Level::DEBUG, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(Level::INFO, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(Level::WARN, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(Level::ERROR, message);
    }
}

/// The three channels as stored in the server state.
#[derive(Debug, Clone)]
pub struct Loggers {
    pub logger: Arc<LogChannel>,
    pub trace_logger: Arc<LogChannel>,
    pub activity_logger: Arc<LogChannel>,
}

impl Loggers {
    pub fn channel(&self, kind: ChannelKind) -> &Arc<LogChannel> {
        match kind {
            ChannelKind::Application => &self.logger,
            ChannelKind::Trace => &self.trace_logger,
            ChannelKind::Activity => &self.activity_logger,
        }
    }
}
