//! Logging channels
//!
//! - [`build_loggers`] - application / trace / activity channels per server
//! - [`Transport`] - output sink contract, with [`FileTransport`] and
//!   [`ConsoleTransport`] built in
//! - [`init_logger`] - global `tracing` subscriber for process diagnostics

mod channel;
mod factory;
mod subscriber;
mod transport;

pub use channel::{BoundTransport, ChannelKind, LogChannel, Loggers};
pub use factory::build_loggers;
pub use subscriber::init_logger;
pub use transport::{ConsoleTransport, FileTransport, LogEntry, Transport};
