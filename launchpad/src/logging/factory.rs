//! Channel assembly from the merged configuration.

use std::str::FromStr;
use std::sync::Arc;

use tracing::Level;

use super::channel::{BoundTransport, ChannelKind, LogChannel, Loggers};
use super::transport::{ConsoleTransport, FileTransport, Transport};
use crate::core::{Config, Result, ServerError};

/// Build the application, trace and activity channels.
///
/// Per channel the transport list is the caller's extra transports followed by
/// the enabled built-ins (file then console for the application channel, file
/// only for trace and activity). Every channel is checked for emptiness on
/// every call.
pub fn build_loggers(config: &Config) -> Result<Loggers> {
    let level = Level::from_str(&config.log_level)
        .map_err(|_| ServerError::InvalidLogLevel(config.log_level.clone()))?;

    let logger = build_channel(
        config,
        ChannelKind::Application,
        level,
        &config.log_additional_logger_transports,
        config.log_default_file_transport,
        config.log_default_console_transport,
    )?;
    let trace_logger = build_channel(
        config,
        ChannelKind::Trace,
        level,
        &config.log_additional_trace_transports,
        config.log_default_trace_transport,
        false,
    )?;
    let activity_logger = build_channel(
        config,
        ChannelKind::Activity,
        level,
        &config.log_additional_activity_transports,
        config.log_default_activity_transport,
        false,
    )?;

    Ok(Loggers {
        logger: Arc::new(logger),
        trace_logger: Arc::new(trace_logger),
        activity_logger: Arc::new(activity_logger),
    })
}

fn build_channel(
    config: &Config,
    kind: ChannelKind,
    level: Level,
    extra: &[Arc<dyn Transport>],
    file: bool,
    console: bool,
) -> Result<LogChannel> {
    let mut transports: Vec<Arc<dyn Transport>> = extra.to_vec();

    if file {
        let transport =
            FileTransport::daily(&config.log_directory, kind.file_stem(), config.log_json)
                .map_err(ServerError::Logging)?;
        transports.push(Arc::new(transport));
    }

    if console {
        transports.push(Arc::new(ConsoleTransport::new()));
    }

    if transports.is_empty() {
        return Err(ServerError::EmptyChannel(kind));
    }

    tracing::debug!(
        channel = %kind,
        transports = transports.len(),
        "Logging channel assembled"
    );

    Ok(LogChannel::new(
        kind,
        transports
            .into_iter()
            .map(|t| BoundTransport::new(t, level))
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PartialConfig;
    use crate::logging::LogEntry;

    #[derive(Debug)]
    struct Null;

    impl Transport for Null {
        fn name(&self) -> &str {
            "null"
        }

        fn write(&self, _entry: &LogEntry) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn config_in(dir: &tempfile::TempDir, partial: PartialConfig) -> Config {
        Config::from_partial(PartialConfig {
            log_directory: Some(dir.path().to_path_buf()),
            ..partial
        })
    }

    #[test]
    fn test_default_transport_counts() {
        let dir = tempfile::tempdir().unwrap();
        let loggers = build_loggers(&config_in(&dir, PartialConfig::default())).unwrap();

        assert_eq!(loggers.logger.transports().len(), 2);
        assert_eq!(loggers.trace_logger.transports().len(), 1);
        assert_eq!(loggers.activity_logger.transports().len(), 1);
        assert_eq!(loggers.logger.transports()[0].name(), "file:app");
        assert_eq!(loggers.logger.transports()[1].name(), "console");
    }

    #[test]
    fn test_extras_come_first() {
        let dir = tempfile::tempdir().unwrap();
        let partial = PartialConfig::default().additional_trace_transport(Null);
        let loggers = build_loggers(&config_in(&dir, partial)).unwrap();

        let names: Vec<_> = loggers
            .trace_logger
            .transports()
            .iter()
            .map(|t| t.name().to_string())
            .collect();
        assert_eq!(names, vec!["null", "file:trace"]);
    }

    #[test]
    fn test_empty_channels_are_rejected() {
        let dir = tempfile::tempdir().unwrap();

        let err = build_loggers(&config_in(
            &dir,
            PartialConfig {
                log_default_file_transport: Some(false),
                log_default_console_transport: Some(false),
                ..Default::default()
            },
        ))
        .unwrap_err();
        assert_eq!(err.to_string(), "Default logger has no transports");

        let err = build_loggers(&config_in(
            &dir,
            PartialConfig {
                log_default_trace_transport: Some(false),
                ..Default::default()
            },
        ))
        .unwrap_err();
        assert_eq!(err.to_string(), "Trace logger has no transports");

        let err = build_loggers(&config_in(
            &dir,
            PartialConfig {
                log_default_activity_transport: Some(false),
                ..Default::default()
            },
        ))
        .unwrap_err();
        assert_eq!(err.to_string(), "Activity logger has no transports");
    }

    #[test]
    fn test_replacement_transport_satisfies_channel() {
        let dir = tempfile::tempdir().unwrap();
        let partial = PartialConfig {
            log_default_activity_transport: Some(false),
            ..Default::default()
        }
        .additional_activity_transport(Null);

        let loggers = build_loggers(&config_in(&dir, partial)).unwrap();
        assert_eq!(loggers.activity_logger.transports().len(), 1);
    }

    #[test]
    fn test_levels() {
        let dir = tempfile::tempdir().unwrap();
        let loggers = build_loggers(&config_in(&dir, PartialConfig::default())).unwrap();
        assert_eq!(loggers.logger.transports()[0].level(), Level::DEBUG);

        let loggers = build_loggers(&config_in(
            &dir,
            PartialConfig {
                log_level: Some("warn".into()),
                ..Default::default()
            },
        ))
        .unwrap();
        assert_eq!(loggers.logger.transports()[0].level(), Level::WARN);

        let err = build_loggers(&config_in(
            &dir,
            PartialConfig {
                log_level: Some("loud".into()),
                ..Default::default()
            },
        ))
        .unwrap_err();
        assert!(matches!(err, ServerError::InvalidLogLevel(level) if level == "loud"));
    }
}
