use crate::error::ConfigError;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// File name prefix for the rolling log files.
const LOG_FILE_PREFIX: &str = "podium.log";

/// Logging options. `RUST_LOG`, when set, takes precedence over `level`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::Args))]
pub struct LogSettings {
    /// Default log filter, e.g. "info" or "database=debug".
    #[cfg_attr(feature = "clap", arg(long = "log-level", default_value = "info", global = true))]
    pub level: String,

    /// Also write logs to daily-rolling files in this directory.
    #[cfg_attr(feature = "clap", arg(long = "log-dir", global = true))]
    pub directory: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

impl LogSettings {
    fn filter(&self) -> Result<EnvFilter, ConfigError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(&self.level).map_err(|e| {
                ConfigError::ValidationError(format!("invalid log level '{}': {}", self.level, e))
            }),
        }
    }
}

/// Installs the global tracing subscriber.
///
/// Logs go to stderr; with a `directory` they are also written to a daily
/// rolling file. The returned guard flushes the file writer on drop and must
/// be held for the life of the program.
pub fn init(settings: &LogSettings) -> Result<Option<WorkerGuard>, ConfigError> {
    let filter = settings.filter()?;
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(true);
    let registry = tracing_subscriber::registry().with(filter).with(stderr_layer);

    match &settings.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .try_init()
                .map_err(|e| ConfigError::LoggingError(e.to_string()))?;
            Ok(Some(guard))
        }
        None => {
            registry
                .try_init()
                .map_err(|e| ConfigError::LoggingError(e.to_string()))?;
            Ok(None)
        }
    }
}
