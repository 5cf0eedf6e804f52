use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    pub log_level: Option<String>,
    pub file_log: Option<bool>,
    pub log_dir: Option<String>,
    pub log_file: Option<String>,
}

impl LoggingConfig {
    /// Resolves the effective filter directive: explicit level, then
    /// `CRA_WATCH_LOG_LEVEL`, then `info`.
    pub fn level(&self) -> String {
        self.log_level
            .clone()
            .or_else(|| std::env::var("CRA_WATCH_LOG_LEVEL").ok())
            .unwrap_or_else(|| "info".to_string())
    }

    /// Builds the filter. An explicit level beats `RUST_LOG`, which beats
    /// `CRA_WATCH_LOG_LEVEL`.
    pub fn filter(&self) -> EnvFilter {
        self.log_level
            .as_deref()
            .ok_or(())
            .and_then(|level| EnvFilter::try_new(level).map_err(|_| ()))
            .or_else(|_| EnvFilter::try_from_default_env())
            .or_else(|_| EnvFilter::try_new(self.level()))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }

    /// File logging is off unless requested; the console is the primary sink
    /// for an operator watching the terminal.
    pub fn file_enabled(&self) -> bool {
        self.file_log.unwrap_or_else(|| {
            std::env::var("CRA_WATCH_FILE_LOG")
                .map(|v| v != "0")
                .unwrap_or(false)
        })
    }
}

pub fn init_logging(
    config: LoggingConfig,
) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    let filter = config.filter();

    if !config.file_enabled() {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .try_init()?;
        return Ok(None);
    }

    let log_dir = config
        .log_dir
        .or_else(|| std::env::var("CRA_WATCH_LOG_DIR").ok())
        .unwrap_or_else(|| "logs".to_string());
    let log_file = config
        .log_file
        .or_else(|| std::env::var("CRA_WATCH_LOG_FILE").ok())
        .unwrap_or_else(|| "cra-line-watch.log".to_string());
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking)
                .with_target(true),
        )
        .try_init()?;

    Ok(Some(guard))
}
