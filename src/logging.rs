use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

use crate::config::LogSettings;
use crate::error::{SigilError, SigilResult};

/// Logging configuration for the scanner
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub log_dir: PathBuf,
    pub enable_file_logging: bool,
    pub enable_json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: PathBuf::from("logs"),
            enable_file_logging: false,
            enable_json_format: false,
        }
    }
}

impl From<&LogSettings> for LoggingConfig {
    fn from(settings: &LogSettings) -> Self {
        Self {
            level: settings.level.clone(),
            log_dir: settings.log_dir.clone(),
            enable_file_logging: settings.enable_file_logging,
            enable_json_format: settings.enable_json_format,
        }
    }
}

/// Initialize the logging system. Keep the returned guard alive for the
/// lifetime of the process or buffered file logs are lost.
pub fn init_logging(config: &LoggingConfig) -> SigilResult<Option<WorkerGuard>> {
    if config.enable_file_logging {
        fs::create_dir_all(&config.log_dir)
            .map_err(|e| SigilError::file_io(config.log_dir.to_string_lossy().to_string(), e))?;
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("sigil_scanner={},sigil={},warn", config.level, config.level))
    });

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .compact()
        .boxed();

    let registry = Registry::default().with(env_filter).with(console_layer);

    let guard = if config.enable_file_logging {
        let file_appender = rolling::daily(&config.log_dir, "sigil-scanner.log");
        let (file_writer, guard) = non_blocking(file_appender);

        let file_layer = if config.enable_json_format {
            fmt::layer().json().with_writer(file_writer).boxed()
        } else {
            fmt::layer().with_writer(file_writer).with_ansi(false).boxed()
        };

        registry
            .with(file_layer)
            .try_init()
            .map_err(|e| SigilError::configuration(format!("logging already initialized: {}", e)))?;
        Some(guard)
    } else {
        registry
            .try_init()
            .map_err(|e| SigilError::configuration(format!("logging already initialized: {}", e)))?;
        None
    };

    info!("Logging initialized at level {}", config.level);
    if config.enable_file_logging {
        info!("File logging enabled: {}", config.log_dir.display());
    }

    Ok(guard)
}

/// Logs elapsed time for an operation when dropped
pub struct PerformanceTimer {
    start: std::time::Instant,
    operation: String,
}

impl PerformanceTimer {
    pub fn start(operation: impl Into<String>) -> Self {
        let operation = operation.into();
        tracing::debug!("Starting: {}", operation);
        Self {
            start: std::time::Instant::now(),
            operation,
        }
    }

    pub fn checkpoint(&self, checkpoint: &str) {
        let elapsed = self.start.elapsed();
        tracing::debug!("{} - {}: {}ms", self.operation, checkpoint, elapsed.as_millis());
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Drop for PerformanceTimer {
    fn drop(&mut self) {
        info!("Completed {}: {}ms", self.operation, self.start.elapsed().as_millis());
    }
}
