//! JSONL logging with OpenTelemetry support for the ErrorLog service
//!
//! This crate sets up the `tracing` subscriber used by the error-log
//! server and its command line tools.
//!
//! # Features
//!
//! - **JSONL Output**: Structured JSON lines format for log aggregation (default)
//! - **Pretty Output**: Human-readable console output for development and CLIs
//! - **OpenTelemetry Integration**: Span export over OTLP
//! - **File Rotation**: Daily/hourly log rotation via tracing-appender
//! - **Standard Names**: Shared span names, see [`spans`]
//!
//! # Quick Start
//!
//! ```ignore
//! use errorlog_logging::{ErrorLogSubscriberBuilder, LogConfig};
//!
//! // Simple setup with defaults (JSONL to console)
//! let _guard = ErrorLogSubscriberBuilder::new().init();
//!
//! // Development mode with pretty human-readable output
//! let _guard = ErrorLogSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init();
//! ```

pub mod config;
mod names;
pub mod otel;

pub use config::{
    ConsoleConfig, ConsoleFormat, DIAGNOSTICS_DIR, FileConfig, FilterConfig, JsonlConfig,
    LogConfig, OtelConfig, RotationStrategy,
};
pub use names::spans;
pub use tracing_appender::non_blocking::WorkerGuard;

use std::fs::{self, File};

use thiserror::Error;
use tracing_appender::non_blocking::NonBlocking;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Registry with the global level filter applied
pub type BaseSubscriber = Layered<EnvFilter, Registry>;

/// A type-erased output layer
pub type BoxedLayer = Box<dyn Layer<BaseSubscriber> + Send + Sync + 'static>;

/// The subscriber assembled by [`ErrorLogSubscriberBuilder::build`]
pub type ErrorLogSubscriber = Layered<Vec<BoxedLayer>, BaseSubscriber>;

/// Errors from setting up logging
#[derive(Debug, Error)]
pub enum LoggingError {
    /// Failed to create a log directory or file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create the rolling file appender
    #[error("Appender error: {0}")]
    Appender(String),

    /// Invalid filter directive
    #[error("Invalid filter: {0}")]
    Filter(String),

    /// A global subscriber was already installed
    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Builder for configuring and initializing the ErrorLog logging subscriber
///
/// By default, console output uses JSONL format. Use `LogConfig::development()`
/// for human-readable pretty output during development.
pub struct ErrorLogSubscriberBuilder {
    config: LogConfig,
}

impl ErrorLogSubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    ///
    /// Default: JSONL output to console
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    /// Enable OpenTelemetry with the given configuration
    pub fn with_opentelemetry(mut self, config: OtelConfig) -> Self {
        self.config.otel = config;
        self.config.otel.enabled = true;
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Assemble the subscriber without installing it
    ///
    /// The returned guard, if any, flushes file output when dropped and must
    /// be kept alive as long as the subscriber is in use.
    pub fn build(self) -> Result<(ErrorLogSubscriber, Option<WorkerGuard>), LoggingError> {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(self.config.filter_directives())
                .map_err(|e| LoggingError::Filter(e.to_string()))?,
        };

        let mut layers: Vec<BoxedLayer> = Vec::new();
        let mut guard = None;

        if self.config.console.enabled {
            layers.push(self.console_layer()?);
        }

        if let Some(file_config) = &self.config.file {
            let (writer, file_guard) = create_file_writer(file_config)?;
            guard = Some(file_guard);
            layers.push(self.jsonl_layer(writer));
        }

        if self.config.otel.enabled {
            match otel::init_otel_layer::<BaseSubscriber>(&self.config.otel) {
                Ok(otel_layer) => layers.push(otel_layer.boxed()),
                Err(e) => {
                    // No subscriber is installed yet to report this through
                    eprintln!("Warning: Failed to initialize OpenTelemetry: {}", e);
                }
            }
        }

        let subscriber = Registry::default().with(env_filter).with(layers);
        Ok((subscriber, guard))
    }

    fn console_layer(&self) -> Result<BoxedLayer, LoggingError> {
        let console = &self.config.console;
        let layer: BoxedLayer = match console.format {
            ConsoleFormat::Pretty => tracing_subscriber::fmt::layer()
                .with_ansi(console.ansi)
                .with_target(true)
                .with_writer(std::io::stderr)
                .boxed(),
            ConsoleFormat::Json => self.jsonl_layer(std::io::stderr),
        };

        match &console.level {
            Some(level) => {
                let filter =
                    EnvFilter::try_new(level).map_err(|e| LoggingError::Filter(e.to_string()))?;
                Ok(layer.with_filter(filter).boxed())
            }
            None => Ok(layer),
        }
    }

    fn jsonl_layer<W>(&self, writer: W) -> BoxedLayer
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let jsonl = &self.config.jsonl;
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(jsonl.include_current_span)
            .with_span_list(jsonl.include_spans)
            .flatten_event(jsonl.flatten_events)
            .with_file(jsonl.include_location)
            .with_line_number(jsonl.include_location)
            .with_thread_ids(jsonl.include_thread_info)
            .with_thread_names(jsonl.include_thread_info)
            .with_ansi(false)
            .with_writer(writer)
            .boxed()
    }

    /// Initialize the subscriber globally
    ///
    /// Returns a guard that must be kept alive for the duration of the
    /// program when file output is enabled. Setup failures are reported on
    /// stderr and leave logging disabled.
    pub fn init(self) -> Option<WorkerGuard> {
        match self.try_init() {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("Warning: Failed to initialize logging: {}", e);
                None
            }
        }
    }

    /// Try to initialize the subscriber globally
    ///
    /// Returns an error if a global subscriber has already been set.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let (subscriber, guard) = self.build()?;
        subscriber
            .try_init()
            .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;
        Ok(guard)
    }
}

impl Default for ErrorLogSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Create the writer for file output
///
/// `Never` truncates a single file; the other strategies append to
/// rolling files named `<prefix>.<date>.log`.
fn create_file_writer(
    file_config: &FileConfig,
) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    fs::create_dir_all(&file_config.directory)?;

    let rotation = match file_config.rotation {
        RotationStrategy::Never => {
            let file_path = file_config
                .directory
                .join(format!("{}.log", file_config.prefix));
            let file = File::create(&file_path)?;
            return Ok(tracing_appender::non_blocking(file));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(&file_config.prefix)
        .filename_suffix("log");
    if let Some(max) = file_config.max_files {
        builder = builder.max_log_files(max);
    }
    let appender = builder
        .build(&file_config.directory)
        .map_err(|e| LoggingError::Appender(e.to_string()))?;
    Ok(tracing_appender::non_blocking(appender))
}
