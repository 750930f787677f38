//! Configuration types for the logging system
//!
//! [`LogConfig`] has presets for the three ways the error-log binaries run:
//! [`LogConfig::server`] for the long-running service,
//! [`LogConfig::cli`] for the inspection tool and
//! [`LogConfig::testing`] for test suites.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Sub-directory of the error-log directory holding the service's own diagnostics
pub const DIAGNOSTICS_DIR: &str = "diagnostics";

/// Main logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default level, overridden by `RUST_LOG` when set
    pub default_level: String,
    pub console: ConsoleConfig,
    /// JSONL file output, disabled if `None`
    pub file: Option<FileConfig>,
    pub jsonl: JsonlConfig,
    pub filters: FilterConfig,
    pub otel: OtelConfig,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_level: "info".to_string(),
            console: ConsoleConfig::default(),
            file: None,
            jsonl: JsonlConfig::default(),
            filters: FilterConfig::default(),
            otel: OtelConfig::default(),
        }
    }
}

impl LogConfig {
    /// Verbose human-readable console output
    pub fn development() -> Self {
        Self {
            default_level: "debug".to_string(),
            console: ConsoleConfig::pretty(Some("debug")),
            ..Default::default()
        }
    }

    /// The long-running service
    ///
    /// Diagnostics go to daily JSONL files under
    /// `<log_dir>/diagnostics`, next to the error logs themselves, and
    /// spans are exported over OTLP as configured by the environment.
    /// Warnings are also echoed to the console.
    pub fn server(log_dir: impl AsRef<Path>) -> Self {
        Self {
            default_level: "info".to_string(),
            console: ConsoleConfig {
                level: Some("warn".to_string()),
                ..ConsoleConfig::default()
            },
            file: Some(
                FileConfig::new(log_dir.as_ref().join(DIAGNOSTICS_DIR))
                    .with_prefix("errorlog-server")
                    .with_max_files(30),
            ),
            otel: OtelConfig {
                enabled: true,
                ..OtelConfig::from_env()
            },
            ..Default::default()
        }
        .with_target("h2", "warn")
        .with_target("tonic", "warn")
    }

    /// Minimal output for test suites
    pub fn testing() -> Self {
        Self {
            default_level: "warn".to_string(),
            console: ConsoleConfig {
                level: Some("warn".to_string()),
                ..ConsoleConfig::default()
            },
            ..Default::default()
        }
    }

    /// Command line tools: human-readable output on stderr only
    pub fn cli(level: impl Into<String>) -> Self {
        let level = level.into();
        Self {
            console: ConsoleConfig::pretty(Some(&level)),
            default_level: level,
            ..Default::default()
        }
    }

    /// Set the default level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.default_level = level.into();
        self
    }

    /// Override the level of one target, e.g. `errorlog_storage=debug`
    pub fn with_target(mut self, target: impl Into<String>, level: impl Into<String>) -> Self {
        self.filters.targets.insert(target.into(), level.into());
        self
    }

    /// Env-filter directives for this configuration
    ///
    /// The default level comes first, then excluded crates (turned off),
    /// then per-target overrides.
    pub fn filter_directives(&self) -> String {
        let mut directives = vec![self.default_level.clone()];
        for krate in &self.filters.exclude_crates {
            directives.push(format!("{}=off", krate));
        }
        for (target, level) in &self.filters.targets {
            directives.push(format!("{}={}", target, level));
        }
        directives.join(",")
    }
}

/// How console output is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ConsoleFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Human-readable, multi-line
    Pretty,
}

/// Console output, always written to stderr
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    pub enabled: bool,
    pub format: ConsoleFormat,
    /// ANSI colors, only used by [`ConsoleFormat::Pretty`]
    pub ansi: bool,
    /// Extra level filter for the console only
    pub level: Option<String>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            format: ConsoleFormat::Json,
            ansi: false,
            level: None,
        }
    }
}

impl ConsoleConfig {
    /// Pretty output with colors
    pub fn pretty(level: Option<&str>) -> Self {
        Self {
            enabled: true,
            format: ConsoleFormat::Pretty,
            ansi: true,
            level: level.map(str::to_string),
        }
    }
}

/// JSONL file output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub directory: PathBuf,
    /// File name prefix; files are named `<prefix>.<date>.log`
    pub prefix: String,
    pub rotation: RotationStrategy,
    /// Rotated files to keep, unlimited if `None`
    pub max_files: Option<usize>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./logs"),
            prefix: "errorlog".to_string(),
            rotation: RotationStrategy::Daily,
            max_files: Some(7),
        }
    }
}

impl FileConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Default::default()
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_rotation(mut self, rotation: RotationStrategy) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = Some(max_files);
        self
    }
}

/// File rotation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RotationStrategy {
    #[default]
    Daily,
    Hourly,
    /// A single file, truncated when logging starts
    Never,
}

/// Shape of each JSON line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonlConfig {
    /// Put event fields at the top level instead of under `fields`
    pub flatten_events: bool,
    /// Include the list of entered spans
    pub include_spans: bool,
    pub include_current_span: bool,
    pub include_thread_info: bool,
    /// Include source file and line
    pub include_location: bool,
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self {
            flatten_events: true,
            include_spans: true,
            include_current_span: true,
            include_thread_info: false,
            include_location: true,
        }
    }
}

/// Filtering configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Crates to silence entirely
    pub exclude_crates: Vec<String>,
    /// Per-target levels
    pub targets: BTreeMap<String, String>,
}

/// OpenTelemetry span export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtelConfig {
    pub enabled: bool,
    /// OTLP gRPC endpoint
    pub endpoint: String,
    pub service_name: String,
    /// Fraction of traces kept, 0.0 to 1.0
    pub sample_ratio: f64,
    /// Added to the exported resource
    pub resource_attributes: BTreeMap<String, String>,
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "http://localhost:4317".to_string(),
            service_name: "errorlog-server".to_string(),
            sample_ratio: 1.0,
            resource_attributes: BTreeMap::new(),
        }
    }
}

impl OtelConfig {
    /// Defaults overridden by the standard `OTEL_*` environment variables
    ///
    /// Reads `OTEL_EXPORTER_OTLP_ENDPOINT`, `OTEL_SERVICE_NAME` and
    /// `OTEL_TRACES_SAMPLER_ARG`. The result is not enabled.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(endpoint) = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
            config.endpoint = endpoint;
        }
        if let Ok(name) = std::env::var("OTEL_SERVICE_NAME") {
            config.service_name = name;
        }
        if let Some(ratio) = std::env::var("OTEL_TRACES_SAMPLER_ARG")
            .ok()
            .and_then(|r| r.parse::<f64>().ok())
        {
            config = config.with_sample_ratio(ratio);
        }
        config
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Set the sample ratio, clamped to `0.0..=1.0`
    pub fn with_sample_ratio(mut self, ratio: f64) -> Self {
        self.sample_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.resource_attributes.insert(key.into(), value.into());
        self
    }
}
