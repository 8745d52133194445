//! Tracing configuration and initialization.
//!
//! Provides structured logging with span-based context propagation.

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Configuration for tracing initialization.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Service name for identification
    pub service_name: String,
    /// Log level used when `RUST_LOG` is not set
    pub log_level: Level,
    /// Whether to include span events (new, close)
    pub include_span_events: bool,
    /// Whether to output in JSON format
    pub json_output: bool,
    /// Whether to include file and line numbers
    pub include_location: bool,
    /// Whether to include target (module path)
    pub include_target: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: "k8s-mcp".to_string(),
            log_level: Level::INFO,
            include_span_events: false,
            json_output: false,
            include_location: false,
            include_target: true,
        }
    }
}

impl TracingConfig {
    /// Create a new config with the given service name.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Set the log level.
    pub fn with_level(mut self, level: Level) -> Self {
        self.log_level = level;
        self
    }

    /// Enable JSON output format.
    pub fn with_json(mut self, json: bool) -> Self {
        self.json_output = json;
        self
    }

    /// Include span events in output.
    pub fn with_span_events(mut self, include: bool) -> Self {
        self.include_span_events = include;
        self
    }

    /// Build an EnvFilter from this config. `RUST_LOG` wins when set.
    fn build_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.log_level.to_string()))
    }
}

/// Parse a level name such as `"debug"` (case-insensitive).
pub fn parse_level(level: &str) -> Option<Level> {
    level.parse().ok()
}

/// Initialize tracing with the given configuration.
///
/// Logs are written to stderr. Returns `false` if a global subscriber was
/// already installed, which happens when several tests initialize tracing.
///
/// # Example
///
/// ```no_run
/// use observability::{init_tracing, TracingConfig};
/// use tracing::Level;
///
/// init_tracing(TracingConfig::new("k8s-mcp").with_level(Level::DEBUG));
/// ```
pub fn init_tracing(config: TracingConfig) -> bool {
    let filter = config.build_filter();

    let span_events = if config.include_span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let installed = if config.json_output {
        let fmt_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_span_events(span_events)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_target(config.include_target);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .is_ok()
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_span_events(span_events)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_target(config.include_target);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .is_ok()
    };

    if installed {
        tracing::info!(
            service = %config.service_name,
            level = %config.log_level,
            json = config.json_output,
            "Tracing initialized"
        );
    }
    installed
}

/// Create a span for a tool invocation.
#[macro_export]
macro_rules! tool_span {
    ($tool:expr) => {
        tracing::info_span!("tool_call", tool = %$tool)
    };
    ($tool:expr, $($field:tt)*) => {
        tracing::info_span!("tool_call", tool = %$tool, $($field)*)
    };
}
