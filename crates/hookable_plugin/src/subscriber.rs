//! `tracing` subscriber setup for applications embedding a plugin system.
//!
//! Hooks, plugins, correlators, and debuggers log through `tracing`. Nothing
//! is printed until a subscriber is installed; [`TracingConfig`] installs a
//! `tracing-subscriber` registry with an [`EnvFilter`] and one of three
//! output formats.
//!
//! # Example
//!
//! ```ignore
//! use hookable_plugin::subscriber::{TracingConfig, TracingFormat};
//! use tracing::Level;
//! ```

use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Output layer installed on the registry, filtered by its own [`EnvFilter`].
type OutputLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

// ─────────────────────────────────────────────────────────────────────────────
// TracingFormat
// ─────────────────────────────────────────────────────────────────────────────

/// Tracing output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable colored output (default).
    #[default]
    Pretty,
    /// Compact single-line output.
    Compact,
    /// JSON structured output for log aggregation.
    Json,
}

// ─────────────────────────────────────────────────────────────────────────────
// TracingConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Subscriber configuration.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Maximum log level when no filter string is given.
    pub level: Level,
    /// Output format.
    pub format: TracingFormat,
    /// Target-specific filter, e.g. `"hookable_plugin=debug"`.
    pub env_filter: Option<String>,
    /// Whether to include span enter/exit events.
    pub span_events: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: TracingFormat::Pretty,
            env_filter: None,
            span_events: false,
        }
    }
}

impl TracingConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum log level.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Sets the output format.
    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets filter directives.
    ///
    /// Format: `target=level,target=level,...`. Directives are parsed
    /// leniently: unparsable ones are skipped, and [`level`](Self::level)
    /// stays the default directive.
    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Enables span enter/exit events in output.
    #[must_use]
    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    /// Installs the global subscriber.
    ///
    /// Returns `false` if a global subscriber was already installed, in which
    /// case this configuration is ignored.
    pub fn init(&self) -> bool {
        let installed = tracing_subscriber::registry()
            .with(self.output())
            .try_init()
            .is_ok();
        if installed {
            tracing::info!(level = %self.level, format = ?self.format, "tracing initialized");
        }
        installed
    }

    fn span_events(&self) -> FmtSpan {
        if self.span_events {
            FmtSpan::ENTER | FmtSpan::EXIT
        } else {
            FmtSpan::NONE
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::from_level(self.level).into())
            .parse_lossy(self.env_filter.as_deref().unwrap_or_default())
    }

    fn output(&self) -> OutputLayer {
        let layer = tracing_subscriber::fmt::layer().with_span_events(self.span_events());
        match self.format {
            TracingFormat::Pretty => layer.pretty().with_filter(self.filter()).boxed(),
            TracingFormat::Compact => layer.compact().with_filter(self.filter()).boxed(),
            TracingFormat::Json => layer.json().with_filter(self.filter()).boxed(),
        }
    }
}
