//! Subscriber assembly for the `[logging]` section.

use std::str::FromStr;

use tracing_subscriber::{
    EnvFilter, Layer, Registry, filter::Directive, fmt, layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::error::{TelemetryError, TelemetryResult};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, human oriented.
    #[default]
    Pretty,
    /// One line per event.
    Compact,
    /// One JSON object per event. Never colored.
    Json,
    /// The `tracing_subscriber` default layout.
    Full,
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            "full" => Ok(Self::Full),
            _ => Err(TelemetryError::UnknownFormat(s.to_owned())),
        }
    }
}

/// Stream the subscriber writes to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogTarget {
    /// Standard output.
    Stdout,
    /// Standard error.
    #[default]
    Stderr,
}

impl FromStr for LogTarget {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stdout" => Ok(Self::Stdout),
            "stderr" => Ok(Self::Stderr),
            _ => Err(TelemetryError::UnknownTarget(s.to_owned())),
        }
    }
}

/// Resolved logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Base level, e.g. `info`.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Output stream.
    pub target: LogTarget,
    /// Colored output (ignored for JSON).
    pub ansi: bool,
    /// Prefix each line with a timestamp.
    pub timestamps: bool,
    /// Per-target overrides such as `sigchain_verify=debug`.
    pub directives: Vec<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new("info")
    }
}

impl LogConfig {
    /// Pretty stderr output at `level`.
    #[must_use]
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            format: LogFormat::Pretty,
            target: LogTarget::Stderr,
            ansi: true,
            timestamps: true,
            directives: Vec::new(),
        }
    }

    /// Build from the `[logging]` section.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::UnknownFormat`] or
    /// [`TelemetryError::UnknownTarget`].
    #[cfg(feature = "config")]
    pub fn from_config(section: &sigchain_config::LoggingSection) -> TelemetryResult<Self> {
        Ok(Self {
            level: section.level.clone(),
            format: section.format.parse()?,
            target: section.target.parse()?,
            ansi: section.ansi,
            timestamps: true,
            directives: section.directives.clone(),
        })
    }

    /// Set the output format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Add a per-target override.
    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    /// Drop timestamps, e.g. when a supervisor adds its own.
    #[must_use]
    pub fn without_timestamps(mut self) -> Self {
        self.timestamps = false;
        self
    }

    /// Disable ANSI colors.
    #[must_use]
    pub fn without_ansi(mut self) -> Self {
        self.ansi = false;
        self
    }

    fn filter(&self) -> TelemetryResult<EnvFilter> {
        let invalid = |e: &dyn std::fmt::Display| TelemetryError::InvalidFilter(e.to_string());
        let mut filter = EnvFilter::try_new(&self.level).map_err(|e| invalid(&e))?;
        for directive in &self.directives {
            let directive: Directive = directive.parse().map_err(|e| invalid(&e))?;
            filter = filter.add_directive(directive);
        }
        Ok(filter)
    }

    fn layer<W>(&self, writer: W) -> BoxedLayer
    where
        W: for<'a> fmt::MakeWriter<'a> + Send + Sync + 'static,
    {
        let ansi = self.ansi && self.format != LogFormat::Json;
        let base = fmt::layer().with_writer(writer).with_ansi(ansi);
        match (self.format, self.timestamps) {
            (LogFormat::Pretty, true) => base.pretty().boxed(),
            (LogFormat::Pretty, false) => base.pretty().without_time().boxed(),
            (LogFormat::Compact, true) => base.compact().boxed(),
            (LogFormat::Compact, false) => base.compact().without_time().boxed(),
            (LogFormat::Json, true) => base.json().boxed(),
            (LogFormat::Json, false) => base.json().without_time().boxed(),
            (LogFormat::Full, true) => base.boxed(),
            (LogFormat::Full, false) => base.without_time().boxed(),
        }
    }
}

/// Install the global subscriber described by `config`.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidFilter`] for a bad level or directive,
/// or [`TelemetryError::AlreadyInitialized`] if a subscriber is installed.
pub fn setup_logging(config: &LogConfig) -> TelemetryResult<()> {
    let filter = config.filter()?;
    let layer = match config.target {
        LogTarget::Stdout => config.layer(std::io::stdout),
        LogTarget::Stderr => config.layer(std::io::stderr),
    };
    tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .try_init()
        .map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))
}
