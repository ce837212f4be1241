// observability/tracing_setup.rs - Tracing Configuration

//! Log output for the trust engine.
//!
//! Everything goes to stderr so command output on stdout stays
//! machine-readable. The filter comes from `RUST_LOG` when set, otherwise
//! from the `[logging]` settings section.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{
    filter::ParseError, fmt, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError,
    EnvFilter, Layer, Registry,
};

/// Filter used when `--verbose` is given
const VERBOSE_FILTER: &str = "debug,peer_trust=trace";

/// Log line layout
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TracingFormat {
    #[default]
    Pretty,
    Compact,
    /// One JSON object per line, never colored
    Json,
}

/// The `[logging]` settings section
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    /// `EnvFilter` directives, e.g. `"info,peer_trust=debug"`
    pub filter: String,

    pub format: TracingFormat,

    /// ANSI colors for the text formats
    pub color: bool,

    /// Include file and line of each event
    pub source_location: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            filter: "info,peer_trust=debug".into(),
            format: TracingFormat::Pretty,
            color: true,
            source_location: false,
        }
    }
}

/// Errors from installing the subscriber
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] ParseError),

    #[error("tracing already initialized: {0}")]
    AlreadyInitialized(#[from] TryInitError),
}

impl TracingConfig {
    /// Raise the filter to trace level for this crate and add source locations
    pub fn verbose(mut self, verbose: bool) -> Self {
        if verbose {
            self.filter = VERBOSE_FILTER.into();
            self.source_location = true;
        }
        self
    }

    /// Parse the configured filter directives
    pub fn env_filter(&self) -> Result<EnvFilter, ParseError> {
        EnvFilter::try_new(&self.filter)
    }

    fn fmt_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_file(self.source_location)
            .with_line_number(self.source_location);

        match self.format {
            TracingFormat::Pretty => layer.with_ansi(self.color).boxed(),
            TracingFormat::Compact => layer.compact().with_ansi(self.color).boxed(),
            TracingFormat::Json => layer.json().with_ansi(false).boxed(),
        }
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over the configured filter.
pub fn init_tracing(config: &TracingConfig) -> Result<(), TracingError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => config.env_filter()?,
    };

    tracing_subscriber::registry()
        .with(config.fmt_layer())
        .with(env_filter)
        .try_init()?;

    tracing::debug!(filter = %config.filter, format = ?config.format, "Tracing initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_section_from_config_text() {
        let config: TracingConfig =
            serde_json::from_str(r#"{"format": "json", "filter": "peer_trust=trace"}"#).unwrap();
        assert_eq!(config.format, TracingFormat::Json);
        assert_eq!(config.filter, "peer_trust=trace");
        assert!(config.color);
        assert!(!config.source_location);
    }

    #[test]
    fn test_verbose_overrides_filter() {
        let quiet = TracingConfig::default().verbose(false);
        assert_eq!(quiet, TracingConfig::default());

        let loud = TracingConfig {
            format: TracingFormat::Compact,
            ..Default::default()
        }
        .verbose(true);
        assert_eq!(loud.filter, VERBOSE_FILTER);
        assert!(loud.source_location);
        assert_eq!(loud.format, TracingFormat::Compact);
    }

    #[test]
    fn test_filter_parsing() {
        assert!(TracingConfig::default().env_filter().is_ok());

        let broken = TracingConfig {
            filter: "peer_trust=loudest".into(),
            ..Default::default()
        };
        assert!(broken.env_filter().is_err());
    }
}
