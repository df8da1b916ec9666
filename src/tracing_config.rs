//! Tracing configuration for the Lambda binary
//!
//! The library only emits events; the binary installs a subscriber once at
//! cold start. Lambda forwards stdout to CloudWatch, so JSON lines with
//! flattened fields are the default: every event becomes one queryable record.

use crate::error::{BgRemovalError, Result};
use std::str::FromStr;
use tracing_subscriber::{
    filter::Directive, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry,
};

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info";

/// Target of the per-invocation timing record, kept at `info` under any filter
pub const TELEMETRY_TARGET: &str = "telemetry";

/// Configuration for tracing output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    /// One JSON object per line, event fields flattened to the top level
    Json,
    /// Compact single-line text, for local runs
    Compact,
}

impl FromStr for TracingFormat {
    type Err = BgRemovalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "compact" | "text" => Ok(Self::Compact),
            other => Err(BgRemovalError::config_value_error(
                crate::config::ENV_LOG_FORMAT,
                other,
                "json or compact",
            )),
        }
    }
}

/// Tracing configuration builder
#[derive(Debug)]
pub struct TracingConfig {
    /// Output format
    pub format: TracingFormat,
    /// Environment filter string (falls back to `RUST_LOG`, then `info`)
    pub env_filter: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            format: TracingFormat::Json,
            env_filter: None,
        }
    }
}

impl TracingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set output format
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    /// Set custom environment filter
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Filter from the configured directives, `RUST_LOG` or [`DEFAULT_FILTER`]
    ///
    /// The telemetry target is always enabled at `info`.
    pub fn build_filter(&self) -> anyhow::Result<EnvFilter> {
        let filter = match &self.env_filter {
            Some(directives) => EnvFilter::try_new(directives)?,
            None => EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))?,
        };
        let telemetry: Directive = format!("{TELEMETRY_TARGET}=info").parse()?;
        Ok(filter.add_directive(telemetry))
    }

    /// Initialize the global tracing subscriber
    ///
    /// `log` records emitted by the inference backends are bridged into the
    /// same output.
    pub fn init(self) -> anyhow::Result<()> {
        use tracing_subscriber::fmt;

        let registry = Registry::default().with(self.build_filter()?);

        match self.format {
            TracingFormat::Json => {
                let fmt_layer = fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(false)
                    .with_span_list(false)
                    .with_target(false)
                    .without_time();

                registry.with(fmt_layer).try_init()?;
            },
            TracingFormat::Compact => {
                let fmt_layer = fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .compact();

                registry.with(fmt_layer).try_init()?;
            },
        }

        tracing::debug!(format = ?self.format, "tracing initialized");
        Ok(())
    }
}
