//! Configuration types for the background removal function
//!
//! Configuration is read once per cold start from environment variables
//! (see [`AppConfig::from_env`]) and then shared by every invocation.

use crate::error::{BgRemovalError, Result};
use crate::models::ModelSpec;
use crate::tracing_config::TracingFormat;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

pub const ENV_MODEL_PATH: &str = "BGREMOVE_MODEL_PATH";
pub const ENV_MODEL_VARIANT: &str = "BGREMOVE_MODEL_VARIANT";
pub const ENV_BACKEND: &str = "BGREMOVE_BACKEND";
pub const ENV_EXECUTION_PROVIDER: &str = "BGREMOVE_EXECUTION_PROVIDER";
pub const ENV_INTRA_THREADS: &str = "BGREMOVE_INTRA_THREADS";
pub const ENV_INTER_THREADS: &str = "BGREMOVE_INTER_THREADS";
pub const ENV_OUTPUT_PREFIX: &str = "BGREMOVE_OUTPUT_PREFIX";
pub const ENV_MAX_INPUT_BYTES: &str = "BGREMOVE_MAX_INPUT_BYTES";
pub const ENV_MAX_IMAGE_DIMENSION: &str = "BGREMOVE_MAX_IMAGE_DIMENSION";
pub const ENV_LOG_FORMAT: &str = "BGREMOVE_LOG_FORMAT";

/// Model directory used when `BGREMOVE_MODEL_PATH` is unset (Lambda layer mount)
pub const DEFAULT_MODEL_PATH: &str = "/opt/models/isnet-general-onnx";
pub const DEFAULT_OUTPUT_PREFIX: &str = "processed/";
pub const DEFAULT_MAX_INPUT_BYTES: u64 = 32 * 1024 * 1024;
pub const DEFAULT_MAX_IMAGE_DIMENSION: u32 = 12_000;

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExecutionProvider {
    /// Use CUDA when available, CPU otherwise
    #[default]
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
        }
    }
}

impl FromStr for ExecutionProvider {
    type Err = BgRemovalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda),
            other => Err(BgRemovalError::config_value_error(
                ENV_EXECUTION_PROVIDER,
                other,
                "auto, cpu or cuda",
            )),
        }
    }
}

/// Inference engine selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BackendType {
    /// Tract backend (pure Rust, no external dependencies)
    #[default]
    Tract,
    /// ONNX Runtime backend
    Onnx,
}

impl BackendType {
    /// Whether support for this backend was compiled in
    #[must_use]
    pub fn is_enabled(self) -> bool {
        match self {
            Self::Tract => cfg!(feature = "tract"),
            Self::Onnx => cfg!(feature = "onnx"),
        }
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tract => write!(f, "tract"),
            Self::Onnx => write!(f, "onnx"),
        }
    }
}

impl FromStr for BackendType {
    type Err = BgRemovalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tract" => Ok(Self::Tract),
            "onnx" => Ok(Self::Onnx),
            other => Err(BgRemovalError::config_value_error(
                ENV_BACKEND,
                other,
                "tract or onnx",
            )),
        }
    }
}

/// Configuration for the model side of background removal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovalConfig {
    /// Model directory and variant
    pub model_spec: ModelSpec,

    /// Inference engine
    pub backend_type: BackendType,

    /// Execution provider for ONNX Runtime (ignored by Tract)
    pub execution_provider: ExecutionProvider,

    /// Number of intra-op threads for inference (0 = auto)
    pub intra_threads: usize,

    /// Number of inter-op threads for inference (0 = auto)
    pub inter_threads: usize,
}

impl Default for RemovalConfig {
    fn default() -> Self {
        Self {
            model_spec: ModelSpec::new(DEFAULT_MODEL_PATH),
            backend_type: BackendType::default(),
            execution_provider: ExecutionProvider::default(),
            intra_threads: 0,
            inter_threads: 0,
        }
    }
}

impl RemovalConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    /// ```rust
    /// use bgremove_lambda::config::{BackendType, RemovalConfig};
    ///
    /// # #[cfg(feature = "tract")]
    /// # {
    /// let config = RemovalConfig::builder()
    ///     .model_path("/opt/models/isnet-general-onnx")
    ///     .backend_type(BackendType::Tract)
    ///     .intra_threads(2)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.intra_threads, 2);
    /// # }
    /// ```
    #[must_use]
    pub fn builder() -> RemovalConfigBuilder {
        RemovalConfigBuilder::default()
    }

    /// Validate that the selected backend is available in this build
    ///
    /// # Errors
    /// - Backend feature not compiled in
    pub fn validate(&self) -> Result<()> {
        if !self.backend_type.is_enabled() {
            return Err(BgRemovalError::invalid_config(format!(
                "Backend '{}' is not enabled in this build (enable the '{}' feature)",
                self.backend_type, self.backend_type
            )));
        }
        Ok(())
    }
}

/// Builder for `RemovalConfig`
#[derive(Debug, Default)]
pub struct RemovalConfigBuilder {
    config: RemovalConfig,
}

impl RemovalConfigBuilder {
    #[must_use]
    pub fn model_spec(mut self, model_spec: ModelSpec) -> Self {
        self.config.model_spec = model_spec;
        self
    }

    #[must_use]
    pub fn model_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.model_spec.path = path.into();
        self
    }

    #[must_use]
    pub fn variant<S: Into<String>>(mut self, variant: S) -> Self {
        self.config.model_spec.variant = Some(variant.into());
        self
    }

    #[must_use]
    pub fn backend_type(mut self, backend_type: BackendType) -> Self {
        self.config.backend_type = backend_type;
        self
    }

    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.execution_provider = provider;
        self
    }

    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self
    }

    #[must_use]
    pub fn inter_threads(mut self, threads: usize) -> Self {
        self.config.inter_threads = threads;
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    /// - Backend feature not compiled in
    pub fn build(self) -> Result<RemovalConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration for the fetch/transform/store pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerConfig {
    /// Namespace prepended to the source file name to form the destination key
    pub output_prefix: String,

    /// Reject source objects larger than this many bytes (`None` = unbounded)
    pub max_input_bytes: Option<u64>,

    /// Reject images wider or taller than this many pixels (`None` = unbounded)
    pub max_image_dimension: Option<u32>,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            output_prefix: DEFAULT_OUTPUT_PREFIX.to_string(),
            max_input_bytes: Some(DEFAULT_MAX_INPUT_BYTES),
            max_image_dimension: Some(DEFAULT_MAX_IMAGE_DIMENSION),
        }
    }
}

impl HandlerConfig {
    /// Validate pipeline settings
    ///
    /// An empty prefix would make the destination key equal to the source key
    /// for objects at the bucket root and overwrite the input.
    ///
    /// # Errors
    /// - Empty output prefix
    pub fn validate(&self) -> Result<()> {
        if self.output_prefix.is_empty() {
            return Err(BgRemovalError::invalid_config(format!(
                "{ENV_OUTPUT_PREFIX} must not be empty"
            )));
        }
        Ok(())
    }
}

/// Complete function configuration, loaded at cold start
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub removal: RemovalConfig,
    pub handler: HandlerConfig,
    pub log_format: TracingFormat,
}

impl AppConfig {
    /// Load configuration from the process environment
    ///
    /// # Errors
    /// - Any variable present but unparseable
    /// - Selected backend not compiled in
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// Unset and blank variables fall back to defaults.
    ///
    /// # Errors
    /// - Any variable present but unparseable
    /// - Selected backend not compiled in
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let mut builder = RemovalConfig::builder();
        if let Some(path) = get(ENV_MODEL_PATH) {
            builder = builder.model_path(path);
        }
        if let Some(variant) = get(ENV_MODEL_VARIANT) {
            builder = builder.variant(variant.trim());
        }
        if let Some(backend) = get(ENV_BACKEND) {
            builder = builder.backend_type(backend.parse()?);
        }
        if let Some(provider) = get(ENV_EXECUTION_PROVIDER) {
            builder = builder.execution_provider(provider.parse()?);
        }
        if let Some(threads) = get(ENV_INTRA_THREADS) {
            builder = builder.intra_threads(parse_number(ENV_INTRA_THREADS, &threads)?);
        }
        if let Some(threads) = get(ENV_INTER_THREADS) {
            builder = builder.inter_threads(parse_number(ENV_INTER_THREADS, &threads)?);
        }
        let removal = builder.build()?;

        let mut handler = HandlerConfig::default();
        if let Some(prefix) = lookup(ENV_OUTPUT_PREFIX) {
            handler.output_prefix = prefix;
        }
        if let Some(limit) = get(ENV_MAX_INPUT_BYTES) {
            handler.max_input_bytes = non_zero(parse_number(ENV_MAX_INPUT_BYTES, &limit)?);
        }
        if let Some(limit) = get(ENV_MAX_IMAGE_DIMENSION) {
            handler.max_image_dimension =
                non_zero(parse_number(ENV_MAX_IMAGE_DIMENSION, &limit)?);
        }
        handler.validate()?;

        let log_format = match get(ENV_LOG_FORMAT) {
            Some(format) => format.parse()?,
            None => TracingFormat::Json,
        };

        Ok(Self {
            removal,
            handler,
            log_format,
        })
    }
}

fn parse_number<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| BgRemovalError::config_value_error(name, value, "a non-negative integer"))
}

fn non_zero<T: Default + PartialEq>(value: T) -> Option<T> {
    if value == T::default() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    #[cfg(feature = "tract")]
    fn test_defaults_when_environment_is_empty() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(config.handler, HandlerConfig::default());
        assert_eq!(config.handler.output_prefix, "processed/");
        assert_eq!(config.removal.model_spec.path, PathBuf::from(DEFAULT_MODEL_PATH));
        assert_eq!(config.removal.model_spec.variant, None);
        assert_eq!(config.removal.backend_type, BackendType::Tract);
        assert_eq!(config.log_format, TracingFormat::Json);
    }

    #[test]
    #[cfg(feature = "tract")]
    fn test_overrides_from_environment() {
        let config = AppConfig::from_lookup(lookup_from(&[
            (ENV_MODEL_PATH, "/tmp/model"),
            (ENV_MODEL_VARIANT, " fp16 "),
            (ENV_EXECUTION_PROVIDER, "CPU"),
            (ENV_INTRA_THREADS, "4"),
            (ENV_OUTPUT_PREFIX, "cutouts/"),
            (ENV_MAX_INPUT_BYTES, "1024"),
            (ENV_MAX_IMAGE_DIMENSION, "0"),
            (ENV_LOG_FORMAT, "compact"),
        ]))
        .unwrap();

        assert_eq!(config.removal.model_spec.path, PathBuf::from("/tmp/model"));
        assert_eq!(config.removal.model_spec.variant.as_deref(), Some("fp16"));
        assert_eq!(config.removal.execution_provider, ExecutionProvider::Cpu);
        assert_eq!(config.removal.intra_threads, 4);
        assert_eq!(config.handler.output_prefix, "cutouts/");
        assert_eq!(config.handler.max_input_bytes, Some(1024));
        assert_eq!(config.handler.max_image_dimension, None);
        assert_eq!(config.log_format, TracingFormat::Compact);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        for vars in [
            vec![(ENV_BACKEND, "gpu")],
            vec![(ENV_EXECUTION_PROVIDER, "coreml")],
            vec![(ENV_INTRA_THREADS, "-1")],
            vec![(ENV_MAX_INPUT_BYTES, "lots")],
            vec![(ENV_OUTPUT_PREFIX, "")],
            vec![(ENV_LOG_FORMAT, "xml")],
        ] {
            let result = AppConfig::from_lookup(lookup_from(&vars));
            assert!(
                matches!(result, Err(BgRemovalError::InvalidConfig(_))),
                "expected config error for {vars:?}"
            );
        }
    }

    #[test]
    fn test_backend_parsing_and_availability() {
        assert_eq!("Tract".parse::<BackendType>().unwrap(), BackendType::Tract);
        assert_eq!("onnx".parse::<BackendType>().unwrap(), BackendType::Onnx);
        assert_eq!(BackendType::Tract.is_enabled(), cfg!(feature = "tract"));

        let result = RemovalConfig::builder().backend_type(BackendType::Onnx).build();
        assert_eq!(result.is_ok(), cfg!(feature = "onnx"));
    }

    #[test]
    fn test_provider_display_round_trips() {
        for provider in [
            ExecutionProvider::Auto,
            ExecutionProvider::Cpu,
            ExecutionProvider::Cuda,
        ] {
            assert_eq!(provider.to_string().parse::<ExecutionProvider>().unwrap(), provider);
        }
    }
}
