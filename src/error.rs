//! Error types for background removal invocations

use thiserror::Error;

/// Result type alias for background removal operations
pub type Result<T> = std::result::Result<T, BgRemovalError>;

/// Error types for a background removal invocation
///
/// Variants fall into three classes: input errors (`InvalidInput`, `InputTooLarge`),
/// store errors (`Storage`, `Io`) and processing errors (`Image`, `Inference`,
/// `Processing`). Configuration and model errors only occur at cold start.
#[derive(Error, Debug)]
pub enum BgRemovalError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Malformed invocation payload
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Object store request failed
    #[error("Storage error: failed to {operation} s3://{bucket}/{key}: {message}")]
    Storage {
        operation: &'static str,
        bucket: String,
        key: String,
        message: String,
        retryable: bool,
    },

    /// Source object exceeds the configured size bound
    #[error("Input too large: {size} bytes exceeds limit of {limit} bytes")]
    InputTooLarge { size: u64, limit: u64 },

    /// Backend inference errors
    #[error("Inference error: {0}")]
    Inference(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Model loading or initialization errors
    #[error("Model error: {0}")]
    Model(String),

    /// Tensor or pixel processing errors
    #[error("Processing error: {0}")]
    Processing(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BgRemovalError {
    /// Create a new invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a storage error for an object reference
    pub fn storage<S: Into<String>>(
        operation: &'static str,
        reference: &crate::types::ImageReference,
        message: S,
        retryable: bool,
    ) -> Self {
        Self::Storage {
            operation,
            bucket: reference.bucket.clone(),
            key: reference.key.clone(),
            message: message.into(),
            retryable,
        }
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        expected: &str,
    ) -> Self {
        Self::InvalidConfig(format!(
            "Invalid {}: '{}' (expected: {})",
            parameter, value, expected
        ))
    }

    /// Create model error with the offending path
    pub fn model_error_with_context<P: AsRef<std::path::Path>>(
        operation: &str,
        model_path: P,
        error: &str,
    ) -> Self {
        Self::Model(format!(
            "Failed to {} model '{}': {}",
            operation,
            model_path.as_ref().display(),
            error
        ))
    }

    /// Whether a later attempt of the same invocation could succeed
    ///
    /// Only transient store failures qualify. Bad input, missing objects,
    /// undecodable images and model failures are terminal.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Storage { retryable, .. } => *retryable,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
            ),
            _ => false,
        }
    }

    /// Short machine-readable classification used in log records
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) | Self::Storage { .. } => "io",
            Self::InvalidInput(_) | Self::InputTooLarge { .. } => "input",
            Self::Image(_) | Self::Inference(_) | Self::Processing(_) => "processing",
            Self::InvalidConfig(_) | Self::Model(_) => "configuration",
            Self::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ImageReference;

    #[test]
    fn test_error_display() {
        let err = BgRemovalError::invalid_config("Invalid model path");
        assert_eq!(err.to_string(), "Invalid configuration: Invalid model path");

        let err = BgRemovalError::InputTooLarge {
            size: 2048,
            limit: 1024,
        };
        assert_eq!(
            err.to_string(),
            "Input too large: 2048 bytes exceeds limit of 1024 bytes"
        );
    }

    #[test]
    fn test_storage_error_context() {
        let reference = ImageReference::new("demo", "a/b/cat.jpg");
        let err = BgRemovalError::storage("download", &reference, "NoSuchKey", false);
        let message = err.to_string();
        assert!(message.contains("download"));
        assert!(message.contains("s3://demo/a/b/cat.jpg"));
        assert!(message.contains("NoSuchKey"));
        assert!(!err.is_retryable());
        assert_eq!(err.kind(), "io");
    }

    #[test]
    fn test_retry_classification() {
        let reference = ImageReference::new("demo", "cat.jpg");
        assert!(BgRemovalError::storage("upload", &reference, "SlowDown", true).is_retryable());
        assert!(BgRemovalError::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "read timed out"
        ))
        .is_retryable());

        assert!(!BgRemovalError::invalid_input("missing key").is_retryable());
        assert!(!BgRemovalError::processing("bad tensor").is_retryable());
        assert!(!BgRemovalError::model("missing onnx").is_retryable());
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(BgRemovalError::invalid_input("x").kind(), "input");
        assert_eq!(BgRemovalError::inference("x").kind(), "processing");
        assert_eq!(BgRemovalError::model("x").kind(), "configuration");
        assert_eq!(BgRemovalError::internal("x").kind(), "internal");
    }

    #[test]
    fn test_config_value_error() {
        let err = BgRemovalError::config_value_error("BGREMOVE_BACKEND", "gpu", "tract or onnx");
        let message = err.to_string();
        assert!(message.contains("BGREMOVE_BACKEND"));
        assert!(message.contains("'gpu'"));
        assert!(message.contains("tract or onnx"));
    }
}
