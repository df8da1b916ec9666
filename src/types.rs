//! Core types for invocation payloads, object references and results

use crate::error::{BgRemovalError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status marker returned for a successful invocation
pub const STATUS_COMPLETED: &str = "completed";

/// Location of an object in the store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageReference {
    pub bucket: String,
    pub key: String,
}

impl ImageReference {
    pub fn new<B: Into<String>, K: Into<String>>(bucket: B, key: K) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Final path segment of the key (everything after the last `/`)
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }

    /// Destination reference in the same bucket under `prefix`
    ///
    /// Only the final key segment survives; bucket, path depth and image
    /// contents never influence the result.
    #[must_use]
    pub fn derive_output(&self, prefix: &str) -> Self {
        Self {
            bucket: self.bucket.clone(),
            key: format!("{prefix}{}", self.file_name()),
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Invocation payload: `{"bucket": ..., "key": ...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRequest {
    pub bucket: String,
    pub key: String,
}

impl ProcessRequest {
    /// Parse and validate a raw invocation payload
    ///
    /// # Errors
    /// - Payload is not an object, or `bucket`/`key` are missing or not strings
    /// - `bucket` or `key` is empty
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let request: Self = serde_json::from_value(value)
            .map_err(|e| BgRemovalError::invalid_input(format!("Malformed event: {e}")))?;
        request.validate()?;
        Ok(request)
    }

    /// Reject empty identifiers
    ///
    /// # Errors
    /// - `bucket` or `key` is empty
    pub fn validate(&self) -> Result<()> {
        if self.bucket.is_empty() {
            return Err(BgRemovalError::invalid_input("Field 'bucket' must not be empty"));
        }
        if self.key.is_empty() {
            return Err(BgRemovalError::invalid_input("Field 'key' must not be empty"));
        }
        Ok(())
    }

    #[must_use]
    pub fn reference(&self) -> ImageReference {
        ImageReference::new(self.bucket.clone(), self.key.clone())
    }
}

/// Invocation result: `{"status": "completed", "output_key": ...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub status: String,
    pub output_key: String,
}

impl ProcessResponse {
    #[must_use]
    pub fn completed(output_key: String) -> Self {
        Self {
            status: STATUS_COMPLETED.to_string(),
            output_key,
        }
    }
}

/// Wall-clock durations of one invocation, in seconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StageTimings {
    /// Object download into memory
    pub download_time: f64,

    /// Decode, RGBA normalization and background removal
    pub process_time: f64,

    /// PNG encoding and object upload
    pub upload_time: f64,

    /// Whole invocation
    pub total_time: f64,
}

/// Result of a completed pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutcome {
    pub output: ImageReference,
    pub timings: StageTimings,
}

/// Per-pixel foreground probability scaled to `0..=255`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentationMask {
    /// Row-major mask values, one per source pixel
    pub data: Vec<u8>,
    /// Mask dimensions (width, height)
    pub dimensions: (u32, u32),
}

impl SegmentationMask {
    #[must_use]
    pub fn new(data: Vec<u8>, dimensions: (u32, u32)) -> Self {
        Self { data, dimensions }
    }

    /// Mask value at a pixel, 0 outside the mask
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> u8 {
        let (width, height) = self.dimensions;
        if x >= width || y >= height {
            return 0;
        }
        self.data
            .get((y as usize) * (width as usize) + x as usize)
            .copied()
            .unwrap_or(0)
    }

    /// Fraction of pixels considered foreground (value >= 128)
    #[must_use]
    pub fn foreground_ratio(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        let foreground = self.data.iter().filter(|&&v| v >= 128).count();
        foreground as f64 / self.data.len() as f64
    }
}
