//! Backend implementations for different inference engines
//!
//! - Tract backend (pure Rust, default, fits the Lambda CPU sandbox)
//! - ONNX Runtime backend (optional `onnx` feature)

use crate::config::BackendType;
use crate::error::{BgRemovalError, Result};
use crate::inference::{BackendFactory, InferenceBackend};
use crate::models::ModelManager;

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "tract")]
pub mod tract;

// Test utilities for backend testing
#[cfg(test)]
pub mod test_utils;

#[cfg(feature = "onnx")]
pub use self::onnx::OnnxBackend;

#[cfg(feature = "tract")]
pub use self::tract::TractBackend;

/// Backend factory for the engines compiled into this build
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultBackendFactory;

impl BackendFactory for DefaultBackendFactory {
    #[cfg_attr(
        not(any(feature = "tract", feature = "onnx")),
        allow(unused_variables)
    )]
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_manager: ModelManager,
    ) -> Result<Box<dyn InferenceBackend>> {
        match backend_type {
            #[cfg(feature = "tract")]
            BackendType::Tract => Ok(Box::new(TractBackend::with_model_manager(model_manager))),
            #[cfg(feature = "onnx")]
            BackendType::Onnx => Ok(Box::new(OnnxBackend::with_model_manager(model_manager))),
            #[allow(unreachable_patterns)]
            other => Err(BgRemovalError::invalid_config(format!(
                "Backend '{other}' is not enabled in this build"
            ))),
        }
    }
}
