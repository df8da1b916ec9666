//! Tract backend implementation
//!
//! Pure Rust inference with no native libraries, which keeps the Lambda
//! deployment package self-contained.

use crate::config::RemovalConfig;
use crate::error::{BgRemovalError, Result};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, ModelManager, PreprocessingConfig};
use ndarray::Array4;
use tract_onnx::prelude::*;

/// Type alias for the complex Tract model type to reduce complexity warnings
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

// Use instant crate for cross-platform time compatibility
use instant::{Duration, Instant};

/// Tract backend for running segmentation models
#[derive(Debug)]
pub struct TractBackend {
    model: Option<TractModel>,
    model_manager: Option<ModelManager>,
    initialized: bool,
}

impl TractBackend {
    /// Create an uninitialized backend without a model
    #[must_use]
    pub fn new() -> Self {
        Self {
            model: None,
            model_manager: None,
            initialized: false,
        }
    }

    /// Create a Tract backend with a pre-configured model manager
    #[must_use]
    pub fn with_model_manager(model_manager: ModelManager) -> Self {
        Self {
            model: None,
            model_manager: Some(model_manager),
            initialized: false,
        }
    }

    fn load_model(&mut self, config: &RemovalConfig) -> Result<Duration> {
        let model_load_start = Instant::now();

        let Some(ref model_manager) = self.model_manager else {
            return Err(BgRemovalError::model(
                "No model manager available for Tract backend",
            ));
        };

        let model_data = model_manager.load_model()?;
        let model_info = model_manager.get_info()?;

        #[allow(clippy::cast_precision_loss)] // Precision loss acceptable for logging display
        let size_mb = model_info.size_bytes as f64 / (1024.0 * 1024.0);
        log::info!(
            "Initializing Tract backend: model {} ({}), {size_mb:.2} MB",
            model_info.name,
            model_info.precision
        );
        if config.intra_threads > 0 || config.inter_threads > 0 {
            log::debug!("Thread settings are ignored by the Tract backend");
        }

        let model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_data))
            .map_err(|e| BgRemovalError::model(format!("Failed to load ONNX model: {e}")))?
            .into_optimized()
            .map_err(|e| BgRemovalError::model(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| {
                BgRemovalError::model(format!("Failed to create runnable model: {e}"))
            })?;

        self.model = Some(model);
        self.initialized = true;

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "Tract backend initialized in {}ms",
            model_load_time.as_millis()
        );

        Ok(model_load_time)
    }
}

impl Default for TractBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for TractBackend {
    fn initialize(&mut self, config: &RemovalConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }

        let model_load_time = self.load_model(config)?;
        Ok(Some(model_load_time))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| BgRemovalError::inference("Tract model not initialized"))?;

        log::debug!("Running Tract inference on {:?}", input.shape());
        let inference_start = Instant::now();

        let input_tensor = Tensor::from(input.clone());
        let outputs = model
            .run(tvec![input_tensor.into()])
            .map_err(|e| BgRemovalError::inference(format!("Tract inference failed: {e}")))?;

        let output_tensor = outputs
            .into_iter()
            .next()
            .ok_or_else(|| BgRemovalError::inference("No output tensor found"))?
            .into_arc_tensor();

        let output_data = output_tensor.to_array_view::<f32>().map_err(|e| {
            BgRemovalError::inference(format!("Failed to convert output tensor: {e}"))
        })?;

        let &[batch, channels, height, width] = output_data.shape() else {
            return Err(BgRemovalError::inference(format!(
                "Expected 4D output tensor, got {}D",
                output_data.shape().len()
            )));
        };

        let output_array = Array4::from_shape_vec(
            (batch, channels, height, width),
            output_data.iter().copied().collect(),
        )
        .map_err(|e| BgRemovalError::inference(format!("Failed to reshape output tensor: {e}")))?;

        log::debug!(
            "Tract inference completed in {}ms, output {:?}",
            inference_start.elapsed().as_millis(),
            output_array.shape()
        );

        Ok(output_array)
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        let model_manager = self
            .model_manager
            .as_ref()
            .ok_or_else(|| BgRemovalError::internal("Model manager not initialized"))?;
        model_manager.get_preprocessing_config()
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        let model_manager = self
            .model_manager
            .as_ref()
            .ok_or_else(|| BgRemovalError::internal("Model manager not initialized"))?;
        model_manager.get_info()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelSpec;
    use std::fs;
    use tempfile::TempDir;

    fn corrupt_model_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("config.json"), r#"{"model_type": "isnet"}"#).unwrap();
        fs::write(
            dir.path().join("preprocessor_config.json"),
            r#"{"size": {"height": 64, "width": 64}, "image_mean": [0.5, 0.5, 0.5], "image_std": [1, 1, 1]}"#,
        )
        .unwrap();
        fs::create_dir_all(dir.path().join("onnx")).unwrap();
        fs::write(dir.path().join("onnx/model.onnx"), b"definitely not protobuf").unwrap();
        dir
    }

    #[test]
    fn test_uninitialized_backend() {
        let mut backend = TractBackend::new();
        assert!(!backend.is_initialized());
        assert!(backend.get_model_info().is_err());
        assert!(backend.get_preprocessing_config().is_err());

        let input = Array4::<f32>::zeros((1, 3, 8, 8));
        assert!(matches!(
            backend.infer(&input),
            Err(BgRemovalError::Inference(_))
        ));
    }

    #[test]
    fn test_initialize_without_model_manager_fails() {
        let mut backend = TractBackend::new();
        let result = backend.initialize(&RemovalConfig::default());
        assert!(matches!(result, Err(BgRemovalError::Model(_))));
        assert!(!backend.is_initialized());
    }

    #[test]
    fn test_corrupt_model_is_rejected() {
        let dir = corrupt_model_dir();
        let manager = ModelManager::from_spec(&ModelSpec::new(dir.path())).unwrap();
        let mut backend = TractBackend::with_model_manager(manager);

        assert_eq!(
            backend.get_preprocessing_config().unwrap().target_size,
            [64, 64]
        );
        assert_eq!(backend.get_model_info().unwrap().input_shape, (1, 3, 64, 64));

        let result = backend.initialize(&RemovalConfig::default());
        assert!(matches!(result, Err(BgRemovalError::Model(_))));
        assert!(!backend.is_initialized());
    }
}
