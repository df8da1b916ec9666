//! Mock backend and model fixtures for unit tests
//!
//! The mock produces a centered disc mask so tests can check pixels on
//! both sides of the foreground boundary without a real model.

use crate::{
    config::{BackendType, RemovalConfig},
    error::{BgRemovalError, Result},
    inference::{BackendFactory, InferenceBackend},
    models::{ModelInfo, ModelManager, PreprocessingConfig},
};
use instant::Duration;
use ndarray::Array4;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Mock backend returning a disc-shaped mask at the model resolution
#[derive(Debug, Clone)]
pub struct MockBackend {
    initialized: bool,
    preprocessing_config: PreprocessingConfig,
    should_fail_init: bool,
    should_fail_inference: bool,
    inference_calls: Arc<AtomicUsize>,
}

impl MockBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            initialized: false,
            preprocessing_config: PreprocessingConfig {
                target_size: [32, 32],
                normalization_mean: [0.5, 0.5, 0.5],
                normalization_std: [1.0, 1.0, 1.0],
            },
            should_fail_init: false,
            should_fail_inference: false,
            inference_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    #[must_use]
    pub fn with_target_size(mut self, height: u32, width: u32) -> Self {
        self.preprocessing_config.target_size = [height, width];
        self
    }

    #[must_use]
    pub fn failing_init(mut self) -> Self {
        self.should_fail_init = true;
        self
    }

    #[must_use]
    pub fn failing_inference(mut self) -> Self {
        self.should_fail_inference = true;
        self
    }

    /// Shared counter of `infer` calls
    #[must_use]
    pub fn inference_calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.inference_calls)
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for MockBackend {
    fn initialize(&mut self, _config: &RemovalConfig) -> Result<Option<Duration>> {
        if self.should_fail_init {
            return Err(BgRemovalError::model("Mock initialization failure"));
        }
        if self.initialized {
            return Ok(None);
        }
        self.initialized = true;
        Ok(Some(Duration::from_millis(1)))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        if !self.initialized {
            return Err(BgRemovalError::inference("Mock backend not initialized"));
        }
        if self.should_fail_inference {
            return Err(BgRemovalError::inference("Mock inference failure"));
        }
        self.inference_calls.fetch_add(1, Ordering::SeqCst);

        let (_, _, height, width) = input.dim();
        let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
        let radius = width.min(height) as f32 / 4.0;

        Ok(Array4::from_shape_fn((1, 1, height, width), |(_, _, y, x)| {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            if dx * dx + dy * dy <= radius * radius {
                1.0
            } else {
                0.0
            }
        }))
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(self.preprocessing_config.clone())
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        let [height, width] = self.preprocessing_config.target_size;
        Ok(ModelInfo {
            name: "mock-disc".to_string(),
            precision: "fp32".to_string(),
            size_bytes: 1024,
            input_shape: (1, 3, height as usize, width as usize),
            output_shape: (1, 1, height as usize, width as usize),
        })
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

/// Factory handing out clones of a template `MockBackend`
#[derive(Debug)]
pub struct MockBackendFactory {
    template: MockBackend,
    created: Arc<AtomicUsize>,
}

impl MockBackendFactory {
    #[must_use]
    pub fn new(template: MockBackend) -> Self {
        Self {
            template,
            created: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared counter of created backends
    #[must_use]
    pub fn created(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.created)
    }
}

impl BackendFactory for MockBackendFactory {
    fn create_backend(
        &self,
        _backend_type: BackendType,
        _model_manager: ModelManager,
    ) -> Result<Box<dyn InferenceBackend>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.template.clone()))
    }
}

/// Write a minimal HuggingFace-layout model directory with placeholder weights
pub fn write_placeholder_model(dir: &Path) {
    std::fs::write(dir.join("config.json"), r#"{"model_type": "mock"}"#).unwrap();
    std::fs::write(
        dir.join("preprocessor_config.json"),
        r#"{"size": {"height": 32, "width": 32}, "image_mean": [0.5, 0.5, 0.5], "image_std": [1, 1, 1]}"#,
    )
    .unwrap();
    std::fs::create_dir_all(dir.join("onnx")).unwrap();
    std::fs::write(dir.join("onnx/model.onnx"), b"placeholder").unwrap();
}
