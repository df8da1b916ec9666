//! ONNX Runtime backend implementation
//!
//! Supports CPU and CUDA execution providers. Lambda itself has no GPU, so
//! `auto` resolves to CPU there; CUDA matters when the same image runs on
//! container hosts.

use crate::config::{ExecutionProvider, RemovalConfig};
use crate::error::{BgRemovalError, Result};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, ModelManager, PreprocessingConfig};
use instant::{Duration, Instant};
use ndarray::Array4;
use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider as OrtExecutionProvider};
use ort::session::{builder::GraphOptimizationLevel, builder::SessionBuilder, Session};
use ort::value::Value;

/// ONNX Runtime backend for running segmentation models
#[derive(Debug)]
pub struct OnnxBackend {
    session: Option<Session>,
    model_manager: Option<ModelManager>,
    initialized: bool,
}

impl OnnxBackend {
    /// Create an uninitialized backend without a model
    #[must_use]
    pub fn new() -> Self {
        Self {
            session: None,
            model_manager: None,
            initialized: false,
        }
    }

    /// Create a new ONNX backend with specific model manager
    #[must_use]
    pub fn with_model_manager(model_manager: ModelManager) -> Self {
        Self {
            session: None,
            model_manager: Some(model_manager),
            initialized: false,
        }
    }

    fn cuda_available() -> bool {
        OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false)
    }

    fn configure_provider(
        session_builder: SessionBuilder,
        provider: ExecutionProvider,
    ) -> Result<SessionBuilder> {
        let use_cuda = match provider {
            ExecutionProvider::Cpu => false,
            ExecutionProvider::Auto => Self::cuda_available(),
            ExecutionProvider::Cuda => {
                let available = Self::cuda_available();
                if !available {
                    log::warn!(
                        "CUDA execution provider requested but not available, falling back to CPU"
                    );
                }
                available
            },
        };

        if !use_cuda {
            log::info!("Using CPU execution provider");
            return Ok(session_builder);
        }

        log::info!("Using CUDA execution provider");
        session_builder
            .with_execution_providers([CUDAExecutionProvider::default().build()])
            .map_err(|e| {
                BgRemovalError::inference(format!("Failed to set CUDA execution provider: {e}"))
            })
    }

    fn load_model(&mut self, config: &RemovalConfig) -> Result<Duration> {
        let model_load_start = Instant::now();

        let model_manager = self
            .model_manager
            .as_ref()
            .ok_or_else(|| BgRemovalError::model("No model manager available for ONNX backend"))?;

        let model_data = model_manager.load_model()?;
        let model_info = model_manager.get_info()?;

        let session_builder = Session::builder()
            .map_err(|e| {
                BgRemovalError::inference(format!("Failed to create session builder: {e}"))
            })?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| {
                BgRemovalError::inference(format!("Failed to set optimization level: {e}"))
            })?;
        let session_builder = Self::configure_provider(session_builder, config.execution_provider)?;

        // Lambda sizes vCPUs by memory; available_parallelism reflects the allocation
        let cores = std::thread::available_parallelism()
            .map(std::num::NonZero::get)
            .unwrap_or(2);
        let intra_threads = if config.intra_threads > 0 {
            config.intra_threads
        } else {
            cores
        };
        let inter_threads = if config.inter_threads > 0 {
            config.inter_threads
        } else {
            (cores / 4).max(1)
        };

        let session = session_builder
            .with_intra_threads(intra_threads)
            .map_err(|e| BgRemovalError::inference(format!("Failed to set intra threads: {e}")))?
            .with_inter_threads(inter_threads)
            .map_err(|e| BgRemovalError::inference(format!("Failed to set inter threads: {e}")))?
            .commit_from_memory(&model_data)
            .map_err(|e| {
                BgRemovalError::model(format!("Failed to create session from model data: {e}"))
            })?;

        #[allow(clippy::cast_precision_loss)] // Precision loss acceptable for logging display
        let size_mb = model_info.size_bytes as f64 / (1024.0 * 1024.0);
        log::debug!(
            "ONNX Runtime session created: model {} ({}), {size_mb:.2} MB, {intra_threads} intra-op / {inter_threads} inter-op threads",
            model_info.name,
            model_info.precision
        );

        self.session = Some(session);
        self.initialized = true;

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "ONNX backend initialized in {}ms",
            model_load_time.as_millis()
        );

        Ok(model_load_time)
    }
}

impl Default for OnnxBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for OnnxBackend {
    fn initialize(&mut self, config: &RemovalConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }

        let model_load_time = self.load_model(config)?;
        Ok(Some(model_load_time))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| BgRemovalError::inference("ONNX session not initialized"))?;

        log::debug!("Running ONNX inference on {:?}", input.dim());
        let inference_start = Instant::now();

        let input_value = Value::from_array(input.clone()).map_err(|e| {
            BgRemovalError::processing(format!("Failed to convert input tensor: {e}"))
        })?;

        // Positional inputs: models disagree on tensor names
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| BgRemovalError::inference(format!("ONNX inference failed: {e}")))?;

        let first_key = outputs
            .keys()
            .next()
            .ok_or_else(|| BgRemovalError::inference("No output tensors found"))?;
        let output_tensor = outputs
            .get(first_key)
            .ok_or_else(|| BgRemovalError::inference("First output tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(|e| {
                BgRemovalError::inference(format!("Failed to extract output tensor: {e}"))
            })?;

        let &[batch, channels, height, width] = output_tensor.shape() else {
            return Err(BgRemovalError::inference(format!(
                "Expected 4D output tensor, got {}D",
                output_tensor.shape().len()
            )));
        };

        let output_array = Array4::from_shape_vec(
            (batch, channels, height, width),
            output_tensor.iter().copied().collect(),
        )
        .map_err(|e| BgRemovalError::inference(format!("Failed to reshape output tensor: {e}")))?;

        log::debug!(
            "ONNX inference completed in {}ms",
            inference_start.elapsed().as_millis()
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
