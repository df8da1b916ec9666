//! Seam between the segmenter and the runtime executing the ONNX graph

use crate::{
    config::{BackendType, RemovalConfig},
    error::Result,
    models::{ModelInfo, ModelManager, PreprocessingConfig},
};
use ndarray::Array4;

use instant::Duration;

/// A loaded segmentation model that maps image tensors to mask tensors
///
/// Backends are driven from a blocking worker thread, so they must be `Send`.
pub trait InferenceBackend: Send {
    /// Load the model and build the execution plan
    ///
    /// Returns the model load time, or `None` when already initialized.
    ///
    /// # Errors
    /// - Model bytes missing or not a valid graph
    fn initialize(&mut self, config: &RemovalConfig) -> Result<Option<Duration>>;

    /// Run inference on an NCHW input tensor, returning an NCHW mask tensor
    ///
    /// # Errors
    /// - Backend not initialized
    /// - Model inference failures
    /// - Unexpected output tensor rank
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>>;

    /// Resize target and normalization the model was trained with
    ///
    /// # Errors
    /// - No model manager attached
    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig>;

    /// # Errors
    /// - No model manager attached
    fn get_model_info(&self) -> Result<ModelInfo>;

    fn is_initialized(&self) -> bool;
}

/// Builds backends for a [`BackendType`]; swapped out in tests
pub trait BackendFactory: Send + Sync {
    /// Wrap `model_manager` in a backend of `backend_type` (not yet initialized)
    ///
    /// # Errors
    /// - Backend type not compiled in
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_manager: ModelManager,
    ) -> Result<Box<dyn InferenceBackend>>;
}
