//! Background removal on decoded images
//!
//! [`Segmenter`] is the seam the handler depends on. [`ModelSegmenter`] is the
//! production implementation: it runs an ONNX segmentation model through an
//! [`InferenceBackend`] and turns the predicted mask into transparency.

use crate::{
    backends::DefaultBackendFactory,
    config::RemovalConfig,
    error::{BgRemovalError, Result},
    inference::{BackendFactory, InferenceBackend},
    models::{ModelInfo, ModelManager},
    types::SegmentationMask,
    utils::preprocessing::{ImagePreprocessor, Letterbox},
};
use image::{Rgba, RgbaImage};
use instant::{Duration, Instant};
use ndarray::Array4;
use std::sync::Mutex;
use tracing::{debug, info};

/// Removes the background of an RGBA image
///
/// Implementations return an image with the same dimensions in which
/// background pixels have their alpha reduced toward zero. Calls are
/// CPU-bound and blocking.
pub trait Segmenter: Send + Sync {
    /// Remove the background of `image`
    ///
    /// # Errors
    /// - Model initialization or inference failures
    fn segment(&self, image: RgbaImage) -> Result<RgbaImage>;
}

/// Segmenter backed by an ONNX model
///
/// The backend is created and initialized on first use and then kept for the
/// lifetime of the value, so a warm Lambda instance pays the model load once.
pub struct ModelSegmenter {
    config: RemovalConfig,
    backend_factory: Box<dyn BackendFactory>,
    backend: Mutex<Option<Box<dyn InferenceBackend>>>,
}

impl std::fmt::Debug for ModelSegmenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSegmenter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ModelSegmenter {
    /// Create a segmenter using the backends compiled into this build
    #[must_use]
    pub fn new(config: RemovalConfig) -> Self {
        Self::with_factory(config, Box::new(DefaultBackendFactory))
    }

    /// Create a segmenter with a custom backend factory
    #[must_use]
    pub fn with_factory(config: RemovalConfig, backend_factory: Box<dyn BackendFactory>) -> Self {
        Self {
            config,
            backend_factory,
            backend: Mutex::new(None),
        }
    }

    /// Load and initialize the model ahead of the first invocation
    ///
    /// Returns the model load time, or `None` if the backend was already warm.
    ///
    /// # Errors
    /// - Model directory missing or invalid
    /// - Backend creation or initialization failures
    pub fn warm_up(&self) -> Result<Option<Duration>> {
        let mut guard = self.lock_backend()?;
        if guard.is_some() {
            return Ok(None);
        }
        let start = Instant::now();
        *guard = Some(self.create_backend()?);
        Ok(Some(start.elapsed()))
    }

    /// Information about the loaded model
    ///
    /// # Errors
    /// - Backend initialization failures
    pub fn model_info(&self) -> Result<ModelInfo> {
        self.with_backend(|backend| backend.get_model_info())
    }

    fn lock_backend(&self) -> Result<std::sync::MutexGuard<'_, Option<Box<dyn InferenceBackend>>>> {
        self.backend
            .lock()
            .map_err(|_| BgRemovalError::internal("Inference backend lock poisoned"))
    }

    fn create_backend(&self) -> Result<Box<dyn InferenceBackend>> {
        info!(
            model = %self.config.model_spec.display_name(),
            backend = %self.config.backend_type,
            "initializing segmentation model"
        );

        let model_manager = ModelManager::from_spec(&self.config.model_spec)?;
        let mut backend = self
            .backend_factory
            .create_backend(self.config.backend_type, model_manager)?;

        if let Some(load_time) = backend.initialize(&self.config)? {
            info!(
                model_load_ms = load_time.as_millis() as u64,
                "segmentation model ready"
            );
        }
        Ok(backend)
    }

    /// Run `f` against the initialized backend, initializing it if needed
    ///
    /// A failed initialization leaves the slot empty so the next call retries.
    fn with_backend<T>(
        &self,
        f: impl FnOnce(&mut dyn InferenceBackend) -> Result<T>,
    ) -> Result<T> {
        let mut guard = self.lock_backend()?;
        if guard.is_none() {
            *guard = Some(self.create_backend()?);
        }
        let backend = guard
            .as_mut()
            .ok_or_else(|| BgRemovalError::internal("Inference backend missing after init"))?;
        f(backend.as_mut())
    }
}

impl Segmenter for ModelSegmenter {
    fn segment(&self, image: RgbaImage) -> Result<RgbaImage> {
        let dimensions = image.dimensions();
        let _span = tracing::debug_span!("segment", width = dimensions.0, height = dimensions.1)
            .entered();

        let (output, preprocess_time, inference_time) = self.with_backend(|backend| {
            let preprocessing_config = backend.get_preprocessing_config()?;

            let start = Instant::now();
            let (input, _) = ImagePreprocessor::preprocess(&image, &preprocessing_config)?;
            let preprocess_time = start.elapsed();

            let start = Instant::now();
            let output = backend.infer(&input)?;
            Ok((output, preprocess_time, start.elapsed()))
        })?;

        let start = Instant::now();
        let mask = tensor_to_mask(&output, dimensions)?;
        let result = apply_mask(image, &mask)?;

        debug!(
            preprocess_ms = preprocess_time.as_millis() as u64,
            inference_ms = inference_time.as_millis() as u64,
            postprocess_ms = start.elapsed().as_millis() as u64,
            foreground_ratio = mask.foreground_ratio(),
            "segmentation complete"
        );

        Ok(result)
    }
}

/// Map a `[1, 1, H, W]` model output back onto the source pixel grid
///
/// The letterbox placement used for preprocessing is recomputed from the
/// output size, so outputs smaller or larger than the input canvas map
/// correctly as long as the model preserves the aspect of its canvas.
///
/// # Errors
/// - Output tensor is not single-batch, single-channel
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn tensor_to_mask(
    tensor: &Array4<f32>,
    source_dimensions: (u32, u32),
) -> Result<SegmentationMask> {
    let (batch, channels, height, width) = tensor.dim();
    if batch != 1 || channels != 1 {
        return Err(BgRemovalError::processing(format!(
            "Invalid output tensor shape {:?}, expected [1, 1, H, W]",
            tensor.shape()
        )));
    }

    let canvas = [
        u32::try_from(height).map_err(|_| BgRemovalError::processing("Mask height overflow"))?,
        u32::try_from(width).map_err(|_| BgRemovalError::processing("Mask width overflow"))?,
    ];
    let letterbox = Letterbox::new(source_dimensions, canvas)?;

    let (src_width, src_height) = source_dimensions;
    let mut data = Vec::with_capacity(src_width as usize * src_height as usize);
    for y in 0..src_height {
        for x in 0..src_width {
            let (cx, cy) = letterbox.source_to_canvas(x, y);
            let value = tensor
                .get([0, 0, cy as usize, cx as usize])
                .copied()
                .unwrap_or(0.0);
            data.push((value.clamp(0.0, 1.0) * 255.0).round() as u8);
        }
    }

    Ok(SegmentationMask::new(data, source_dimensions))
}

/// Scale every pixel's alpha by the mask value
///
/// `alpha_out = round(alpha_in * mask / 255)`. RGB is kept wherever the result
/// is visible; fully transparent pixels are zeroed.
///
/// # Errors
/// - Mask dimensions differ from the image
pub fn apply_mask(mut image: RgbaImage, mask: &SegmentationMask) -> Result<RgbaImage> {
    if image.dimensions() != mask.dimensions {
        return Err(BgRemovalError::processing(format!(
            "Mask dimensions {:?} do not match image {:?}",
            mask.dimensions,
            image.dimensions()
        )));
    }

    for (pixel, &mask_value) in image.pixels_mut().zip(&mask.data) {
        let alpha = (u16::from(pixel[3]) * u16::from(mask_value) + 127) / 255;
        if alpha == 0 {
            *pixel = Rgba([0, 0, 0, 0]);
        } else {
            #[allow(clippy::cast_possible_truncation)] // alpha <= 255
            {
                pixel[3] = alpha as u8;
            }
        }
    }

    Ok(image)
}
