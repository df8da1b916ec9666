//! Image preprocessing for model inference
//!
//! The source image is resized with its aspect ratio preserved, centered on a
//! white canvas of the model input size, and normalized into an NCHW tensor.
//! [`Letterbox`] records that geometry so the mask can be mapped back onto
//! source pixels.

use crate::{
    error::{BgRemovalError, Result},
    models::PreprocessingConfig,
};
use image::{imageops::FilterType, RgbaImage};
use ndarray::Array4;

/// Canvas color around the resized image (RGB)
pub const PADDING_COLOR: [u8; 3] = [255, 255, 255];

/// Placement of a source image inside a fixed-size model canvas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// Source to canvas scale factor
    pub scale: f32,
    /// Size of the resized source inside the canvas (width, height)
    pub scaled_dimensions: (u32, u32),
    /// Top-left corner of the resized source in the canvas
    pub offset: (u32, u32),
    /// Canvas size (width, height)
    pub canvas_dimensions: (u32, u32),
}

impl Letterbox {
    /// Fit `source` (width, height) into a canvas of `[height, width]`
    ///
    /// # Errors
    /// - Zero-sized source or canvas
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn new(source: (u32, u32), target_size: [u32; 2]) -> Result<Self> {
        let (src_width, src_height) = source;
        let [canvas_height, canvas_width] = target_size;
        if src_width == 0 || src_height == 0 {
            return Err(BgRemovalError::processing(format!(
                "Cannot preprocess empty image ({src_width}x{src_height})"
            )));
        }
        if canvas_width == 0 || canvas_height == 0 {
            return Err(BgRemovalError::processing(format!(
                "Invalid model input size {canvas_width}x{canvas_height}"
            )));
        }

        let scale = (canvas_width as f32 / src_width as f32)
            .min(canvas_height as f32 / src_height as f32);

        // Keep at least one pixel and never exceed the canvas after rounding
        let scaled_width = ((src_width as f32 * scale).round() as u32).clamp(1, canvas_width);
        let scaled_height = ((src_height as f32 * scale).round() as u32).clamp(1, canvas_height);

        Ok(Self {
            scale,
            scaled_dimensions: (scaled_width, scaled_height),
            offset: (
                (canvas_width - scaled_width) / 2,
                (canvas_height - scaled_height) / 2,
            ),
            canvas_dimensions: (canvas_width, canvas_height),
        })
    }

    /// Canvas coordinate sampled for a source pixel center
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn source_to_canvas(&self, x: u32, y: u32) -> (u32, u32) {
        let (scaled_width, scaled_height) = self.scaled_dimensions;
        let sx = (((x as f32 + 0.5) * self.scale) as u32).min(scaled_width - 1);
        let sy = (((y as f32 + 0.5) * self.scale) as u32).min(scaled_height - 1);
        (sx + self.offset.0, sy + self.offset.1)
    }
}

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Build the normalized NCHW input tensor for `image`
    ///
    /// Alpha is ignored: the model sees the RGB channels only.
    ///
    /// # Errors
    /// - Zero-sized image or model input size
    /// - Zero standard deviation in the normalization config
    pub fn preprocess(
        image: &RgbaImage,
        preprocessing_config: &PreprocessingConfig,
    ) -> Result<(Array4<f32>, Letterbox)> {
        if preprocessing_config.normalization_std.iter().any(|s| *s == 0.0) {
            return Err(BgRemovalError::invalid_config(
                "Normalization std must be non-zero",
            ));
        }

        let letterbox = Letterbox::new(image.dimensions(), preprocessing_config.target_size)?;
        let (scaled_width, scaled_height) = letterbox.scaled_dimensions;
        let (canvas_width, canvas_height) = letterbox.canvas_dimensions;
        let (offset_x, offset_y) = letterbox.offset;

        let resized =
            image::imageops::resize(image, scaled_width, scaled_height, FilterType::Triangle);

        let normalize = |channel: usize, value: u8| {
            (f32::from(value) / 255.0 - preprocessing_config.normalization_mean[channel])
                / preprocessing_config.normalization_std[channel]
        };

        let mut tensor =
            Array4::<f32>::zeros((1, 3, canvas_height as usize, canvas_width as usize));
        for channel in 0..3 {
            tensor
                .slice_mut(ndarray::s![0, channel, .., ..])
                .fill(normalize(channel, PADDING_COLOR[channel]));
        }

        #[allow(clippy::indexing_slicing)]
        // Safe: letterbox keeps the resized image inside the canvas
        for (x, y, pixel) in resized.enumerate_pixels() {
            let cx = (x + offset_x) as usize;
            let cy = (y + offset_y) as usize;
            for channel in 0..3 {
                tensor[[0, channel, cy, cx]] = normalize(channel, pixel[channel]);
            }
        }

        Ok((tensor, letterbox))
    }
}
