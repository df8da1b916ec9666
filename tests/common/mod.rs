//! Shared fixtures for integration tests: synthetic images, a placeholder
//! model directory and a deterministic disc-mask backend.

#![allow(dead_code)]

use bgremove_lambda::{
    BackendFactory, BackendType, BgRemovalError, InferenceBackend, ModelInfo, ModelManager,
    ModelSegmenter, ModelSpec, PreprocessingConfig, RemovalConfig, Result, Segmenter,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use instant::Duration;
use ndarray::Array4;
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tracing_subscriber::fmt::MakeWriter;

/// Encode an image in the given container format
pub fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, format).unwrap();
    buffer.into_inner()
}

/// Opaque photo-like JPEG with a horizontal gradient
pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 128])
    });
    encode(&DynamicImage::ImageRgb8(image), ImageFormat::Jpeg)
}

/// PNG with a real alpha channel
pub fn rgba_png(image: &RgbaImage) -> Vec<u8> {
    encode(&DynamicImage::ImageRgba8(image.clone()), ImageFormat::Png)
}

/// HuggingFace-layout model directory whose weights are never parsed
pub fn placeholder_model(target: u32) -> TempDir {
    let dir = TempDir::new().unwrap();
    write_model_files(dir.path(), target);
    dir
}

fn write_model_files(dir: &Path, target: u32) {
    std::fs::write(dir.join("config.json"), r#"{"model_type": "disc"}"#).unwrap();
    std::fs::write(
        dir.join("preprocessor_config.json"),
        format!(
            r#"{{"size": {{"height": {target}, "width": {target}}}, "image_mean": [128, 128, 128], "image_std": [256, 256, 256]}}"#
        ),
    )
    .unwrap();
    std::fs::create_dir_all(dir.join("onnx")).unwrap();
    std::fs::write(dir.join("onnx/model.onnx"), b"placeholder weights").unwrap();
}

/// Backend predicting a centered disc covering half the canvas width
pub struct DiscBackend {
    model_manager: ModelManager,
    initialized: bool,
}

impl InferenceBackend for DiscBackend {
    fn initialize(&mut self, _config: &RemovalConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }
        self.initialized = true;
        Ok(Some(Duration::ZERO))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        if !self.initialized {
            return Err(BgRemovalError::inference("not initialized"));
        }
        let (_, _, height, width) = input.dim();
        let radius = width.min(height) as f32 / 4.0;
        Ok(Array4::from_shape_fn((1, 1, height, width), |(_, _, y, x)| {
            let dx = x as f32 + 0.5 - width as f32 / 2.0;
            let dy = y as f32 + 0.5 - height as f32 / 2.0;
            if (dx * dx + dy * dy).sqrt() <= radius {
                1.0
            } else {
                0.01
            }
        }))
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        self.model_manager.get_preprocessing_config()
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        self.model_manager.get_info()
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

pub struct DiscBackendFactory;

impl BackendFactory for DiscBackendFactory {
    fn create_backend(
        &self,
        _backend_type: BackendType,
        model_manager: ModelManager,
    ) -> Result<Box<dyn InferenceBackend>> {
        Ok(Box::new(DiscBackend {
            model_manager,
            initialized: false,
        }))
    }
}

/// `ModelSegmenter` over the disc backend and a placeholder model directory
pub fn disc_segmenter(model_dir: &Path) -> ModelSegmenter {
    let config = RemovalConfig {
        model_spec: ModelSpec::new(model_dir),
        ..RemovalConfig::default()
    };
    ModelSegmenter::with_factory(config, Box::new(DiscBackendFactory))
}

/// Segmenter that records what it was given and returns it unchanged
#[derive(Default)]
pub struct RecordingSegmenter {
    seen: Mutex<Vec<RgbaImage>>,
}

impl RecordingSegmenter {
    pub fn seen(&self) -> Vec<RgbaImage> {
        self.seen.lock().unwrap().clone()
    }
}

impl Segmenter for RecordingSegmenter {
    fn segment(&self, image: RgbaImage) -> Result<RgbaImage> {
        self.seen.lock().unwrap().push(image.clone());
        Ok(image)
    }
}

/// Checkerboard of two alpha levels, useful to detect alpha loss
pub fn checkerboard_alpha(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        if (x + y) % 2 == 0 {
            Rgba([200, 30, 30, 255])
        } else {
            Rgba([30, 30, 200, 90])
        }
    })
}

/// In-memory sink for formatted log output
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn lines(&self) -> Vec<String> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
