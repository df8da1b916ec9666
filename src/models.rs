//! Model discovery and metadata for locally mounted ONNX models
//!
//! A model is a directory in one of two layouts:
//!
//! - HuggingFace: `config.json`, `preprocessor_config.json` and
//!   `onnx/model.onnx` (fp32) and/or `onnx/model_fp16.onnx` (fp16)
//! - Legacy: `model.json` describing variants and preprocessing, with
//!   `model_<variant>.onnx` next to it

use crate::error::{BgRemovalError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Location and variant of the model to load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Model directory
    pub path: PathBuf,
    /// Precision variant (`fp32`, `fp16`); `None` selects automatically
    pub variant: Option<String>,
}

impl ModelSpec {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            variant: None,
        }
    }

    /// Short name for logs
    #[must_use]
    pub fn display_name(&self) -> String {
        let name = self
            .path
            .file_name()
            .map_or_else(|| self.path.display().to_string(), |n| n.to_string_lossy().into_owned());
        match &self.variant {
            Some(variant) => format!("{name}:{variant}"),
            None => name,
        }
    }
}

/// Tensor preprocessing parameters expected by a model
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessingConfig {
    /// Model input size as `[height, width]`
    pub target_size: [u32; 2],
    /// Per-channel mean in the 0-1 range (RGB)
    pub normalization_mean: [f32; 3],
    /// Per-channel standard deviation in the 0-1 range (RGB)
    pub normalization_std: [f32; 3],
}

impl Default for PreprocessingConfig {
    /// ISNet defaults
    fn default() -> Self {
        Self {
            target_size: [1024, 1024],
            normalization_mean: [0.5, 0.5, 0.5],
            normalization_std: [1.0, 1.0, 1.0],
        }
    }
}

/// Model information and metadata
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    pub name: String,
    pub precision: String,
    pub size_bytes: u64,
    pub input_shape: (usize, usize, usize, usize), // NCHW format
    pub output_shape: (usize, usize, usize, usize),
}

/// Model directory layout
#[derive(Debug, Clone, PartialEq)]
enum ModelFormat {
    /// `model.json` + `model_<variant>.onnx`
    Legacy,
    /// `config.json` + `preprocessor_config.json` + `onnx/`
    HuggingFace,
}

/// Resolved model directory with parsed configuration
#[derive(Debug)]
pub struct ModelManager {
    model_path: PathBuf,
    format: ModelFormat,
    model_config: serde_json::Value,
    preprocessor_config: Option<serde_json::Value>,
    variant: String,
}

impl ModelManager {
    /// Resolve a model specification against the filesystem
    ///
    /// # Errors
    /// - Model path does not exist or is not a directory
    /// - No recognizable configuration files in the directory
    /// - JSON parsing errors in configuration files
    /// - Requested variant not present
    pub fn from_spec(spec: &ModelSpec) -> Result<Self> {
        let model_path = spec.path.clone();

        if !model_path.exists() {
            return Err(BgRemovalError::invalid_config(format!(
                "Model path does not exist: {}",
                model_path.display()
            )));
        }
        if !model_path.is_dir() {
            return Err(BgRemovalError::invalid_config(format!(
                "Model path must be a directory: {}",
                model_path.display()
            )));
        }

        match Self::detect_model_format(&model_path)? {
            ModelFormat::HuggingFace => Self::load_huggingface(model_path, spec.variant.clone()),
            ModelFormat::Legacy => Self::load_legacy(model_path, spec.variant.clone()),
        }
    }

    fn detect_model_format(model_path: &Path) -> Result<ModelFormat> {
        if model_path.join("config.json").exists()
            && model_path.join("preprocessor_config.json").exists()
        {
            Ok(ModelFormat::HuggingFace)
        } else if model_path.join("model.json").exists() {
            Ok(ModelFormat::Legacy)
        } else {
            Err(BgRemovalError::invalid_config(format!(
                "No valid model configuration found in: {}. Expected either model.json (legacy) or config.json + preprocessor_config.json (HuggingFace)",
                model_path.display()
            )))
        }
    }

    fn read_json(path: &Path) -> Result<serde_json::Value> {
        let content = fs::read_to_string(path).map_err(|e| {
            BgRemovalError::invalid_config(format!("Failed to read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            BgRemovalError::invalid_config(format!("Failed to parse {}: {e}", path.display()))
        })
    }

    fn load_huggingface(model_path: PathBuf, variant: Option<String>) -> Result<Self> {
        let model_config = Self::read_json(&model_path.join("config.json"))?;
        let preprocessor_config = Self::read_json(&model_path.join("preprocessor_config.json"))?;

        let onnx_dir = model_path.join("onnx");
        if !onnx_dir.is_dir() {
            return Err(BgRemovalError::invalid_config(format!(
                "onnx directory not found in HuggingFace model: {}",
                model_path.display()
            )));
        }

        let available: Vec<String> = [("model.onnx", "fp32"), ("model_fp16.onnx", "fp16")]
            .iter()
            .filter(|(file, _)| onnx_dir.join(file).is_file())
            .map(|(_, variant)| (*variant).to_string())
            .collect();

        let variant = Self::resolve_variant(&model_path, variant, &available)?;

        Ok(Self {
            model_path,
            format: ModelFormat::HuggingFace,
            model_config,
            preprocessor_config: Some(preprocessor_config),
            variant,
        })
    }

    fn load_legacy(model_path: PathBuf, variant: Option<String>) -> Result<Self> {
        let model_config = Self::read_json(&model_path.join("model.json"))?;

        for field in ["name", "variants", "preprocessing"] {
            if model_config.get(field).is_none() {
                return Err(BgRemovalError::invalid_config(format!(
                    "Missing required field '{field}' in model.json"
                )));
            }
        }

        let available: Vec<String> = model_config
            .get("variants")
            .and_then(serde_json::Value::as_object)
            .ok_or_else(|| {
                BgRemovalError::invalid_config("variants section in model.json must be an object")
            })?
            .keys()
            .cloned()
            .collect();

        let variant = Self::resolve_variant(&model_path, variant, &available)?;

        Ok(Self {
            model_path,
            format: ModelFormat::Legacy,
            model_config,
            preprocessor_config: None,
            variant,
        })
    }

    /// Pick the requested variant, or fp32 before fp16 before anything else
    ///
    /// fp32 comes first because Tract cannot execute most half-precision graphs
    /// and Lambda has no GPU to benefit from them.
    fn resolve_variant(
        model_path: &Path,
        requested: Option<String>,
        available: &[String],
    ) -> Result<String> {
        if available.is_empty() {
            return Err(BgRemovalError::model_error_with_context(
                "load",
                model_path,
                "no ONNX variants found",
            ));
        }

        if let Some(variant) = requested {
            if available.contains(&variant) {
                return Ok(variant);
            }
            return Err(BgRemovalError::model_error_with_context(
                "load variant of",
                model_path,
                &format!("variant '{variant}' not found. Available: {available:?}"),
            ));
        }

        ["fp32", "fp16"]
            .iter()
            .find(|preferred| available.iter().any(|v| v == *preferred))
            .map(|v| (*v).to_string())
            .or_else(|| {
                let mut sorted = available.to_vec();
                sorted.sort();
                sorted.into_iter().next()
            })
            .ok_or_else(|| BgRemovalError::internal("variant list unexpectedly empty"))
    }

    /// Resolved precision variant
    #[must_use]
    pub fn variant(&self) -> &str {
        &self.variant
    }

    /// Path of the ONNX file for the resolved variant
    #[must_use]
    pub fn model_file_path(&self) -> PathBuf {
        match self.format {
            ModelFormat::Legacy => self.model_path.join(format!("model_{}.onnx", self.variant)),
            ModelFormat::HuggingFace => {
                let onnx_dir = self.model_path.join("onnx");
                match self.variant.as_str() {
                    "fp16" => onnx_dir.join("model_fp16.onnx"),
                    _ => onnx_dir.join("model.onnx"),
                }
            },
        }
    }

    /// Read the ONNX graph bytes
    ///
    /// # Errors
    /// - Model file missing or unreadable
    pub fn load_model(&self) -> Result<Vec<u8>> {
        let path = self.model_file_path();
        if !path.is_file() {
            return Err(BgRemovalError::invalid_config(format!(
                "Model file not found: {}",
                path.display()
            )));
        }
        fs::read(&path).map_err(|e| {
            BgRemovalError::model_error_with_context("read", &path, &e.to_string())
        })
    }

    /// Model information
    ///
    /// # Errors
    /// - Model file metadata unavailable
    /// - Missing size information in the preprocessing configuration
    pub fn get_info(&self) -> Result<ModelInfo> {
        let size_bytes = fs::metadata(self.model_file_path())
            .map(|m| m.len())
            .map_err(|e| BgRemovalError::model(format!("Failed to stat model file: {e}")))?;

        let [height, width] = self.get_preprocessing_config()?.target_size;
        let (height, width) = (height as usize, width as usize);

        let base_name = match self.format {
            ModelFormat::Legacy => self.model_config.get("name").and_then(|v| v.as_str()),
            ModelFormat::HuggingFace => {
                self.model_config.get("model_type").and_then(|v| v.as_str())
            },
        }
        .unwrap_or("unknown");

        Ok(ModelInfo {
            name: format!("{base_name}-{}", self.variant),
            precision: self.variant.clone(),
            size_bytes,
            input_shape: (1, 3, height, width),
            output_shape: (1, 1, height, width),
        })
    }

    /// Preprocessing configuration
    ///
    /// # Errors
    /// - Missing or malformed size, mean or std entries
    pub fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        match self.format {
            ModelFormat::Legacy => {
                let preprocessing = self.model_config.get("preprocessing").ok_or_else(|| {
                    BgRemovalError::invalid_config("Missing preprocessing config")
                })?;
                let target = preprocessing
                    .get("target_size")
                    .and_then(serde_json::Value::as_array)
                    .ok_or_else(|| {
                        BgRemovalError::invalid_config("Missing target_size in preprocessing config")
                    })?;
                let normalization = preprocessing.get("normalization");

                Ok(PreprocessingConfig {
                    target_size: [
                        parse_dimension(target.first(), "target_size[0]")?,
                        parse_dimension(target.get(1), "target_size[1]")?,
                    ],
                    normalization_mean: parse_triplet(
                        normalization.and_then(|n| n.get("mean")),
                        "normalization.mean",
                    )?,
                    normalization_std: parse_triplet(
                        normalization.and_then(|n| n.get("std")),
                        "normalization.std",
                    )?,
                })
            },
            ModelFormat::HuggingFace => {
                let preprocessor = self.preprocessor_config.as_ref().ok_or_else(|| {
                    BgRemovalError::invalid_config(
                        "Missing preprocessor config for HuggingFace model",
                    )
                })?;
                let size = preprocessor.get("size").ok_or_else(|| {
                    BgRemovalError::invalid_config("Missing size in preprocessor config")
                })?;

                Ok(PreprocessingConfig {
                    target_size: [
                        parse_dimension(size.get("height"), "size.height")?,
                        parse_dimension(size.get("width"), "size.width")?,
                    ],
                    normalization_mean: to_unit_range(parse_triplet(
                        preprocessor.get("image_mean"),
                        "image_mean",
                    )?),
                    normalization_std: to_unit_range(parse_triplet(
                        preprocessor.get("image_std"),
                        "image_std",
                    )?),
                })
            },
        }
    }
}

fn parse_dimension(value: Option<&serde_json::Value>, name: &str) -> Result<u32> {
    let raw = value
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| BgRemovalError::invalid_config(format!("Missing or invalid {name}")))?;
    match u32::try_from(raw) {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(BgRemovalError::invalid_config(format!(
            "{name} out of range: {raw}"
        ))),
    }
}

fn parse_triplet(value: Option<&serde_json::Value>, name: &str) -> Result<[f32; 3]> {
    let values = value
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| BgRemovalError::invalid_config(format!("Missing {name}")))?;
    if values.len() < 3 {
        return Err(BgRemovalError::invalid_config(format!(
            "{name} must have at least 3 values"
        )));
    }

    let mut out = [0.0_f32; 3];
    for (slot, v) in out.iter_mut().zip(values) {
        *slot = v
            .as_f64()
            .ok_or_else(|| BgRemovalError::invalid_config(format!("Invalid value in {name}")))?
            as f32;
    }
    Ok(out)
}

/// HuggingFace configs give mean/std either in 0-255 or 0-1; normalize to 0-1
fn to_unit_range(values: [f32; 3]) -> [f32; 3] {
    if values.iter().any(|v| *v > 1.0) {
        values.map(|v| v / 255.0)
    } else {
        values
    }
}
