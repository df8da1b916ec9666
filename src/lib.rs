#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Background Removal Lambda
//!
//! A serverless function that removes the background of images stored in S3.
//! Each invocation names a source object; the function downloads it, runs a
//! segmentation model over it, and uploads a transparent PNG under a derived
//! key in the same bucket.
//!
//! ## Invocation
//!
//! ```json
//! { "bucket": "demo", "key": "a/b/cat.jpg" }
//! ```
//!
//! returns
//!
//! ```json
//! { "status": "completed", "output_key": "processed/cat.jpg" }
//! ```
//!
//! and writes `s3://demo/processed/cat.jpg` with content type `image/png`.
//!
//! ## Components
//!
//! - [`Handler`]: the fetch, segment, store pipeline with stage timings
//! - [`ObjectStore`]: storage seam, implemented by [`S3ObjectStore`] and
//!   [`InMemoryObjectStore`]
//! - [`Segmenter`]: background removal seam, implemented by [`ModelSegmenter`]
//!   over an [`InferenceBackend`] (Tract by default, ONNX Runtime with the
//!   `onnx` feature)
//!
//! ## Local use
//!
//! ```rust,no_run
//! use bgremove_lambda::{
//!     Handler, HandlerConfig, ImageReference, InMemoryObjectStore, ModelSegmenter, RemovalConfig,
//! };
//!
//! # async fn example(bytes: Vec<u8>) -> anyhow::Result<()> {
//! let source = ImageReference::new("demo", "a/b/cat.jpg");
//! let store = InMemoryObjectStore::new().with_object(source.clone(), bytes);
//! let segmenter = ModelSegmenter::new(
//!     RemovalConfig::builder()
//!         .model_path("./models/isnet-general-onnx")
//!         .build()?,
//! );
//!
//! let handler = Handler::new(store, segmenter, HandlerConfig::default());
//! let outcome = handler.process(&source).await?;
//! println!("{} in {:.2}s", outcome.output, outcome.timings.total_time);
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `tract` (default): pure Rust inference backend
//! - `onnx`: ONNX Runtime backend with CUDA support
//! - `webp-support` (default): WebP input decoding

pub mod backends;
pub mod codec;
pub mod config;
pub mod error;
pub mod handler;
pub mod inference;
pub mod models;
pub mod segmenter;
pub mod storage;
pub mod tracing_config;
pub mod types;
pub mod utils;

pub use backends::DefaultBackendFactory;
pub use codec::{ImageCodec, PNG_CONTENT_TYPE};
pub use config::{AppConfig, BackendType, ExecutionProvider, HandlerConfig, RemovalConfig};
pub use error::{BgRemovalError, Result};
pub use handler::{function_handler, Handler};
pub use inference::{BackendFactory, InferenceBackend};
pub use models::{ModelInfo, ModelManager, ModelSpec, PreprocessingConfig};
pub use segmenter::{ModelSegmenter, Segmenter};
pub use storage::{InMemoryObjectStore, ObjectStore, S3ObjectStore, StoredObject};
pub use tracing_config::{TracingConfig, TracingFormat, TELEMETRY_TARGET};
pub use types::{
    ImageReference, ProcessOutcome, ProcessRequest, ProcessResponse, SegmentationMask,
    StageTimings,
};
