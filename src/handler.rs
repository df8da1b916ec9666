//! Invocation pipeline: fetch, remove background, store
//!
//! One [`Handler`] is built at cold start and borrowed by every invocation.
//! Each invocation is a straight line with no branching beyond error exits:
//!
//! 1. download the source object into memory
//! 2. decode to RGBA8 and run the segmenter (blocking pool)
//! 3. encode PNG and upload under `output_prefix + file name`
//! 4. log one record with the stage timings

use crate::codec::{ImageCodec, PNG_CONTENT_TYPE};
use crate::config::HandlerConfig;
use crate::error::{BgRemovalError, Result};
use crate::segmenter::Segmenter;
use crate::storage::ObjectStore;
use crate::tracing_config::TELEMETRY_TARGET;
use crate::types::{ImageReference, ProcessOutcome, ProcessRequest, ProcessResponse, StageTimings};
use instant::Instant;
use lambda_runtime::LambdaEvent;
use std::sync::Arc;
use tracing::{error, info, Instrument, Span};

/// Background removal pipeline over an object store and a segmenter
pub struct Handler<S, M> {
    store: S,
    segmenter: Arc<M>,
    codec: ImageCodec,
    config: HandlerConfig,
}

impl<S, M> std::fmt::Debug for Handler<S, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<S, M> Handler<S, M>
where
    S: ObjectStore,
    M: Segmenter + 'static,
{
    pub fn new(store: S, segmenter: M, config: HandlerConfig) -> Self {
        Self::with_shared_segmenter(store, Arc::new(segmenter), config)
    }

    /// Create a handler sharing an already wrapped segmenter
    pub fn with_shared_segmenter(store: S, segmenter: Arc<M>, config: HandlerConfig) -> Self {
        let codec = ImageCodec::new(config.max_image_dimension);
        Self {
            store,
            segmenter,
            codec,
            config,
        }
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    /// Destination of the processed image for `source`
    #[must_use]
    pub fn output_reference(&self, source: &ImageReference) -> ImageReference {
        source.derive_output(&self.config.output_prefix)
    }

    /// Run the pipeline for one source object
    ///
    /// Nothing is written unless every earlier step succeeded.
    ///
    /// # Errors
    /// - `Storage` / `InputTooLarge` when the source cannot be read
    /// - `Image`, `Processing`, `Inference` when decoding or segmentation fails
    /// - `Storage` when the destination cannot be written
    pub async fn process(&self, source: &ImageReference) -> Result<ProcessOutcome> {
        let output = self.output_reference(source);
        let total_start = Instant::now();

        let stage_start = Instant::now();
        let bytes = self
            .store
            .get_object(source, self.config.max_input_bytes)
            .await?;
        let download_time = stage_start.elapsed().as_secs_f64();

        let stage_start = Instant::now();
        let codec = self.codec.clone();
        let segmenter = Arc::clone(&self.segmenter);
        let image = run_blocking(move || {
            let image = codec.decode_rgba(&bytes)?;
            drop(bytes);
            segmenter.segment(image)
        })
        .await?;
        let process_time = stage_start.elapsed().as_secs_f64();

        let stage_start = Instant::now();
        let codec = self.codec.clone();
        let png = run_blocking(move || codec.encode_png(&image)).await?;
        self.store
            .put_object(&output, png, PNG_CONTENT_TYPE)
            .await?;
        let upload_time = stage_start.elapsed().as_secs_f64();

        let timings = StageTimings {
            download_time,
            process_time,
            upload_time,
            total_time: total_start.elapsed().as_secs_f64(),
        };

        info!(
            target: TELEMETRY_TARGET,
            download_time = timings.download_time,
            process_time = timings.process_time,
            upload_time = timings.upload_time,
            total_time = timings.total_time,
            output_key = %output.key,
            "background removed"
        );

        Ok(ProcessOutcome { output, timings })
    }

    /// Process a validated invocation request
    ///
    /// # Errors
    /// - Any error from [`process`](Self::process)
    pub async fn handle(&self, request: ProcessRequest) -> Result<ProcessResponse> {
        let source = request.reference();
        let outcome = self
            .process(&source)
            .instrument(tracing::info_span!(
                "process",
                bucket = %source.bucket,
                key = %source.key
            ))
            .await?;
        Ok(ProcessResponse::completed(outcome.output.key))
    }
}

/// Run CPU-bound work on the blocking pool inside the current span
async fn run_blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let span = Span::current();
    tokio::task::spawn_blocking(move || span.in_scope(work))
        .await
        .map_err(|e| BgRemovalError::internal(format!("Blocking task failed: {e}")))?
}

/// Lambda entry point for one invocation
///
/// The payload is validated before any store access. Failures are logged
/// with their classification and returned to the runtime, which reports the
/// invocation as failed.
///
/// # Errors
/// - Malformed payload
/// - Any pipeline error
pub async fn function_handler<S, M>(
    event: LambdaEvent<serde_json::Value>,
    handler: &Handler<S, M>,
) -> std::result::Result<ProcessResponse, lambda_runtime::Error>
where
    S: ObjectStore,
    M: Segmenter + 'static,
{
    let LambdaEvent { payload, context } = event;
    let span = tracing::info_span!("invocation", request_id = %context.request_id);

    async move {
        let result = match ProcessRequest::from_value(payload) {
            Ok(request) => handler.handle(request).await,
            Err(e) => Err(e),
        };

        result.map_err(|e| {
            error!(
                error = %e,
                error_kind = e.kind(),
                retryable = e.is_retryable(),
                "invocation failed"
            );
            lambda_runtime::Error::from(e)
        })
    }
    .instrument(span)
    .await
}
