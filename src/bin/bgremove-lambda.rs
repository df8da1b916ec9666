//! AWS Lambda entry point
//!
//! Cold start: read configuration, install tracing, build the S3 client and
//! load the model. Every invocation then borrows the same [`Handler`].

use anyhow::Context as _;
use bgremove_lambda::{
    function_handler, AppConfig, Handler, ModelSegmenter, S3ObjectStore, TracingConfig,
};
use lambda_runtime::{run, service_fn, LambdaEvent};

#[tokio::main]
async fn main() -> Result<(), lambda_runtime::Error> {
    let config = AppConfig::from_env().context("failed to load configuration")?;
    TracingConfig::new()
        .with_format(config.log_format)
        .init()
        .context("failed to initialize tracing")?;

    let store = S3ObjectStore::from_env().await;

    let segmenter = ModelSegmenter::new(config.removal.clone());
    let model_path = config.removal.model_spec.path.display();
    let load_time = segmenter
        .warm_up()
        .with_context(|| format!("failed to load model from {model_path}"))?
        .unwrap_or_default();
    let model = segmenter.model_info().context("failed to read model metadata")?;
    tracing::info!(
        model_load_time = load_time.as_secs_f64(),
        backend = %config.removal.backend_type,
        model = %model.name,
        precision = %model.precision,
        input_shape = ?model.input_shape,
        "model loaded at cold start"
    );

    let handler = Handler::new(store, segmenter, config.handler);
    run(service_fn(|event: LambdaEvent<serde_json::Value>| {
        function_handler(event, &handler)
    }))
    .await
}
