//! Amazon S3 object store

use super::{check_size, ObjectStore};
use crate::error::{BgRemovalError, Result};
use crate::types::ImageReference;
use async_trait::async_trait;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::instrument;

/// Error codes S3 uses for transient conditions
const RETRYABLE_CODES: &[&str] = &[
    "SlowDown",
    "Throttling",
    "ThrottlingException",
    "RequestTimeout",
    "RequestTimeTooSkewed",
    "InternalError",
    "ServiceUnavailable",
];

/// Object store backed by an S3 client
///
/// The client is built once per cold start and reused by every invocation.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the ambient AWS configuration (Lambda role, region)
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&config))
    }
}

/// Whether an HTTP status signals a transient failure
fn is_retryable_status(status: u16) -> bool {
    status == 429 || status >= 500
}

/// Convert an SDK failure into a `Storage` error
///
/// `terminal` marks modeled errors known to be permanent (missing object).
fn storage_error<E>(
    operation: &'static str,
    reference: &ImageReference,
    err: SdkError<E, HttpResponse>,
    terminal: bool,
) -> BgRemovalError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let retryable = !terminal
        && match &err {
            SdkError::TimeoutError(_)
            | SdkError::DispatchFailure(_)
            | SdkError::ResponseError(_) => true,
            SdkError::ServiceError(service) => {
                is_retryable_status(service.raw().status().as_u16())
                    || service
                        .err()
                        .code()
                        .is_some_and(|code| RETRYABLE_CODES.contains(&code))
            },
            _ => false,
        };

    BgRemovalError::storage(
        operation,
        reference,
        DisplayErrorContext(&err).to_string(),
        retryable,
    )
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self), fields(bucket = %reference.bucket, key = %reference.key))]
    async fn get_object(
        &self,
        reference: &ImageReference,
        max_bytes: Option<u64>,
    ) -> Result<Vec<u8>> {
        let output = self
            .client
            .get_object()
            .bucket(&reference.bucket)
            .key(&reference.key)
            .send()
            .await
            .map_err(|e| {
                let missing = e
                    .as_service_error()
                    .is_some_and(GetObjectError::is_no_such_key);
                storage_error("download", reference, e, missing)
            })?;

        if let Some(length) = output.content_length() {
            check_size(u64::try_from(length).unwrap_or(0), max_bytes)?;
        }

        let body = output.body.collect().await.map_err(|e| {
            BgRemovalError::storage(
                "download",
                reference,
                format!("failed to read object body: {e}"),
                true,
            )
        })?;
        let bytes = body.into_bytes();
        check_size(bytes.len() as u64, max_bytes)?;

        tracing::debug!(size = bytes.len(), "downloaded object");
        Ok(bytes.to_vec())
    }

    #[instrument(
        skip(self, body),
        fields(bucket = %reference.bucket, key = %reference.key, size = body.len())
    )]
    async fn put_object(
        &self,
        reference: &ImageReference,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        self.client
            .put_object()
            .bucket(&reference.bucket)
            .key(&reference.key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| storage_error("upload", reference, e, false))?;

        tracing::debug!("uploaded object");
        Ok(())
    }
}
