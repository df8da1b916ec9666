//! Object storage abstraction
//!
//! The handler only needs two capabilities from a store: read a whole object
//! into memory and write a buffer back with a content type.

use crate::error::Result;
use crate::types::ImageReference;
use async_trait::async_trait;

pub mod memory;
pub mod s3;

pub use memory::{InMemoryObjectStore, StoredObject};
pub use s3::S3ObjectStore;

/// Minimal object store used by the handler
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Download the full body of an object
    ///
    /// With `max_bytes` set, objects larger than the limit fail with
    /// `InputTooLarge`, before the body is read whenever the size is known
    /// up front.
    ///
    /// # Errors
    /// - Object or bucket missing, access denied, transport failures
    /// - Object larger than `max_bytes`
    async fn get_object(&self, reference: &ImageReference, max_bytes: Option<u64>)
        -> Result<Vec<u8>>;

    /// Upload `body` with the given content type, replacing any existing object
    ///
    /// # Errors
    /// - Access denied, transport failures
    async fn put_object(
        &self,
        reference: &ImageReference,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<()>;
}

/// Fail with `InputTooLarge` when `size` exceeds `limit`
pub(crate) fn check_size(size: u64, limit: Option<u64>) -> Result<()> {
    match limit {
        Some(limit) if size > limit => {
            Err(crate::error::BgRemovalError::InputTooLarge { size, limit })
        },
        _ => Ok(()),
    }
}
