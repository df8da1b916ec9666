//! In-process object store for tests and local runs

use super::{check_size, ObjectStore};
use crate::error::{BgRemovalError, Result};
use crate::types::ImageReference;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Object body and metadata as written by `put_object`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}

/// Object store keeping everything in a map, with call counters
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<ImageReference, StoredObject>>,
    get_calls: AtomicUsize,
    put_calls: AtomicUsize,
    fail_puts: AtomicBool,
}

impl InMemoryObjectStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object without touching the call counters
    pub fn insert(&self, reference: ImageReference, body: Vec<u8>) {
        if let Ok(mut objects) = self.objects.lock() {
            objects.insert(
                reference,
                StoredObject {
                    body,
                    content_type: None,
                },
            );
        }
    }

    /// Builder-style variant of [`insert`](Self::insert)
    #[must_use]
    pub fn with_object(self, reference: ImageReference, body: Vec<u8>) -> Self {
        self.insert(reference, body);
        self
    }

    /// Make every subsequent upload fail with a retryable error
    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Current object at `reference`, if any
    #[must_use]
    pub fn object(&self, reference: &ImageReference) -> Option<StoredObject> {
        self.objects.lock().ok()?.get(reference).cloned()
    }

    /// Number of stored objects
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.lock().map_or(0, |objects| objects.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<ImageReference, StoredObject>>> {
        self.objects
            .lock()
            .map_err(|_| BgRemovalError::internal("Object map lock poisoned"))
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn get_object(
        &self,
        reference: &ImageReference,
        max_bytes: Option<u64>,
    ) -> Result<Vec<u8>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);

        let object = self.lock()?.get(reference).cloned().ok_or_else(|| {
            BgRemovalError::storage("download", reference, "NoSuchKey: object not found", false)
        })?;
        check_size(object.body.len() as u64, max_bytes)?;
        Ok(object.body)
    }

    async fn put_object(
        &self,
        reference: &ImageReference,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(BgRemovalError::storage(
                "upload",
                reference,
                "ServiceUnavailable: injected failure",
                true,
            ));
        }

        self.lock()?.insert(
            reference.clone(),
            StoredObject {
                body,
                content_type: Some(content_type.to_string()),
            },
        );
        Ok(())
    }
}
