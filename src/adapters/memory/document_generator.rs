//! Document generator that records requests instead of sending them.

use async_trait::async_trait;
use std::sync::Mutex;

use super::lock;
use crate::ports::{DocumentError, DocumentGenerator, DocumentRequest};

#[derive(Default)]
pub struct RecordingDocumentGenerator {
    requests: Mutex<Vec<DocumentRequest>>,
    failure: Mutex<Option<DocumentError>>,
}

impl RecordingDocumentGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every later request fails with `error` until `succeed` is called.
    pub fn fail_with(&self, error: DocumentError) {
        *lock(&self.failure) = Some(error);
    }

    pub fn succeed(&self) {
        *lock(&self.failure) = None;
    }

    /// Requests accepted so far. Failed requests are not recorded.
    pub fn requests(&self) -> Vec<DocumentRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl DocumentGenerator for RecordingDocumentGenerator {
    async fn request_generation(&self, request: DocumentRequest) -> Result<(), DocumentError> {
        if let Some(error) = lock(&self.failure).clone() {
            return Err(error);
        }
        lock(&self.requests).push(request);
        Ok(())
    }
}
