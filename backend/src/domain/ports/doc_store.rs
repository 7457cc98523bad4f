//! Driven port for the authoritative document store.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error as ThisError;

use crate::domain::document::Document;
use crate::domain::error::Error;

/// Failures surfaced by a document store adapter.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum StoreError {
    #[error("document not found")]
    NotFound,
    #[error("document store unavailable: {0}")]
    Transient(String),
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Error::not_found("document not found"),
            StoreError::Transient(reason) => {
                Error::internal(format!("document store unavailable: {reason}"))
            }
        }
    }
}

/// Typed access to the external document store.
///
/// Adapters own the server clock: `set` stamps `created_at` and
/// `updated_at` unless the caller supplies them, `update` stamps
/// `updated_at` likewise. Reads return records whose timestamp fields the
/// timestamp kit can normalize.
#[async_trait]
pub trait DocStore: Send + Sync {
    /// Fetch a document by primary key.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Create or replace a document, returning the stored record.
    async fn set(&self, collection: &str, id: &str, record: Document)
        -> Result<Document, StoreError>;

    /// Patch an existing document, returning the stored record.
    ///
    /// Fails with [`StoreError::NotFound`] when the document is absent.
    async fn update(&self, collection: &str, id: &str, patch: Document)
        -> Result<Document, StoreError>;

    /// Remove a document. Removing an absent document is not an error.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// All documents whose `field` equals `value`.
    async fn where_equals(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError>;

    /// Every document in a collection, for bulk down-sync reads.
    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError>;
}
