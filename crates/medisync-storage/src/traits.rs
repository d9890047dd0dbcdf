//! Storage traits for the document store abstraction layer.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StorageError;
use crate::query::Query;
use crate::types::Collection;

/// In-place change applied by [`DocumentStore::modify`]. Returning an error
/// aborts the change and leaves the stored document as it was.
pub type Mutation = Box<dyn FnOnce(&mut Value) -> Result<(), StorageError> + Send>;

/// Contract every document store backend implements.
///
/// Documents are JSON objects identified by their `id` string. Implementations
/// must be thread-safe and must enforce the unique fields declared by
/// [`Collection::unique_fields`] atomically with the write that could violate
/// them.
///
/// # Example
///
/// ```ignore
/// async fn get_patient(store: &dyn DocumentStore, id: &str) -> Result<Value, StorageError> {
///     store.require(Collection::Patients, id).await
/// }
/// ```
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts a new document, generating an `id` if it has none.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if the id is taken and
    /// `StorageError::UniqueViolation` if a unique field clashes.
    async fn insert(&self, collection: Collection, doc: Value) -> Result<Value, StorageError>;

    /// Reads a document by id. Returns `None` if it does not exist.
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>, StorageError>;

    /// Replaces a document wholesale. The stored `id` is kept.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the document does not exist.
    async fn replace(
        &self,
        collection: Collection,
        id: &str,
        doc: Value,
    ) -> Result<Value, StorageError>;

    /// Atomic read-modify-write of one document. No other write to the
    /// collection can interleave between the read and the write.
    async fn modify(
        &self,
        collection: Collection,
        id: &str,
        mutation: Mutation,
    ) -> Result<Value, StorageError>;

    /// Deletes a document and returns it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the document does not exist.
    async fn delete(&self, collection: Collection, id: &str) -> Result<Value, StorageError>;

    /// Deletes every document matching the query's filters. Returns how many
    /// were removed.
    async fn delete_where(&self, collection: Collection, query: &Query)
    -> Result<usize, StorageError>;

    /// Lists documents matching the query, sorted as requested.
    async fn find(&self, collection: Collection, query: &Query) -> Result<Vec<Value>, StorageError>;

    /// Counts documents matching the query's filters.
    async fn count(&self, collection: Collection, query: &Query) -> Result<usize, StorageError>;

    /// Increment-and-fetch of a named counter. The first call for a key
    /// returns 1. Values are never reused.
    async fn next_sequence(&self, key: &str) -> Result<u64, StorageError>;

    /// Short backend identifier for logs.
    fn backend_name(&self) -> &'static str;

    /// Reads a document by id, failing with `NotFound` if it is absent.
    async fn require(&self, collection: Collection, id: &str) -> Result<Value, StorageError> {
        self.get(collection, id)
            .await?
            .ok_or_else(|| StorageError::not_found(collection.as_str(), id))
    }

    /// Returns `true` if any document matches the query's filters.
    async fn exists(&self, collection: Collection, query: &Query) -> Result<bool, StorageError> {
        Ok(self.count(collection, query).await? > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time check: the trait must stay usable as a trait object.
    fn _assert_store_object_safe(_: &dyn DocumentStore) {}
}
