//! In-memory document store backend for the MediSync server.
//!
//! Each collection is an insertion-ordered map guarded by its own async
//! `RwLock`; writes to one collection are serialized, which is what makes the
//! unique-field checks and `modify` atomic. Named sequences live in a
//! `DashMap` and are incremented under its shard lock.
//!
//! # Example
//!
//! ```ignore
//! use medisync_db_memory::InMemoryStore;
//! use medisync_storage::{Collection, DocumentStore};
//!
//! let store = InMemoryStore::new();
//! let dept = store
//!     .insert(Collection::Departments, serde_json::json!({"name": "Cardiology", "code": "CARD"}))
//!     .await?;
//! ```

mod store;

pub use medisync_storage::{DocumentStore, DynStore, StorageError};
pub use store::InMemoryStore;

/// Creates a new shareable in-memory store.
pub fn create_store() -> DynStore {
    std::sync::Arc::new(InMemoryStore::new())
}
