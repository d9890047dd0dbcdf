//! # medisync-storage
//!
//! Storage abstraction layer for the MediSync server.
//!
//! Entities are persisted as JSON documents in named collections. This crate
//! defines the [`DocumentStore`] contract, the [`Query`] model used for list
//! endpoints, and the [`StorageError`] taxonomy. Backends live in separate
//! crates.
//!
//! ## Example
//!
//! ```ignore
//! use medisync_storage::{Collection, DocumentStore, Filter, Query};
//!
//! async fn waiting_patients(store: &dyn DocumentStore, dept: &str) -> StorageResult<Vec<Value>> {
//!     let query = Query::new()
//!         .filter(Filter::eq("department", dept))
//!         .filter(Filter::eq("status", "waiting"))
//!         .sort_asc("appointmentDate");
//!     store.find(Collection::Patients, &query).await
//! }
//! ```

pub mod codec;
mod error;
mod query;
mod traits;
mod types;

pub use codec::{decode, decode_all, encode};
pub use error::{ErrorCategory, StorageError};
pub use query::{Filter, Query, SortKey, compare_values};
pub use traits::{DocumentStore, Mutation};
pub use types::Collection;

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shared store trait object.
pub type DynStore = std::sync::Arc<dyn DocumentStore>;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::codec::{decode, decode_all, encode};
    pub use crate::error::{ErrorCategory, StorageError};
    pub use crate::query::{Filter, Query, SortKey};
    pub use crate::traits::{DocumentStore, Mutation};
    pub use crate::types::Collection;
    pub use crate::{DynStore, StorageResult};
}
