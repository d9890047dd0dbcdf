//! User lookup contract.
//!
//! The auth layer only reads users; creation and updates go through the
//! user service in the server crate.

use async_trait::async_trait;
use medisync_core::model::User;

use crate::error::AuthError;

/// Storage for user lookups used by login and the request extractor.
#[async_trait]
pub trait UserStorage: Send + Sync {
    /// Find a user by id.
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AuthError>;

    /// Find a user by email. Implementations compare case-insensitively.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;
}
