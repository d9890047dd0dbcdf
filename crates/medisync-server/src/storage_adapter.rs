//! Adapter exposing the document store as the auth crate's `UserStorage`.

use async_trait::async_trait;
use medisync_auth::{AuthError, UserStorage};
use medisync_core::model::User;
use medisync_storage::{Collection, DynStore, Filter, Query, decode};

/// Reads users out of the `users` collection.
#[derive(Clone)]
pub struct StoreUserStorage {
    store: DynStore,
}

impl StoreUserStorage {
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }
}

impl std::fmt::Debug for StoreUserStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreUserStorage")
            .field("backend", &self.store.backend_name())
            .finish()
    }
}

#[async_trait]
impl UserStorage for StoreUserStorage {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AuthError> {
        match self.store.get(Collection::Users, id).await? {
            Some(doc) => Ok(Some(decode(doc)?)),
            None => Ok(None),
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        // Emails are stored lowercased.
        let query = Query::new()
            .filter(Filter::eq("email", email.trim().to_lowercase()))
            .limit(1);
        let doc = self.store.find(Collection::Users, &query).await?.into_iter().next();
        doc.map(decode).transpose().map_err(AuthError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medisync_core::model::{Role, UserStatus};
    use medisync_storage::encode;
    use time::OffsetDateTime;

    #[tokio::test]
    async fn finds_users_by_id_and_email() {
        let store = medisync_db_memory::create_store();
        let user = User {
            id: "u-1".into(),
            name: "Pat Pharmacist".into(),
            email: "pat@medisync.local".into(),
            password_hash: "hash".into(),
            role: Role::Pharmacy,
            department: None,
            status: UserStatus::Active,
            created_at: OffsetDateTime::now_utc(),
        };
        store
            .insert(Collection::Users, encode(&user).unwrap())
            .await
            .unwrap();

        let users = StoreUserStorage::new(store);
        assert_eq!(users.find_by_id("u-1").await.unwrap().unwrap(), user);
        assert_eq!(
            users
                .find_by_email(" PAT@medisync.local ")
                .await
                .unwrap()
                .unwrap()
                .id,
            "u-1"
        );
        assert!(users.find_by_id("missing").await.unwrap().is_none());
    }
}
