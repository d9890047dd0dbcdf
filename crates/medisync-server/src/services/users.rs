//! Staff accounts: login, registration, admin management and profiles.

use std::sync::Arc;

use medisync_api::ApiError;
use medisync_auth::{AuthError, JwtService, hash_password, verify_password};
use medisync_core::model::{PublicUser, Role, User, UserDraft, UserStatus};
use medisync_core::{generate_id, now_utc};
use medisync_storage::{Collection, DynStore, Filter, Query, decode, decode_all, encode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::{ApiResult, merge_update};

/// A user may not change these through their own profile.
const PROFILE_PROTECTED: &[&str] = &["passwordHash", "role", "status"];

#[derive(Debug, Default, Deserialize)]
pub struct Credentials {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Body returned by login and registration.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub department: Option<String>,
    pub status: UserStatus,
}

impl LoginResponse {
    fn new(user: User, token: String) -> Self {
        Self {
            success: true,
            token,
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            department: user.department,
            status: user.status,
        }
    }
}

#[derive(Clone)]
pub struct UserService {
    store: DynStore,
    jwt: Arc<JwtService>,
    public_registration: bool,
}

impl UserService {
    pub fn new(store: DynStore, jwt: Arc<JwtService>, public_registration: bool) -> Self {
        Self {
            store,
            jwt,
            public_registration,
        }
    }

    pub async fn login(&self, credentials: Credentials) -> ApiResult<LoginResponse> {
        let (Some(email), Some(password)) = (
            credentials.email.filter(|e| !e.trim().is_empty()),
            credentials.password.filter(|p| !p.is_empty()),
        ) else {
            return Err(ApiError::bad_request("Please provide an email and password"));
        };

        let Some(user) = self.find_by_email(&email).await? else {
            return Err(AuthError::InvalidCredentials.into());
        };
        if !verify_blocking(password, user.password_hash.clone()).await? {
            warn!(user_id = %user.id, "login failed: wrong password");
            return Err(AuthError::InvalidCredentials.into());
        }
        if !user.is_active() {
            return Err(AuthError::UserInactive.into());
        }

        let token = self.issue(&user)?;
        info!(user_id = %user.id, role = %user.role, "user logged in");
        Ok(LoginResponse::new(user, token))
    }

    /// Self-service sign-up, answered with a token like login.
    pub async fn register(&self, draft: UserDraft) -> ApiResult<LoginResponse> {
        if !self.public_registration {
            return Err(ApiError::forbidden("Public registration is disabled"));
        }
        let user = self.insert(draft).await?;
        let token = self.issue(&user)?;
        Ok(LoginResponse::new(user, token))
    }

    pub async fn create(&self, draft: UserDraft) -> ApiResult<PublicUser> {
        Ok(self.insert(draft).await?.public())
    }

    pub async fn list(&self) -> ApiResult<Vec<PublicUser>> {
        let users: Vec<User> = decode_all(
            self.store
                .find(Collection::Users, &Query::new().sort_asc("name"))
                .await?,
        )?;
        Ok(users.iter().map(User::public).collect())
    }

    pub async fn get(&self, id: &str) -> ApiResult<PublicUser> {
        Ok(self.load(id).await?.public())
    }

    /// Admin update. A `password` in the patch is re-hashed.
    pub async fn update(&self, id: &str, patch: Value) -> ApiResult<PublicUser> {
        self.apply_update(id, patch, &["passwordHash"]).await
    }

    pub async fn delete(&self, id: &str) -> ApiResult<()> {
        self.store.delete(Collection::Users, id).await?;
        info!(user_id = %id, "user deleted");
        Ok(())
    }

    pub async fn profile(&self, user: &User) -> ApiResult<PublicUser> {
        self.get(&user.id).await
    }

    pub async fn update_profile(&self, user: &User, patch: Value) -> ApiResult<PublicUser> {
        self.apply_update(&user.id, patch, PROFILE_PROTECTED).await
    }

    /// Load a user by email, regardless of status.
    pub async fn find_by_email(&self, email: &str) -> ApiResult<Option<User>> {
        let query = Query::new()
            .filter(Filter::eq("email", email.trim().to_lowercase()))
            .limit(1);
        let doc = self.store.find(Collection::Users, &query).await?.into_iter().next();
        Ok(doc.map(decode).transpose()?)
    }

    async fn insert(&self, draft: UserDraft) -> ApiResult<User> {
        let hash = match draft.new_password() {
            Some(password) => Some(hash_blocking(password.to_string()).await?),
            None => None,
        };
        let user = draft.into_user(generate_id(), hash, now_utc())?;
        self.store.insert(Collection::Users, encode(&user)?).await?;
        info!(user_id = %user.id, role = %user.role, "user created");
        Ok(user)
    }

    async fn apply_update(&self, id: &str, patch: Value, protected: &[&str]) -> ApiResult<PublicUser> {
        let current = self.load(id).await?;
        let mut doc = encode(&current)?;
        merge_update(&mut doc, patch, protected)?;
        let draft: UserDraft = serde_json::from_value(doc)
            .map_err(|e| ApiError::bad_request(format!("Invalid user update: {e}")))?;
        let hash = match draft.new_password() {
            Some(password) => hash_blocking(password.to_string()).await?,
            None => current.password_hash.clone(),
        };
        let updated = draft.into_user(current.id.clone(), Some(hash), current.created_at)?;

        self.store
            .replace(Collection::Users, id, encode(&updated)?)
            .await?;
        info!(user_id = %id, "user updated");
        Ok(updated.public())
    }

    async fn load(&self, id: &str) -> ApiResult<User> {
        Ok(decode(self.store.require(Collection::Users, id).await?)?)
    }

    fn issue(&self, user: &User) -> ApiResult<String> {
        self.jwt
            .issue(&user.id, user.role)
            .map_err(|e| ApiError::internal(format!("failed to issue token: {e}")))
    }
}

// Argon2 runs on the blocking pool.
async fn hash_blocking(password: String) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::internal(format!("password task failed: {e}")))?
        .map_err(ApiError::from)
}

async fn verify_blocking(password: String, hash: String) -> ApiResult<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| ApiError::internal(format!("password task failed: {e}")))?
        .map_err(ApiError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::Duration;

    fn service(public_registration: bool) -> UserService {
        UserService::new(
            medisync_db_memory::create_store(),
            Arc::new(JwtService::new(b"test-secret-0123456789", Duration::days(30))),
            public_registration,
        )
    }

    fn draft(body: Value) -> UserDraft {
        serde_json::from_value(body).unwrap()
    }

    fn credentials(email: &str, password: &str) -> Credentials {
        Credentials {
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }

    #[tokio::test]
    async fn register_then_login() {
        let service = service(true);
        let registered = service
            .register(draft(json!({
                "name": "Rita Reception",
                "email": "Rita@Hospital.org",
                "password": "secret1"
            })))
            .await
            .unwrap();
        assert_eq!(registered.role, Role::Reception);
        assert_eq!(registered.email, "rita@hospital.org");

        let login = service
            .login(credentials("rita@hospital.org", "secret1"))
            .await
            .unwrap();
        assert!(login.success);
        assert_eq!(login.id, registered.id);
        assert!(!login.token.is_empty());

        let err = service
            .login(credentials("rita@hospital.org", "wrong-pw"))
            .await
            .unwrap_err();
        assert_eq!(err.public_message(), "Invalid email or password");
    }

    #[tokio::test]
    async fn registration_can_be_disabled() {
        let err = service(false)
            .register(draft(json!({"name": "X", "email": "x@y.z", "password": "secret1"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let service = service(true);
        let body = json!({"name": "A", "email": "a@b.c", "password": "secret1"});
        service.create(draft(body.clone())).await.unwrap();
        let err = service.create(draft(body)).await.unwrap_err();
        assert_eq!(err.public_message(), "User with this email already exists");
    }

    #[tokio::test]
    async fn inactive_users_cannot_log_in() {
        let service = service(true);
        service
            .create(draft(json!({
                "name": "Gone",
                "email": "gone@b.c",
                "password": "secret1",
                "status": "inactive"
            })))
            .await
            .unwrap();
        let err = service
            .login(credentials("gone@b.c", "secret1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn profile_update_cannot_escalate() {
        let service = service(true);
        let created = service
            .create(draft(json!({"name": "Nina", "email": "n@b.c", "password": "secret1", "role": "nurse"})))
            .await
            .unwrap();
        let user = service.load(&created.id).await.unwrap();

        let updated = service
            .update_profile(&user, json!({"name": "Nina N.", "role": "admin", "status": "inactive"}))
            .await
            .unwrap();
        assert_eq!(updated.name, "Nina N.");
        assert_eq!(updated.role, Role::Nurse);
        assert_eq!(updated.status, UserStatus::Active);

        service
            .update(&created.id, json!({"password": "newsecret"}))
            .await
            .unwrap();
        assert!(service.login(credentials("n@b.c", "newsecret")).await.is_ok());
        assert!(service.login(credentials("n@b.c", "secret1")).await.is_err());
    }
}
