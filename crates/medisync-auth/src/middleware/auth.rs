//! Bearer token authentication extractor.
//!
//! The token is read from `Authorization: Bearer <token>` or, for WebSocket
//! upgrades only (browsers cannot set headers there), from the `token` query
//! parameter. The user is reloaded on every request so that deactivation and
//! role changes apply without waiting for token expiry.

use std::ops::Deref;
use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{
        header::{AUTHORIZATION, UPGRADE},
        request::Parts,
    },
};
use medisync_core::model::User;

use crate::error::AuthError;
use crate::policy::{Action, Resource, authorize};
use crate::storage::UserStorage;
use crate::token::{JwtError, JwtService};

/// State required by [`AuthUser`]; exposed to it through `FromRef`.
#[derive(Clone)]
pub struct AuthState {
    pub jwt_service: Arc<JwtService>,
    pub user_storage: Arc<dyn UserStorage>,
}

impl AuthState {
    pub fn new(jwt_service: Arc<JwtService>, user_storage: Arc<dyn UserStorage>) -> Self {
        Self {
            jwt_service,
            user_storage,
        }
    }

    /// Resolve a raw token to an active user.
    ///
    /// # Errors
    ///
    /// Returns an authentication error if the token does not verify, has
    /// expired, or names a missing or inactive user.
    pub async fn authenticate(&self, token: &str) -> Result<User, AuthError> {
        let claims = self.jwt_service.decode(token).map_err(|e| match e {
            JwtError::Expired => AuthError::TokenExpired,
            other => AuthError::invalid_token(other.to_string()),
        })?;

        let user = self
            .user_storage
            .find_by_id(&claims.sub)
            .await?
            .ok_or_else(|| {
                tracing::debug!(user_id = %claims.sub, "token subject not found");
                AuthError::UserNotFound
            })?;

        if !user.is_active() {
            tracing::warn!(user_id = %user.id, "inactive user presented a token");
            return Err(AuthError::UserInactive);
        }

        Ok(user)
    }
}

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl AuthUser {
    /// Check the policy table for this caller's role.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Forbidden`] when the role is not allowed.
    pub fn require(&self, resource: Resource, action: Action) -> Result<(), AuthError> {
        authorize(self.0.role, resource, action)
    }

    pub fn into_inner(self) -> User {
        self.0
    }
}

impl Deref for AuthUser {
    type Target = User;

    fn deref(&self) -> &User {
        &self.0
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = AuthState::from_ref(state);

        let token = extract_bearer(parts)
            .or_else(|| {
                is_websocket_upgrade(parts)
                    .then(|| extract_token_from_query(parts))
                    .flatten()
            })
            .ok_or(AuthError::MissingCredentials)?;

        let user = auth_state.authenticate(&token).await?;
        tracing::debug!(user_id = %user.id, role = %user.role, "request authenticated");
        Ok(AuthUser(user))
    }
}

fn extract_bearer(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
}

fn is_websocket_upgrade(parts: &Parts) -> bool {
    parts
        .headers
        .get(UPGRADE)
        .and_then(|h| h.to_str().ok())
        .is_some_and(|h| h.eq_ignore_ascii_case("websocket"))
}

fn extract_token_from_query(parts: &Parts) -> Option<String> {
    let query = parts.uri.query()?;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "token")
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}
