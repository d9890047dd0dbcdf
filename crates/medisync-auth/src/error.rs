//! Authentication and authorization error types.

use medisync_api::ApiError;
use medisync_storage::StorageError;

/// Errors that can occur during authentication and authorization.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No bearer token was supplied.
    #[error("Not authorized to access this route, no token")]
    MissingCredentials,

    /// The token is malformed or its signature does not verify.
    #[error("Not authorized, invalid token")]
    InvalidToken {
        /// Underlying decode failure, logged but not returned to clients.
        message: String,
    },

    /// The token has expired.
    #[error("Token has expired")]
    TokenExpired,

    /// The token subject does not resolve to a user.
    #[error("Not authorized, user not found")]
    UserNotFound,

    /// The user account is deactivated.
    #[error("Account is inactive")]
    UserInactive,

    /// Login failed. Deliberately does not say which half was wrong.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// The authenticated role is not allowed to perform the action.
    #[error("User role {role} is not authorized to access this route")]
    Forbidden { role: String },

    /// Storage lookup failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// An internal error occurred.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AuthError {
    /// Creates a new `InvalidToken` error.
    #[must_use]
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken {
            message: message.into(),
        }
    }

    /// Creates a new `Forbidden` error.
    #[must_use]
    pub fn forbidden(role: impl Into<String>) -> Self {
        Self::Forbidden { role: role.into() }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if the caller is not (or no longer) authenticated.
    #[must_use]
    pub fn is_authentication_error(&self) -> bool {
        matches!(
            self,
            Self::MissingCredentials
                | Self::InvalidToken { .. }
                | Self::TokenExpired
                | Self::UserNotFound
                | Self::UserInactive
                | Self::InvalidCredentials
        )
    }

    /// Returns `true` if the caller is authenticated but not allowed.
    #[must_use]
    pub fn is_authorization_error(&self) -> bool {
        matches!(self, Self::Forbidden { .. })
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Storage(e) => ApiError::from(e),
            AuthError::Internal { message } => ApiError::internal(message),
            e if e.is_authorization_error() => ApiError::forbidden(e.to_string()),
            e => ApiError::unauthorized(e.to_string()),
        }
    }
}
