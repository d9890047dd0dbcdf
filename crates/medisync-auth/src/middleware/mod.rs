//! HTTP integration for authentication and authorization.
//!
//! ```ignore
//! async fn handler(user: AuthUser) -> Result<Json<PublicUser>, ApiError> {
//!     user.require(Resource::Profile, Action::Read)?;
//!     Ok(Json(user.public()))
//! }
//! ```

pub mod auth;
pub mod error;

pub use auth::{AuthState, AuthUser};
