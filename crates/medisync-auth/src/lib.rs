//! Authentication and authorization for MediSync.
//!
//! - [`token`]: HS256 JWT issuance and validation
//! - [`password`]: Argon2id password hashing
//! - [`policy`]: the role policy table and [`policy::authorize`]
//! - [`middleware`]: the [`middleware::AuthUser`] extractor and its state
//! - [`storage`]: user lookup contract used by the extractor and login

pub mod error;
pub mod middleware;
pub mod password;
pub mod policy;
pub mod storage;
pub mod token;

pub use error::AuthError;
pub use middleware::{AuthState, AuthUser};
pub use password::{hash_password, verify_password};
pub use policy::{Action, Resource, authorize};
pub use storage::UserStorage;
pub use token::{Claims, JwtError, JwtService};
