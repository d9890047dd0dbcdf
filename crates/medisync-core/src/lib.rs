pub mod datetime;
pub mod error;
pub mod events;
pub mod id;
pub mod model;
pub mod token;
pub mod validation;

pub use datetime::{day_bounds, format_rfc3339, now_utc, parse_date, parse_timestamp};
pub use error::{CoreError, Result};
pub use id::generate_id;
pub use token::format_token_number;
pub use validation::{FieldError, ValidationErrors, Validator};
