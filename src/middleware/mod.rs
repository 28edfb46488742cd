pub mod auth;
pub mod guards;

pub use auth::{bearer_token, Claims, TokenVerifier};
pub use guards::User;
