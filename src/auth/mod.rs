//! Authentication
//!
//! A static username/key pair is exchanged at `/login/` for a session
//! token, which every protected route then expects as a bearer token.

mod credentials;
mod middleware;
mod tokens;

pub use credentials::Credentials;
pub use middleware::require_token;
pub use tokens::{TokenStore, TOKEN_BYTES};
