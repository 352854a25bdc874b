//! Authentication module: token issuance/verification, the request guard,
//! and the signup/login/refresh/reset flow handlers.

mod guard;
pub mod handlers;
mod token;

pub use guard::AuthenticatedUser;
pub use token::{generate_opaque_token, generate_reset_code, Claims, TokenService};
