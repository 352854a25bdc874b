//! Database module: connection pooling, models, and the data access layer
//! for users, refresh-token sessions, and the security audit log.

pub mod models;
pub mod operations;

pub use models::{LogStatus, RefreshToken, SecurityLog, User, UserProfile};
pub use operations::DbOperations;
