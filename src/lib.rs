pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod mail;

use actix_web::HttpResponse;
use std::sync::Arc;
use std::time::Duration;

pub use config::Settings;
pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;

pub use auth::{AuthenticatedUser, TokenService};
pub use db::{DbOperations, RefreshToken, SecurityLog, User};
pub use mail::{MailClient, SendOutcome};

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Application state shared across all request handlers. Constructed once at
/// startup and immutable thereafter; handlers receive it via `web::Data`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub db: DbOperations,
    pub tokens: Arc<TokenService>,
    pub mailer: Arc<MailClient>,
}

impl AppState {
    pub async fn new(config: Settings) -> Result<Self> {
        let db = DbOperations::new_with_options(
            &config.database.url,
            config.database.max_connections,
            Duration::from_secs(5),
        )
        .await?;

        Ok(Self {
            db,
            tokens: Arc::new(TokenService::new(&config.auth)),
            mailer: Arc::new(MailClient::new(&config.mail)),
            config: Arc::new(config),
        })
    }

    /// Assembly from an existing pool; the test suites use this with
    /// throwaway databases.
    pub fn with_pool(config: Settings, pool: Arc<sqlx::PgPool>) -> Self {
        Self {
            db: DbOperations::new(pool),
            tokens: Arc::new(TokenService::new(&config.auth)),
            mailer: Arc::new(MailClient::new(&config.mail)),
            config: Arc::new(config),
        }
    }
}
