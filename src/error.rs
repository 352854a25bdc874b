use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Request-scoped error taxonomy. Every variant maps to a status code and a
/// JSON body of the form `{"error": <message>}`; persistence and
/// configuration failures never leak their underlying message to the client.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    /// Unknown email or password mismatch on login; one message for both.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Verification link with no matching (email, token) pair.
    #[error("Invalid token or email")]
    InvalidLink,

    /// Numeric reset-code failures; the message names the condition but the
    /// kind (and status) is uniform.
    #[error("{0}")]
    InvalidCode(&'static str),

    /// Link-token reset with no matching unexpired token.
    #[error("Invalid or expired token")]
    InvalidResetToken,

    #[error("{0}")]
    Unauthenticated(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("{0}")]
    Internal(String),
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let message = match self {
            // Internal detail stays in the logs
            AppError::Database(_) | AppError::Config(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        };
        HttpResponse::build(self.status_code()).json(json!({ "error": message }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_)
            | AppError::InvalidCredentials
            | AppError::InvalidLink
            | AppError::InvalidCode(_)
            | AppError::InvalidResetToken => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(_) | AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            AppError::BadRequest("Email and password required".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::InvalidCredentials.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::InvalidLink.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::InvalidCode("Code expired").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::InvalidResetToken.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::Unauthenticated("No token provided").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::NotFound("User not found").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Internal("Signup failed".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::AddrInUse, "address in use");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::Internal(_)));

        let db_err = sqlx::Error::RowNotFound;
        let app_err: AppError = db_err.into();
        assert!(matches!(app_err, AppError::Database(_)));
        assert_eq!(app_err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(AppError::InvalidCredentials.to_string(), "Invalid credentials");
        assert_eq!(AppError::InvalidResetToken.to_string(), "Invalid or expired token");
        assert_eq!(AppError::InvalidCode("No code issued").to_string(), "No code issued");
    }

    #[test]
    fn test_database_errors_not_leaked() {
        let err = AppError::Database(sqlx::Error::PoolTimedOut);
        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
