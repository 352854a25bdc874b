use crate::db::models::{RefreshToken, SecurityLog, User};
use crate::error::AppError;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Data access layer over the connection pool. Single-statement operations
/// only; the store's per-statement atomicity is the isolation this design
/// relies on.
#[derive(Clone)]
pub struct DbOperations {
    pool: Arc<PgPool>,
}

impl DbOperations {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await?;

        Ok(Self { pool: Arc::new(pool) })
    }

    // ---- users ----

    pub async fn create_user(&self, user: &User) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, display_name, password_hash, is_verified,
                               verify_token, reset_token, reset_token_expiry,
                               reset_code, reset_code_expiry, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.password_hash)
        .bind(user.is_verified)
        .bind(&user.verify_token)
        .bind(&user.reset_token)
        .bind(user.reset_token_expiry)
        .bind(&user.reset_code)
        .bind(user.reset_code_expiry)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    pub async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(user)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(user)
    }

    /// Exact (email, verify_token) match; used by the verification link.
    pub async fn get_user_for_verification(
        &self,
        email: &str,
        token: &str,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE email = $1 AND verify_token = $2",
        )
        .bind(email)
        .bind(token)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(user)
    }

    /// (email, reset_token) match with an unexpired expiry.
    pub async fn get_user_for_reset(
        &self,
        email: &str,
        token: &str,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE email = $1 AND reset_token = $2 AND reset_token_expiry > $3",
        )
        .bind(email)
        .bind(token)
        .bind(Utc::now())
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(user)
    }

    pub async fn mark_verified(&self, user_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE users SET is_verified = TRUE, verify_token = NULL, updated_at = $1 WHERE id = $2",
        )
        .bind(Utc::now())
        .bind(user_id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    /// Overwrites any outstanding link-reset token.
    pub async fn set_reset_token(
        &self,
        user_id: Uuid,
        token: &str,
        expiry: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE users SET reset_token = $1, reset_token_expiry = $2, updated_at = $3 WHERE id = $4",
        )
        .bind(token)
        .bind(expiry)
        .bind(Utc::now())
        .bind(user_id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    /// Overwrites any outstanding numeric code.
    pub async fn set_reset_code(
        &self,
        user_id: Uuid,
        code: &str,
        expiry: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE users SET reset_code = $1, reset_code_expiry = $2, updated_at = $3 WHERE id = $4",
        )
        .bind(code)
        .bind(expiry)
        .bind(Utc::now())
        .bind(user_id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    /// Consumes a verified numeric code and mints the bridging link token in
    /// one statement.
    pub async fn consume_code_and_set_reset_token(
        &self,
        user_id: Uuid,
        token: &str,
        expiry: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE users
            SET reset_code = NULL, reset_code_expiry = NULL,
                reset_token = $1, reset_token_expiry = $2, updated_at = $3
            WHERE id = $4
            "#,
        )
        .bind(token)
        .bind(expiry)
        .bind(Utc::now())
        .bind(user_id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    /// Stores the new hash and clears the reset-token fields; reusing the
    /// token afterwards fails naturally because the field no longer matches.
    pub async fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $1, reset_token = NULL, reset_token_expiry = NULL, updated_at = $2
            WHERE id = $3
            "#,
        )
        .bind(password_hash)
        .bind(Utc::now())
        .bind(user_id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    // ---- refresh tokens ----

    pub async fn insert_refresh_token(&self, token: &RefreshToken) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (id, user_id, token, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(&token.token)
        .bind(token.expires_at)
        .bind(token.created_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    pub async fn get_refresh_token(
        &self,
        user_id: Uuid,
        token: &str,
    ) -> Result<Option<RefreshToken>, AppError> {
        let row = sqlx::query_as::<_, RefreshToken>(
            "SELECT * FROM refresh_tokens WHERE user_id = $1 AND token = $2",
        )
        .bind(user_id)
        .bind(token)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row)
    }

    /// Revocation by token value, not scoped to a user: logout has no
    /// authenticated identity, so the delete matches whichever user holds it.
    pub async fn delete_refresh_token(&self, token: &str) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token = $1")
            .bind(token)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected())
    }

    /// Opportunistic cleanup at login; live sessions are untouched.
    pub async fn prune_expired_refresh_tokens(&self, user_id: Uuid) -> Result<u64, AppError> {
        let result =
            sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1 AND expires_at < $2")
                .bind(user_id)
                .bind(Utc::now())
                .execute(self.pool.as_ref())
                .await?;

        Ok(result.rows_affected())
    }

    // ---- security logs ----

    pub async fn insert_security_log(&self, log: &SecurityLog) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO security_logs (id, user_id, username, email, status, ip,
                                       user_agent, record_accessed, meta, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(log.id)
        .bind(log.user_id)
        .bind(&log.username)
        .bind(&log.email)
        .bind(log.status.as_str())
        .bind(&log.ip)
        .bind(&log.user_agent)
        .bind(&log.record_accessed)
        .bind(&log.meta)
        .bind(log.created_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }
}
