use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_verified: bool,
    pub verify_token: Option<String>,
    pub reset_token: Option<String>,
    pub reset_token_expiry: Option<DateTime<Utc>>,
    pub reset_code: Option<String>,
    pub reset_code_expiry: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// New unverified user; the caller supplies the already-hashed password
    /// and the opaque verification token.
    pub fn new(
        email: String,
        display_name: Option<String>,
        password_hash: String,
        verify_token: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email,
            display_name,
            password_hash,
            is_verified: false,
            verify_token: Some(verify_token),
            reset_token: None,
            reset_token_expiry: None,
            reset_code: None,
            reset_code_expiry: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Client-safe projection: no hash, no outstanding tokens.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            name: self.display_name.clone(),
            is_verified: self.is_verified,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    #[serde(rename = "isVerified")]
    pub is_verified: bool,
}

/// One active session. The signed token carries its own expiry; this row's
/// `expires_at` is checked independently so deleting the row revokes it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    pub fn new(user_id: Uuid, token: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            token,
            expires_at,
            created_at: Utc::now(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Success,
    Fail,
}

impl LogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStatus::Success => "success",
            LogStatus::Fail => "fail",
        }
    }
}

/// Append-only audit record. Actor fields are optional because failed
/// attempts may precede identification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityLog {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub status: LogStatus,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub record_accessed: Option<String>,
    pub meta: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl SecurityLog {
    pub fn new(status: LogStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: None,
            username: None,
            email: None,
            status,
            ip: None,
            user_agent: None,
            record_accessed: None,
            meta: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_new_user_is_unverified() {
        let user = User::new(
            "a@x.com".to_string(),
            Some("Ada".to_string()),
            "$2b$10$hash".to_string(),
            "deadbeef".to_string(),
        );
        assert!(!user.is_verified);
        assert_eq!(user.verify_token.as_deref(), Some("deadbeef"));
        assert!(user.reset_token.is_none());
        assert!(user.reset_code.is_none());
    }

    #[test]
    fn test_profile_omits_credentials() {
        let user = User::new(
            "a@x.com".to_string(),
            None,
            "$2b$10$hash".to_string(),
            "deadbeef".to_string(),
        );
        let json = serde_json::to_value(user.profile()).unwrap();
        assert_eq!(json["email"], "a@x.com");
        assert_eq!(json["isVerified"], false);
        assert!(json.get("password_hash").is_none());
        assert!(json.get("verify_token").is_none());
    }

    #[test]
    fn test_refresh_token_expiry() {
        let live = RefreshToken::new(Uuid::new_v4(), "t".into(), Utc::now() + Duration::days(7));
        assert!(!live.is_expired());

        let dead = RefreshToken::new(Uuid::new_v4(), "t".into(), Utc::now() - Duration::seconds(1));
        assert!(dead.is_expired());
    }

    #[test]
    fn test_log_status_str() {
        assert_eq!(LogStatus::Success.as_str(), "success");
        assert_eq!(LogStatus::Fail.as_str(), "fail");
    }
}
