use crate::config::AuthConfig;
use crate::error::AppError;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User ID
    pub exp: i64,    // Expiration time
    pub iat: i64,    // Issued at
}

/// Issues and verifies the signed access and refresh tokens. Access tokens
/// are stateless; refresh tokens are additionally tracked in the
/// refresh_tokens table with their own expiry, so revocation works even
/// while the signature is still valid.
pub struct TokenService {
    secret: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            secret: config.jwt_secret.clone(),
            access_ttl: Duration::minutes(config.access_token_minutes),
            refresh_ttl: Duration::days(config.refresh_token_days),
        }
    }

    pub fn issue_access_token(&self, user_id: Uuid) -> Result<String, AppError> {
        self.sign(user_id, self.access_ttl)
    }

    pub fn issue_refresh_token(&self, user_id: Uuid) -> Result<String, AppError> {
        self.sign(user_id, self.refresh_ttl)
    }

    /// Signed lifetime of a refresh token; the stored row's expiry must match.
    pub fn refresh_lifetime(&self) -> Duration {
        self.refresh_ttl
    }

    /// Any failure (bad signature, malformed payload, lapsed expiry) comes
    /// back as one uniform error; clients never learn which it was.
    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|_| AppError::Unauthenticated("Invalid token"))?;

        Ok(data.claims)
    }

    fn sign(&self, user_id: Uuid, ttl: Duration) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Token signing failed: {}", e)))
    }
}

/// Opaque lookup token for verification and reset links: 20 random bytes,
/// hex-encoded (40 characters).
pub fn generate_opaque_token() -> String {
    let mut bytes = [0u8; 20];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// 6-digit numeric reset code, uniform over 100000..=999999.
pub fn generate_reset_code() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_service() -> TokenService {
        TokenService::new(&AuthConfig {
            jwt_secret: "test_secret".to_string(),
            access_token_minutes: 15,
            refresh_token_days: 7,
            reset_token_minutes: 60,
            reset_code_minutes: 15,
            bcrypt_cost: 4,
        })
    }

    #[test]
    fn test_access_token_round_trip() {
        let service = test_service();
        let user_id = Uuid::new_v4();

        let token = service.issue_access_token(user_id).unwrap();
        let claims = service.verify(&token).unwrap();

        assert_eq!(claims.sub, user_id.to_string());
        assert!(claims.exp > claims.iat);
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn test_refresh_token_lifetime() {
        let service = test_service();
        let token = service.issue_refresh_token(Uuid::new_v4()).unwrap();
        let claims = service.verify(&token).unwrap();

        assert_eq!(claims.exp - claims.iat, 7 * 24 * 3600);
        assert_eq!(service.refresh_lifetime(), Duration::days(7));
    }

    #[test]
    fn test_tampered_token_rejected() {
        let service = test_service();
        let token = service.issue_access_token(Uuid::new_v4()).unwrap();

        let mut tampered = token.clone();
        tampered.pop();
        tampered.push(if token.ends_with('a') { 'b' } else { 'a' });

        assert!(matches!(service.verify(&tampered), Err(AppError::Unauthenticated(_))));
        assert!(matches!(service.verify("not-a-jwt"), Err(AppError::Unauthenticated(_))));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let service = test_service();
        let other = TokenService::new(&AuthConfig {
            jwt_secret: "other_secret".to_string(),
            access_token_minutes: 15,
            refresh_token_days: 7,
            reset_token_minutes: 60,
            reset_code_minutes: 15,
            bcrypt_cost: 4,
        });

        let token = service.issue_access_token(Uuid::new_v4()).unwrap();
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let service = test_service();
        // Past the 60s validation leeway
        let token = service.sign(Uuid::new_v4(), Duration::minutes(-2)).unwrap();
        assert!(matches!(service.verify(&token), Err(AppError::Unauthenticated(_))));
    }

    #[test]
    fn test_opaque_token_shape() {
        let token = generate_opaque_token();
        assert_eq!(token.len(), 40);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_opaque_token());
    }

    #[test]
    fn test_reset_code_shape() {
        for _ in 0..100 {
            let code = generate_reset_code();
            assert_eq!(code.len(), 6);
            let n: u32 = code.parse().unwrap();
            assert!((100_000..=999_999).contains(&n));
        }
    }
}
