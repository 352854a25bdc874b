use crate::error::AppError;
use crate::AppState;
use actix_web::http::header;
use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use std::future::{ready, Ready};
use tracing::warn;
use uuid::Uuid;

/// Extractor guarding protected routes. Looks for a bearer credential in the
/// `Authorization` header first, then the `accessToken` cookie; verifies it
/// and attaches only the resolved user id. No other side effects.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Ready<Result<Self, AppError>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(resolve(req))
    }
}

fn resolve(req: &HttpRequest) -> Result<AuthenticatedUser, AppError> {
    let bearer = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_owned);

    let token = bearer.or_else(|| req.cookie("accessToken").map(|c| c.value().to_owned()));

    let Some(token) = token else {
        return Err(AppError::Unauthenticated("No token provided"));
    };

    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| AppError::Internal("Application state missing".to_string()))?;

    let claims = state.tokens.verify(&token).map_err(|_| {
        warn!("Rejected request with invalid access token");
        AppError::Unauthenticated("Invalid token")
    })?;

    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Unauthenticated("Invalid token"))?;

    Ok(AuthenticatedUser { user_id })
}
