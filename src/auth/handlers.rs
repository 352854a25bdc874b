use crate::auth::guard::AuthenticatedUser;
use crate::auth::token::{generate_opaque_token, generate_reset_code};
use crate::db::{LogStatus, RefreshToken, SecurityLog, User};
use crate::error::AppError;
use crate::mail::SendOutcome;
use crate::AppState;
use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

const REFRESH_COOKIE: &str = "refreshToken";

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub token: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotRequest {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyCodeRequest {
    pub email: Option<String>,
    pub code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub email: Option<String>,
    pub token: Option<String>,
    pub password: Option<String>,
}

/// Present-and-non-empty body field, per the source contract where an empty
/// string fails the same way as an absent one.
fn require(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|v| !v.is_empty())
}

/// Converts any store/hashing error into a stage-specific 500, logging the
/// real cause server-side only.
fn internal<E: std::fmt::Display>(stage: &'static str) -> impl Fn(E) -> AppError {
    move |e| {
        error!("{}: {}", stage, e);
        AppError::Internal(stage.to_string())
    }
}

/// Bcrypt is the one deliberately expensive call per request; run it on the
/// blocking pool so the worker keeps scheduling other in-flight requests.
async fn hash_password(password: &str, cost: u32) -> Result<String, String> {
    let password = password.to_string();
    web::block(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())
}

async fn verify_password(password: &str, hash: &str) -> Result<bool, String> {
    let password = password.to_string();
    let hash = hash.to_string();
    web::block(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())
}

fn refresh_cookie(token: String, days: i64) -> Cookie<'static> {
    Cookie::build(REFRESH_COOKIE, token)
        .path("/")
        .http_only(true)
        .secure(false)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::days(days))
        .finish()
}

fn clear_refresh_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::new(REFRESH_COOKIE, "");
    cookie.set_path("/");
    cookie.make_removal();
    cookie
}

/// Audit-sink write; failure to record never fails the request.
async fn record_login_attempt(
    state: &AppState,
    status: LogStatus,
    user: Option<&User>,
    email: &str,
    req: &HttpRequest,
) {
    let log = SecurityLog {
        user_id: user.map(|u| u.id),
        username: user.and_then(|u| u.display_name.clone()),
        email: Some(email.to_string()),
        ip: req.peer_addr().map(|addr| addr.ip().to_string()),
        user_agent: req
            .headers()
            .get(header::USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .map(String::from),
        record_accessed: Some("login".to_string()),
        ..SecurityLog::new(status)
    };

    if let Err(e) = state.db.insert_security_log(&log).await {
        error!("Failed to write security log: {}", e);
    }
}

/// POST /api/auth/signup
///
/// Creates an unverified user and mails a verification link. An existing
/// email answers 200 with `exists: true`; a notifier failure answers 200
/// with `emailError: true` and leaves the account in place.
pub async fn signup(
    body: web::Json<SignupRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let (Some(email), Some(password)) = (require(&body.email), require(&body.password)) else {
        return Err(AppError::BadRequest("Email and password required".to_string()));
    };
    info!("Received signup request for email: {}", email);

    let existing = state
        .db
        .get_user_by_email(email)
        .await
        .map_err(internal("Signup failed"))?;
    if existing.is_some() {
        return Ok(HttpResponse::Ok().json(json!({
            "message": "User already exists",
            "exists": true,
        })));
    }

    let hashed = hash_password(password, state.config.auth.bcrypt_cost)
        .await
        .map_err(internal("Signup failed"))?;
    let verify_token = generate_opaque_token();
    let user = User::new(
        email.to_string(),
        body.name.clone().filter(|n| !n.is_empty()),
        hashed,
        verify_token.clone(),
    );
    state
        .db
        .create_user(&user)
        .await
        .map_err(internal("Signup failed"))?;

    let verify_link = format!(
        "{}/api/auth/verify?token={}&email={}",
        state.config.client_url,
        verify_token,
        urlencoding::encode(email)
    );
    let text = format!("Verify: {}", verify_link);
    let html = format!("<p>Click <a href=\"{}\">here</a> to verify</p>", verify_link);

    match state.mailer.send(email, "Verify your account", &text, &html).await {
        Ok(_) => Ok(HttpResponse::Ok().json(json!({
            "message": "User created, verification email sent",
        }))),
        Err(e) => {
            // The account stays; the client is told the email may be missing
            error!("Verification email failed to send: {}", e);
            Ok(HttpResponse::Ok().json(json!({
                "message": "User created, but verification email failed to send",
                "emailError": true,
            })))
        }
    }
}

/// GET /api/auth/verify?token=..&email=..
///
/// Single use: the matching token is cleared on success, so a replay no
/// longer finds a match.
pub async fn verify_email(
    query: web::Query<VerifyQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let (Some(token), Some(email)) = (require(&query.token), require(&query.email)) else {
        return Err(AppError::BadRequest("Invalid verify link".to_string()));
    };

    let user = state
        .db
        .get_user_for_verification(email, token)
        .await
        .map_err(internal("Verification failed"))?
        .ok_or(AppError::InvalidLink)?;

    state
        .db
        .mark_verified(user.id)
        .await
        .map_err(internal("Verification failed"))?;

    info!("Email verified for {}", email);
    Ok(HttpResponse::Ok().json(json!({ "message": "Email verified" })))
}

/// POST /api/auth/login
///
/// Uniform `Invalid credentials` whether the email is unknown or the
/// password mismatches. Success issues an access token in the body and the
/// refresh token as an HttpOnly cookie, appending it to the user's session
/// set (multi-device: prior tokens stay valid).
pub async fn login(
    req: HttpRequest,
    body: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let (Some(email), Some(password)) = (require(&body.email), require(&body.password)) else {
        return Err(AppError::BadRequest("Email and password required".to_string()));
    };
    info!("Received login request for email: {}", email);

    let Some(user) = state
        .db
        .get_user_by_email(email)
        .await
        .map_err(internal("Login failed"))?
    else {
        record_login_attempt(&state, LogStatus::Fail, None, email, &req).await;
        return Err(AppError::InvalidCredentials);
    };

    let password_ok = verify_password(password, &user.password_hash)
        .await
        .map_err(internal("Login failed"))?;
    if !password_ok {
        warn!("Login failed for email: {}", email);
        record_login_attempt(&state, LogStatus::Fail, Some(&user), email, &req).await;
        return Err(AppError::InvalidCredentials);
    }

    let access_token = state.tokens.issue_access_token(user.id)?;
    let refresh_token = state.tokens.issue_refresh_token(user.id)?;
    let expires_at = Utc::now() + state.tokens.refresh_lifetime();

    state
        .db
        .insert_refresh_token(&RefreshToken::new(user.id, refresh_token.clone(), expires_at))
        .await
        .map_err(internal("Login failed"))?;

    match state.db.prune_expired_refresh_tokens(user.id).await {
        Ok(0) => {}
        Ok(n) => info!("Pruned {} expired refresh tokens for {}", n, email),
        Err(e) => warn!("Refresh token pruning failed: {}", e),
    }

    record_login_attempt(&state, LogStatus::Success, Some(&user), email, &req).await;
    info!("Login successful for email: {}", email);

    Ok(HttpResponse::Ok()
        .cookie(refresh_cookie(refresh_token, state.config.auth.refresh_token_days))
        .json(json!({
            "token": access_token,
            "user": user.profile(),
        })))
}

/// POST /api/auth/logout
///
/// Removes the cookie's token from whichever user holds it (the caller is
/// not otherwise identified here) and clears the cookie. Always succeeds.
pub async fn logout(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    if let Some(cookie) = req.cookie(REFRESH_COOKIE) {
        match state.db.delete_refresh_token(cookie.value()).await {
            Ok(n) if n > 0 => info!("Revoked {} refresh token(s) on logout", n),
            Ok(_) => {}
            Err(e) => warn!("Logout revocation failed: {}", e),
        }
    }

    HttpResponse::Ok()
        .cookie(clear_refresh_cookie())
        .json(json!({ "message": "Logged out" }))
}

/// POST /api/auth/refresh
///
/// Exchanges the refresh cookie for a new access token. The token must pass
/// signature verification and the stored row's own expiry check; the
/// refresh token itself is not rotated.
pub async fn refresh(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let Some(cookie) = req.cookie(REFRESH_COOKIE) else {
        return Err(AppError::Unauthenticated("No refresh token"));
    };
    let refresh_token = cookie.value();

    let claims = state
        .tokens
        .verify(refresh_token)
        .map_err(|_| AppError::Unauthenticated("Invalid refresh token"))?;
    let user_id = claims
        .sub
        .parse()
        .map_err(|_| AppError::Unauthenticated("Invalid refresh token"))?;

    let user = state
        .db
        .get_user_by_id(user_id)
        .await
        .map_err(|e| {
            error!("Refresh lookup failed: {}", e);
            AppError::Unauthenticated("Invalid refresh token")
        })?
        .ok_or(AppError::Unauthenticated("Invalid refresh token"))?;

    // Second, independent expiry check against the stored session row
    let stored = state
        .db
        .get_refresh_token(user.id, refresh_token)
        .await
        .map_err(|e| {
            error!("Refresh lookup failed: {}", e);
            AppError::Unauthenticated("Invalid refresh token")
        })?;
    match stored {
        Some(row) if !row.is_expired() => {}
        _ => return Err(AppError::Unauthenticated("Refresh token expired")),
    }

    let access_token = state.tokens.issue_access_token(user.id)?;
    Ok(HttpResponse::Ok().json(json!({ "token": access_token })))
}

/// POST /api/auth/forgot
///
/// Link-token reset flow. Unknown emails get the same 200 message; in
/// non-production or when the notifier skipped, the raw link rides along
/// for manual testing.
pub async fn forgot_password(
    body: web::Json<ForgotRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let Some(email) = require(&body.email) else {
        return Err(AppError::BadRequest("Email required".to_string()));
    };

    let message = "If user exists, reset email sent";
    let Some(user) = state
        .db
        .get_user_by_email(email)
        .await
        .map_err(internal("Forgot password failed"))?
    else {
        return Ok(HttpResponse::Ok().json(json!({ "message": message })));
    };

    let token = generate_opaque_token();
    let expiry = Utc::now() + Duration::minutes(state.config.auth.reset_token_minutes);
    state
        .db
        .set_reset_token(user.id, &token, expiry)
        .await
        .map_err(internal("Forgot password failed"))?;

    let reset_link = format!(
        "{}/reset-password?token={}&email={}",
        state.config.client_url,
        token,
        urlencoding::encode(email)
    );
    let text = format!("Reset: {}", reset_link);
    let html = format!("<p>Reset your password <a href=\"{}\">here</a></p>", reset_link);

    let outcome = match state.mailer.send(email, "Reset your password", &text, &html).await {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            error!("Forgot password mail send failed: {}", e);
            None
        }
    };

    let skipped = outcome == Some(SendOutcome::Skipped);
    let mut response = json!({ "message": message });
    if !state.config.is_production() || skipped {
        info!("Password reset link (dev): {}", reset_link);
        response["resetLink"] = json!(reset_link);
        if skipped {
            response["emailSkipped"] = json!(true);
        }
    }

    Ok(HttpResponse::Ok().json(response))
}

/// POST /api/auth/forgot-code
///
/// Numeric-code reset flow; same anti-enumeration and dev-echo pattern as
/// the link flow.
pub async fn forgot_code(
    body: web::Json<ForgotRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let Some(email) = require(&body.email) else {
        return Err(AppError::BadRequest("Email required".to_string()));
    };

    let message = "If user exists, reset code sent";
    let Some(user) = state
        .db
        .get_user_by_email(email)
        .await
        .map_err(internal("Failed to request reset code"))?
    else {
        return Ok(HttpResponse::Ok().json(json!({ "message": message })));
    };

    let code = generate_reset_code();
    let expiry = Utc::now() + Duration::minutes(state.config.auth.reset_code_minutes);
    state
        .db
        .set_reset_code(user.id, &code, expiry)
        .await
        .map_err(internal("Failed to request reset code"))?;

    let text = format!("Your password reset code: {}", code);
    let html = format!("<p>Your password reset code: <strong>{}</strong></p>", code);

    let outcome = match state
        .mailer
        .send(email, "Your password reset code", &text, &html)
        .await
    {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            error!("Reset code mail send failed: {}", e);
            None
        }
    };

    let skipped = outcome == Some(SendOutcome::Skipped);
    let mut response = json!({ "message": message });
    if !state.config.is_production() || skipped {
        info!("Reset code (dev) issued for {}", email);
        response["resetCode"] = json!(code);
        if skipped {
            response["emailSkipped"] = json!(true);
        }
    }

    Ok(HttpResponse::Ok().json(response))
}

/// POST /api/auth/verify-code
///
/// Consumes a valid numeric code and answers with a fresh single-use reset
/// token, bridging into the link flow's finishing step.
pub async fn verify_code(
    body: web::Json<VerifyCodeRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let (Some(email), Some(code)) = (require(&body.email), require(&body.code)) else {
        return Err(AppError::BadRequest("Email and code required".to_string()));
    };

    let user = state
        .db
        .get_user_by_email(email)
        .await
        .map_err(internal("Failed to verify code"))?
        .ok_or(AppError::InvalidCode("Invalid code or email"))?;

    let (Some(issued), Some(expiry)) = (&user.reset_code, user.reset_code_expiry) else {
        return Err(AppError::InvalidCode("No code issued"));
    };
    if expiry < Utc::now() {
        return Err(AppError::InvalidCode("Code expired"));
    }
    if issued.as_str() != code {
        return Err(AppError::InvalidCode("Invalid code"));
    }

    let token = generate_opaque_token();
    let token_expiry = Utc::now() + Duration::minutes(state.config.auth.reset_token_minutes);
    state
        .db
        .consume_code_and_set_reset_token(user.id, &token, token_expiry)
        .await
        .map_err(internal("Failed to verify code"))?;

    info!("Reset code verified for {}", email);
    Ok(HttpResponse::Ok().json(json!({
        "message": "Code verified",
        "resetToken": token,
    })))
}

/// POST /api/auth/reset and /api/auth/reset-with-token (identical contract).
///
/// Rehashes and stores the new password for a matching unexpired reset
/// token, then clears the token fields; a second use no longer matches.
pub async fn reset_password(
    body: web::Json<ResetRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let (Some(email), Some(token), Some(password)) = (
        require(&body.email),
        require(&body.token),
        require(&body.password),
    ) else {
        return Err(AppError::BadRequest("Invalid request".to_string()));
    };

    let user = state
        .db
        .get_user_for_reset(email, token)
        .await
        .map_err(internal("Reset failed"))?
        .ok_or(AppError::InvalidResetToken)?;

    let hashed = hash_password(password, state.config.auth.bcrypt_cost)
        .await
        .map_err(internal("Reset failed"))?;
    state
        .db
        .update_password(user.id, &hashed)
        .await
        .map_err(internal("Reset failed"))?;

    info!("Password reset for {}", email);
    Ok(HttpResponse::Ok().json(json!({ "message": "Password reset successful" })))
}

/// GET /api/auth/check
///
/// Guard-protected identity probe; 404 when the token's user has vanished.
pub async fn check(
    auth: AuthenticatedUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = state
        .db
        .get_user_by_id(auth.user_id)
        .await?
        .ok_or(AppError::NotFound("User not found"))?;

    Ok(HttpResponse::Ok().json(json!({ "user": user.profile() })))
}
