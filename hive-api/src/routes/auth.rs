use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use hive_core::models::UserProfile;
use hive_core::services::{Registration, Session};
use hive_core::store::Store;
use hive_core::validation::{ProfileChanges, RegisterInput};
use hive_shared::errors::{AppError, AppResult, ErrorCode};
use hive_shared::types::auth::AuthUser;
use hive_shared::types::ApiResponse;

use crate::events::publisher;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ResendVerificationRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn register<S: Store>(
    State(state): State<AppState<S>>,
    Json(req): Json<RegisterInput>,
) -> AppResult<ApiResponse<Registration>> {
    let registration = state.run(move |engine| engine.register(req)).await?;
    let user = &registration.user;

    if let Err(e) = state
        .email
        .send_verification_code(&user.email, &user.display_name, &registration.verification_code)
        .await
    {
        tracing::error!(error = %e, user_id = %user.id, "failed to send verification email");
    }
    publisher::publish_user_registered(&state, user.id, &user.email).await;

    Ok(ApiResponse::created(registration).with_message("verification code sent"))
}

pub async fn verify_email<S: Store>(
    State(state): State<AppState<S>>,
    Json(req): Json<VerifyEmailRequest>,
) -> AppResult<ApiResponse<Session>> {
    let session = state.run(move |engine| engine.verify_email(&req.email, &req.code)).await?;
    Ok(ApiResponse::ok_with_message(session, "email verified"))
}

/// One code per email per minute. Redis failures let the request through.
pub async fn resend_verification<S: Store>(
    State(state): State<AppState<S>>,
    Json(req): Json<ResendVerificationRequest>,
) -> AppResult<ApiResponse<&'static str>> {
    if let Some(redis) = &state.redis {
        let key = format!("hive:resend:{}", req.email.trim().to_lowercase());
        let allowed = redis.rate_limit_check(&key, 1, 60).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "resend rate limit check failed");
            true
        });
        if !allowed {
            return Err(AppError::new(
                ErrorCode::RateLimited,
                "please wait before requesting a new code",
            ));
        }
    }

    let registration = state.run(move |engine| engine.resend_verification(&req.email)).await?;
    let user = &registration.user;
    if let Err(e) = state
        .email
        .send_verification_code(&user.email, &user.display_name, &registration.verification_code)
        .await
    {
        tracing::error!(error = %e, user_id = %user.id, "failed to resend verification email");
    }
    Ok(ApiResponse::ok("verification code sent"))
}

pub async fn login<S: Store>(State(state): State<AppState<S>>, Json(req): Json<LoginRequest>) -> AppResult<ApiResponse<Session>> {
    check_login_rate(&state, &req.email).await?;
    let session = state.run(move |engine| engine.login(&req.email, &req.password)).await?;
    Ok(ApiResponse::ok(session))
}

/// Counts attempts per email. Redis failures let the attempt through.
async fn check_login_rate<S: Store>(state: &AppState<S>, email: &str) -> AppResult<()> {
    let Some(redis) = &state.redis else {
        return Ok(());
    };
    let key = format!("hive:login:{}", email.trim().to_lowercase());
    let allowed = redis
        .rate_limit_check(&key, state.config.login_rate_limit, state.config.login_rate_window_secs)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "login rate limit check failed");
            true
        });
    if !allowed {
        return Err(AppError::new(ErrorCode::RateLimited, "too many login attempts, try again later"));
    }
    Ok(())
}

pub async fn refresh_token<S: Store>(
    State(state): State<AppState<S>>,
    Json(req): Json<RefreshRequest>,
) -> AppResult<ApiResponse<Session>> {
    let session = state.run(move |engine| engine.refresh(&req.refresh_token)).await?;
    Ok(ApiResponse::ok(session))
}

pub async fn logout<S: Store>(
    user: AuthUser,
    State(state): State<AppState<S>>,
    Json(req): Json<RefreshRequest>,
) -> AppResult<ApiResponse<&'static str>> {
    state.run(move |engine| engine.logout(&req.refresh_token, user.id)).await?;
    Ok(ApiResponse::ok("logged out"))
}

pub async fn me<S: Store>(user: AuthUser, State(state): State<AppState<S>>) -> AppResult<ApiResponse<UserProfile>> {
    let profile = state.run(move |engine| engine.me(user.id)).await?;
    Ok(ApiResponse::ok(profile))
}

pub async fn update_profile<S: Store>(
    user: AuthUser,
    State(state): State<AppState<S>>,
    Json(req): Json<ProfileChanges>,
) -> AppResult<ApiResponse<UserProfile>> {
    let profile = state.run(move |engine| engine.update_profile(user.id, req)).await?;
    Ok(ApiResponse::ok_with_message(profile, "profile updated"))
}
