use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use hive_shared::errors::{AppError, AppResult, ErrorCode};
use hive_shared::types::auth::TokenPair;

use super::passwords::{
    burn_verification, generate_verification_code, hash_password, validate_password, verify_password,
};
use super::tokens::{hash_token, issue_pair};
use super::{user_not_found, Engine};
use crate::models::{User, UserProfile, UserRole};
use crate::store::{Store, StoreTx};
use crate::validation::{ProfileChanges, RegisterInput};

/// An unverified account and the code to email it, from registration or
/// a resend.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub user: UserProfile,
    #[serde(skip)]
    pub verification_code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user: UserProfile,
}

fn invalid_credentials() -> AppError {
    AppError::new(ErrorCode::InvalidCredentials, "invalid email or password")
}

impl<S: Store> Engine<S> {
    /// Issues a token pair and stores the hashed refresh token.
    fn open_session(&self, tx: &mut dyn StoreTx, user: &User) -> AppResult<Session> {
        let (tokens, row) = issue_pair(&self.tokens, user.id, user.role, Utc::now())?;
        tx.insert_refresh_token(&row)?;
        Ok(Session { tokens, user: user.profile() })
    }

    pub fn register(&self, input: RegisterInput) -> AppResult<Registration> {
        let input = input.normalized();
        input.validate()?;
        validate_password(&input.password)?;
        let password_hash = hash_password(&input.password)?;
        let code = generate_verification_code();

        let user = self.store.transaction(|tx| {
            if tx.user_by_email(&input.email)?.is_some() {
                return Err(AppError::new(ErrorCode::EmailAlreadyExists, "email already registered"));
            }
            let now = Utc::now();
            let user = User {
                id: Uuid::now_v7(),
                email: input.email.clone(),
                password_hash,
                display_name: input.display_name.clone(),
                role: UserRole::User,
                total_credits: 0,
                is_active: true,
                email_verified: false,
                email_verification_code: Some(code.clone()),
                bio: String::new(),
                skills: Vec::new(),
                github_url: None,
                portfolio_url: None,
                created_at: now,
                updated_at: now,
            };
            tx.insert_user(&user)?;
            Ok(user)
        })?;

        tracing::info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(Registration { user: user.profile(), verification_code: code })
    }

    /// Marks the email verified and signs the user in.
    pub fn verify_email(&self, email: &str, code: &str) -> AppResult<Session> {
        let email = email.trim().to_lowercase();
        let code = code.trim();

        let session = self.store.transaction(|tx| {
            let mut user = tx
                .user_by_email(&email)?
                .ok_or_else(|| AppError::new(ErrorCode::VerificationCodeInvalid, "invalid verification code"))?;
            if user.email_verified {
                return Err(AppError::invalid_state(ErrorCode::InvalidState, "email is already verified"));
            }
            if user.email_verification_code.as_deref() != Some(code) {
                return Err(AppError::new(ErrorCode::VerificationCodeInvalid, "invalid verification code"));
            }
            if !user.is_active {
                return Err(AppError::new(ErrorCode::UserBanned, "account is banned"));
            }

            user.email_verified = true;
            user.email_verification_code = None;
            user.updated_at = Utc::now();
            tx.update_user(&user)?;
            self.open_session(tx, &user)
        })?;

        tracing::info!(user_id = %session.user.id, "email verified");
        Ok(session)
    }

    /// Replaces the verification code of an unverified account. The old
    /// code stops working.
    pub fn resend_verification(&self, email: &str) -> AppResult<Registration> {
        let email = email.trim().to_lowercase();
        let code = generate_verification_code();

        let user = self.store.transaction(|tx| {
            let mut user = tx
                .user_by_email(&email)?
                .ok_or_else(|| {
                    AppError::with_details(
                        ErrorCode::ValidationError,
                        "no account with this email",
                        serde_json::json!({ "email": ["no account with this email"] }),
                    )
                })?;
            if user.email_verified {
                return Err(AppError::invalid_state(ErrorCode::InvalidState, "email is already verified"));
            }
            if !user.is_active {
                return Err(AppError::new(ErrorCode::UserBanned, "account is banned"));
            }
            user.email_verification_code = Some(code.clone());
            user.updated_at = Utc::now();
            tx.update_user(&user)?;
            Ok(user)
        })?;

        tracing::info!(user_id = %user.id, "verification code reissued");
        Ok(Registration { user: user.profile(), verification_code: code })
    }

    /// Only active, verified accounts can sign in.
    pub fn login(&self, email: &str, password: &str) -> AppResult<Session> {
        let email = email.trim().to_lowercase();
        let Some(user) = self.store.transaction(|tx| tx.user_by_email(&email))? else {
            burn_verification(password);
            return Err(invalid_credentials());
        };

        // Hash check runs outside the transaction.
        if !verify_password(password, &user.password_hash)? {
            tracing::warn!(user_id = %user.id, "login failed");
            return Err(invalid_credentials());
        }
        if !user.is_active {
            return Err(AppError::new(ErrorCode::UserBanned, "account is banned"));
        }
        if !user.email_verified {
            return Err(AppError::new(ErrorCode::EmailNotVerified, "verify your email first"));
        }

        let session = self.store.transaction(|tx| self.open_session(tx, &user))?;
        tracing::info!(user_id = %user.id, "user logged in");
        Ok(session)
    }

    /// Rotates the refresh token: the presented one is revoked and a new
    /// pair is issued.
    pub fn refresh(&self, refresh_token: &str) -> AppResult<Session> {
        let token_hash = hash_token(refresh_token);
        self.store.transaction(|tx| {
            let stored = tx
                .refresh_token_by_hash(&token_hash)?
                .ok_or_else(|| AppError::new(ErrorCode::TokenInvalid, "invalid refresh token"))?;
            let now = Utc::now();
            if stored.revoked_at.is_some() {
                return Err(AppError::new(ErrorCode::RefreshTokenRevoked, "refresh token has been revoked"));
            }
            if stored.expires_at <= now {
                return Err(AppError::new(ErrorCode::TokenExpired, "refresh token expired"));
            }

            let user = tx.user(stored.user_id)?.ok_or_else(|| user_not_found(stored.user_id))?;
            if !user.is_active {
                return Err(AppError::new(ErrorCode::UserBanned, "account is banned"));
            }

            tx.revoke_refresh_token(stored.id, now)?;
            self.open_session(tx, &user)
        })
    }

    /// Revokes the caller's refresh token. Already revoked tokens are a no-op.
    pub fn logout(&self, refresh_token: &str, actor_id: Uuid) -> AppResult<()> {
        let token_hash = hash_token(refresh_token);
        self.store.transaction(|tx| {
            let stored = tx
                .refresh_token_by_hash(&token_hash)?
                .filter(|t| t.user_id == actor_id)
                .ok_or_else(|| AppError::new(ErrorCode::TokenInvalid, "invalid refresh token"))?;
            if stored.revoked_at.is_none() {
                tx.revoke_refresh_token(stored.id, Utc::now())?;
            }
            Ok(())
        })?;
        tracing::info!(user_id = %actor_id, "user logged out");
        Ok(())
    }

    pub fn me(&self, user_id: Uuid) -> AppResult<UserProfile> {
        self.store.transaction(|tx| {
            let user = tx.user(user_id)?.ok_or_else(|| user_not_found(user_id))?;
            Ok(user.profile())
        })
    }

    pub fn update_profile(&self, user_id: Uuid, changes: ProfileChanges) -> AppResult<UserProfile> {
        let changes = changes.normalized();
        changes.check()?;

        let user = self.store.transaction(|tx| {
            let mut user = tx.user_for_update(user_id)?.ok_or_else(|| user_not_found(user_id))?;
            if !user.is_active {
                return Err(AppError::new(ErrorCode::UserBanned, "account is banned"));
            }
            if let Some(display_name) = changes.display_name {
                user.display_name = display_name;
            }
            if let Some(bio) = changes.bio {
                user.bio = bio;
            }
            if let Some(skills) = changes.skills {
                user.skills = skills;
            }
            if let Some(url) = changes.github_url {
                user.github_url = Some(url).filter(|u| !u.is_empty());
            }
            if let Some(url) = changes.portfolio_url {
                user.portfolio_url = Some(url).filter(|u| !u.is_empty());
            }
            user.updated_at = Utc::now();
            tx.update_user(&user)?;
            Ok(user)
        })?;

        tracing::info!(user_id = %user.id, "profile updated");
        Ok(user.profile())
    }

    /// Grants the admin role to an existing account. Used at startup for
    /// the configured admin emails; unknown emails are skipped.
    pub fn ensure_admin(&self, email: &str) -> AppResult<Option<UserProfile>> {
        let email = email.trim().to_lowercase();
        let promoted = self.store.transaction(|tx| {
            let Some(mut user) = tx.user_by_email(&email)? else {
                return Ok(None);
            };
            if !user.is_admin() {
                user.role = UserRole::Admin;
                user.updated_at = Utc::now();
                tx.update_user(&user)?;
            }
            Ok(Some(user.profile()))
        })?;

        match &promoted {
            Some(user) => tracing::info!(user_id = %user.id, "admin role ensured"),
            None => tracing::warn!(email = %email, "admin email has no account yet"),
        }
        Ok(promoted)
    }
}
