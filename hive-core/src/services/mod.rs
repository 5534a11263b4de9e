use uuid::Uuid;

use hive_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::User;
use crate::policy::{TokenSettings, WorkflowPolicy};
use crate::store::{Store, StoreTx};

pub mod chat;
pub mod contribution;
pub mod ledger;
pub mod moderation;
pub mod passwords;
pub mod project;
pub mod session;
pub mod tokens;

pub use chat::ChatPage;
pub use contribution::Decision;
pub use moderation::{AdjustmentOutcome, AdminContext, ModerationOutcome, ReversalOutcome};
pub use project::ProjectQuery;
pub use session::{Registration, Session};

/// The workflow engine. Each public operation is one store transaction.
pub struct Engine<S> {
    store: S,
    policy: WorkflowPolicy,
    tokens: TokenSettings,
}

impl<S: Store> Engine<S> {
    pub fn new(store: S, policy: WorkflowPolicy, tokens: TokenSettings) -> Self {
        Self { store, policy, tokens }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> &WorkflowPolicy {
        &self.policy
    }

    pub fn token_settings(&self) -> &TokenSettings {
        &self.tokens
    }
}

/// The acting user, who must exist and not be banned.
pub(crate) fn load_actor(tx: &mut dyn StoreTx, id: Uuid) -> AppResult<User> {
    let user = tx
        .user(id)?
        .ok_or_else(|| AppError::new(ErrorCode::Unauthorized, "account no longer exists"))?;
    if !user.is_active {
        return Err(AppError::new(ErrorCode::UserBanned, "account is banned"));
    }
    Ok(user)
}

pub(crate) fn require_verified(user: &User) -> AppResult<()> {
    if !user.email_verified {
        return Err(AppError::new(ErrorCode::EmailNotVerified, "verify your email first"));
    }
    Ok(())
}

pub(crate) fn require_admin(user: &User) -> AppResult<()> {
    if !user.is_admin() {
        return Err(AppError::new(ErrorCode::AdminRequired, "admin access required"));
    }
    Ok(())
}

pub(crate) fn user_not_found(id: Uuid) -> AppError {
    AppError::new(ErrorCode::UserNotFound, format!("user {id} not found"))
}

pub(crate) fn project_not_found(id: Uuid) -> AppError {
    AppError::new(ErrorCode::ProjectNotFound, format!("project {id} not found"))
}

pub(crate) fn contribution_not_found(id: Uuid) -> AppError {
    AppError::new(ErrorCode::ContributionNotFound, format!("contribution {id} not found"))
}
