//! Admin overlay: soft-deletes, bans and credit corrections.
//!
//! Nothing here deletes history. Every action validates the reason and the
//! admin role before touching any row and writes exactly one moderation log
//! entry in the same transaction as its effect.

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use uuid::Uuid;

use hive_shared::errors::{AppError, AppResult, ErrorCode};
use hive_shared::types::{Page, PaginationParams};

use super::{contribution_not_found, ledger, load_actor, project_not_found, require_admin, user_not_found, Engine};
use crate::models::{
    ContributionStatus, LedgerEntry, ModerationAction, ModerationLog, ProjectStatus, TargetType, User,
};
use crate::policy::SoftDeletePolicy;
use crate::store::{Store, StoreTx};
use crate::validation::validate_reason;

const MAX_IP_LEN: usize = 45;
const MAX_USER_AGENT_LEN: usize = 500;

/// The acting admin plus where the request came from. Stored on the log.
#[derive(Debug, Clone, Default)]
pub struct AdminContext {
    pub admin_id: Uuid,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl AdminContext {
    pub fn new(admin_id: Uuid, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        Self {
            admin_id,
            ip_address: clip(ip_address, MAX_IP_LEN),
            user_agent: clip(user_agent, MAX_USER_AGENT_LEN),
        }
    }
}

impl From<Uuid> for AdminContext {
    fn from(admin_id: Uuid) -> Self {
        Self { admin_id, ..Self::default() }
    }
}

fn clip(value: Option<String>, max: usize) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    Some(value.chars().take(max).collect())
}

#[derive(Debug, Clone, Serialize)]
pub struct ModerationOutcome {
    pub log_id: Uuid,
    pub action: ModerationAction,
    pub target_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reversal_entry_id: Option<Uuid>,
    #[serde(skip)]
    pub log: ModerationLog,
    #[serde(skip)]
    pub reversal: Option<LedgerEntry>,
}

impl ModerationOutcome {
    fn new(log: ModerationLog, reversal: Option<LedgerEntry>) -> Self {
        Self {
            log_id: log.id,
            action: log.action,
            target_id: log.target_id,
            reversal_entry_id: reversal.as_ref().map(|r| r.id),
            log,
            reversal,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReversalOutcome {
    pub log_id: Uuid,
    pub original_entry_id: Uuid,
    pub reversal_entry_id: Uuid,
    pub amount_reversed: i64,
    #[serde(skip)]
    pub log: ModerationLog,
    #[serde(skip)]
    pub reversal: LedgerEntry,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdjustmentOutcome {
    pub log_id: Uuid,
    pub entry_id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub new_total: i64,
    #[serde(skip)]
    pub log: ModerationLog,
    #[serde(skip)]
    pub entry: LedgerEntry,
}

fn load_admin(tx: &mut dyn StoreTx, admin_id: Uuid) -> AppResult<User> {
    let admin = load_actor(tx, admin_id)?;
    require_admin(&admin)?;
    Ok(admin)
}

#[allow(clippy::too_many_arguments)]
fn write_log(
    tx: &mut dyn StoreTx,
    admin: &User,
    ctx: &AdminContext,
    action: ModerationAction,
    target: (TargetType, Uuid),
    target_description: String,
    reason: &str,
    now: DateTime<Utc>,
) -> AppResult<ModerationLog> {
    let log = ModerationLog {
        id: Uuid::now_v7(),
        action,
        moderator_id: admin.id,
        target_type: target.0,
        target_id: target.1,
        target_description,
        reason: reason.to_string(),
        moderator_email: admin.email.clone(),
        ip_address: ctx.ip_address.clone(),
        user_agent: ctx.user_agent.clone(),
        created_at: now,
    };
    tx.insert_moderation_log(&log)?;
    Ok(log)
}

fn record(log: &ModerationLog) {
    counter!("moderation_actions_total", "action" => log.action.as_str()).increment(1);
    tracing::warn!(
        log_id = %log.id,
        moderator_id = %log.moderator_id,
        action = %log.action,
        target_type = %log.target_type,
        target_id = %log.target_id,
        "moderation action"
    );
}

fn describe(user: &User) -> String {
    format!("User: {} ({})", user.display_name, user.email)
}

impl<S: Store> Engine<S> {
    /// Forces the project CLOSED. Already closed projects are still logged.
    pub fn soft_delete_project(
        &self,
        project_id: Uuid,
        admin: impl Into<AdminContext>,
        reason: &str,
    ) -> AppResult<ModerationOutcome> {
        let ctx = admin.into();
        let reason = validate_reason(reason)?;
        let log = self.store.transaction(|tx| {
            let admin = load_admin(tx, ctx.admin_id)?;
            let mut project = tx
                .project_for_update(project_id)?
                .ok_or_else(|| project_not_found(project_id))?;

            let now = Utc::now();
            let description = format!("Project: {} (was {})", project.title, project.status);
            if project.status != ProjectStatus::Closed {
                project.status = ProjectStatus::Closed;
                project.updated_at = now;
                tx.update_project(&project)?;
            }
            write_log(
                tx,
                &admin,
                &ctx,
                ModerationAction::SoftDeleteProject,
                (TargetType::Project, project.id),
                description,
                &reason,
                now,
            )
        })?;

        record(&log);
        Ok(ModerationOutcome::new(log, None))
    }

    /// Forces the contribution DECLINED. An ACCEPTED contribution whose award
    /// still stands is handled per [`SoftDeletePolicy`].
    pub fn soft_delete_contribution(
        &self,
        contribution_id: Uuid,
        admin: impl Into<AdminContext>,
        reason: &str,
    ) -> AppResult<ModerationOutcome> {
        let ctx = admin.into();
        let reason = validate_reason(reason)?;
        let policy = self.policy.soft_delete;
        let (log, reversal) = self.store.transaction(|tx| {
            let admin = load_admin(tx, ctx.admin_id)?;
            let mut contribution = tx
                .contribution_for_update(contribution_id)?
                .ok_or_else(|| contribution_not_found(contribution_id))?;
            let now = Utc::now();
            let description = format!(
                "Contribution: {} (was {})",
                contribution.title.as_deref().unwrap_or("untitled"),
                contribution.status
            );

            let mut reversal = None;
            if contribution.status == ContributionStatus::Accepted {
                if let Some(award) = tx.award_for_contribution(contribution.id)? {
                    if tx.reversal_of(award.id)?.is_none() {
                        match policy {
                            SoftDeletePolicy::RequireExplicitReversal => {
                                return Err(AppError::with_details(
                                    ErrorCode::AwardNotReversed,
                                    "reverse the contribution's award before soft-deleting it",
                                    serde_json::json!({ "award_entry_id": award.id }),
                                ));
                            }
                            SoftDeletePolicy::AutoReverse => {
                                reversal = Some(ledger::reverse(tx, award.id, admin.id, &reason, now)?);
                            }
                        }
                    }
                }
            }

            contribution.status = ContributionStatus::Declined;
            contribution.moderation_reason = Some(reason.clone());
            if contribution.decided_at.is_none() {
                contribution.decided_by = Some(admin.id);
                contribution.decided_at = Some(now);
            }
            contribution.updated_at = now;
            tx.update_contribution(&contribution)?;

            let log = write_log(
                tx,
                &admin,
                &ctx,
                ModerationAction::SoftDeleteContribution,
                (TargetType::Contribution, contribution.id),
                description,
                &reason,
                now,
            )?;
            Ok((log, reversal))
        })?;

        if let Some(entry) = &reversal {
            ledger::record_appended(entry);
        }
        record(&log);
        Ok(ModerationOutcome::new(log, reversal))
    }

    /// Deactivates the account and revokes its refresh tokens. Credits stay.
    pub fn ban_user(&self, user_id: Uuid, admin: impl Into<AdminContext>, reason: &str) -> AppResult<ModerationOutcome> {
        self.set_banned(user_id, admin.into(), reason, true)
    }

    pub fn unban_user(
        &self,
        user_id: Uuid,
        admin: impl Into<AdminContext>,
        reason: &str,
    ) -> AppResult<ModerationOutcome> {
        self.set_banned(user_id, admin.into(), reason, false)
    }

    fn set_banned(&self, user_id: Uuid, ctx: AdminContext, reason: &str, banned: bool) -> AppResult<ModerationOutcome> {
        let reason = validate_reason(reason)?;
        let log = self.store.transaction(|tx| {
            let admin = load_admin(tx, ctx.admin_id)?;
            let mut target = tx.user_for_update(user_id)?.ok_or_else(|| user_not_found(user_id))?;

            if banned {
                if target.id == admin.id {
                    return Err(AppError::new(ErrorCode::CannotBanSelf, "you cannot ban yourself"));
                }
                if target.is_admin() {
                    return Err(AppError::new(ErrorCode::CannotBanAdmin, "admins cannot be banned"));
                }
            }
            if target.is_active != banned {
                let state = if banned { "banned" } else { "active" };
                return Err(AppError::invalid_state(ErrorCode::InvalidState, format!("user is already {state}")));
            }

            let now = Utc::now();
            target.is_active = !banned;
            target.updated_at = now;
            tx.update_user(&target)?;
            if banned {
                let revoked = tx.revoke_user_refresh_tokens(target.id, now)?;
                tracing::debug!(user_id = %target.id, revoked, "refresh tokens revoked on ban");
            }

            let action = if banned { ModerationAction::BanUser } else { ModerationAction::UnbanUser };
            write_log(tx, &admin, &ctx, action, (TargetType::User, target.id), describe(&target), &reason, now)
        })?;

        record(&log);
        Ok(ModerationOutcome::new(log, None))
    }

    pub fn reverse_credit(
        &self,
        entry_id: Uuid,
        admin: impl Into<AdminContext>,
        reason: &str,
    ) -> AppResult<ReversalOutcome> {
        let ctx = admin.into();
        let reason = validate_reason(reason)?;
        let (log, reversal) = self.store.transaction(|tx| {
            let admin = load_admin(tx, ctx.admin_id)?;
            let now = Utc::now();
            let reversal = ledger::reverse(tx, entry_id, admin.id, &reason, now)?;
            let owner = tx.user(reversal.to_user)?.ok_or_else(|| user_not_found(reversal.to_user))?;

            let log = write_log(
                tx,
                &admin,
                &ctx,
                ModerationAction::ReverseCredit,
                (TargetType::Credit, entry_id),
                format!("{} credit(s) of {}", reversal.amount, describe(&owner)),
                &reason,
                now,
            )?;
            Ok((log, reversal))
        })?;

        ledger::record_appended(&reversal);
        record(&log);
        Ok(ReversalOutcome {
            log_id: log.id,
            original_entry_id: entry_id,
            reversal_entry_id: reversal.id,
            amount_reversed: reversal.amount,
            log,
            reversal,
        })
    }

    pub fn adjust_credit(
        &self,
        user_id: Uuid,
        admin: impl Into<AdminContext>,
        amount: i64,
        reason: &str,
    ) -> AppResult<AdjustmentOutcome> {
        let ctx = admin.into();
        let reason = validate_reason(reason)?;
        let (log, entry, user) = self.store.transaction(|tx| {
            let admin = load_admin(tx, ctx.admin_id)?;
            let now = Utc::now();
            let (entry, user) = ledger::adjust(tx, user_id, amount, &reason, admin.id, now)?;

            let log = write_log(
                tx,
                &admin,
                &ctx,
                ModerationAction::AdjustCredit,
                (TargetType::Credit, entry.id),
                format!("{amount:+} credit(s) for {}", describe(&user)),
                &reason,
                now,
            )?;
            Ok((log, entry, user))
        })?;

        ledger::record_appended(&entry);
        record(&log);
        Ok(AdjustmentOutcome {
            log_id: log.id,
            entry_id: entry.id,
            user_id,
            amount,
            new_total: user.total_credits,
            log,
            entry,
        })
    }

    /// Newest first.
    pub fn audit_log(&self, admin_id: Uuid, params: &PaginationParams) -> AppResult<Page<ModerationLog>> {
        self.store.transaction(|tx| {
            load_admin(tx, admin_id)?;
            tx.moderation_logs(params)
        })
    }
}
