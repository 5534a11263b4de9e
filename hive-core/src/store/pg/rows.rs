use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use hive_shared::errors::AppError;

use super::schema::{
    chat_messages, contributions, credit_ledger_entries, moderation_logs, projects, refresh_tokens, users,
};
use crate::models::{
    ChatMessage, Contribution, Difficulty, LedgerEntry, ModerationLog, Project, RefreshToken, TagUsage, User,
};

fn parse<T>(value: &str) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| AppError::internal(format!("corrupt stored value: {e}")))
}

// --- User ---

#[derive(Debug, Queryable, Selectable, Insertable, AsChangeset, Identifiable)]
#[diesel(table_name = users, treat_none_as_null = true)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub role: String,
    pub total_credits: i64,
    pub is_active: bool,
    pub email_verified: bool,
    pub email_verification_code: Option<String>,
    pub bio: String,
    pub skills: Vec<String>,
    pub github_url: Option<String>,
    pub portfolio_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserRow {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            email: u.email.clone(),
            password_hash: u.password_hash.clone(),
            display_name: u.display_name.clone(),
            role: u.role.as_str().to_string(),
            total_credits: u.total_credits,
            is_active: u.is_active,
            email_verified: u.email_verified,
            email_verification_code: u.email_verification_code.clone(),
            bio: u.bio.clone(),
            skills: u.skills.clone(),
            github_url: u.github_url.clone(),
            portfolio_url: u.portfolio_url.clone(),
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            role: parse(&r.role)?,
            id: r.id,
            email: r.email,
            password_hash: r.password_hash,
            display_name: r.display_name,
            total_credits: r.total_credits,
            is_active: r.is_active,
            email_verified: r.email_verified,
            email_verification_code: r.email_verification_code,
            bio: r.bio,
            skills: r.skills,
            github_url: r.github_url,
            portfolio_url: r.portfolio_url,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

// --- Project ---

#[derive(Debug, Queryable, Selectable, Insertable, AsChangeset, Identifiable)]
#[diesel(table_name = projects, treat_none_as_null = true)]
pub struct ProjectRow {
    pub id: Uuid,
    pub host_id: Uuid,
    pub title: String,
    pub description: String,
    pub what_it_does: String,
    pub inputs_dependencies: Option<String>,
    pub desired_outputs: String,
    pub difficulty: Option<String>,
    pub estimated_time: Option<String>,
    pub github_url: Option<String>,
    pub tags: Vec<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Project> for ProjectRow {
    fn from(p: &Project) -> Self {
        Self {
            id: p.id,
            host_id: p.host_id,
            title: p.title.clone(),
            description: p.description.clone(),
            what_it_does: p.what_it_does.clone(),
            inputs_dependencies: p.inputs_dependencies.clone(),
            desired_outputs: p.desired_outputs.clone(),
            difficulty: p.difficulty.map(|d| d.as_str().to_string()),
            estimated_time: p.estimated_time.clone(),
            github_url: p.github_url.clone(),
            tags: p.tags.clone(),
            status: p.status.as_str().to_string(),
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

impl TryFrom<ProjectRow> for Project {
    type Error = AppError;

    fn try_from(r: ProjectRow) -> Result<Self, Self::Error> {
        Ok(Self {
            status: parse(&r.status)?,
            difficulty: r.difficulty.as_deref().map(parse::<Difficulty>).transpose()?,
            id: r.id,
            host_id: r.host_id,
            title: r.title,
            description: r.description,
            what_it_does: r.what_it_does,
            inputs_dependencies: r.inputs_dependencies,
            desired_outputs: r.desired_outputs,
            estimated_time: r.estimated_time,
            github_url: r.github_url,
            tags: r.tags,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

// --- Contribution ---

#[derive(Debug, Queryable, Selectable, Insertable, AsChangeset, Identifiable)]
#[diesel(table_name = contributions, treat_none_as_null = true)]
pub struct ContributionRow {
    pub id: Uuid,
    pub project_id: Uuid,
    pub contributor_id: Uuid,
    pub title: Option<String>,
    pub body: String,
    pub links: Vec<String>,
    pub attachments: Vec<String>,
    pub status: String,
    pub decided_by: Option<Uuid>,
    pub decided_at: Option<DateTime<Utc>>,
    pub moderation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Contribution> for ContributionRow {
    fn from(c: &Contribution) -> Self {
        Self {
            id: c.id,
            project_id: c.project_id,
            contributor_id: c.contributor_id,
            title: c.title.clone(),
            body: c.body.clone(),
            links: c.links.clone(),
            attachments: c.attachments.clone(),
            status: c.status.as_str().to_string(),
            decided_by: c.decided_by,
            decided_at: c.decided_at,
            moderation_reason: c.moderation_reason.clone(),
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

impl TryFrom<ContributionRow> for Contribution {
    type Error = AppError;

    fn try_from(r: ContributionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            status: parse(&r.status)?,
            id: r.id,
            project_id: r.project_id,
            contributor_id: r.contributor_id,
            title: r.title,
            body: r.body,
            links: r.links,
            attachments: r.attachments,
            decided_by: r.decided_by,
            decided_at: r.decided_at,
            moderation_reason: r.moderation_reason,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

// --- Ledger ---

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = credit_ledger_entries)]
pub struct LedgerEntryRow {
    pub id: Uuid,
    pub to_user: Uuid,
    pub from_user: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub contribution_id: Option<Uuid>,
    pub amount: i64,
    pub entry_type: String,
    pub original_entry_id: Option<Uuid>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&LedgerEntry> for LedgerEntryRow {
    fn from(e: &LedgerEntry) -> Self {
        Self {
            id: e.id,
            to_user: e.to_user,
            from_user: e.from_user,
            project_id: e.project_id,
            contribution_id: e.contribution_id,
            amount: e.amount,
            entry_type: e.entry_type.as_str().to_string(),
            original_entry_id: e.original_entry_id,
            reason: e.reason.clone(),
            created_at: e.created_at,
        }
    }
}

impl TryFrom<LedgerEntryRow> for LedgerEntry {
    type Error = AppError;

    fn try_from(r: LedgerEntryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            entry_type: parse(&r.entry_type)?,
            id: r.id,
            to_user: r.to_user,
            from_user: r.from_user,
            project_id: r.project_id,
            contribution_id: r.contribution_id,
            amount: r.amount,
            original_entry_id: r.original_entry_id,
            reason: r.reason,
            created_at: r.created_at,
        })
    }
}

// --- ModerationLog ---

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = moderation_logs)]
pub struct ModerationLogRow {
    pub id: Uuid,
    pub action: String,
    pub moderator_id: Uuid,
    pub target_type: String,
    pub target_id: Uuid,
    pub target_description: String,
    pub reason: String,
    pub moderator_email: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&ModerationLog> for ModerationLogRow {
    fn from(l: &ModerationLog) -> Self {
        Self {
            id: l.id,
            action: l.action.as_str().to_string(),
            moderator_id: l.moderator_id,
            target_type: l.target_type.as_str().to_string(),
            target_id: l.target_id,
            target_description: l.target_description.clone(),
            reason: l.reason.clone(),
            moderator_email: l.moderator_email.clone(),
            ip_address: l.ip_address.clone(),
            user_agent: l.user_agent.clone(),
            created_at: l.created_at,
        }
    }
}

impl TryFrom<ModerationLogRow> for ModerationLog {
    type Error = AppError;

    fn try_from(r: ModerationLogRow) -> Result<Self, Self::Error> {
        Ok(Self {
            action: parse(&r.action)?,
            target_type: parse(&r.target_type)?,
            id: r.id,
            moderator_id: r.moderator_id,
            target_id: r.target_id,
            target_description: r.target_description,
            reason: r.reason,
            moderator_email: r.moderator_email,
            ip_address: r.ip_address,
            user_agent: r.user_agent,
            created_at: r.created_at,
        })
    }
}

// --- Tag usage ---

#[derive(Debug, QueryableByName)]
pub struct TagUsageRow {
    #[diesel(sql_type = diesel::sql_types::Text)]
    pub tag: String,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    pub usage_count: i64,
}

impl From<TagUsageRow> for TagUsage {
    fn from(r: TagUsageRow) -> Self {
        Self {
            tag: r.tag,
            usage_count: r.usage_count.max(0) as u64,
        }
    }
}

// --- RefreshToken ---

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = refresh_tokens)]
pub struct RefreshTokenRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&RefreshToken> for RefreshTokenRow {
    fn from(t: &RefreshToken) -> Self {
        Self {
            id: t.id,
            user_id: t.user_id,
            token_hash: t.token_hash.clone(),
            expires_at: t.expires_at,
            revoked_at: t.revoked_at,
            created_at: t.created_at,
        }
    }
}

impl From<RefreshTokenRow> for RefreshToken {
    fn from(r: RefreshTokenRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            token_hash: r.token_hash,
            expires_at: r.expires_at,
            revoked_at: r.revoked_at,
            created_at: r.created_at,
        }
    }
}

// --- ChatMessage ---

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = chat_messages)]
pub struct ChatMessageRow {
    pub id: Uuid,
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<&ChatMessage> for ChatMessageRow {
    fn from(m: &ChatMessage) -> Self {
        Self {
            id: m.id,
            project_id: m.project_id,
            user_id: m.user_id,
            content: m.content.clone(),
            created_at: m.created_at,
        }
    }
}

impl From<ChatMessageRow> for ChatMessage {
    fn from(r: ChatMessageRow) -> Self {
        Self {
            id: r.id,
            project_id: r.project_id,
            user_id: r.user_id,
            content: r.content,
            created_at: r.created_at,
        }
    }
}
