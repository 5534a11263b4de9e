//! Persistence seam of the engine.
//!
//! Every engine operation runs inside one [`Store::transaction`]. The
//! closure either returns `Ok` and everything it wrote becomes visible
//! at once, or returns `Err` and nothing it wrote survives.
//!
//! `*_for_update` reads lock the row until the transaction ends, which is
//! what serializes two racing transitions of the same contribution.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use hive_shared::errors::AppResult;
use hive_shared::types::{Page, PaginationParams};

use crate::models::{
    ChatMessage, Contribution, ContributionStatus, Difficulty, LedgerEntry, ModerationLog, Project, ProjectStatus,
    RefreshToken, TagUsage, User,
};

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

pub trait Store: Send + Sync + 'static {
    fn transaction<T, F>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&mut dyn StoreTx) -> AppResult<T>;
}

#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    /// Empty means every status.
    pub statuses: Vec<ProjectStatus>,
    pub host_id: Option<Uuid>,
    pub difficulty: Option<Difficulty>,
    /// Any of these tags.
    pub tags: Vec<String>,
    /// Case-insensitive match on title, description or desired outputs.
    pub search: Option<String>,
}

impl ProjectFilter {
    pub fn matches(&self, project: &Project) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&project.status))
            && self.host_id.map_or(true, |h| project.host_id == h)
            && self.difficulty.map_or(true, |d| project.difficulty == Some(d))
            && (self.tags.is_empty() || self.tags.iter().any(|t| project.tags.contains(t)))
            && self.search.as_ref().map_or(true, |q| {
                let q = q.to_lowercase();
                [&project.title, &project.description, &project.desired_outputs]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&q))
            })
    }
}

/// Which contributions a reader may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    All,
    /// ACCEPTED ones plus the given user's own.
    AcceptedOrOwn(Option<Uuid>),
}

#[derive(Debug, Clone)]
pub struct ContributionFilter {
    pub project_id: Option<Uuid>,
    pub contributor_id: Option<Uuid>,
    pub status: Option<ContributionStatus>,
    pub visibility: Visibility,
}

impl ContributionFilter {
    pub fn matches(&self, c: &Contribution) -> bool {
        self.project_id.map_or(true, |p| c.project_id == p)
            && self.contributor_id.map_or(true, |u| c.contributor_id == u)
            && self.status.map_or(true, |s| c.status == s)
            && match self.visibility {
                Visibility::All => true,
                Visibility::AcceptedOrOwn(viewer) => {
                    c.status == ContributionStatus::Accepted || viewer == Some(c.contributor_id)
                }
            }
    }
}

pub trait StoreTx {
    // Users
    fn insert_user(&mut self, user: &User) -> AppResult<()>;
    fn user(&mut self, id: Uuid) -> AppResult<Option<User>>;
    fn user_for_update(&mut self, id: Uuid) -> AppResult<Option<User>>;
    fn user_by_email(&mut self, email: &str) -> AppResult<Option<User>>;
    fn users(&mut self, ids: &[Uuid]) -> AppResult<Vec<User>>;
    fn update_user(&mut self, user: &User) -> AppResult<()>;

    // Projects
    fn insert_project(&mut self, project: &Project) -> AppResult<()>;
    fn project(&mut self, id: Uuid) -> AppResult<Option<Project>>;
    fn project_for_update(&mut self, id: Uuid) -> AppResult<Option<Project>>;
    fn update_project(&mut self, project: &Project) -> AppResult<()>;
    /// Newest first.
    fn list_projects(&mut self, filter: &ProjectFilter, page: &PaginationParams) -> AppResult<Page<Project>>;
    /// Tags of non-draft projects, most used first, ties by name.
    fn tag_usage(&mut self) -> AppResult<Vec<TagUsage>>;

    // Contributions
    fn insert_contribution(&mut self, contribution: &Contribution) -> AppResult<()>;
    fn contribution(&mut self, id: Uuid) -> AppResult<Option<Contribution>>;
    fn contribution_for_update(&mut self, id: Uuid) -> AppResult<Option<Contribution>>;
    fn update_contribution(&mut self, contribution: &Contribution) -> AppResult<()>;
    fn delete_contribution(&mut self, id: Uuid) -> AppResult<()>;
    fn count_contributions(&mut self, project_id: Uuid) -> AppResult<u64>;
    fn accepted_contributor_ids(&mut self, project_id: Uuid) -> AppResult<Vec<Uuid>>;
    /// Newest first.
    fn list_contributions(
        &mut self,
        filter: &ContributionFilter,
        page: &PaginationParams,
    ) -> AppResult<Page<Contribution>>;

    // Ledger. Append-only: there is no update or delete.
    fn append_entry(&mut self, entry: &LedgerEntry) -> AppResult<()>;
    fn ledger_entry(&mut self, id: Uuid) -> AppResult<Option<LedgerEntry>>;
    fn award_for_contribution(&mut self, contribution_id: Uuid) -> AppResult<Option<LedgerEntry>>;
    fn reversal_of(&mut self, entry_id: Uuid) -> AppResult<Option<LedgerEntry>>;
    fn entries_for_user(&mut self, user_id: Uuid) -> AppResult<Vec<LedgerEntry>>;
    /// Newest first.
    fn ledger_page(&mut self, user_id: Uuid, page: &PaginationParams) -> AppResult<Page<LedgerEntry>>;

    // Moderation log. Append-only.
    fn insert_moderation_log(&mut self, log: &ModerationLog) -> AppResult<()>;
    /// Newest first.
    fn moderation_logs(&mut self, page: &PaginationParams) -> AppResult<Page<ModerationLog>>;

    // Refresh tokens
    fn insert_refresh_token(&mut self, token: &RefreshToken) -> AppResult<()>;
    fn refresh_token_by_hash(&mut self, token_hash: &str) -> AppResult<Option<RefreshToken>>;
    fn revoke_refresh_token(&mut self, id: Uuid, at: DateTime<Utc>) -> AppResult<()>;
    fn revoke_user_refresh_tokens(&mut self, user_id: Uuid, at: DateTime<Utc>) -> AppResult<usize>;

    // Chat
    fn insert_chat_message(&mut self, message: &ChatMessage) -> AppResult<()>;
    /// Newest first, strictly older than `before` when given.
    fn chat_history(&mut self, project_id: Uuid, before: Option<Uuid>, limit: usize) -> AppResult<Vec<ChatMessage>>;
}
