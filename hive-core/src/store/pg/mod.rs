//! PostgreSQL store on diesel with an r2d2 pool.
//!
//! Row locks come from `SELECT ... FOR UPDATE`; uniqueness of contributions,
//! awards and reversals comes from the indexes in `migrations/`, whose
//! violations are mapped back to domain error codes here.

use chrono::{DateTime, Utc};
use diesel::pg::{Pg, PgConnection};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use uuid::Uuid;

use hive_shared::clients::db::{checkout, DbPool};
use hive_shared::errors::{AppError, AppResult, ErrorCode};
use hive_shared::types::{Page, PaginationParams};

use super::{ContributionFilter, ProjectFilter, Store, StoreTx, Visibility};
use crate::models::{
    ChatMessage, Contribution, ContributionStatus, EntryType, LedgerEntry, ModerationLog, Project,
    ProjectStatus, RefreshToken, TagUsage, User,
};

pub mod rows;
pub mod schema;

use rows::*;
use schema::{
    chat_messages, contributions, credit_ledger_entries, moderation_logs, projects, refresh_tokens, users,
};

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

impl Store for PgStore {
    fn transaction<T, F>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&mut dyn StoreTx) -> AppResult<T>,
    {
        let mut pooled = checkout(&self.pool)?;
        let conn: &mut PgConnection = &mut pooled;
        conn.transaction::<T, AppError, _>(|conn| {
            let mut tx = PgTx { conn };
            f(&mut tx)
        })
    }
}

struct PgTx<'c> {
    conn: &'c mut PgConnection,
}

/// Unique index name -> domain conflict.
fn map_unique(err: DieselError) -> AppError {
    if let DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) = &err {
        let (code, message) = match info.constraint_name() {
            Some("users_email_key") => (ErrorCode::EmailAlreadyExists, "email already registered"),
            Some("contributions_project_contributor_key") => {
                (ErrorCode::DuplicateContribution, "you have already contributed to this project")
            }
            Some("ledger_one_award_per_contribution") => {
                (ErrorCode::DuplicateAward, "contribution has already been awarded")
            }
            Some("ledger_one_reversal_per_entry") => {
                (ErrorCode::EntryAlreadyReversed, "ledger entry has already been reversed")
            }
            _ => (ErrorCode::Conflict, "conflicting record"),
        };
        return AppError::new(code, message);
    }
    AppError::Database(err)
}

fn page_of<R, T>(rows: Vec<R>, count: i64, params: &PaginationParams) -> AppResult<Page<T>>
where
    T: TryFrom<R, Error = AppError>,
{
    let items = rows.into_iter().map(T::try_from).collect::<AppResult<Vec<T>>>()?;
    Ok(Page::new(items, count.max(0) as u64, params))
}

fn filtered_projects<'a>(filter: &'a ProjectFilter) -> projects::BoxedQuery<'a, Pg> {
    let mut query = projects::table.into_boxed();
    if !filter.statuses.is_empty() {
        let statuses: Vec<&'static str> = filter.statuses.iter().map(|s| s.as_str()).collect();
        query = query.filter(projects::status.eq_any(statuses));
    }
    if let Some(host_id) = filter.host_id {
        query = query.filter(projects::host_id.eq(host_id));
    }
    if let Some(difficulty) = filter.difficulty {
        query = query.filter(projects::difficulty.eq(difficulty.as_str()));
    }
    if !filter.tags.is_empty() {
        query = query.filter(projects::tags.overlaps_with(filter.tags.clone()));
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", search.replace('%', "\\%").replace('_', "\\_"));
        query = query.filter(
            projects::title
                .ilike(pattern.clone())
                .or(projects::description.ilike(pattern.clone()))
                .or(projects::desired_outputs.ilike(pattern)),
        );
    }
    query
}

fn filtered_contributions<'a>(filter: &'a ContributionFilter) -> contributions::BoxedQuery<'a, Pg> {
    let mut query = contributions::table.into_boxed();
    if let Some(project_id) = filter.project_id {
        query = query.filter(contributions::project_id.eq(project_id));
    }
    if let Some(contributor_id) = filter.contributor_id {
        query = query.filter(contributions::contributor_id.eq(contributor_id));
    }
    if let Some(status) = filter.status {
        query = query.filter(contributions::status.eq(status.as_str()));
    }
    let accepted = ContributionStatus::Accepted.as_str();
    match filter.visibility {
        Visibility::All => {}
        Visibility::AcceptedOrOwn(Some(viewer)) => {
            query = query.filter(
                contributions::status
                    .eq(accepted)
                    .or(contributions::contributor_id.eq(viewer)),
            );
        }
        Visibility::AcceptedOrOwn(None) => {
            query = query.filter(contributions::status.eq(accepted));
        }
    }
    query
}

impl StoreTx for PgTx<'_> {
    fn insert_user(&mut self, user: &User) -> AppResult<()> {
        diesel::insert_into(users::table)
            .values(UserRow::from(user))
            .execute(self.conn)
            .map_err(map_unique)?;
        Ok(())
    }

    fn user(&mut self, id: Uuid) -> AppResult<Option<User>> {
        users::table
            .find(id)
            .select(UserRow::as_select())
            .first(self.conn)
            .optional()?
            .map(User::try_from)
            .transpose()
    }

    fn user_for_update(&mut self, id: Uuid) -> AppResult<Option<User>> {
        users::table
            .find(id)
            .select(UserRow::as_select())
            .for_update()
            .first(self.conn)
            .optional()?
            .map(User::try_from)
            .transpose()
    }

    fn user_by_email(&mut self, email: &str) -> AppResult<Option<User>> {
        users::table
            .filter(users::email.eq(email))
            .select(UserRow::as_select())
            .first(self.conn)
            .optional()?
            .map(User::try_from)
            .transpose()
    }

    fn users(&mut self, ids: &[Uuid]) -> AppResult<Vec<User>> {
        let rows: Vec<UserRow> = users::table
            .filter(users::id.eq_any(ids.to_vec()))
            .select(UserRow::as_select())
            .load(self.conn)?;
        let mut found = rows.into_iter().map(User::try_from).collect::<AppResult<Vec<User>>>()?;
        found.sort_by_key(|u| ids.iter().position(|id| *id == u.id));
        Ok(found)
    }

    fn update_user(&mut self, user: &User) -> AppResult<()> {
        diesel::update(users::table.find(user.id))
            .set(&UserRow::from(user))
            .execute(self.conn)
            .map_err(map_unique)?;
        Ok(())
    }

    fn insert_project(&mut self, project: &Project) -> AppResult<()> {
        diesel::insert_into(projects::table)
            .values(ProjectRow::from(project))
            .execute(self.conn)?;
        Ok(())
    }

    fn project(&mut self, id: Uuid) -> AppResult<Option<Project>> {
        projects::table
            .find(id)
            .select(ProjectRow::as_select())
            .first(self.conn)
            .optional()?
            .map(Project::try_from)
            .transpose()
    }

    fn project_for_update(&mut self, id: Uuid) -> AppResult<Option<Project>> {
        projects::table
            .find(id)
            .select(ProjectRow::as_select())
            .for_update()
            .first(self.conn)
            .optional()?
            .map(Project::try_from)
            .transpose()
    }

    fn update_project(&mut self, project: &Project) -> AppResult<()> {
        diesel::update(projects::table.find(project.id))
            .set(&ProjectRow::from(project))
            .execute(self.conn)?;
        Ok(())
    }

    fn list_projects(&mut self, filter: &ProjectFilter, page: &PaginationParams) -> AppResult<Page<Project>> {
        let count: i64 = filtered_projects(filter).count().get_result(self.conn)?;
        let rows: Vec<ProjectRow> = filtered_projects(filter)
            .select(ProjectRow::as_select())
            .order((projects::created_at.desc(), projects::id.desc()))
            .offset(page.offset() as i64)
            .limit(page.limit() as i64)
            .load(self.conn)?;
        page_of(rows, count, page)
    }

    fn tag_usage(&mut self) -> AppResult<Vec<TagUsage>> {
        let rows: Vec<TagUsageRow> = diesel::sql_query(
            "SELECT tag, COUNT(*) AS usage_count \
             FROM projects CROSS JOIN LATERAL unnest(tags) AS tag \
             WHERE status <> $1 \
             GROUP BY tag \
             ORDER BY usage_count DESC, tag ASC",
        )
        .bind::<diesel::sql_types::Text, _>(ProjectStatus::Draft.as_str())
        .load(self.conn)?;
        Ok(rows.into_iter().map(TagUsage::from).collect())
    }

    fn insert_contribution(&mut self, contribution: &Contribution) -> AppResult<()> {
        diesel::insert_into(contributions::table)
            .values(ContributionRow::from(contribution))
            .execute(self.conn)
            .map_err(map_unique)?;
        Ok(())
    }

    fn contribution(&mut self, id: Uuid) -> AppResult<Option<Contribution>> {
        contributions::table
            .find(id)
            .select(ContributionRow::as_select())
            .first(self.conn)
            .optional()?
            .map(Contribution::try_from)
            .transpose()
    }

    fn contribution_for_update(&mut self, id: Uuid) -> AppResult<Option<Contribution>> {
        contributions::table
            .find(id)
            .select(ContributionRow::as_select())
            .for_update()
            .first(self.conn)
            .optional()?
            .map(Contribution::try_from)
            .transpose()
    }

    fn update_contribution(&mut self, contribution: &Contribution) -> AppResult<()> {
        diesel::update(contributions::table.find(contribution.id))
            .set(&ContributionRow::from(contribution))
            .execute(self.conn)?;
        Ok(())
    }

    fn delete_contribution(&mut self, id: Uuid) -> AppResult<()> {
        diesel::delete(contributions::table.find(id)).execute(self.conn)?;
        Ok(())
    }

    fn count_contributions(&mut self, project_id: Uuid) -> AppResult<u64> {
        let count: i64 = contributions::table
            .filter(contributions::project_id.eq(project_id))
            .count()
            .get_result(self.conn)?;
        Ok(count.max(0) as u64)
    }

    fn accepted_contributor_ids(&mut self, project_id: Uuid) -> AppResult<Vec<Uuid>> {
        Ok(contributions::table
            .filter(contributions::project_id.eq(project_id))
            .filter(contributions::status.eq(ContributionStatus::Accepted.as_str()))
            .order(contributions::decided_at.asc())
            .select(contributions::contributor_id)
            .load(self.conn)?)
    }

    fn list_contributions(
        &mut self,
        filter: &ContributionFilter,
        page: &PaginationParams,
    ) -> AppResult<Page<Contribution>> {
        let count: i64 = filtered_contributions(filter).count().get_result(self.conn)?;
        let rows: Vec<ContributionRow> = filtered_contributions(filter)
            .select(ContributionRow::as_select())
            .order((contributions::created_at.desc(), contributions::id.desc()))
            .offset(page.offset() as i64)
            .limit(page.limit() as i64)
            .load(self.conn)?;
        page_of(rows, count, page)
    }

    fn append_entry(&mut self, entry: &LedgerEntry) -> AppResult<()> {
        diesel::insert_into(credit_ledger_entries::table)
            .values(LedgerEntryRow::from(entry))
            .execute(self.conn)
            .map_err(map_unique)?;
        Ok(())
    }

    fn ledger_entry(&mut self, id: Uuid) -> AppResult<Option<LedgerEntry>> {
        credit_ledger_entries::table
            .find(id)
            .select(LedgerEntryRow::as_select())
            .first(self.conn)
            .optional()?
            .map(LedgerEntry::try_from)
            .transpose()
    }

    fn award_for_contribution(&mut self, contribution_id: Uuid) -> AppResult<Option<LedgerEntry>> {
        credit_ledger_entries::table
            .filter(credit_ledger_entries::contribution_id.eq(contribution_id))
            .filter(credit_ledger_entries::entry_type.eq(EntryType::Award.as_str()))
            .select(LedgerEntryRow::as_select())
            .first(self.conn)
            .optional()?
            .map(LedgerEntry::try_from)
            .transpose()
    }

    fn reversal_of(&mut self, entry_id: Uuid) -> AppResult<Option<LedgerEntry>> {
        credit_ledger_entries::table
            .filter(credit_ledger_entries::original_entry_id.eq(entry_id))
            .filter(credit_ledger_entries::entry_type.eq(EntryType::Reversal.as_str()))
            .select(LedgerEntryRow::as_select())
            .first(self.conn)
            .optional()?
            .map(LedgerEntry::try_from)
            .transpose()
    }

    fn entries_for_user(&mut self, user_id: Uuid) -> AppResult<Vec<LedgerEntry>> {
        let rows: Vec<LedgerEntryRow> = credit_ledger_entries::table
            .filter(credit_ledger_entries::to_user.eq(user_id))
            .order(credit_ledger_entries::created_at.asc())
            .select(LedgerEntryRow::as_select())
            .load(self.conn)?;
        rows.into_iter().map(LedgerEntry::try_from).collect()
    }

    fn ledger_page(&mut self, user_id: Uuid, page: &PaginationParams) -> AppResult<Page<LedgerEntry>> {
        let count: i64 = credit_ledger_entries::table
            .filter(credit_ledger_entries::to_user.eq(user_id))
            .count()
            .get_result(self.conn)?;
        let rows: Vec<LedgerEntryRow> = credit_ledger_entries::table
            .filter(credit_ledger_entries::to_user.eq(user_id))
            .order((credit_ledger_entries::created_at.desc(), credit_ledger_entries::id.desc()))
            .offset(page.offset() as i64)
            .limit(page.limit() as i64)
            .select(LedgerEntryRow::as_select())
            .load(self.conn)?;
        page_of(rows, count, page)
    }

    fn insert_moderation_log(&mut self, log: &ModerationLog) -> AppResult<()> {
        diesel::insert_into(moderation_logs::table)
            .values(ModerationLogRow::from(log))
            .execute(self.conn)?;
        Ok(())
    }

    fn moderation_logs(&mut self, page: &PaginationParams) -> AppResult<Page<ModerationLog>> {
        let count: i64 = moderation_logs::table.count().get_result(self.conn)?;
        let rows: Vec<ModerationLogRow> = moderation_logs::table
            .order((moderation_logs::created_at.desc(), moderation_logs::id.desc()))
            .offset(page.offset() as i64)
            .limit(page.limit() as i64)
            .select(ModerationLogRow::as_select())
            .load(self.conn)?;
        page_of(rows, count, page)
    }

    fn insert_refresh_token(&mut self, token: &RefreshToken) -> AppResult<()> {
        diesel::insert_into(refresh_tokens::table)
            .values(RefreshTokenRow::from(token))
            .execute(self.conn)?;
        Ok(())
    }

    fn refresh_token_by_hash(&mut self, token_hash: &str) -> AppResult<Option<RefreshToken>> {
        Ok(refresh_tokens::table
            .filter(refresh_tokens::token_hash.eq(token_hash))
            .select(RefreshTokenRow::as_select())
            .for_update()
            .first(self.conn)
            .optional()?
            .map(RefreshToken::from))
    }

    fn revoke_refresh_token(&mut self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        diesel::update(
            refresh_tokens::table
                .find(id)
                .filter(refresh_tokens::revoked_at.is_null()),
        )
        .set(refresh_tokens::revoked_at.eq(Some(at)))
        .execute(self.conn)?;
        Ok(())
    }

    fn revoke_user_refresh_tokens(&mut self, user_id: Uuid, at: DateTime<Utc>) -> AppResult<usize> {
        Ok(diesel::update(
            refresh_tokens::table
                .filter(refresh_tokens::user_id.eq(user_id))
                .filter(refresh_tokens::revoked_at.is_null()),
        )
        .set(refresh_tokens::revoked_at.eq(Some(at)))
        .execute(self.conn)?)
    }

    fn insert_chat_message(&mut self, message: &ChatMessage) -> AppResult<()> {
        diesel::insert_into(chat_messages::table)
            .values(ChatMessageRow::from(message))
            .execute(self.conn)?;
        Ok(())
    }

    fn chat_history(&mut self, project_id: Uuid, before: Option<Uuid>, limit: usize) -> AppResult<Vec<ChatMessage>> {
        let mut query = chat_messages::table
            .filter(chat_messages::project_id.eq(project_id))
            .into_boxed();
        if let Some(before) = before {
            query = query.filter(chat_messages::id.lt(before));
        }
        let rows: Vec<ChatMessageRow> = query
            .order((chat_messages::created_at.desc(), chat_messages::id.desc()))
            .limit(limit as i64)
            .select(ChatMessageRow::as_select())
            .load(self.conn)?;
        Ok(rows.into_iter().map(ChatMessage::from).collect())
    }
}
