use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use hive_shared::errors::{AppError, AppResult, ErrorCode};
use hive_shared::types::{Page, PaginationParams};

use super::{ContributionFilter, ProjectFilter, Store, StoreTx};
use crate::models::{
    ChatMessage, Contribution, ContributionStatus, EntryType, LedgerEntry, ModerationLog, Project,
    ProjectStatus, RefreshToken, TagUsage, User,
};

/// In-process store used by tests and local runs.
///
/// A single mutex guards the whole state. A transaction works on a clone
/// and swaps it in only when the closure succeeds.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    users: HashMap<Uuid, User>,
    projects: HashMap<Uuid, Project>,
    contributions: HashMap<Uuid, Contribution>,
    ledger: Vec<LedgerEntry>,
    moderation_logs: Vec<ModerationLog>,
    refresh_tokens: HashMap<Uuid, RefreshToken>,
    chat_messages: Vec<ChatMessage>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn transaction<T, F>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&mut dyn StoreTx) -> AppResult<T>,
    {
        let mut committed = self
            .state
            .lock()
            .map_err(|_| AppError::internal("memory store lock poisoned"))?;
        let mut working = committed.clone();
        let out = f(&mut working)?;
        *committed = working;
        Ok(out)
    }
}

fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> (DateTime<Utc>, Uuid)) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

fn missing(what: &str, id: Uuid) -> AppError {
    AppError::internal(format!("{what} {id} vanished inside a transaction"))
}

impl StoreTx for MemoryState {
    fn insert_user(&mut self, user: &User) -> AppResult<()> {
        if self.users.values().any(|u| u.email == user.email) {
            return Err(AppError::new(ErrorCode::EmailAlreadyExists, "email already registered"));
        }
        self.users.insert(user.id, user.clone());
        Ok(())
    }

    fn user(&mut self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.users.get(&id).cloned())
    }

    fn user_for_update(&mut self, id: Uuid) -> AppResult<Option<User>> {
        self.user(id)
    }

    fn user_by_email(&mut self, email: &str) -> AppResult<Option<User>> {
        Ok(self.users.values().find(|u| u.email == email).cloned())
    }

    fn users(&mut self, ids: &[Uuid]) -> AppResult<Vec<User>> {
        Ok(ids.iter().filter_map(|id| self.users.get(id).cloned()).collect())
    }

    fn update_user(&mut self, user: &User) -> AppResult<()> {
        let slot = self.users.get_mut(&user.id).ok_or_else(|| missing("user", user.id))?;
        *slot = user.clone();
        Ok(())
    }

    fn insert_project(&mut self, project: &Project) -> AppResult<()> {
        self.projects.insert(project.id, project.clone());
        Ok(())
    }

    fn project(&mut self, id: Uuid) -> AppResult<Option<Project>> {
        Ok(self.projects.get(&id).cloned())
    }

    fn project_for_update(&mut self, id: Uuid) -> AppResult<Option<Project>> {
        self.project(id)
    }

    fn update_project(&mut self, project: &Project) -> AppResult<()> {
        let slot = self.projects.get_mut(&project.id).ok_or_else(|| missing("project", project.id))?;
        *slot = project.clone();
        Ok(())
    }

    fn list_projects(&mut self, filter: &ProjectFilter, page: &PaginationParams) -> AppResult<Page<Project>> {
        let mut hits: Vec<Project> = self.projects.values().filter(|p| filter.matches(p)).cloned().collect();
        newest_first(&mut hits, |p| (p.created_at, p.id));
        Ok(Page::from_vec(hits, page))
    }

    fn tag_usage(&mut self) -> AppResult<Vec<TagUsage>> {
        let mut counts: HashMap<&str, u64> = HashMap::new();
        for project in self.projects.values().filter(|p| p.status != ProjectStatus::Draft) {
            for tag in &project.tags {
                *counts.entry(tag.as_str()).or_default() += 1;
            }
        }
        let mut usage: Vec<TagUsage> = counts
            .into_iter()
            .map(|(tag, usage_count)| TagUsage { tag: tag.to_string(), usage_count })
            .collect();
        usage.sort_by(|a, b| b.usage_count.cmp(&a.usage_count).then_with(|| a.tag.cmp(&b.tag)));
        Ok(usage)
    }

    fn insert_contribution(&mut self, contribution: &Contribution) -> AppResult<()> {
        let duplicate = self.contributions.values().any(|c| {
            c.project_id == contribution.project_id && c.contributor_id == contribution.contributor_id
        });
        if duplicate {
            return Err(AppError::new(
                ErrorCode::DuplicateContribution,
                "you have already contributed to this project",
            ));
        }
        self.contributions.insert(contribution.id, contribution.clone());
        Ok(())
    }

    fn contribution(&mut self, id: Uuid) -> AppResult<Option<Contribution>> {
        Ok(self.contributions.get(&id).cloned())
    }

    fn contribution_for_update(&mut self, id: Uuid) -> AppResult<Option<Contribution>> {
        self.contribution(id)
    }

    fn update_contribution(&mut self, contribution: &Contribution) -> AppResult<()> {
        let slot = self
            .contributions
            .get_mut(&contribution.id)
            .ok_or_else(|| missing("contribution", contribution.id))?;
        *slot = contribution.clone();
        Ok(())
    }

    fn delete_contribution(&mut self, id: Uuid) -> AppResult<()> {
        self.contributions.remove(&id);
        Ok(())
    }

    fn count_contributions(&mut self, project_id: Uuid) -> AppResult<u64> {
        Ok(self.contributions.values().filter(|c| c.project_id == project_id).count() as u64)
    }

    fn accepted_contributor_ids(&mut self, project_id: Uuid) -> AppResult<Vec<Uuid>> {
        let mut accepted: Vec<&Contribution> = self
            .contributions
            .values()
            .filter(|c| c.project_id == project_id && c.status == ContributionStatus::Accepted)
            .collect();
        accepted.sort_by_key(|c| c.decided_at);
        Ok(accepted.into_iter().map(|c| c.contributor_id).collect())
    }

    fn list_contributions(
        &mut self,
        filter: &ContributionFilter,
        page: &PaginationParams,
    ) -> AppResult<Page<Contribution>> {
        let mut hits: Vec<Contribution> = self.contributions.values().filter(|c| filter.matches(c)).cloned().collect();
        newest_first(&mut hits, |c| (c.created_at, c.id));
        Ok(Page::from_vec(hits, page))
    }

    fn append_entry(&mut self, entry: &LedgerEntry) -> AppResult<()> {
        match entry.entry_type {
            EntryType::Award => {
                let taken = self.ledger.iter().any(|e| {
                    e.entry_type == EntryType::Award && e.contribution_id.is_some() && e.contribution_id == entry.contribution_id
                });
                if taken {
                    return Err(AppError::new(ErrorCode::DuplicateAward, "contribution has already been awarded"));
                }
            }
            EntryType::Reversal => {
                let taken = self.ledger.iter().any(|e| {
                    e.entry_type == EntryType::Reversal && e.original_entry_id == entry.original_entry_id
                });
                if taken {
                    return Err(AppError::new(
                        ErrorCode::EntryAlreadyReversed,
                        "ledger entry has already been reversed",
                    ));
                }
            }
            EntryType::Adjustment => {}
        }
        self.ledger.push(entry.clone());
        Ok(())
    }

    fn ledger_entry(&mut self, id: Uuid) -> AppResult<Option<LedgerEntry>> {
        Ok(self.ledger.iter().find(|e| e.id == id).cloned())
    }

    fn award_for_contribution(&mut self, contribution_id: Uuid) -> AppResult<Option<LedgerEntry>> {
        Ok(self
            .ledger
            .iter()
            .find(|e| e.entry_type == EntryType::Award && e.contribution_id == Some(contribution_id))
            .cloned())
    }

    fn reversal_of(&mut self, entry_id: Uuid) -> AppResult<Option<LedgerEntry>> {
        Ok(self
            .ledger
            .iter()
            .find(|e| e.entry_type == EntryType::Reversal && e.original_entry_id == Some(entry_id))
            .cloned())
    }

    fn entries_for_user(&mut self, user_id: Uuid) -> AppResult<Vec<LedgerEntry>> {
        Ok(self.ledger.iter().filter(|e| e.to_user == user_id).cloned().collect())
    }

    fn ledger_page(&mut self, user_id: Uuid, page: &PaginationParams) -> AppResult<Page<LedgerEntry>> {
        let mut entries = self.entries_for_user(user_id)?;
        newest_first(&mut entries, |e| (e.created_at, e.id));
        Ok(Page::from_vec(entries, page))
    }

    fn insert_moderation_log(&mut self, log: &ModerationLog) -> AppResult<()> {
        self.moderation_logs.push(log.clone());
        Ok(())
    }

    fn moderation_logs(&mut self, page: &PaginationParams) -> AppResult<Page<ModerationLog>> {
        let mut logs = self.moderation_logs.clone();
        newest_first(&mut logs, |l| (l.created_at, l.id));
        Ok(Page::from_vec(logs, page))
    }

    fn insert_refresh_token(&mut self, token: &RefreshToken) -> AppResult<()> {
        self.refresh_tokens.insert(token.id, token.clone());
        Ok(())
    }

    fn refresh_token_by_hash(&mut self, token_hash: &str) -> AppResult<Option<RefreshToken>> {
        Ok(self.refresh_tokens.values().find(|t| t.token_hash == token_hash).cloned())
    }

    fn revoke_refresh_token(&mut self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        if let Some(token) = self.refresh_tokens.get_mut(&id) {
            token.revoked_at.get_or_insert(at);
        }
        Ok(())
    }

    fn revoke_user_refresh_tokens(&mut self, user_id: Uuid, at: DateTime<Utc>) -> AppResult<usize> {
        let mut revoked = 0;
        for token in self.refresh_tokens.values_mut() {
            if token.user_id == user_id && token.revoked_at.is_none() {
                token.revoked_at = Some(at);
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    fn insert_chat_message(&mut self, message: &ChatMessage) -> AppResult<()> {
        self.chat_messages.push(message.clone());
        Ok(())
    }

    fn chat_history(&mut self, project_id: Uuid, before: Option<Uuid>, limit: usize) -> AppResult<Vec<ChatMessage>> {
        let mut messages: Vec<ChatMessage> = self
            .chat_messages
            .iter()
            .filter(|m| m.project_id == project_id && before.map_or(true, |b| m.id < b))
            .cloned()
            .collect();
        newest_first(&mut messages, |m| (m.created_at, m.id));
        messages.truncate(limit);
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(entry_type: EntryType, contribution_id: Option<Uuid>, original: Option<Uuid>) -> LedgerEntry {
        LedgerEntry {
            id: Uuid::now_v7(),
            to_user: Uuid::now_v7(),
            from_user: None,
            project_id: None,
            contribution_id,
            amount: 1,
            entry_type,
            original_entry_id: original,
            reason: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn failed_transaction_leaves_no_trace() {
        let store = MemoryStore::new();
        let award = entry(EntryType::Award, Some(Uuid::now_v7()), None);

        let result: AppResult<()> = store.transaction(|tx| {
            tx.append_entry(&award)?;
            Err(AppError::internal("boom"))
        });
        assert!(result.is_err());

        let found = store.transaction(|tx| tx.ledger_entry(award.id)).unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn second_award_for_contribution_conflicts() {
        let store = MemoryStore::new();
        let contribution_id = Some(Uuid::now_v7());
        let err = store
            .transaction(|tx| {
                tx.append_entry(&entry(EntryType::Award, contribution_id, None))?;
                tx.append_entry(&entry(EntryType::Award, contribution_id, None))
            })
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::DuplicateAward);
    }

    #[test]
    fn second_reversal_of_entry_conflicts() {
        let store = MemoryStore::new();
        let original = Some(Uuid::now_v7());
        let err = store
            .transaction(|tx| {
                tx.append_entry(&entry(EntryType::Reversal, None, original))?;
                tx.append_entry(&entry(EntryType::Reversal, None, original))
            })
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::EntryAlreadyReversed);
    }

    #[test]
    fn chat_history_pages_backwards() {
        let store = MemoryStore::new();
        let project_id = Uuid::now_v7();
        let messages: Vec<ChatMessage> = (0..5)
            .map(|i| ChatMessage {
                id: Uuid::now_v7(),
                project_id,
                user_id: Uuid::now_v7(),
                content: format!("m{i}"),
                created_at: Utc::now() + chrono::Duration::milliseconds(i),
            })
            .collect();
        store
            .transaction(|tx| messages.iter().try_for_each(|m| tx.insert_chat_message(m)))
            .unwrap();

        let first = store.transaction(|tx| tx.chat_history(project_id, None, 2)).unwrap();
        assert_eq!(first.iter().map(|m| m.content.as_str()).collect::<Vec<_>>(), ["m4", "m3"]);

        let cursor = first.last().map(|m| m.id);
        let second = store.transaction(|tx| tx.chat_history(project_id, cursor, 2)).unwrap();
        assert_eq!(second.iter().map(|m| m.content.as_str()).collect::<Vec<_>>(), ["m2", "m1"]);
    }
}
