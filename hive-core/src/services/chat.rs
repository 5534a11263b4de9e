use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use hive_shared::errors::{AppError, AppResult, ErrorCode};

use super::{load_actor, project_not_found, Engine};
use crate::models::{ChatMessage, Project};
use crate::store::{Store, StoreTx};
use crate::validation::validate_chat_message;

pub const DEFAULT_HISTORY_LIMIT: usize = 50;
pub const MAX_HISTORY_LIMIT: usize = 100;

/// One page of history, newest first. `next_cursor` fetches older messages.
#[derive(Debug, Clone, Serialize)]
pub struct ChatPage {
    pub messages: Vec<ChatMessage>,
    pub next_cursor: Option<Uuid>,
}

/// Chat members are the host and every accepted contributor.
fn member_project(tx: &mut dyn StoreTx, project_id: Uuid, user_id: Uuid) -> AppResult<Project> {
    load_actor(tx, user_id)?;
    let project = tx.project(project_id)?.ok_or_else(|| project_not_found(project_id))?;
    if project.host_id != user_id && !tx.accepted_contributor_ids(project_id)?.contains(&user_id) {
        return Err(AppError::new(
            ErrorCode::NotProjectMember,
            "only the host and accepted contributors can use the project chat",
        ));
    }
    Ok(project)
}

impl<S: Store> Engine<S> {
    pub fn ensure_chat_member(&self, project_id: Uuid, user_id: Uuid) -> AppResult<()> {
        self.store.transaction(|tx| member_project(tx, project_id, user_id).map(|_| ()))
    }

    pub fn post_chat_message(&self, project_id: Uuid, user_id: Uuid, content: &str) -> AppResult<ChatMessage> {
        let content = validate_chat_message(content)?;
        let message = self.store.transaction(|tx| {
            member_project(tx, project_id, user_id)?;
            let message = ChatMessage {
                id: Uuid::now_v7(),
                project_id,
                user_id,
                content,
                created_at: Utc::now(),
            };
            tx.insert_chat_message(&message)?;
            Ok(message)
        })?;

        tracing::debug!(message_id = %message.id, project_id = %project_id, "chat message stored");
        Ok(message)
    }

    pub fn chat_history(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        cursor: Option<Uuid>,
        limit: Option<usize>,
    ) -> AppResult<ChatPage> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, MAX_HISTORY_LIMIT);
        self.store.transaction(|tx| {
            member_project(tx, project_id, user_id)?;
            let messages = tx.chat_history(project_id, cursor, limit)?;
            let next_cursor = if messages.len() == limit { messages.last().map(|m| m.id) } else { None };
            Ok(ChatPage { messages, next_cursor })
        })
    }
}
