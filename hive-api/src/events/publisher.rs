//! Domain events, published after the engine transaction has committed.
//! Publishing failures are logged and never fail the request.

use serde::Serialize;
use uuid::Uuid;

use hive_core::models::{Contribution, LedgerEntry, ModerationLog};
use hive_core::store::Store;
use hive_shared::types::event::{payloads, routing_keys, Event};

use crate::state::AppState;

const SOURCE: &str = "hive-api";

async fn publish<S: Store, T: Serialize>(state: &AppState<S>, routing_key: &str, actor: Uuid, data: T) {
    let Some(rabbitmq) = &state.rabbitmq else {
        return;
    };
    let event = Event::new(SOURCE, routing_key, data).with_user(actor);
    if let Err(e) = rabbitmq.publish(routing_key, &event).await {
        tracing::error!(error = %e, routing_key = %routing_key, "failed to publish event");
    }
}

pub async fn publish_user_registered<S: Store>(state: &AppState<S>, user_id: Uuid, email: &str) {
    let data = payloads::UserRegistered { user_id, email: email.to_string() };
    publish(state, routing_keys::AUTH_USER_REGISTERED, user_id, data).await;
}

pub async fn publish_contribution_submitted<S: Store>(state: &AppState<S>, contribution: &Contribution) {
    let data = payloads::ContributionSubmitted {
        contribution_id: contribution.id,
        project_id: contribution.project_id,
        contributor_id: contribution.contributor_id,
    };
    publish(state, routing_keys::CONTRIBUTION_SUBMITTED, contribution.contributor_id, data).await;
}

/// Accept and decline share one payload; the routing key follows the outcome.
pub async fn publish_contribution_decided<S: Store>(
    state: &AppState<S>,
    contribution: &Contribution,
    decided_by: Uuid,
    award: Option<&LedgerEntry>,
) {
    let routing_key = if award.is_some() {
        routing_keys::CONTRIBUTION_ACCEPTED
    } else {
        routing_keys::CONTRIBUTION_DECLINED
    };
    let data = payloads::ContributionDecided {
        contribution_id: contribution.id,
        project_id: contribution.project_id,
        contributor_id: contribution.contributor_id,
        decided_by,
        status: contribution.status.to_string(),
        award_entry_id: award.map(|e| e.id),
    };
    publish(state, routing_key, decided_by, data).await;

    if let Some(entry) = award {
        publish_entry_appended(state, entry, decided_by).await;
    }
}

pub async fn publish_entry_appended<S: Store>(state: &AppState<S>, entry: &LedgerEntry, actor: Uuid) {
    let data = payloads::CreditEntryAppended {
        entry_id: entry.id,
        to_user: entry.to_user,
        entry_type: entry.entry_type.to_string(),
        amount: entry.amount,
        original_entry_id: entry.original_entry_id,
    };
    publish(state, routing_keys::CREDITS_ENTRY_APPENDED, actor, data).await;
}

pub async fn publish_moderation_logged<S: Store>(state: &AppState<S>, log: &ModerationLog) {
    let data = payloads::ModerationActionLogged {
        log_id: log.id,
        moderator_id: log.moderator_id,
        action: log.action.to_string(),
        target_type: log.target_type.to_string(),
        target_id: log.target_id,
    };
    publish(state, routing_keys::MODERATION_ACTION_LOGGED, log.moderator_id, data).await;
}
