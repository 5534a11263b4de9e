use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use hive_shared::errors::{AppError, AppResult, ErrorCode};
use hive_shared::types::{Page, PaginationParams};

use super::ledger::{self, AwardRequest};
use super::{contribution_not_found, load_actor, project_not_found, require_verified, Engine};
use crate::models::{Contribution, ContributionStatus, LedgerEntry, Project, ProjectStatus, User};
use crate::store::{ContributionFilter, Store, StoreTx, Visibility};
use crate::validation::{ContributionChanges, NewContribution};

/// Result of a host decision. `award` is set only for an accept.
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub contribution: Contribution,
    pub award: Option<LedgerEntry>,
}

/// Locks the contribution and checks that `actor` hosts its project.
fn host_decision_target(
    tx: &mut dyn StoreTx,
    contribution_id: Uuid,
    actor: &User,
) -> AppResult<(Contribution, Project)> {
    let contribution = tx
        .contribution_for_update(contribution_id)?
        .ok_or_else(|| contribution_not_found(contribution_id))?;
    let project = tx
        .project(contribution.project_id)?
        .ok_or_else(|| project_not_found(contribution.project_id))?;

    if project.host_id != actor.id {
        return Err(AppError::new(
            ErrorCode::NotProjectHost,
            "only the project host can decide on contributions",
        ));
    }
    if !contribution.is_pending() {
        return Err(AppError::new(
            ErrorCode::ContributionAlreadyDecided,
            format!("contribution is already {}", contribution.status),
        ));
    }
    Ok((contribution, project))
}

/// Locks the contribution and checks that `actor` wrote it and it is undecided.
fn own_pending(tx: &mut dyn StoreTx, contribution_id: Uuid, actor: &User) -> AppResult<Contribution> {
    let contribution = tx
        .contribution_for_update(contribution_id)?
        .ok_or_else(|| contribution_not_found(contribution_id))?;
    if contribution.contributor_id != actor.id {
        return Err(AppError::new(
            ErrorCode::NotContributionOwner,
            "only the contributor can change this contribution",
        ));
    }
    if !contribution.is_pending() {
        return Err(AppError::new(
            ErrorCode::ContributionAlreadyDecided,
            format!("contribution is already {}", contribution.status),
        ));
    }
    Ok(contribution)
}

fn can_see(contribution: &Contribution, project: &Project, viewer: Option<&User>) -> bool {
    match viewer {
        Some(v) if v.is_admin() || v.id == project.host_id || v.id == contribution.contributor_id => true,
        _ => contribution.status == ContributionStatus::Accepted && project.status != ProjectStatus::Draft,
    }
}

impl<S: Store> Engine<S> {
    pub fn submit_contribution(
        &self,
        project_id: Uuid,
        contributor_id: Uuid,
        input: NewContribution,
    ) -> AppResult<Contribution> {
        let input = input.normalized();
        input.check()?;

        let contribution = self.store.transaction(|tx| {
            let actor = load_actor(tx, contributor_id)?;
            require_verified(&actor)?;

            // Locked so a concurrent close cannot slip between check and insert.
            let project = tx
                .project_for_update(project_id)?
                .ok_or_else(|| project_not_found(project_id))?;
            if project.host_id == actor.id {
                return Err(AppError::new(
                    ErrorCode::CannotContributeToOwnProject,
                    "hosts cannot contribute to their own project",
                ));
            }
            if project.status != ProjectStatus::Open {
                return Err(AppError::new(
                    ErrorCode::ProjectNotOpen,
                    format!("project is {}, contributions are closed", project.status),
                ));
            }

            let now = Utc::now();
            let contribution = Contribution {
                id: Uuid::now_v7(),
                project_id,
                contributor_id: actor.id,
                title: input.title,
                body: input.body,
                links: input.links,
                attachments: input.attachments,
                status: ContributionStatus::Pending,
                decided_by: None,
                decided_at: None,
                moderation_reason: None,
                created_at: now,
                updated_at: now,
            };
            tx.insert_contribution(&contribution)?;
            Ok(contribution)
        })?;

        tracing::info!(
            contribution_id = %contribution.id,
            project_id = %project_id,
            contributor_id = %contributor_id,
            "contribution submitted"
        );
        Ok(contribution)
    }

    /// Marks the contribution ACCEPTED and appends its AWARD atomically.
    pub fn accept_contribution(&self, contribution_id: Uuid, actor_id: Uuid) -> AppResult<Decision> {
        let amount = self.policy.award_amount;
        let decision = self.store.transaction(|tx| {
            let actor = load_actor(tx, actor_id)?;
            let (mut contribution, project) = host_decision_target(tx, contribution_id, &actor)?;

            let now = Utc::now();
            contribution.status = ContributionStatus::Accepted;
            contribution.decided_by = Some(actor.id);
            contribution.decided_at = Some(now);
            contribution.updated_at = now;
            tx.update_contribution(&contribution)?;

            let award = ledger::award(
                tx,
                &AwardRequest {
                    to_user: contribution.contributor_id,
                    project_id: project.id,
                    contribution_id: contribution.id,
                    amount,
                    issued_by: actor.id,
                },
                now,
            )?;
            Ok(Decision { contribution, award: Some(award) })
        })?;

        if let Some(award) = &decision.award {
            ledger::record_appended(award);
        }
        tracing::info!(
            contribution_id = %contribution_id,
            decided_by = %actor_id,
            "contribution accepted"
        );
        Ok(decision)
    }

    pub fn decline_contribution(&self, contribution_id: Uuid, actor_id: Uuid) -> AppResult<Decision> {
        let contribution = self.store.transaction(|tx| {
            let actor = load_actor(tx, actor_id)?;
            let (mut contribution, _) = host_decision_target(tx, contribution_id, &actor)?;

            let now = Utc::now();
            contribution.status = ContributionStatus::Declined;
            contribution.decided_by = Some(actor.id);
            contribution.decided_at = Some(now);
            contribution.updated_at = now;
            tx.update_contribution(&contribution)?;
            Ok(contribution)
        })?;

        tracing::info!(
            contribution_id = %contribution_id,
            decided_by = %actor_id,
            "contribution declined"
        );
        Ok(Decision { contribution, award: None })
    }

    pub fn update_contribution(
        &self,
        contribution_id: Uuid,
        actor_id: Uuid,
        changes: ContributionChanges,
    ) -> AppResult<Contribution> {
        let changes = changes.normalized();
        changes.check()?;

        self.store.transaction(|tx| {
            let actor = load_actor(tx, actor_id)?;
            let mut contribution = own_pending(tx, contribution_id, &actor)?;

            if let Some(title) = changes.title {
                contribution.title = Some(title).filter(|t| !t.is_empty());
            }
            if let Some(body) = changes.body {
                contribution.body = body;
            }
            if let Some(links) = changes.links {
                contribution.links = links;
            }
            if let Some(attachments) = changes.attachments {
                contribution.attachments = attachments;
            }
            contribution.updated_at = Utc::now();
            tx.update_contribution(&contribution)?;
            Ok(contribution)
        })
    }

    /// Deletes an undecided contribution so the contributor may submit again.
    pub fn withdraw_contribution(&self, contribution_id: Uuid, actor_id: Uuid) -> AppResult<()> {
        self.store.transaction(|tx| {
            let actor = load_actor(tx, actor_id)?;
            let contribution = own_pending(tx, contribution_id, &actor)?;
            tx.delete_contribution(contribution.id)
        })?;
        tracing::info!(contribution_id = %contribution_id, "contribution withdrawn");
        Ok(())
    }

    /// Hidden contributions read as not found.
    pub fn get_contribution(&self, contribution_id: Uuid, viewer: Option<Uuid>) -> AppResult<Contribution> {
        self.store.transaction(|tx| {
            let contribution = tx
                .contribution(contribution_id)?
                .ok_or_else(|| contribution_not_found(contribution_id))?;
            let project = tx
                .project(contribution.project_id)?
                .ok_or_else(|| project_not_found(contribution.project_id))?;
            let viewer = match viewer {
                Some(id) => tx.user(id)?,
                None => None,
            };
            if !can_see(&contribution, &project, viewer.as_ref()) {
                return Err(contribution_not_found(contribution_id));
            }
            Ok(contribution)
        })
    }

    /// The host (and admins) see every contribution, everyone else sees
    /// ACCEPTED ones plus their own.
    pub fn project_contributions(
        &self,
        project_id: Uuid,
        viewer: Option<Uuid>,
        status: Option<ContributionStatus>,
        params: &PaginationParams,
    ) -> AppResult<Page<Contribution>> {
        self.store.transaction(|tx| {
            let project = tx.project(project_id)?.ok_or_else(|| project_not_found(project_id))?;
            let viewer_user = match viewer {
                Some(id) => tx.user(id)?,
                None => None,
            };
            let privileged = viewer_user
                .as_ref()
                .map_or(false, |v| v.is_admin() || v.id == project.host_id);
            if project.status == ProjectStatus::Draft && !privileged {
                return Err(project_not_found(project_id));
            }

            let filter = ContributionFilter {
                project_id: Some(project_id),
                contributor_id: None,
                status,
                visibility: if privileged { Visibility::All } else { Visibility::AcceptedOrOwn(viewer) },
            };
            tx.list_contributions(&filter, params)
        })
    }

    pub fn my_contributions(
        &self,
        user_id: Uuid,
        status: Option<ContributionStatus>,
        params: &PaginationParams,
    ) -> AppResult<Page<Contribution>> {
        self.store.transaction(|tx| {
            let filter = ContributionFilter {
                project_id: None,
                contributor_id: Some(user_id),
                status,
                visibility: Visibility::All,
            };
            tx.list_contributions(&filter, params)
        })
    }
}
