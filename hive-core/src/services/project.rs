use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use hive_shared::errors::{AppError, AppResult, ErrorCode};
use hive_shared::types::{Page, PaginationParams};

use super::{load_actor, project_not_found, require_verified, user_not_found, Engine};
use crate::models::{Difficulty, Project, ProjectDetail, ProjectListing, ProjectStatus, TagUsage, User};
use crate::store::{ProjectFilter, Store, StoreTx};
use crate::validation::{normalize_tags, NewProject, ProjectChanges};

/// Listing filters as they arrive from the query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectQuery {
    pub status: Option<ProjectStatus>,
    pub difficulty: Option<Difficulty>,
    /// Comma separated; a project matches when it carries any of them.
    pub tags: Option<String>,
    pub host_id: Option<Uuid>,
    pub search: Option<String>,
}

/// Locks the project and checks that `actor` hosts it.
fn hosted_for_update(tx: &mut dyn StoreTx, project_id: Uuid, actor: &User) -> AppResult<Project> {
    let project = tx
        .project_for_update(project_id)?
        .ok_or_else(|| project_not_found(project_id))?;
    if project.host_id != actor.id {
        return Err(AppError::new(ErrorCode::NotProjectHost, "only the project host can do that"));
    }
    Ok(project)
}

fn closed_error() -> AppError {
    AppError::new(ErrorCode::ProjectClosed, "project is closed")
}

fn listing(tx: &mut dyn StoreTx, project: Project) -> AppResult<ProjectListing> {
    let contribution_count = tx.count_contributions(project.id)?;
    Ok(ProjectListing { project, contribution_count })
}

impl<S: Store> Engine<S> {
    pub fn create_project(&self, host_id: Uuid, input: NewProject) -> AppResult<Project> {
        let input = input.normalized();
        input.check()?;

        let project = self.store.transaction(|tx| {
            let host = load_actor(tx, host_id)?;
            require_verified(&host)?;

            let now = Utc::now();
            let project = Project {
                id: Uuid::now_v7(),
                host_id: host.id,
                title: input.title,
                description: input.description,
                what_it_does: input.what_it_does,
                inputs_dependencies: input.inputs_dependencies,
                desired_outputs: input.desired_outputs,
                difficulty: input.difficulty,
                estimated_time: input.estimated_time,
                github_url: input.github_url,
                tags: input.tags,
                status: input.status.unwrap_or(ProjectStatus::Open),
                created_at: now,
                updated_at: now,
            };
            tx.insert_project(&project)?;
            Ok(project)
        })?;

        tracing::info!(project_id = %project.id, host_id = %host_id, status = %project.status, "project created");
        Ok(project)
    }

    /// DRAFT -> OPEN.
    pub fn publish_project(&self, project_id: Uuid, actor_id: Uuid) -> AppResult<Project> {
        self.transition_project(project_id, actor_id, ProjectStatus::Open)
    }

    /// Any non-CLOSED status -> CLOSED. Contributions and ledger entries are untouched.
    pub fn close_project(&self, project_id: Uuid, actor_id: Uuid) -> AppResult<Project> {
        self.transition_project(project_id, actor_id, ProjectStatus::Closed)
    }

    fn transition_project(&self, project_id: Uuid, actor_id: Uuid, next: ProjectStatus) -> AppResult<Project> {
        let project = self.store.transaction(|tx| {
            let actor = load_actor(tx, actor_id)?;
            let mut project = hosted_for_update(tx, project_id, &actor)?;
            if project.status == ProjectStatus::Closed {
                return Err(closed_error());
            }
            if !project.status.can_transition_to(next) {
                return Err(AppError::new(
                    ErrorCode::InvalidProjectTransition,
                    format!("cannot move project from {} to {next}", project.status),
                ));
            }
            project.status = next;
            project.updated_at = Utc::now();
            tx.update_project(&project)?;
            Ok(project)
        })?;

        tracing::info!(project_id = %project_id, status = %project.status, "project status changed");
        Ok(project)
    }

    /// CLOSED projects are read-only.
    pub fn edit_project(&self, project_id: Uuid, actor_id: Uuid, changes: ProjectChanges) -> AppResult<Project> {
        let changes = changes.normalized();
        changes.check()?;

        self.store.transaction(|tx| {
            let actor = load_actor(tx, actor_id)?;
            let mut project = hosted_for_update(tx, project_id, &actor)?;
            if project.status == ProjectStatus::Closed {
                return Err(closed_error());
            }

            if let Some(next) = changes.status {
                if next != project.status && !project.status.can_transition_to(next) {
                    return Err(AppError::new(
                        ErrorCode::InvalidProjectTransition,
                        format!("cannot move project from {} to {next}", project.status),
                    ));
                }
                project.status = next;
            }
            if let Some(title) = changes.title {
                project.title = title;
            }
            if let Some(description) = changes.description {
                project.description = description;
            }
            if let Some(what_it_does) = changes.what_it_does {
                project.what_it_does = what_it_does;
            }
            if let Some(inputs) = changes.inputs_dependencies {
                project.inputs_dependencies = Some(inputs).filter(|v| !v.is_empty());
            }
            if let Some(outputs) = changes.desired_outputs {
                project.desired_outputs = outputs;
            }
            if let Some(difficulty) = changes.difficulty {
                project.difficulty = Some(difficulty);
            }
            if let Some(estimated) = changes.estimated_time {
                project.estimated_time = Some(estimated).filter(|v| !v.is_empty());
            }
            if let Some(url) = changes.github_url {
                project.github_url = Some(url).filter(|v| !v.is_empty());
            }
            if let Some(tags) = changes.tags {
                project.tags = tags;
            }
            project.updated_at = Utc::now();
            tx.update_project(&project)?;
            Ok(project)
        })
    }

    /// Drafts are visible only to their host and admins.
    pub fn get_project(&self, project_id: Uuid, viewer: Option<Uuid>) -> AppResult<ProjectDetail> {
        self.store.transaction(|tx| {
            let project = tx.project(project_id)?.ok_or_else(|| project_not_found(project_id))?;
            if project.status == ProjectStatus::Draft {
                let privileged = match viewer {
                    Some(id) if id == project.host_id => true,
                    Some(id) => tx.user(id)?.map_or(false, |u| u.is_admin()),
                    None => false,
                };
                if !privileged {
                    return Err(project_not_found(project_id));
                }
            }

            let host = tx
                .user(project.host_id)?
                .ok_or_else(|| user_not_found(project.host_id))?
                .summary();
            let contribution_count = tx.count_contributions(project.id)?;
            let accepted_ids = tx.accepted_contributor_ids(project.id)?;
            let accepted_contributors = tx.users(&accepted_ids)?.iter().map(User::summary).collect();

            Ok(ProjectDetail {
                project,
                host,
                contribution_count,
                accepted_contributors,
            })
        })
    }

    /// Without a status filter the listing shows OPEN and CLOSED projects.
    /// Drafts appear only when a host lists their own projects.
    pub fn list_projects(
        &self,
        query: &ProjectQuery,
        viewer: Option<Uuid>,
        params: &PaginationParams,
    ) -> AppResult<Page<ProjectListing>> {
        let own_listing = query.host_id.is_some() && query.host_id == viewer;
        let statuses = match query.status {
            Some(ProjectStatus::Draft) if !own_listing => return Ok(Page::new(Vec::new(), 0, params)),
            Some(status) => vec![status],
            None if own_listing => Vec::new(),
            None => vec![ProjectStatus::Open, ProjectStatus::Closed],
        };
        let filter = ProjectFilter {
            statuses,
            host_id: query.host_id,
            difficulty: query.difficulty,
            tags: query
                .tags
                .as_deref()
                .map(|raw| normalize_tags(raw.split(',').map(str::to_string).collect()))
                .unwrap_or_default(),
            search: query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string),
        };

        self.store.transaction(|tx| {
            let page = tx.list_projects(&filter, params)?;
            let mut items = Vec::with_capacity(page.items.len());
            for project in page.items {
                items.push(listing(tx, project)?);
            }
            Ok(Page::new(items, page.count, params))
        })
    }

    /// Every project the user hosts, drafts included.
    pub fn my_projects(&self, host_id: Uuid, params: &PaginationParams) -> AppResult<Page<ProjectListing>> {
        let query = ProjectQuery { host_id: Some(host_id), ..Default::default() };
        self.list_projects(&query, Some(host_id), params)
    }

    /// Tags in use on published projects, most used first.
    pub fn project_tags(&self) -> AppResult<Vec<TagUsage>> {
        self.store.transaction(|tx| tx.tag_usage())
    }
}
