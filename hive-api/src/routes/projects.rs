use axum::extract::{Path, Query, RawQuery, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use hive_core::models::{Contribution, ContributionStatus, Project, ProjectDetail, ProjectListing, TagUsage};
use hive_core::services::ProjectQuery;
use hive_core::store::Store;
use hive_core::validation::{NewContribution, NewProject, ProjectChanges};
use hive_shared::errors::AppResult;
use hive_shared::middleware::OptionalAuthUser;
use hive_shared::types::auth::AuthUser;
use hive_shared::types::pagination::{Paginated, PaginationParams};
use hive_shared::types::ApiResponse;

use crate::events::publisher;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct StatusFilter {
    pub status: Option<ContributionStatus>,
}

pub async fn list_projects<S: Store>(
    OptionalAuthUser(viewer): OptionalAuthUser,
    State(state): State<AppState<S>>,
    Query(query): Query<ProjectQuery>,
    Query(params): Query<PaginationParams>,
    RawQuery(raw): RawQuery,
) -> AppResult<Paginated<ProjectListing>> {
    let viewer = viewer.map(|u| u.id);
    let page = state.run(move |engine| engine.list_projects(&query, viewer, &params)).await?;
    Ok(Paginated::with_query(page, "/projects", raw.as_deref()))
}

pub async fn my_projects<S: Store>(
    user: AuthUser,
    State(state): State<AppState<S>>,
    Query(params): Query<PaginationParams>,
    RawQuery(raw): RawQuery,
) -> AppResult<Paginated<ProjectListing>> {
    let page = state.run(move |engine| engine.my_projects(user.id, &params)).await?;
    Ok(Paginated::with_query(page, "/projects/mine", raw.as_deref()))
}

/// Tags in use on published projects, most used first.
pub async fn project_tags<S: Store>(State(state): State<AppState<S>>) -> AppResult<ApiResponse<Vec<TagUsage>>> {
    let tags = state.run(|engine| engine.project_tags()).await?;
    Ok(ApiResponse::ok(tags))
}

pub async fn create_project<S: Store>(
    user: AuthUser,
    State(state): State<AppState<S>>,
    Json(req): Json<NewProject>,
) -> AppResult<ApiResponse<Project>> {
    let project = state.run(move |engine| engine.create_project(user.id, req)).await?;
    Ok(ApiResponse::created(project))
}

pub async fn get_project<S: Store>(
    OptionalAuthUser(viewer): OptionalAuthUser,
    State(state): State<AppState<S>>,
    Path(project_id): Path<Uuid>,
) -> AppResult<ApiResponse<ProjectDetail>> {
    let viewer = viewer.map(|u| u.id);
    let detail = state.run(move |engine| engine.get_project(project_id, viewer)).await?;
    Ok(ApiResponse::ok(detail))
}

pub async fn edit_project<S: Store>(
    user: AuthUser,
    State(state): State<AppState<S>>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<ProjectChanges>,
) -> AppResult<ApiResponse<Project>> {
    let project = state.run(move |engine| engine.edit_project(project_id, user.id, req)).await?;
    Ok(ApiResponse::ok(project))
}

pub async fn publish_project<S: Store>(
    user: AuthUser,
    State(state): State<AppState<S>>,
    Path(project_id): Path<Uuid>,
) -> AppResult<ApiResponse<Project>> {
    let project = state.run(move |engine| engine.publish_project(project_id, user.id)).await?;
    Ok(ApiResponse::ok_with_message(project, "project published"))
}

pub async fn close_project<S: Store>(
    user: AuthUser,
    State(state): State<AppState<S>>,
    Path(project_id): Path<Uuid>,
) -> AppResult<ApiResponse<Project>> {
    let project = state.run(move |engine| engine.close_project(project_id, user.id)).await?;
    Ok(ApiResponse::ok_with_message(project, "project closed"))
}

pub async fn project_contributions<S: Store>(
    OptionalAuthUser(viewer): OptionalAuthUser,
    State(state): State<AppState<S>>,
    Path(project_id): Path<Uuid>,
    Query(filter): Query<StatusFilter>,
    Query(params): Query<PaginationParams>,
    RawQuery(raw): RawQuery,
) -> AppResult<Paginated<Contribution>> {
    let viewer = viewer.map(|u| u.id);
    let page = state
        .run(move |engine| engine.project_contributions(project_id, viewer, filter.status, &params))
        .await?;
    Ok(Paginated::with_query(page, &format!("/projects/{project_id}/contributions"), raw.as_deref()))
}

pub async fn submit_contribution<S: Store>(
    user: AuthUser,
    State(state): State<AppState<S>>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<NewContribution>,
) -> AppResult<ApiResponse<Contribution>> {
    let contribution = state
        .run(move |engine| engine.submit_contribution(project_id, user.id, req))
        .await?;
    publisher::publish_contribution_submitted(&state, &contribution).await;
    Ok(ApiResponse::created(contribution))
}
