use axum::extract::{Path, Query, RawQuery, State};
use axum::Json;
use uuid::Uuid;

use hive_core::models::Contribution;
use hive_core::services::Decision;
use hive_core::store::Store;
use hive_core::validation::ContributionChanges;
use hive_shared::errors::AppResult;
use hive_shared::middleware::OptionalAuthUser;
use hive_shared::types::auth::AuthUser;
use hive_shared::types::pagination::{Paginated, PaginationParams};
use hive_shared::types::ApiResponse;

use crate::events::publisher;
use crate::routes::projects::StatusFilter;
use crate::state::AppState;

pub async fn my_contributions<S: Store>(
    user: AuthUser,
    State(state): State<AppState<S>>,
    Query(filter): Query<StatusFilter>,
    Query(params): Query<PaginationParams>,
    RawQuery(raw): RawQuery,
) -> AppResult<Paginated<Contribution>> {
    let page = state
        .run(move |engine| engine.my_contributions(user.id, filter.status, &params))
        .await?;
    Ok(Paginated::with_query(page, "/contributions/mine", raw.as_deref()))
}

pub async fn get_contribution<S: Store>(
    OptionalAuthUser(viewer): OptionalAuthUser,
    State(state): State<AppState<S>>,
    Path(contribution_id): Path<Uuid>,
) -> AppResult<ApiResponse<Contribution>> {
    let viewer = viewer.map(|u| u.id);
    let contribution = state.run(move |engine| engine.get_contribution(contribution_id, viewer)).await?;
    Ok(ApiResponse::ok(contribution))
}

pub async fn update_contribution<S: Store>(
    user: AuthUser,
    State(state): State<AppState<S>>,
    Path(contribution_id): Path<Uuid>,
    Json(req): Json<ContributionChanges>,
) -> AppResult<ApiResponse<Contribution>> {
    let contribution = state
        .run(move |engine| engine.update_contribution(contribution_id, user.id, req))
        .await?;
    Ok(ApiResponse::ok(contribution))
}

pub async fn withdraw_contribution<S: Store>(
    user: AuthUser,
    State(state): State<AppState<S>>,
    Path(contribution_id): Path<Uuid>,
) -> AppResult<ApiResponse<&'static str>> {
    state.run(move |engine| engine.withdraw_contribution(contribution_id, user.id)).await?;
    Ok(ApiResponse::ok("contribution withdrawn"))
}

pub async fn accept_contribution<S: Store>(
    user: AuthUser,
    State(state): State<AppState<S>>,
    Path(contribution_id): Path<Uuid>,
) -> AppResult<ApiResponse<Decision>> {
    let decision = state.run(move |engine| engine.accept_contribution(contribution_id, user.id)).await?;
    publisher::publish_contribution_decided(&state, &decision.contribution, user.id, decision.award.as_ref()).await;
    Ok(ApiResponse::ok_with_message(decision, "contribution accepted"))
}

pub async fn decline_contribution<S: Store>(
    user: AuthUser,
    State(state): State<AppState<S>>,
    Path(contribution_id): Path<Uuid>,
) -> AppResult<ApiResponse<Decision>> {
    let decision = state.run(move |engine| engine.decline_contribution(contribution_id, user.id)).await?;
    publisher::publish_contribution_decided(&state, &decision.contribution, user.id, None).await;
    Ok(ApiResponse::ok_with_message(decision, "contribution declined"))
}
