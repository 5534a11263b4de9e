use axum::extract::{Path, Query, RawQuery, State};
use axum::http::{header, HeaderMap};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use hive_core::models::ModerationLog;
use hive_core::services::{AdjustmentOutcome, AdminContext, ModerationOutcome, ReversalOutcome};
use hive_core::store::Store;
use hive_shared::errors::AppResult;
use hive_shared::middleware::AdminUser;
use hive_shared::types::pagination::{Paginated, PaginationParams};
use hive_shared::types::ApiResponse;

use crate::events::publisher;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReasonRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct AdjustCreditRequest {
    pub amount: i64,
    pub reason: String,
}

/// First hop of `X-Forwarded-For`, else `X-Real-IP`.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|raw| raw.split(',').next());
    let raw = forwarded.or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))?;
    let ip = raw.trim();
    let plausible = !ip.is_empty()
        && ip
            .bytes()
            .all(|b| b.is_ascii_hexdigit() || b == b'.' || b == b':');
    plausible.then(|| ip.to_string())
}

fn admin_context(admin_id: Uuid, headers: &HeaderMap) -> AdminContext {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    AdminContext::new(admin_id, client_ip(headers), user_agent)
}

async fn logged<S: Store>(state: &AppState<S>, outcome: ModerationOutcome, message: &str) -> ApiResponse<ModerationOutcome> {
    if let Some(reversal) = &outcome.reversal {
        publisher::publish_entry_appended(state, reversal, outcome.log.moderator_id).await;
    }
    publisher::publish_moderation_logged(state, &outcome.log).await;
    ApiResponse::ok_with_message(outcome, message)
}

pub async fn soft_delete_project<S: Store>(
    AdminUser(admin): AdminUser,
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    Path(project_id): Path<Uuid>,
    Json(req): Json<ReasonRequest>,
) -> AppResult<ApiResponse<ModerationOutcome>> {
    let ctx = admin_context(admin.id, &headers);
    let outcome = state
        .run(move |engine| engine.soft_delete_project(project_id, ctx, &req.reason))
        .await?;
    Ok(logged(&state, outcome, "project soft-deleted").await)
}

pub async fn soft_delete_contribution<S: Store>(
    AdminUser(admin): AdminUser,
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    Path(contribution_id): Path<Uuid>,
    Json(req): Json<ReasonRequest>,
) -> AppResult<ApiResponse<ModerationOutcome>> {
    let ctx = admin_context(admin.id, &headers);
    let outcome = state
        .run(move |engine| engine.soft_delete_contribution(contribution_id, ctx, &req.reason))
        .await?;
    Ok(logged(&state, outcome, "contribution soft-deleted").await)
}

pub async fn ban_user<S: Store>(
    AdminUser(admin): AdminUser,
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
    Json(req): Json<ReasonRequest>,
) -> AppResult<ApiResponse<ModerationOutcome>> {
    let ctx = admin_context(admin.id, &headers);
    let outcome = state.run(move |engine| engine.ban_user(user_id, ctx, &req.reason)).await?;
    Ok(logged(&state, outcome, "user banned").await)
}

pub async fn unban_user<S: Store>(
    AdminUser(admin): AdminUser,
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
    Json(req): Json<ReasonRequest>,
) -> AppResult<ApiResponse<ModerationOutcome>> {
    let ctx = admin_context(admin.id, &headers);
    let outcome = state.run(move |engine| engine.unban_user(user_id, ctx, &req.reason)).await?;
    Ok(logged(&state, outcome, "user unbanned").await)
}

pub async fn reverse_credit<S: Store>(
    AdminUser(admin): AdminUser,
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    Path(entry_id): Path<Uuid>,
    Json(req): Json<ReasonRequest>,
) -> AppResult<ApiResponse<ReversalOutcome>> {
    let ctx = admin_context(admin.id, &headers);
    let outcome = state.run(move |engine| engine.reverse_credit(entry_id, ctx, &req.reason)).await?;
    publisher::publish_entry_appended(&state, &outcome.reversal, admin.id).await;
    publisher::publish_moderation_logged(&state, &outcome.log).await;
    Ok(ApiResponse::ok_with_message(outcome, "credit reversed"))
}

pub async fn adjust_credit<S: Store>(
    AdminUser(admin): AdminUser,
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
    Json(req): Json<AdjustCreditRequest>,
) -> AppResult<ApiResponse<AdjustmentOutcome>> {
    let ctx = admin_context(admin.id, &headers);
    let outcome = state
        .run(move |engine| engine.adjust_credit(user_id, ctx, req.amount, &req.reason))
        .await?;
    publisher::publish_entry_appended(&state, &outcome.entry, admin.id).await;
    publisher::publish_moderation_logged(&state, &outcome.log).await;
    Ok(ApiResponse::ok_with_message(outcome, "credit adjusted"))
}

pub async fn audit_log<S: Store>(
    AdminUser(admin): AdminUser,
    State(state): State<AppState<S>>,
    Query(params): Query<PaginationParams>,
    RawQuery(query): RawQuery,
) -> AppResult<Paginated<ModerationLog>> {
    let page = state.run(move |engine| engine.audit_log(admin.id, &params)).await?;
    Ok(Paginated::with_query(page, "/admin/audit-log", query.as_deref()))
}
