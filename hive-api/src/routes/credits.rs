use axum::extract::{Path, Query, RawQuery, State};
use uuid::Uuid;

use hive_core::models::{Balance, LedgerEntry, UserSummary};
use hive_core::store::Store;
use hive_shared::errors::AppResult;
use hive_shared::types::auth::AuthUser;
use hive_shared::types::pagination::{Paginated, PaginationParams};
use hive_shared::types::ApiResponse;

use crate::state::AppState;

pub async fn balance<S: Store>(user: AuthUser, State(state): State<AppState<S>>) -> AppResult<ApiResponse<Balance>> {
    let balance = state.run(move |engine| engine.balance(user.id)).await?;
    Ok(ApiResponse::ok(balance))
}

pub async fn ledger<S: Store>(
    user: AuthUser,
    State(state): State<AppState<S>>,
    Query(params): Query<PaginationParams>,
    RawQuery(raw): RawQuery,
) -> AppResult<Paginated<LedgerEntry>> {
    let page = state.run(move |engine| engine.ledger(user.id, &params)).await?;
    Ok(Paginated::with_query(page, "/credits/ledger", raw.as_deref()))
}

pub async fn user_summary<S: Store>(
    State(state): State<AppState<S>>,
    Path(user_id): Path<Uuid>,
) -> AppResult<ApiResponse<UserSummary>> {
    let summary = state.run(move |engine| engine.credit_summary(user_id)).await?;
    Ok(ApiResponse::ok(summary))
}
