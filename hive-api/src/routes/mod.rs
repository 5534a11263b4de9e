use axum::routing::{get, patch, post};
use axum::{middleware, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use hive_core::store::Store;
use hive_shared::middleware::metrics_middleware;

use crate::state::AppState;

pub mod admin;
pub mod auth;
pub mod chat;
pub mod contributions;
pub mod credits;
pub mod health;
pub mod projects;

pub fn router<S: Store>(state: AppState<S>) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(auth::register::<S>))
        .route("/verify-email", post(auth::verify_email::<S>))
        .route("/login", post(auth::login::<S>))
        .route("/resend-verification", post(auth::resend_verification::<S>))
        .route("/token/refresh", post(auth::refresh_token::<S>))
        .route("/logout", post(auth::logout::<S>))
        .route("/me", get(auth::me::<S>))
        .route("/profile", patch(auth::update_profile::<S>));

    let project_routes = Router::new()
        .route("/", get(projects::list_projects::<S>).post(projects::create_project::<S>))
        .route("/mine", get(projects::my_projects::<S>))
        .route("/tags", get(projects::project_tags::<S>))
        .route("/:id", get(projects::get_project::<S>).patch(projects::edit_project::<S>))
        .route("/:id/publish", post(projects::publish_project::<S>))
        .route("/:id/close", post(projects::close_project::<S>))
        .route(
            "/:id/contributions",
            get(projects::project_contributions::<S>).post(projects::submit_contribution::<S>),
        );

    let contribution_routes = Router::new()
        .route("/mine", get(contributions::my_contributions::<S>))
        .route(
            "/:id",
            get(contributions::get_contribution::<S>)
                .patch(contributions::update_contribution::<S>)
                .delete(contributions::withdraw_contribution::<S>),
        )
        .route("/:id/accept", post(contributions::accept_contribution::<S>))
        .route("/:id/decline", post(contributions::decline_contribution::<S>));

    let credit_routes = Router::new()
        .route("/balance", get(credits::balance::<S>))
        .route("/ledger", get(credits::ledger::<S>))
        .route("/users/:id", get(credits::user_summary::<S>));

    let admin_routes = Router::new()
        .route("/projects/:id/soft-delete", post(admin::soft_delete_project::<S>))
        .route("/contributions/:id/soft-delete", post(admin::soft_delete_contribution::<S>))
        .route("/users/:id/ban", post(admin::ban_user::<S>))
        .route("/users/:id/unban", post(admin::unban_user::<S>))
        .route("/users/:id/credits/adjust", post(admin::adjust_credit::<S>))
        .route("/credits/:id/reverse", post(admin::reverse_credit::<S>))
        .route("/audit-log", get(admin::audit_log::<S>));

    let chat_routes = Router::new()
        .route("/:project_id/history", get(chat::history::<S>))
        .route("/:project_id/messages", post(chat::post_message::<S>))
        .route("/:project_id/ws", get(chat::socket::<S>));

    Router::new()
        .route("/health", get(health::health_check::<S>))
        .route("/metrics", get(health::metrics::<S>))
        .nest("/auth", auth_routes)
        .nest("/projects", project_routes)
        .nest("/contributions", contribution_routes)
        .nest("/credits", credit_routes)
        .nest("/admin", admin_routes)
        .nest("/chat", chat_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
