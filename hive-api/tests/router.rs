use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use hive_api::{router, AppConfig, AppState};
use hive_core::models::User;
use hive_core::store::{MemoryStore, Store};
use hive_core::validation::{NewProject, RegisterInput};
use hive_core::Engine;
use hive_shared::types::auth::{Claims, UserRole};

type TestState = AppState<MemoryStore>;

fn app() -> (Router, TestState) {
    let config = AppConfig::default();
    let engine = Engine::new(MemoryStore::new(), config.workflow_policy(), config.token_settings());
    let state = AppState::new(engine, config);
    (router(state.clone()), state)
}

fn seed_user(state: &TestState, name: &str) -> Uuid {
    let now = Utc::now();
    let user = User {
        id: Uuid::now_v7(),
        email: format!("{name}@example.com"),
        password_hash: String::new(),
        display_name: name.to_string(),
        role: UserRole::User,
        total_credits: 0,
        is_active: true,
        email_verified: true,
        email_verification_code: None,
        bio: String::new(),
        skills: Vec::new(),
        github_url: None,
        portfolio_url: None,
        created_at: now,
        updated_at: now,
    };
    state.engine.store().transaction(|tx| tx.insert_user(&user)).unwrap();
    user.id
}

fn project(state: &TestState, host: Uuid, tags: &[&str]) -> Uuid {
    let input = NewProject {
        title: "Realtime notes sync".into(),
        description: "A small service that keeps markdown notes in sync across devices.".into(),
        what_it_does: "Syncs notes".into(),
        inputs_dependencies: None,
        desired_outputs: "A working prototype with a short write-up.".into(),
        difficulty: None,
        estimated_time: None,
        github_url: None,
        tags: tags.iter().map(|t| t.to_string()).collect(),
        status: None,
    };
    state.engine.create_project(host, input).unwrap().id
}

fn bearer_for(state: &TestState, user_id: Uuid, role: UserRole) -> String {
    let token = state.keys.sign(&Claims::new(user_id, role, 300)).unwrap();
    format!("Bearer {token}")
}

fn bearer(state: &TestState, role: UserRole) -> String {
    bearer_for(state, Uuid::now_v7(), role)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn json_request(method: &str, uri: &str, auth: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn post_json(uri: &str, auth: Option<&str>, body: Value) -> Request<Body> {
    json_request("POST", uri, auth, body)
}

fn contribution_body() -> Value {
    json!({
        "title": "Prototype",
        "body": "Here is a working prototype built on CRDTs, see the linked repo.",
        "links": ["https://example.com/repo"],
    })
}

#[tokio::test]
async fn health_reports_healthy() {
    let (app, _) = app();
    let (status, body) = send(app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "hive-api");
}

#[tokio::test]
async fn metrics_are_off_without_a_recorder() {
    let (app, _) = app();
    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn protected_routes_require_a_bearer_token() {
    let (app, _) = app();
    let (status, body) = send(app, get("/auth/me")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "E0004");
    assert_eq!(body["error"]["kind"], "authentication");
}

#[tokio::test]
async fn tampered_tokens_are_rejected() {
    let (app, _) = app();
    let request = Request::get("/credits/balance")
        .header(header::AUTHORIZATION, "Bearer not.a.jwt")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "E1005");
}

#[tokio::test]
async fn admin_routes_reject_regular_users() {
    let (app, state) = app();
    let request = Request::get("/admin/audit-log")
        .header(header::AUTHORIZATION, bearer(&state, UserRole::User))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "E5001");
    assert_eq!(body["error"]["kind"], "authorization");
}

#[tokio::test]
async fn moderation_reason_is_checked_first() {
    let (app, state) = app();
    let auth = bearer(&state, UserRole::Admin);
    let uri = format!("/admin/users/{}/ban", Uuid::now_v7());
    let (status, body) = send(app, post_json(&uri, Some(&auth), json!({ "reason": "spam" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "E5002");
    assert_eq!(body["error"]["kind"], "validation");
}

#[tokio::test]
async fn invalid_project_reports_field_details() {
    let (app, state) = app();
    let auth = bearer(&state, UserRole::User);
    let payload = json!({
        "title": "Hey",
        "description": "too short",
        "what_it_does": "x",
        "desired_outputs": "also too short",
        "github_url": "https://gitlab.com/someone/repo",
    });
    let (status, body) = send(app, post_json("/projects", Some(&auth), payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "E0002");
    let details = &body["error"]["details"];
    assert!(details.get("title").is_some());
    assert!(details.get("github_url").is_some());
}

#[tokio::test]
async fn registration_validates_before_storing() {
    let (app, _) = app();
    let payload = json!({ "email": "not-an-email", "password": "correct-horse-42", "display_name": "Ada" });
    let (status, body) = send(app, post_json("/auth/register", None, payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "validation");
}

#[tokio::test]
async fn page_links_keep_the_filters() {
    let (app, state) = app();
    let host = seed_user(&state, "host");
    project(&state, host, &["rust"]);
    project(&state, host, &["rust", "sync"]);
    project(&state, host, &["go"]);

    let (status, body) = send(app.clone(), get("/projects?status=OPEN&tags=rust&page_size=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["next"], "/projects?status=OPEN&tags=rust&page=2&page_size=1");
    assert_eq!(body["previous"], Value::Null);

    let (_, body) = send(app, get("/projects?page=2&status=OPEN&tags=rust&page_size=1")).await;
    assert_eq!(body["next"], Value::Null);
    assert_eq!(body["previous"], "/projects?status=OPEN&tags=rust&page=1&page_size=1");
}

#[tokio::test]
async fn huge_page_numbers_return_an_empty_page() {
    let (app, state) = app();
    let host = seed_user(&state, "host");
    project(&state, host, &["rust"]);

    let (status, body) = send(app, get("/projects?page=18446744073709551615&page_size=100")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
    assert_eq!(body["count"], 1);
    assert_eq!(body["next"], Value::Null);
}

#[tokio::test]
async fn submitting_to_a_closed_or_own_project_is_a_bad_request() {
    let (app, state) = app();
    let host = seed_user(&state, "host");
    let contributor = seed_user(&state, "contributor");
    let open = project(&state, host, &["rust"]);
    let closed = project(&state, host, &["rust"]);
    state.engine.close_project(closed, host).unwrap();

    let host_auth = bearer_for(&state, host, UserRole::User);
    let uri = format!("/projects/{open}/contributions");
    let (status, body) = send(app.clone(), post_json(&uri, Some(&host_auth), contribution_body())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "validation");

    let auth = bearer_for(&state, contributor, UserRole::User);
    let uri = format!("/projects/{closed}/contributions");
    let (status, body) = send(app.clone(), post_json(&uri, Some(&auth), contribution_body())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "validation");

    let uri = format!("/projects/{open}/contributions");
    let (status, _) = send(app, post_json(&uri, Some(&auth), contribution_body())).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn verification_code_can_be_resent() {
    let (app, state) = app();
    state
        .engine
        .register(RegisterInput {
            email: "ada@example.com".into(),
            password: "correct-horse-42".into(),
            display_name: "Ada".into(),
        })
        .unwrap();

    let payload = json!({ "email": "ada@example.com" });
    let (status, body) = send(app.clone(), post_json("/auth/resend-verification", None, payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], "verification code sent");

    let payload = json!({ "email": "nobody@example.com" });
    let (status, body) = send(app, post_json("/auth/resend-verification", None, payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "validation");
}

#[tokio::test]
async fn profile_can_be_updated() {
    let (app, state) = app();
    let ada = seed_user(&state, "ada");
    let auth = bearer_for(&state, ada, UserRole::User);

    let payload = json!({ "bio": "Builds sync engines.", "skills": ["Rust", "CRDTs"] });
    let (status, body) = send(app.clone(), json_request("PATCH", "/auth/profile", Some(&auth), payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["bio"], "Builds sync engines.");
    assert_eq!(body["data"]["skills"], json!(["Rust", "CRDTs"]));

    let payload = json!({ "github_url": "https://gitlab.com/ada" });
    let (status, body) = send(app, json_request("PATCH", "/auth/profile", Some(&auth), payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["details"].get("github_url").is_some());
}

#[tokio::test]
async fn tags_are_listed_with_usage_counts() {
    let (app, state) = app();
    let host = seed_user(&state, "host");
    project(&state, host, &["rust"]);
    project(&state, host, &["Rust", "sync"]);

    let (status, body) = send(app, get("/projects/tags")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!([
            { "tag": "rust", "usage_count": 2 },
            { "tag": "sync", "usage_count": 1 },
        ])
    );
}

#[tokio::test]
async fn moderation_log_keeps_the_request_origin() {
    let (app, state) = app();
    let admin = seed_user(&state, "moderator");
    state.engine.ensure_admin("moderator@example.com").unwrap();
    let target = seed_user(&state, "spammer");

    let mut request = post_json(
        &format!("/admin/users/{target}/ban"),
        Some(&bearer_for(&state, admin, UserRole::Admin)),
        json!({ "reason": "posted spam links in every project" }),
    );
    let headers = request.headers_mut();
    headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
    headers.insert(header::USER_AGENT, "hive-tests/1.0".parse().unwrap());
    let (status, _) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);

    let audit = state.engine.audit_log(admin, &Default::default()).unwrap();
    let log = &audit.items[0];
    assert_eq!(log.moderator_email, "moderator@example.com");
    assert_eq!(log.ip_address.as_deref(), Some("203.0.113.9"));
    assert_eq!(log.user_agent.as_deref(), Some("hive-tests/1.0"));
    assert_eq!(log.target_description, "User: spammer (spammer@example.com)");
}
