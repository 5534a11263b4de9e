#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use hive_core::models::{User, UserRole};
use hive_core::policy::{SoftDeletePolicy, TokenSettings, WorkflowPolicy};
use hive_core::store::{MemoryStore, Store};
use hive_core::validation::{NewContribution, NewProject};
use hive_core::Engine;
use hive_shared::types::PaginationParams;

pub type TestEngine = Arc<Engine<MemoryStore>>;

pub const REASON: &str = "violates the community guidelines";

pub fn engine() -> TestEngine {
    engine_with(SoftDeletePolicy::RequireExplicitReversal)
}

pub fn engine_with(soft_delete: SoftDeletePolicy) -> TestEngine {
    let policy = WorkflowPolicy { award_amount: 1, soft_delete };
    let tokens = TokenSettings::new("integration-test-secret", 900, 3600);
    Arc::new(Engine::new(MemoryStore::new(), policy, tokens))
}

/// Inserts a verified, active account without going through password hashing.
pub fn seed_user(engine: &TestEngine, name: &str, role: UserRole) -> Uuid {
    let now = Utc::now();
    let user = User {
        id: Uuid::now_v7(),
        email: format!("{name}-{}@example.com", Uuid::now_v7().simple()),
        password_hash: String::new(),
        display_name: name.to_string(),
        role,
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
    engine.store().transaction(|tx| tx.insert_user(&user)).unwrap();
    user.id
}

pub fn user(engine: &TestEngine, name: &str) -> Uuid {
    seed_user(engine, name, UserRole::User)
}

pub fn admin(engine: &TestEngine) -> Uuid {
    seed_user(engine, "admin", UserRole::Admin)
}

pub fn new_project() -> NewProject {
    NewProject {
        title: "Realtime notes sync".into(),
        description: "A small service that keeps markdown notes in sync across devices.".into(),
        what_it_does: "Syncs notes".into(),
        inputs_dependencies: None,
        desired_outputs: "A working prototype with a short write-up.".into(),
        difficulty: None,
        estimated_time: None,
        github_url: None,
        tags: vec!["Rust".into(), "sync".into()],
        status: None,
    }
}

pub fn open_project(engine: &TestEngine, host: Uuid) -> Uuid {
    engine.create_project(host, new_project()).unwrap().id
}

pub fn new_contribution() -> NewContribution {
    NewContribution {
        title: Some("Prototype".into()),
        body: "Here is a working prototype built on CRDTs, see the linked repo.".into(),
        links: vec!["https://example.com/repo".into()],
        attachments: Vec::new(),
    }
}

pub fn submit(engine: &TestEngine, project: Uuid, contributor: Uuid) -> Uuid {
    engine.submit_contribution(project, contributor, new_contribution()).unwrap().id
}

pub fn all() -> PaginationParams {
    PaginationParams::new(1, 100)
}

pub fn total_credits(engine: &TestEngine, user: Uuid) -> i64 {
    engine.me(user).unwrap().total_credits
}

/// The cached total must always equal the fold of the ledger.
pub fn assert_reconstructable(engine: &TestEngine, user: Uuid) {
    assert_eq!(engine.balance(user).unwrap().total, total_credits(engine, user));
}
