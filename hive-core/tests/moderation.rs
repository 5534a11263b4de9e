mod common;

use hive_core::models::{ContributionStatus, EntryType, ModerationAction, ProjectStatus, TargetType};
use hive_core::policy::SoftDeletePolicy;
use hive_core::services::AdminContext;
use hive_shared::errors::{ErrorCode, ErrorKind};

use common::*;

#[test]
fn moderation_requires_admin_and_a_real_reason() {
    let engine = engine();
    let (host, someone, admin) = (user(&engine, "host"), user(&engine, "someone"), admin(&engine));
    let project = open_project(&engine, host);

    let err = engine.soft_delete_project(project, someone, REASON).unwrap_err();
    assert_eq!(err.code(), ErrorCode::AdminRequired);

    let err = engine.soft_delete_project(project, admin, "  spam     ").unwrap_err();
    assert_eq!(err.code(), ErrorCode::ReasonTooShort);
    assert_eq!(err.kind(), ErrorKind::Validation);

    // Nothing was written by the rejected attempts.
    assert_eq!(engine.audit_log(admin, &all()).unwrap().count, 0);
    assert_eq!(engine.get_project(project, None).unwrap().project.status, ProjectStatus::Open);

    let err = engine.audit_log(someone, &all()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::AdminRequired);
}

#[test]
fn soft_deleted_project_is_closed_and_logged() {
    let engine = engine();
    let (host, admin) = (user(&engine, "host"), admin(&engine));
    let project = open_project(&engine, host);

    let outcome = engine.soft_delete_project(project, admin, REASON).unwrap();
    assert_eq!(outcome.action, ModerationAction::SoftDeleteProject);
    assert_eq!(outcome.target_id, project);
    assert_eq!(engine.get_project(project, None).unwrap().project.status, ProjectStatus::Closed);

    // Repeating it on a closed project still leaves an audit trail.
    engine.soft_delete_project(project, admin, REASON).unwrap();
    let audit = engine.audit_log(admin, &all()).unwrap();
    assert_eq!(audit.count, 2);
    assert!(audit.items.iter().all(|log| log.target_type == TargetType::Project));
}

#[test]
fn log_records_who_acted_from_where_and_the_prior_status() {
    let engine = engine();
    let (host, contributor, admin) = (user(&engine, "host"), user(&engine, "contributor"), admin(&engine));
    let project = open_project(&engine, host);
    let contribution = submit(&engine, project, contributor);
    let admin_email = engine.me(admin).unwrap().email;

    let ctx = AdminContext::new(admin, Some(" 203.0.113.9 ".into()), Some("x".repeat(600)));
    let outcome = engine.soft_delete_contribution(contribution, ctx, REASON).unwrap();
    assert_eq!(outcome.log.moderator_email, admin_email);
    assert_eq!(outcome.log.ip_address.as_deref(), Some("203.0.113.9"));
    assert_eq!(outcome.log.user_agent.as_ref().map(String::len), Some(500));
    assert_eq!(outcome.log.target_description, "Contribution: Prototype (was PENDING)");

    let outcome = engine.soft_delete_project(project, admin, REASON).unwrap();
    assert_eq!(outcome.log.target_description, "Project: Realtime notes sync (was OPEN)");
    assert_eq!(outcome.log.ip_address, None);
    assert_eq!(outcome.log.user_agent, None);

    let outcome = engine.ban_user(contributor, admin, REASON).unwrap();
    assert!(outcome.log.target_description.starts_with("User: contributor ("));

    let audit = engine.audit_log(admin, &all()).unwrap();
    assert!(audit.items.iter().all(|log| log.moderator_email == admin_email));
}

#[test]
fn soft_delete_of_pending_contribution_declines_it() {
    let engine = engine();
    let (host, contributor, admin) = (user(&engine, "host"), user(&engine, "contributor"), admin(&engine));
    let project = open_project(&engine, host);
    let contribution = submit(&engine, project, contributor);

    engine.soft_delete_contribution(contribution, admin, REASON).unwrap();
    let after = engine.get_contribution(contribution, Some(host)).unwrap();
    assert_eq!(after.status, ContributionStatus::Declined);
    assert_eq!(after.decided_by, Some(admin));
    assert_eq!(after.moderation_reason.as_deref(), Some(REASON));
    assert_eq!(engine.ledger(contributor, &all()).unwrap().count, 0);
}

#[test]
fn explicit_reversal_policy_blocks_soft_delete_of_awarded_contribution() {
    let engine = engine_with(SoftDeletePolicy::RequireExplicitReversal);
    let (host, contributor, admin) = (user(&engine, "host"), user(&engine, "contributor"), admin(&engine));
    let project = open_project(&engine, host);
    let contribution = submit(&engine, project, contributor);
    let award = engine.accept_contribution(contribution, host).unwrap().award.unwrap();

    let err = engine.soft_delete_contribution(contribution, admin, REASON).unwrap_err();
    assert_eq!(err.code(), ErrorCode::AwardNotReversed);
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(
        engine.get_contribution(contribution, Some(host)).unwrap().status,
        ContributionStatus::Accepted
    );
    assert_eq!(engine.audit_log(admin, &all()).unwrap().count, 0);

    engine.reverse_credit(award.id, admin, REASON).unwrap();
    let outcome = engine.soft_delete_contribution(contribution, admin, REASON).unwrap();
    assert!(outcome.reversal.is_none());

    let after = engine.get_contribution(contribution, Some(host)).unwrap();
    assert_eq!(after.status, ContributionStatus::Declined);
    // Original decision metadata is kept.
    assert_eq!(after.decided_by, Some(host));
    assert_eq!(total_credits(&engine, contributor), 0);
    assert_reconstructable(&engine, contributor);
}

#[test]
fn auto_reverse_policy_reverses_in_the_same_action() {
    let engine = engine_with(SoftDeletePolicy::AutoReverse);
    let (host, contributor, admin) = (user(&engine, "host"), user(&engine, "contributor"), admin(&engine));
    let project = open_project(&engine, host);
    let contribution = submit(&engine, project, contributor);
    let award = engine.accept_contribution(contribution, host).unwrap().award.unwrap();

    let outcome = engine.soft_delete_contribution(contribution, admin, REASON).unwrap();
    let reversal = outcome.reversal.unwrap();
    assert_eq!(reversal.entry_type, EntryType::Reversal);
    assert_eq!(reversal.original_entry_id, Some(award.id));
    assert_eq!(outcome.reversal_entry_id, Some(reversal.id));
    assert_eq!(total_credits(&engine, contributor), 0);

    let err = engine.reverse_credit(award.id, admin, REASON).unwrap_err();
    assert_eq!(err.code(), ErrorCode::EntryAlreadyReversed);
    assert_reconstructable(&engine, contributor);
}

#[test]
fn an_entry_is_reversed_at_most_once() {
    let engine = engine();
    let (host, contributor, admin) = (user(&engine, "host"), user(&engine, "contributor"), admin(&engine));
    let project = open_project(&engine, host);
    let contribution = submit(&engine, project, contributor);
    let award = engine.accept_contribution(contribution, host).unwrap().award.unwrap();

    let first = engine.reverse_credit(award.id, admin, REASON).unwrap();
    let err = engine.reverse_credit(award.id, admin, REASON).unwrap_err();
    assert_eq!(err.code(), ErrorCode::EntryAlreadyReversed);
    let err = engine.reverse_credit(first.reversal_entry_id, admin, REASON).unwrap_err();
    assert_eq!(err.code(), ErrorCode::CannotReverseReversal);

    let reversals = engine
        .ledger(contributor, &all())
        .unwrap()
        .items
        .into_iter()
        .filter(|e| e.entry_type == EntryType::Reversal)
        .count();
    assert_eq!(reversals, 1);
    assert_eq!(engine.audit_log(admin, &all()).unwrap().count, 1);
}

#[test]
fn ban_rules() {
    let engine = engine();
    let (someone, admin, other_admin) = (user(&engine, "someone"), admin(&engine), admin(&engine));

    let err = engine.ban_user(admin, admin, REASON).unwrap_err();
    assert_eq!(err.code(), ErrorCode::CannotBanSelf);
    let err = engine.ban_user(other_admin, admin, REASON).unwrap_err();
    assert_eq!(err.code(), ErrorCode::CannotBanAdmin);

    engine.ban_user(someone, admin, REASON).unwrap();
    let err = engine.ban_user(someone, admin, REASON).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    engine.unban_user(someone, admin, REASON).unwrap();
    let err = engine.unban_user(someone, admin, REASON).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    let actions: Vec<_> = engine.audit_log(admin, &all()).unwrap().items.iter().map(|l| l.action).collect();
    assert_eq!(actions, [ModerationAction::UnbanUser, ModerationAction::BanUser]);
}

#[test]
fn banned_user_cannot_act_but_keeps_credits() {
    let engine = engine();
    let (host, contributor, admin) = (user(&engine, "host"), user(&engine, "contributor"), admin(&engine));
    let project = open_project(&engine, host);
    let contribution = submit(&engine, project, contributor);
    engine.accept_contribution(contribution, host).unwrap();

    engine.ban_user(contributor, admin, REASON).unwrap();
    assert_eq!(total_credits(&engine, contributor), 1);

    let second = open_project(&engine, host);
    let err = engine.submit_contribution(second, contributor, new_contribution()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::UserBanned);
}
