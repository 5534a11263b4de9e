//! Append-only credit ledger.
//!
//! Entries are never updated or deleted. A user's cached `total_credits`
//! is recomputed from the full entry log in the same transaction as every
//! append, with the user row locked first so concurrent appends for the
//! same user serialize.

use chrono::{DateTime, Utc};
use metrics::counter;
use uuid::Uuid;

use hive_shared::errors::{AppError, AppResult, ErrorCode};
use hive_shared::types::{Page, PaginationParams};

use super::{user_not_found, Engine};
use crate::models::{Balance, EntryType, LedgerEntry, User, UserSummary};
use crate::store::{Store, StoreTx};
use crate::validation::validate_reason;

#[derive(Debug, Clone)]
pub struct AwardRequest {
    pub to_user: Uuid,
    pub project_id: Uuid,
    pub contribution_id: Uuid,
    pub amount: i64,
    /// The host issuing the award.
    pub issued_by: Uuid,
}

pub fn award(tx: &mut dyn StoreTx, req: &AwardRequest, now: DateTime<Utc>) -> AppResult<LedgerEntry> {
    if req.amount <= 0 {
        return Err(AppError::new(ErrorCode::InvalidCreditAmount, "award amount must be positive"));
    }
    if req.to_user == req.issued_by {
        return Err(AppError::forbidden("cannot award credits to yourself"));
    }

    let recipient = lock_user(tx, req.to_user)?;
    let entry = LedgerEntry {
        id: Uuid::now_v7(),
        to_user: req.to_user,
        from_user: Some(req.issued_by),
        project_id: Some(req.project_id),
        contribution_id: Some(req.contribution_id),
        amount: req.amount,
        entry_type: EntryType::Award,
        original_entry_id: None,
        reason: None,
        created_at: now,
    };
    tx.append_entry(&entry)?;
    settle(tx, recipient, now)?;
    Ok(entry)
}

/// Appends a REVERSAL carrying the original amount.
pub fn reverse(
    tx: &mut dyn StoreTx,
    entry_id: Uuid,
    actor: Uuid,
    reason: &str,
    now: DateTime<Utc>,
) -> AppResult<LedgerEntry> {
    let reason = validate_reason(reason)?;
    let original = tx
        .ledger_entry(entry_id)?
        .ok_or_else(|| AppError::new(ErrorCode::LedgerEntryNotFound, format!("ledger entry {entry_id} not found")))?;

    if original.entry_type == EntryType::Reversal {
        return Err(AppError::new(ErrorCode::CannotReverseReversal, "a reversal cannot itself be reversed"));
    }

    let owner = lock_user(tx, original.to_user)?;
    if tx.reversal_of(entry_id)?.is_some() {
        return Err(AppError::new(ErrorCode::EntryAlreadyReversed, "ledger entry has already been reversed"));
    }

    let reversal = LedgerEntry {
        id: Uuid::now_v7(),
        to_user: original.to_user,
        from_user: Some(actor),
        project_id: original.project_id,
        contribution_id: original.contribution_id,
        amount: original.amount,
        entry_type: EntryType::Reversal,
        original_entry_id: Some(original.id),
        reason: Some(reason),
        created_at: now,
    };
    tx.append_entry(&reversal)?;
    settle(tx, owner, now)?;
    Ok(reversal)
}

/// Manual grant (`amount > 0`) or deduction (`amount < 0`).
pub fn adjust(
    tx: &mut dyn StoreTx,
    to_user: Uuid,
    amount: i64,
    reason: &str,
    actor: Uuid,
    now: DateTime<Utc>,
) -> AppResult<(LedgerEntry, User)> {
    if amount == 0 {
        return Err(AppError::new(ErrorCode::InvalidCreditAmount, "adjustment amount must be non-zero"));
    }
    let reason = validate_reason(reason)?;
    let user = lock_user(tx, to_user)?;

    let entry = LedgerEntry {
        id: Uuid::now_v7(),
        to_user,
        from_user: Some(actor),
        project_id: None,
        contribution_id: None,
        amount,
        entry_type: EntryType::Adjustment,
        original_entry_id: None,
        reason: Some(reason),
        created_at: now,
    };
    tx.append_entry(&entry)?;
    let user = settle(tx, user, now)?;
    Ok((entry, user))
}

pub fn balance(tx: &mut dyn StoreTx, user_id: Uuid) -> AppResult<Balance> {
    Ok(Balance::fold(&tx.entries_for_user(user_id)?))
}

fn lock_user(tx: &mut dyn StoreTx, id: Uuid) -> AppResult<User> {
    tx.user_for_update(id)?.ok_or_else(|| user_not_found(id))
}

fn settle(tx: &mut dyn StoreTx, mut user: User, now: DateTime<Utc>) -> AppResult<User> {
    user.total_credits = balance(tx, user.id)?.total;
    user.updated_at = now;
    tx.update_user(&user)?;
    Ok(user)
}

impl<S: Store> Engine<S> {
    pub fn balance(&self, user_id: Uuid) -> AppResult<Balance> {
        self.store.transaction(|tx| {
            tx.user(user_id)?.ok_or_else(|| user_not_found(user_id))?;
            balance(tx, user_id)
        })
    }

    /// Newest first.
    pub fn ledger(&self, user_id: Uuid, params: &PaginationParams) -> AppResult<Page<LedgerEntry>> {
        self.store.transaction(|tx| {
            tx.user(user_id)?.ok_or_else(|| user_not_found(user_id))?;
            tx.ledger_page(user_id, params)
        })
    }

    /// Public credit figure shown on profiles.
    pub fn credit_summary(&self, user_id: Uuid) -> AppResult<UserSummary> {
        self.store.transaction(|tx| {
            let user = tx.user(user_id)?.ok_or_else(|| user_not_found(user_id))?;
            Ok(user.summary())
        })
    }
}

pub(crate) fn record_appended(entry: &LedgerEntry) {
    match entry.entry_type {
        EntryType::Award => counter!("credits_awarded_total").increment(entry.amount.unsigned_abs()),
        EntryType::Reversal => counter!("credits_reversed_total").increment(entry.amount.unsigned_abs()),
        EntryType::Adjustment => {}
    }
    tracing::info!(
        entry_id = %entry.id,
        to_user = %entry.to_user,
        entry_type = %entry.entry_type,
        amount = entry.amount,
        "ledger entry appended"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;
    use crate::store::MemoryStore;

    fn seed_user(store: &MemoryStore) -> Uuid {
        let now = Utc::now();
        let user = User {
            id: Uuid::now_v7(),
            email: format!("{}@example.com", Uuid::now_v7()),
            password_hash: String::new(),
            display_name: "someone".into(),
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
        store.transaction(|tx| tx.insert_user(&user)).unwrap();
        user.id
    }

    fn award_req(to_user: Uuid, issued_by: Uuid) -> AwardRequest {
        AwardRequest {
            to_user,
            project_id: Uuid::now_v7(),
            contribution_id: Uuid::now_v7(),
            amount: 1,
            issued_by,
        }
    }

    fn cached_total(store: &MemoryStore, id: Uuid) -> i64 {
        store.transaction(|tx| Ok(tx.user(id)?.map(|u| u.total_credits))).unwrap().unwrap()
    }

    #[test]
    fn award_updates_cached_total() {
        let store = MemoryStore::new();
        let (host, contributor) = (seed_user(&store), seed_user(&store));

        store.transaction(|tx| award(tx, &award_req(contributor, host), Utc::now())).unwrap();
        store.transaction(|tx| award(tx, &award_req(contributor, host), Utc::now())).unwrap();

        assert_eq!(cached_total(&store, contributor), 2);
    }

    #[test]
    fn award_rejects_non_positive_and_self() {
        let store = MemoryStore::new();
        let (host, contributor) = (seed_user(&store), seed_user(&store));

        let mut req = award_req(contributor, host);
        req.amount = 0;
        let err = store.transaction(|tx| award(tx, &req, Utc::now())).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidCreditAmount);

        let err = store.transaction(|tx| award(tx, &award_req(host, host), Utc::now())).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[test]
    fn reversal_rules() {
        let store = MemoryStore::new();
        let (host, contributor, admin) = (seed_user(&store), seed_user(&store), seed_user(&store));
        let entry = store.transaction(|tx| award(tx, &award_req(contributor, host), Utc::now())).unwrap();

        let reversal = store
            .transaction(|tx| reverse(tx, entry.id, admin, "awarded by mistake", Utc::now()))
            .unwrap();
        assert_eq!(reversal.amount, entry.amount);
        assert_eq!(reversal.original_entry_id, Some(entry.id));
        assert_eq!(cached_total(&store, contributor), 0);

        let again = store
            .transaction(|tx| reverse(tx, entry.id, admin, "awarded by mistake", Utc::now()))
            .unwrap_err();
        assert_eq!(again.code(), ErrorCode::EntryAlreadyReversed);

        let of_reversal = store
            .transaction(|tx| reverse(tx, reversal.id, admin, "undo the undo please", Utc::now()))
            .unwrap_err();
        assert_eq!(of_reversal.code(), ErrorCode::CannotReverseReversal);

        let unknown = store
            .transaction(|tx| reverse(tx, Uuid::now_v7(), admin, "no such entry here", Utc::now()))
            .unwrap_err();
        assert_eq!(unknown.code(), ErrorCode::LedgerEntryNotFound);
    }

    #[test]
    fn adjustments_are_signed() {
        let store = MemoryStore::new();
        let (user, admin) = (seed_user(&store), seed_user(&store));

        store.transaction(|tx| adjust(tx, user, 5, "community event prize", admin, Utc::now())).unwrap();
        let (deduction, after) = store
            .transaction(|tx| adjust(tx, user, -2, "duplicate prize payout", admin, Utc::now()))
            .unwrap();
        assert_eq!(deduction.amount, -2);
        assert_eq!(after.total_credits, 3);

        let zero = store
            .transaction(|tx| adjust(tx, user, 0, "nothing to see here", admin, Utc::now()))
            .unwrap_err();
        assert_eq!(zero.code(), ErrorCode::InvalidCreditAmount);

        store.transaction(|tx| reverse(tx, deduction.id, admin, "deduction was wrong", Utc::now())).unwrap();
        assert_eq!(cached_total(&store, user), 5);
    }
}
