use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

pub use hive_shared::types::auth::UserRole;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Closed string enums. `$text` is the stored form; parsing is
/// case-insensitive and `$wire` is what goes out over JSON.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident, $label:literal { $($variant:ident => $text:literal / $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn as_wire(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_wire())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(ParseEnumError { kind: $label, value: s.to_string() }),
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_wire())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

text_enum!(
    /// DRAFT -> OPEN -> CLOSED. CLOSED is terminal.
    ProjectStatus, "project status" {
        Draft => "draft" / "DRAFT",
        Open => "open" / "OPEN",
        Closed => "closed" / "CLOSED",
    }
);

impl ProjectStatus {
    pub fn can_transition_to(&self, next: ProjectStatus) -> bool {
        matches!(
            (self, next),
            (ProjectStatus::Draft, ProjectStatus::Open)
                | (ProjectStatus::Draft, ProjectStatus::Closed)
                | (ProjectStatus::Open, ProjectStatus::Closed)
        )
    }
}

text_enum!(
    ContributionStatus, "contribution status" {
        Pending => "pending" / "PENDING",
        Accepted => "accepted" / "ACCEPTED",
        Declined => "declined" / "DECLINED",
    }
);

text_enum!(
    EntryType, "ledger entry type" {
        Award => "award" / "AWARD",
        Reversal => "reversal" / "REVERSAL",
        Adjustment => "adjustment" / "ADJUSTMENT",
    }
);

text_enum!(
    Difficulty, "difficulty" {
        Easy => "easy" / "easy",
        Intermediate => "intermediate" / "intermediate",
        Advanced => "advanced" / "advanced",
    }
);

text_enum!(
    ModerationAction, "moderation action" {
        SoftDeleteProject => "soft_delete_project" / "soft_delete_project",
        SoftDeleteContribution => "soft_delete_contribution" / "soft_delete_contribution",
        BanUser => "ban_user" / "ban_user",
        UnbanUser => "unban_user" / "unban_user",
        ReverseCredit => "reverse_credit" / "reverse_credit",
        AdjustCredit => "adjust_credit" / "adjust_credit",
    }
);

text_enum!(
    TargetType, "moderation target" {
        Project => "project" / "project",
        Contribution => "contribution" / "contribution",
        User => "user" / "user",
        Credit => "credit" / "credit",
    }
);

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub role: UserRole,
    pub total_credits: i64,
    pub is_active: bool,
    pub email_verified: bool,
    pub email_verification_code: Option<String>,
    pub bio: String,
    pub skills: Vec<String>,
    pub github_url: Option<String>,
    pub portfolio_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            display_name: self.display_name.clone(),
            total_credits: self.total_credits,
        }
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            role: self.role,
            total_credits: self.total_credits,
            is_active: self.is_active,
            email_verified: self.email_verified,
            bio: self.bio.clone(),
            skills: self.skills.clone(),
            github_url: self.github_url.clone(),
            portfolio_url: self.portfolio_url.clone(),
            created_at: self.created_at,
        }
    }
}

/// Public view of a user, safe to show to anyone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub display_name: String,
    pub total_credits: i64,
}

/// The account owner's own view.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
    pub total_credits: i64,
    pub is_active: bool,
    pub email_verified: bool,
    pub bio: String,
    pub skills: Vec<String>,
    pub github_url: Option<String>,
    pub portfolio_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Project {
    pub id: Uuid,
    pub host_id: Uuid,
    pub title: String,
    pub description: String,
    pub what_it_does: String,
    pub inputs_dependencies: Option<String>,
    pub desired_outputs: String,
    pub difficulty: Option<Difficulty>,
    pub estimated_time: Option<String>,
    pub github_url: Option<String>,
    pub tags: Vec<String>,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectListing {
    #[serde(flatten)]
    pub project: Project,
    pub contribution_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub host: UserSummary,
    pub contribution_count: u64,
    pub accepted_contributors: Vec<UserSummary>,
}

/// A tag and the number of public projects carrying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagUsage {
    pub tag: String,
    pub usage_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contribution {
    pub id: Uuid,
    pub project_id: Uuid,
    pub contributor_id: Uuid,
    pub title: Option<String>,
    pub body: String,
    pub links: Vec<String>,
    pub attachments: Vec<String>,
    pub status: ContributionStatus,
    pub decided_by: Option<Uuid>,
    pub decided_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moderation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contribution {
    pub fn is_pending(&self) -> bool {
        self.status == ContributionStatus::Pending
    }
}

/// Immutable credit ledger row. Corrections are new rows, never edits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub to_user: Uuid,
    pub from_user: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub contribution_id: Option<Uuid>,
    pub amount: i64,
    pub entry_type: EntryType,
    pub original_entry_id: Option<Uuid>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Balance folded from the entry log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Balance {
    pub total: i64,
    pub awards: i64,
    pub reversals: i64,
    pub adjustments: i64,
}

impl Balance {
    pub fn fold<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> Self {
        let mut balance = Balance::default();
        for entry in entries {
            match entry.entry_type {
                EntryType::Award => balance.awards += entry.amount,
                EntryType::Reversal => balance.reversals += entry.amount,
                EntryType::Adjustment => balance.adjustments += entry.amount,
            }
        }
        balance.total = balance.awards + balance.adjustments - balance.reversals;
        balance
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModerationLog {
    pub id: Uuid,
    pub action: ModerationAction,
    pub moderator_id: Uuid,
    pub target_type: TargetType,
    pub target_id: Uuid,
    pub target_description: String,
    pub reason: String,
    /// Kept even if the moderator's account later changes.
    pub moderator_email: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(entry_type: EntryType, amount: i64) -> LedgerEntry {
        LedgerEntry {
            id: Uuid::now_v7(),
            to_user: Uuid::nil(),
            from_user: None,
            project_id: None,
            contribution_id: None,
            amount,
            entry_type,
            original_entry_id: None,
            reason: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn statuses_parse_any_case_and_serialize_upper() {
        assert_eq!("Accepted".parse::<ContributionStatus>().unwrap(), ContributionStatus::Accepted);
        assert_eq!(" open ".parse::<ProjectStatus>().unwrap(), ProjectStatus::Open);
        assert_eq!(serde_json::to_value(ProjectStatus::Closed).unwrap(), "CLOSED");
        assert_eq!(ProjectStatus::Closed.as_str(), "closed");

        let parsed: EntryType = serde_json::from_value(serde_json::json!("reversal")).unwrap();
        assert_eq!(parsed, EntryType::Reversal);
    }

    #[test]
    fn unknown_status_is_rejected() {
        let err = "archived".parse::<ProjectStatus>().unwrap_err();
        assert_eq!(err.kind, "project status");
    }

    #[test]
    fn closed_is_terminal() {
        for next in [ProjectStatus::Draft, ProjectStatus::Open, ProjectStatus::Closed] {
            assert!(!ProjectStatus::Closed.can_transition_to(next));
        }
        assert!(ProjectStatus::Draft.can_transition_to(ProjectStatus::Open));
        assert!(!ProjectStatus::Open.can_transition_to(ProjectStatus::Draft));
    }

    #[test]
    fn balance_fold_subtracts_reversals() {
        let entries = vec![
            entry(EntryType::Award, 1),
            entry(EntryType::Award, 1),
            entry(EntryType::Reversal, 1),
            entry(EntryType::Adjustment, 5),
            entry(EntryType::Adjustment, -2),
        ];
        let balance = Balance::fold(&entries);
        assert_eq!(balance.awards, 2);
        assert_eq!(balance.reversals, 1);
        assert_eq!(balance.adjustments, 3);
        assert_eq!(balance.total, 4);
    }

    #[test]
    fn reversing_a_deduction_restores_credit() {
        let entries = vec![entry(EntryType::Adjustment, -3), entry(EntryType::Reversal, -3)];
        assert_eq!(Balance::fold(&entries).total, 0);
    }
}
