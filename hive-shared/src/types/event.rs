use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// RabbitMQ Event envelope wrapping all domain events.
///
/// Routing key format: `hive.{domain}.{entity}.{action}`
/// Example: `hive.workflow.contribution.accepted`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event<T: Serialize> {
    pub id: Uuid,
    pub source: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub data: T,
}

impl<T: Serialize> Event<T> {
    pub fn new(source: impl Into<String>, event_type: impl Into<String>, data: T) -> Self {
        Self {
            id: Uuid::now_v7(),
            source: source.into(),
            event_type: event_type.into(),
            timestamp: Utc::now(),
            correlation_id: None,
            user_id: None,
            data,
        }
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_correlation(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }
}

/// RabbitMQ routing keys
pub mod routing_keys {
    // Auth events
    pub const AUTH_USER_REGISTERED: &str = "hive.auth.user.registered";

    // Workflow events
    pub const CONTRIBUTION_SUBMITTED: &str = "hive.workflow.contribution.submitted";
    pub const CONTRIBUTION_ACCEPTED: &str = "hive.workflow.contribution.accepted";
    pub const CONTRIBUTION_DECLINED: &str = "hive.workflow.contribution.declined";

    // Credit events
    pub const CREDITS_ENTRY_APPENDED: &str = "hive.credits.entry.appended";

    // Moderation events
    pub const MODERATION_ACTION_LOGGED: &str = "hive.moderation.action.logged";
}

/// Common event data payloads
pub mod payloads {
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct UserRegistered {
        pub user_id: Uuid,
        pub email: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ContributionSubmitted {
        pub contribution_id: Uuid,
        pub project_id: Uuid,
        pub contributor_id: Uuid,
    }

    /// Shared by the accepted and declined routing keys.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ContributionDecided {
        pub contribution_id: Uuid,
        pub project_id: Uuid,
        pub contributor_id: Uuid,
        pub decided_by: Uuid,
        pub status: String,
        pub award_entry_id: Option<Uuid>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct CreditEntryAppended {
        pub entry_id: Uuid,
        pub to_user: Uuid,
        pub entry_type: String,
        pub amount: i64,
        pub original_entry_id: Option<Uuid>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ModerationActionLogged {
        pub log_id: Uuid,
        pub moderator_id: Uuid,
        pub action: String,
        pub target_type: String,
        pub target_id: Uuid,
    }
}
