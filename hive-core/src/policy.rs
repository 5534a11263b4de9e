use serde::{Deserialize, Serialize};

use hive_shared::types::auth::JwtKeys;

/// What an admin soft-delete does to an accepted contribution whose AWARD
/// still stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoftDeletePolicy {
    /// Refuse until the award has been reversed through `reverse_credit`.
    #[default]
    RequireExplicitReversal,
    /// Append the REVERSAL in the same transaction as the soft-delete.
    AutoReverse,
}

#[derive(Debug, Clone)]
pub struct WorkflowPolicy {
    pub award_amount: i64,
    pub soft_delete: SoftDeletePolicy,
}

impl Default for WorkflowPolicy {
    fn default() -> Self {
        Self {
            award_amount: 1,
            soft_delete: SoftDeletePolicy::default(),
        }
    }
}

/// Token issuing parameters handed to the engine.
#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub keys: JwtKeys,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
}

impl TokenSettings {
    pub fn new(secret: &str, access_ttl_secs: i64, refresh_ttl_secs: i64) -> Self {
        Self {
            keys: JwtKeys::new(secret.as_bytes()),
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }
}
