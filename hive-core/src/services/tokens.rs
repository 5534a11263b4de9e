use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use hive_shared::errors::AppError;
use hive_shared::types::auth::{Claims, TokenPair, UserRole};

use crate::models::RefreshToken;
use crate::policy::TokenSettings;

pub fn create_access_token(settings: &TokenSettings, user_id: Uuid, role: UserRole) -> Result<String, AppError> {
    settings.keys.sign(&Claims::new(user_id, role, settings.access_ttl_secs))
}

/// Opaque 256-bit refresh token, hex encoded. Only its hash is stored.
pub fn create_refresh_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    hex::encode(bytes)
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Issues an access/refresh pair. The returned row must be persisted for
/// the refresh token to be redeemable.
pub fn issue_pair(
    settings: &TokenSettings,
    user_id: Uuid,
    role: UserRole,
    now: DateTime<Utc>,
) -> Result<(TokenPair, RefreshToken), AppError> {
    let access_token = create_access_token(settings, user_id, role)?;
    let refresh_token = create_refresh_token();
    let row = RefreshToken {
        id: Uuid::now_v7(),
        user_id,
        token_hash: hash_token(&refresh_token),
        expires_at: now + Duration::seconds(settings.refresh_ttl_secs),
        revoked_at: None,
        created_at: now,
    };
    Ok((TokenPair::new(access_token, refresh_token, settings.access_ttl_secs), row))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_hex_sha256() {
        let hash = hash_token("abc");
        assert_eq!(hash, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
    }

    #[test]
    fn issued_pair_matches_stored_row() {
        let settings = TokenSettings::new("secret", 900, 3600);
        let user_id = Uuid::now_v7();
        let now = Utc::now();
        let (pair, row) = issue_pair(&settings, user_id, UserRole::User, now).unwrap();

        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, 900);
        assert_eq!(row.token_hash, hash_token(&pair.refresh_token));
        assert_eq!(row.expires_at, now + Duration::seconds(3600));

        let claims = settings.keys.verify(&pair.access_token).unwrap();
        assert_eq!(claims.sub, user_id);
    }
}
