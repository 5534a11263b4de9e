use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use std::sync::OnceLock;

use rand::Rng;

use hive_shared::errors::{AppError, ErrorCode};

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::internal(format!("password hashing failed: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::internal(format!("invalid password hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

static DUMMY_HASH: OnceLock<String> = OnceLock::new();

/// A real argon2 hash of a throwaway password, computed once.
pub fn dummy_hash() -> &'static str {
    DUMMY_HASH.get_or_init(|| hash_password("hive-no-such-account-0").unwrap_or_default())
}

/// Spends the same argon2 work as a real check so that unknown emails take
/// as long to reject as wrong passwords.
pub fn burn_verification(password: &str) {
    let _ = verify_password(password, dummy_hash());
}

/// At least 8 characters with one letter and one digit.
pub fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < 8 {
        return Err(AppError::new(ErrorCode::PasswordTooWeak, "password must be at least 8 characters"));
    }
    if password.chars().count() > 128 {
        return Err(AppError::new(ErrorCode::PasswordTooWeak, "password must be at most 128 characters"));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AppError::new(ErrorCode::PasswordTooWeak, "password must contain at least one number"));
    }
    if !password.chars().any(|c| c.is_alphabetic()) {
        return Err(AppError::new(ErrorCode::PasswordTooWeak, "password must contain at least one letter"));
    }
    Ok(())
}

/// Six-digit email verification code.
pub fn generate_verification_code() -> String {
    let mut rng = rand::thread_rng();
    format!("{:06}", rng.gen_range(0..1_000_000))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("hunter22pass").unwrap();
        assert!(verify_password("hunter22pass", &hash).unwrap());
        assert!(!verify_password("wrong-pass-1", &hash).unwrap());
    }

    #[test]
    fn dummy_hash_is_a_real_argon2_hash() {
        let hash = dummy_hash();
        assert!(hash.starts_with("$argon2"));
        assert!(PasswordHash::new(hash).is_ok());
        assert!(!verify_password("anything-at-all-1", hash).unwrap());
        assert!(std::ptr::eq(hash, dummy_hash()));
    }

    #[test]
    fn weak_passwords_are_rejected() {
        for weak in ["short1", "allletters", "1234567890"] {
            let err = validate_password(weak).unwrap_err();
            assert_eq!(err.code(), ErrorCode::PasswordTooWeak, "{weak}");
        }
        assert!(validate_password("letters4ever").is_ok());
    }

    #[test]
    fn verification_code_is_six_digits() {
        let code = generate_verification_code();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }
}
