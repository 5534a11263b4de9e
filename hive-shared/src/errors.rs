use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::types::ApiErrorResponse;

/// Broad error classes surfaced to clients.
///
/// Every [`ErrorCode`] belongs to exactly one kind; callers that only care
/// about the class of failure (a rejected transition vs. a bad input) match
/// on this instead of the individual code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Authentication,
    Authorization,
    InvalidState,
    Conflict,
    NotFound,
    RateLimited,
    Internal,
}

/// Application error codes following the pattern E{area}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E1xxx: Auth errors
/// - E2xxx: Project errors
/// - E3xxx: Contribution errors
/// - E4xxx: Credit ledger errors
/// - E5xxx: Moderation errors
/// - E6xxx: Chat errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,
    NotFound,
    Unauthorized,
    Forbidden,
    RateLimited,
    ServiceUnavailable,
    BadRequest,
    InvalidState,
    Conflict,

    // Auth (E1xxx)
    InvalidCredentials,
    EmailAlreadyExists,
    EmailNotVerified,
    TokenExpired,
    TokenInvalid,
    RefreshTokenRevoked,
    PasswordTooWeak,
    VerificationCodeInvalid,
    UserBanned,
    UserNotFound,

    // Projects (E2xxx)
    ProjectNotFound,
    NotProjectHost,
    ProjectNotOpen,
    ProjectClosed,
    InvalidProjectTransition,

    // Contributions (E3xxx)
    ContributionNotFound,
    DuplicateContribution,
    CannotContributeToOwnProject,
    ContributionAlreadyDecided,
    NotContributionOwner,

    // Credits (E4xxx)
    LedgerEntryNotFound,
    EntryAlreadyReversed,
    CannotReverseReversal,
    DuplicateAward,
    InvalidCreditAmount,

    // Moderation (E5xxx)
    AdminRequired,
    ReasonTooShort,
    CannotBanSelf,
    CannotBanAdmin,
    AwardNotReversed,

    // Chat (E6xxx)
    NotProjectMember,
    MessageTooLong,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",
            Self::NotFound => "E0003",
            Self::Unauthorized => "E0004",
            Self::Forbidden => "E0005",
            Self::RateLimited => "E0006",
            Self::ServiceUnavailable => "E0007",
            Self::BadRequest => "E0008",
            Self::InvalidState => "E0009",
            Self::Conflict => "E0010",

            // Auth
            Self::InvalidCredentials => "E1001",
            Self::EmailAlreadyExists => "E1002",
            Self::EmailNotVerified => "E1003",
            Self::TokenExpired => "E1004",
            Self::TokenInvalid => "E1005",
            Self::RefreshTokenRevoked => "E1006",
            Self::PasswordTooWeak => "E1007",
            Self::VerificationCodeInvalid => "E1008",
            Self::UserBanned => "E1009",
            Self::UserNotFound => "E1010",

            // Projects
            Self::ProjectNotFound => "E2001",
            Self::NotProjectHost => "E2002",
            Self::ProjectNotOpen => "E2003",
            Self::ProjectClosed => "E2004",
            Self::InvalidProjectTransition => "E2005",

            // Contributions
            Self::ContributionNotFound => "E3001",
            Self::DuplicateContribution => "E3002",
            Self::CannotContributeToOwnProject => "E3003",
            Self::ContributionAlreadyDecided => "E3004",
            Self::NotContributionOwner => "E3005",

            // Credits
            Self::LedgerEntryNotFound => "E4001",
            Self::EntryAlreadyReversed => "E4002",
            Self::CannotReverseReversal => "E4003",
            Self::DuplicateAward => "E4004",
            Self::InvalidCreditAmount => "E4005",

            // Moderation
            Self::AdminRequired => "E5001",
            Self::ReasonTooShort => "E5002",
            Self::CannotBanSelf => "E5003",
            Self::CannotBanAdmin => "E5004",
            Self::AwardNotReversed => "E5005",

            // Chat
            Self::NotProjectMember => "E6001",
            Self::MessageTooLong => "E6002",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InternalError | Self::ServiceUnavailable => ErrorKind::Internal,
            Self::ValidationError | Self::BadRequest | Self::PasswordTooWeak
            | Self::InvalidCreditAmount | Self::ReasonTooShort | Self::MessageTooLong
            | Self::ProjectNotOpen | Self::CannotContributeToOwnProject => ErrorKind::Validation,
            Self::NotFound | Self::UserNotFound | Self::ProjectNotFound
            | Self::ContributionNotFound | Self::LedgerEntryNotFound => ErrorKind::NotFound,
            Self::Unauthorized | Self::InvalidCredentials | Self::TokenExpired
            | Self::TokenInvalid | Self::RefreshTokenRevoked
            | Self::VerificationCodeInvalid => ErrorKind::Authentication,
            Self::Forbidden | Self::EmailNotVerified | Self::UserBanned | Self::NotProjectHost
            | Self::NotContributionOwner
            | Self::AdminRequired | Self::CannotBanSelf | Self::CannotBanAdmin
            | Self::NotProjectMember => ErrorKind::Authorization,
            Self::InvalidState | Self::ProjectClosed
            | Self::InvalidProjectTransition | Self::ContributionAlreadyDecided
            | Self::EntryAlreadyReversed | Self::CannotReverseReversal
            | Self::AwardNotReversed => ErrorKind::InvalidState,
            Self::Conflict | Self::EmailAlreadyExists | Self::DuplicateContribution
            | Self::DuplicateAward => ErrorKind::Conflict,
            Self::RateLimited => ErrorKind::RateLimited,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::InvalidState | ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known {
        code: ErrorCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn invalid_state(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code, message)
    }

    /// The code this error renders with.
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Known { code, .. } => *code,
            AppError::Internal(_) => ErrorCode::InternalError,
            AppError::Database(diesel::result::Error::NotFound) => ErrorCode::NotFound,
            AppError::Database(_) => ErrorCode::InternalError,
            AppError::Validation(_) => ErrorCode::ValidationError,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.code().kind()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details = serde_json::to_value(&errors).unwrap_or(serde_json::Value::Null);
        AppError::with_details(ErrorCode::ValidationError, "validation failed", details)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            AppError::Known { code, message, details } => {
                let status = code.status_code();
                let mut resp = ApiErrorResponse::new(code.code(), code.kind(), message);
                if let Some(d) = details {
                    resp = resp.with_details(d.clone());
                }
                (status, resp)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorResponse::new("E0001", ErrorKind::Internal, "internal server error"),
                )
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                match err {
                    diesel::result::Error::NotFound => (
                        StatusCode::NOT_FOUND,
                        ApiErrorResponse::new("E0003", ErrorKind::NotFound, "resource not found"),
                    ),
                    _ => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ApiErrorResponse::new("E0001", ErrorKind::Internal, "database error"),
                    ),
                }
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ApiErrorResponse::new("E0002", ErrorKind::Validation, msg),
            ),
        };

        (status, Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn every_kind_maps_to_a_status() {
        assert_eq!(ErrorCode::DuplicateContribution.status_code(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::ContributionAlreadyDecided.status_code(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::NotProjectHost.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::ReasonTooShort.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::LedgerEntryNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::TokenExpired.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn submission_gate_failures_are_validation_errors() {
        assert_eq!(ErrorCode::ProjectNotOpen.kind(), ErrorKind::Validation);
        assert_eq!(ErrorCode::CannotContributeToOwnProject.kind(), ErrorKind::Validation);
        assert_eq!(ErrorCode::ProjectNotOpen.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn banned_user_is_an_authorization_failure() {
        assert_eq!(ErrorCode::UserBanned.kind(), ErrorKind::Authorization);
    }

    #[tokio::test]
    async fn known_error_renders_envelope() {
        let (status, value) = body_json(AppError::new(
            ErrorCode::EntryAlreadyReversed,
            "ledger entry has already been reversed",
        ))
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(value["success"], false);
        assert_eq!(value["error"]["code"], "E4002");
        assert_eq!(value["error"]["kind"], "invalid_state");
        assert_eq!(value["error"]["message"], "ledger entry has already been reversed");
    }

    #[tokio::test]
    async fn database_not_found_renders_404() {
        let (status, value) = body_json(AppError::Database(diesel::result::Error::NotFound)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(value["error"]["kind"], "not_found");
    }

    #[test]
    fn code_of_plain_validation_error() {
        let err = AppError::Validation("bad".into());
        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
