use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::types::ApiErrorResponse;

/// Application error codes following the pattern E{domain}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E1xxx: Pairing/session errors
/// - E2xxx: Messaging/location errors
/// - E3xxx: Gallery/media errors
/// - E4xxx: Quest/love errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,
    NotFound,
    BadRequest,
    ServiceUnavailable,

    // Pairing (E1xxx)
    CoupleNotFound,
    AlreadyRegistered,
    AlreadyPaired,
    NotCoupleMember,

    // Messaging/location (E2xxx)
    LocationNotFound,
    LocationSlotsFull,

    // Media (E3xxx)
    MediaNotFound,
    MediaExpired,
    AlreadyViewed,

    // Quests (E4xxx)
    QuestNotFound,
    StaleQuest,
    QuestNotCompleted,
    SelfApproval,
    DuplicateApproval,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",
            Self::NotFound => "E0003",
            Self::BadRequest => "E0004",
            Self::ServiceUnavailable => "E0005",

            // Pairing
            Self::CoupleNotFound => "E1001",
            Self::AlreadyRegistered => "E1002",
            Self::AlreadyPaired => "E1003",
            Self::NotCoupleMember => "E1004",

            // Messaging/location
            Self::LocationNotFound => "E2001",
            Self::LocationSlotsFull => "E2002",

            // Media
            Self::MediaNotFound => "E3001",
            Self::MediaExpired => "E3002",
            Self::AlreadyViewed => "E3003",

            // Quests
            Self::QuestNotFound => "E4001",
            Self::StaleQuest => "E4002",
            Self::QuestNotCompleted => "E4003",
            Self::SelfApproval => "E4004",
            Self::DuplicateApproval => "E4005",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError | Self::ServiceUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ValidationError | Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::NotFound | Self::CoupleNotFound | Self::LocationNotFound
            | Self::MediaNotFound | Self::QuestNotFound => StatusCode::NOT_FOUND,
            Self::AlreadyRegistered | Self::AlreadyPaired | Self::LocationSlotsFull
            | Self::AlreadyViewed | Self::StaleQuest | Self::QuestNotCompleted
            | Self::DuplicateApproval => StatusCode::CONFLICT,
            Self::NotCoupleMember | Self::MediaExpired | Self::SelfApproval => StatusCode::FORBIDDEN,
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

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            AppError::Known { code, message, details } => {
                let status = code.status_code();
                let mut resp = ApiErrorResponse::new(code.code(), message);
                if let Some(d) = details {
                    resp = resp.with_details(d.clone());
                }
                (status, resp)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorResponse::new("E0001", "internal server error"),
                )
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                match err {
                    diesel::result::Error::NotFound => (
                        StatusCode::NOT_FOUND,
                        ApiErrorResponse::new("E0003", "resource not found"),
                    ),
                    _ => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ApiErrorResponse::new("E0001", "database error"),
                    ),
                }
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ApiErrorResponse::new("E0002", msg),
            ),
        };

        (status, Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_codes_map_to_409() {
        for code in [
            ErrorCode::AlreadyPaired,
            ErrorCode::AlreadyViewed,
            ErrorCode::StaleQuest,
            ErrorCode::DuplicateApproval,
        ] {
            assert_eq!(code.status_code(), StatusCode::CONFLICT);
        }
    }

    #[test]
    fn not_found_codes_map_to_404() {
        for code in [
            ErrorCode::CoupleNotFound,
            ErrorCode::QuestNotFound,
            ErrorCode::MediaNotFound,
        ] {
            assert_eq!(code.status_code(), StatusCode::NOT_FOUND);
        }
    }

    #[test]
    fn error_codes_are_unique() {
        let codes = [
            ErrorCode::InternalError,
            ErrorCode::ValidationError,
            ErrorCode::NotFound,
            ErrorCode::BadRequest,
            ErrorCode::ServiceUnavailable,
            ErrorCode::CoupleNotFound,
            ErrorCode::AlreadyRegistered,
            ErrorCode::AlreadyPaired,
            ErrorCode::NotCoupleMember,
            ErrorCode::LocationNotFound,
            ErrorCode::LocationSlotsFull,
            ErrorCode::MediaNotFound,
            ErrorCode::MediaExpired,
            ErrorCode::AlreadyViewed,
            ErrorCode::QuestNotFound,
            ErrorCode::StaleQuest,
            ErrorCode::QuestNotCompleted,
            ErrorCode::SelfApproval,
            ErrorCode::DuplicateApproval,
        ];
        let mut seen = std::collections::HashSet::new();
        for code in codes {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }
}
