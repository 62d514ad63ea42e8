use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::services::{AccountError, AvatarError, TokenError};

#[derive(Debug)]
pub enum ApiError {
    /// Validation failure attributed to a single request field.
    FieldError { field: &'static str, message: String },

    /// Validation failure spanning the whole request.
    NonFieldError(String),

    Unauthorized(String),

    NotFound(String),

    Throttled,

    InternalError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::FieldError { field, message } => write!(f, "{}: {}", field, message),
            ApiError::NonFieldError(msg) => write!(f, "Validation error: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Throttled => write!(f, "Request was throttled"),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::FieldError { field, message } => (
                StatusCode::BAD_REQUEST,
                json!({ (*field): [message] }),
            ),
            ApiError::NonFieldError(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "non_field_errors": [msg] }),
            ),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, json!({ "detail": msg })),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "detail": msg })),
            ApiError::Throttled => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({ "detail": "Request was throttled." }),
            ),
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "detail": "An internal error occurred" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::MissingField(field) => ApiError::FieldError {
                field,
                message: err.to_string(),
            },
            AccountError::InvalidEmail
            | AccountError::DuplicateEmail(_)
            | AccountError::EmailTaken => ApiError::FieldError {
                // Duplicate detected at insert time reports the same way as
                // the pre-check so racing registrations see one body shape
                field: "email",
                message: match err {
                    AccountError::InvalidEmail => err.to_string(),
                    _ => AccountError::EmailTaken.to_string(),
                },
            },
            AccountError::UsernameTaken => ApiError::FieldError {
                field: "username",
                message: err.to_string(),
            },
            AccountError::PasswordMismatch
            | AccountError::InvalidCredentials
            | AccountError::InvalidElevation(_) => ApiError::NonFieldError(err.to_string()),
            AccountError::NotFound => ApiError::NotFound(err.to_string()),
            AccountError::Avatar(avatar_err) => match avatar_err {
                AvatarError::Storage(msg) => ApiError::InternalError(msg),
                other => ApiError::FieldError {
                    field: "avatar",
                    message: other.to_string(),
                },
            },
            AccountError::Database(msg) | AccountError::Internal(msg) => {
                ApiError::InternalError(msg)
            }
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid(_) => {
                ApiError::Unauthorized("Invalid or expired token".to_string())
            }
            TokenError::Signing(msg) => ApiError::InternalError(msg),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl ApiError {
    pub fn internal(msg: impl Into<String>) -> Self {
        ApiError::InternalError(msg.into())
    }
}
