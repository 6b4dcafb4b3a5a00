use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

pub type AppResult<T> = Result<T, AppError>;

/// Why a presented credential was refused. Clients use the code to decide
/// between refreshing and logging in again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    Expired,
    Invalid,
    Blacklisted,
}

impl TokenError {
    pub fn code(&self) -> &'static str {
        match self {
            TokenError::Expired => "TOKEN_EXPIRED",
            TokenError::Invalid => "TOKEN_INVALID",
            TokenError::Blacklisted => "TOKEN_BLACKLISTED",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            TokenError::Expired => "credential expired",
            TokenError::Invalid => "credential invalid",
            TokenError::Blacklisted => "credential invalidated",
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("no credential provided")]
    MissingCredential,
    #[error("{}", .0.message())]
    Token(TokenError),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("account banned")]
    Banned,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("{message}")]
    Validation { message: String, invalid: Vec<String> },
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("database error")]
    Database(#[from] sqlx::Error),
    #[error("internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Rejects a set of tokens, naming every offender.
    pub fn invalid_permissions(invalid: Vec<String>) -> Self {
        Self::Validation {
            message: format!("invalid permissions: {}", invalid.join(", ")),
            invalid,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingCredential | AppError::Token(_) | AppError::Unauthorized(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Banned | AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Validation { .. } | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Configuration(_) | AppError::Database(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::MissingCredential => "NO_TOKEN",
            AppError::Token(kind) => kind.code(),
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Banned => "USER_BANNED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Validation { .. } => "INVALID_PERMISSIONS",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Configuration(_) | AppError::Database(_) | AppError::Internal(_) => {
                "INTERNAL_ERROR"
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    message: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal detail stays in the logs.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = ?self, "request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        let data = match &self {
            AppError::Validation { invalid, .. } => {
                Some(serde_json::json!({ "invalid_permissions": invalid }))
            }
            _ => None,
        };

        let payload = ErrorResponse {
            success: false,
            message,
            code: self.code(),
            data,
        };

        (status, Json(payload)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}
