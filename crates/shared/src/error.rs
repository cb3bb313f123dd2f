use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    NotFound,
    Validation,
    RateLimited,
    Internal,
    /// The backend answered with `success: false`.
    Rejected,
}

impl ErrorCode {
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            401 => Some(ErrorCode::Unauthorized),
            403 => Some(ErrorCode::Forbidden),
            404 => Some(ErrorCode::NotFound),
            400 | 422 => Some(ErrorCode::Validation),
            429 => Some(ErrorCode::RateLimited),
            500..=599 => Some(ErrorCode::Internal),
            _ => None,
        }
    }
}

/// Application-level failure reported by the storefront backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{code:?}: {message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// `success: false` envelope; falls back to `default_message` when the server sent none.
    pub fn rejected(message: Option<String>, default_message: &str) -> Self {
        let message = message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| default_message.to_string());
        Self::new(ErrorCode::Rejected, message)
    }
}
