//! Unified application error model and mapping helpers.
//! This module provides a common error enum used by the HTTP boundary and the
//! core components, along with the mapping from error kinds to status codes.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    /// Bad login credentials (unknown account or hash mismatch).
    AuthFailed { code: String, message: String },
    /// Missing or unparseable bearer credential.
    Unauthenticated { code: String, message: String },
    /// Bearer credential present but signature or expiry check failed.
    InvalidToken { code: String, message: String },
    /// Valid token, insufficient role.
    Unauthorized { code: String, message: String },
    /// Boundary validation failure (email syntax, weak password, bad range).
    Validation { code: String, message: String },
    NotFound { code: String, message: String },
    /// Account id already taken.
    Duplicate { code: String, message: String },
    /// Opaque storage collaborator failure.
    Storage { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::AuthFailed { code, .. }
            | AppError::Unauthenticated { code, .. }
            | AppError::InvalidToken { code, .. }
            | AppError::Unauthorized { code, .. }
            | AppError::Validation { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Duplicate { code, .. }
            | AppError::Storage { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::AuthFailed { message, .. }
            | AppError::Unauthenticated { message, .. }
            | AppError::InvalidToken { message, .. }
            | AppError::Unauthorized { message, .. }
            | AppError::Validation { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Duplicate { message, .. }
            | AppError::Storage { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn auth_failed<S: Into<String>>(code: S, msg: S) -> Self { AppError::AuthFailed { code: code.into(), message: msg.into() } }
    pub fn unauthenticated<S: Into<String>>(code: S, msg: S) -> Self { AppError::Unauthenticated { code: code.into(), message: msg.into() } }
    pub fn invalid_token<S: Into<String>>(code: S, msg: S) -> Self { AppError::InvalidToken { code: code.into(), message: msg.into() } }
    pub fn unauthorized<S: Into<String>>(code: S, msg: S) -> Self { AppError::Unauthorized { code: code.into(), message: msg.into() } }
    pub fn validation<S: Into<String>>(code: S, msg: S) -> Self { AppError::Validation { code: code.into(), message: msg.into() } }
    pub fn not_found<S: Into<String>>(code: S, msg: S) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn duplicate<S: Into<String>>(code: S, msg: S) -> Self { AppError::Duplicate { code: code.into(), message: msg.into() } }
    pub fn storage<S: Into<String>>(code: S, msg: S) -> Self { AppError::Storage { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code.
    ///
    /// Unauthorized (role gate) maps to 401 and InvalidToken to 403, matching
    /// the observable contract of the admin-gated endpoints.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::AuthFailed { .. } => 403,
            AppError::Unauthenticated { .. } => 401,
            AppError::InvalidToken { .. } => 403,
            AppError::Unauthorized { .. } => 401,
            AppError::Validation { .. } => 422,
            AppError::NotFound { .. } => 404,
            AppError::Duplicate { .. } => 400,
            AppError::Storage { .. } => 500,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<crate::storage::StoreError> for AppError {
    fn from(err: crate::storage::StoreError) -> Self {
        AppError::Storage { code: "storage_error".into(), message: err.to_string() }
    }
}
