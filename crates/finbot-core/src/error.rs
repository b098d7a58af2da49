//! Error types for finbot-core

use finbot_store::StoreError;
use rust_decimal::Decimal;
use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

/// Stable machine-readable error codes for the API layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Validation,
    NotFound,
    Conflict,
    InsufficientFunds,
    CurrencyMismatch,
    Forbidden,
    Internal,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = match self {
            ErrorCode::Validation => "validation",
            ErrorCode::NotFound => "not_found",
            ErrorCode::Conflict => "conflict",
            ErrorCode::InsufficientFunds => "insufficient_funds",
            ErrorCode::CurrencyMismatch => "currency_mismatch",
            ErrorCode::Forbidden => "forbidden",
            ErrorCode::Internal => "internal",
        };
        write!(f, "{}", code)
    }
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
    },

    #[error("Currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: String, right: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Storage error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn code(&self) -> ErrorCode {
        match self {
            CoreError::Validation(_) => ErrorCode::Validation,
            CoreError::NotFound(_) => ErrorCode::NotFound,
            CoreError::Conflict(_) => ErrorCode::Conflict,
            CoreError::InsufficientFunds { .. } => ErrorCode::InsufficientFunds,
            CoreError::CurrencyMismatch { .. } => ErrorCode::CurrencyMismatch,
            CoreError::Forbidden(_) => ErrorCode::Forbidden,
            CoreError::Internal(_) => ErrorCode::Internal,
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => CoreError::NotFound(what),
            StoreError::Conflict(what) => CoreError::Conflict(what),
            StoreError::InsufficientFunds {
                available,
                requested,
            } => CoreError::InsufficientFunds {
                available,
                requested,
            },
            other => CoreError::Internal(other.to_string()),
        }
    }
}
