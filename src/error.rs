// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types shared by the Strava and Notion clients.

use crate::config::ConfigError;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Strava authorization error: {0}")]
    Auth(String),

    #[error("Remote API error ({status}): {message}")]
    RemoteApi { status: u16, message: String },

    #[error("Rate limited. Retry after {retry_after}s")]
    RateLimitExceeded { retry_after: u64 },

    #[error("Invalid activity payload: {0}")]
    Validation(String),

    #[error("Syncer used before initialize()")]
    NotInitialized,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Build a `RemoteApi` error.
    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        AppError::RemoteApi {
            status,
            message: message.into(),
        }
    }

    /// HTTP status associated with this error, if any.
    ///
    /// Transport failures report status 0.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            AppError::RemoteApi { status, .. } => Some(*status),
            AppError::RateLimitExceeded { .. } => Some(429),
            _ => None,
        }
    }

    /// Whether this error is an exhausted 429 retry budget.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, AppError::RateLimitExceeded { .. })
    }
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AppError>;
