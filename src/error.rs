// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Error types for the contact intake service

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

/// Body returned for every 500 response.
pub const INTERNAL_ERROR_BODY: &str = "An unexpected error occurred.";

/// Storage layer failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),
}

/// Notification publish failure.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Failed to serialize notification: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Notification transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Notification endpoint rejected message with status {0}")]
    Rejected(u16),

    #[error("Notifier misconfigured: {0}")]
    Config(String),
}

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("A database error occurred: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl AppError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Store(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::Validation(msg) => {
                warn!(error = %msg, "Rejected malformed request");
                (status, self.to_string()).into_response()
            }
            _ => {
                error!(error = %self, "Request failed");
                (status, INTERNAL_ERROR_BODY).into_response()
            }
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
