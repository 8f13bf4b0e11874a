// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Developer key or base URL missing for the requested mode.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Stored password could not be decrypted, or the vault was unreachable.
    #[error("Credential error: {0}")]
    Credential(String),

    /// GunBroker rejected the username/password during authenticate.
    #[error("GunBroker authentication failed ({status}): {message}")]
    MarketplaceAuth { status: u16, message: String },

    /// Non-2xx from a GunBroker data endpoint after the permitted retry.
    #[error("GunBroker API error ({status}): {body}")]
    MarketplaceApi { status: u16, body: String },

    #[error("GunBroker rate limit exceeded")]
    RateLimited,

    /// GunBroker could not be reached or sent an unreadable response.
    #[error("GunBroker unavailable: {0}")]
    MarketplaceUnavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub const SESSION_EXPIRED_MESSAGE: &'static str =
        "Your GunBroker session has expired, please reconnect";

    pub const CREDENTIAL_UNAVAILABLE_MESSAGE: &'static str =
        "Stored GunBroker credentials could not be read. Try again later, \
         or reconnect your account if this keeps happening";

    /// True for a 429 from either GunBroker endpoint.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AppError::RateLimited)
    }

    /// True when a data call was still rejected with 401 after a token refresh.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, AppError::MarketplaceApi { status: 401, .. })
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Configuration(msg) => {
                tracing::error!(error = %msg, "Server misconfiguration");
                (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error", None)
            }
            AppError::Credential(msg) => {
                tracing::error!(error = %msg, "Stored credential unusable");
                (
                    StatusCode::CONFLICT,
                    "reconnect_required",
                    Some(Self::CREDENTIAL_UNAVAILABLE_MESSAGE.to_string()),
                )
            }
            AppError::MarketplaceAuth { message, .. } => (
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                Some(message.clone()),
            ),
            AppError::MarketplaceApi { status: 401, .. } => (
                StatusCode::UNAUTHORIZED,
                "session_expired",
                Some(Self::SESSION_EXPIRED_MESSAGE.to_string()),
            ),
            AppError::MarketplaceApi { status, body } => (
                StatusCode::BAD_GATEWAY,
                "gunbroker_error",
                Some(format!("HTTP {}: {}", status, body)),
            ),
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                Some("GunBroker is rate limiting requests, try again later".to_string()),
            ),
            AppError::MarketplaceUnavailable(msg) => {
                (StatusCode::BAD_GATEWAY, "gunbroker_unavailable", Some(msg.clone()))
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
