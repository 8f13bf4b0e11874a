// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! GunBroker account connection routes.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{IntegrationSummary, Mode};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Integration routes (require authentication via JWT).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/integrations",
            get(list_integrations).post(connect_integration),
        )
        .route("/api/integrations/{id}", delete(disconnect_integration))
        .route("/api/integrations/status/{mode}", get(connection_status))
}

/// Connect form submitted by the dashboard.
#[derive(Deserialize, Validate)]
pub struct ConnectRequest {
    #[validate(length(min = 1, max = 100))]
    pub username: String,
    #[validate(length(min = 1, max = 200))]
    pub password: String,
    /// Connect to the GunBroker sandbox instead of production
    #[serde(default)]
    pub sandbox: bool,
}

/// List the caller's active integrations.
async fn list_integrations(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<IntegrationSummary>>> {
    let integrations = state.tokens.list_integrations(&user.user_id).await?;
    Ok(Json(integrations.iter().map(IntegrationSummary::from).collect()))
}

/// Authenticate with GunBroker and store the connection.
async fn connect_integration(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<ConnectRequest>,
) -> Result<(StatusCode, Json<IntegrationSummary>)> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let mode = Mode::from_sandbox_flag(req.sandbox);
    tracing::info!(user_id = %user.user_id, mode = %mode, "Connecting GunBroker account");

    let integration = state
        .tokens
        .connect(&user.user_id, mode, &req.username, &req.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(IntegrationSummary::from(&integration)),
    ))
}

/// Disconnect an integration. Always succeeds for the caller's own IDs.
async fn disconnect_integration(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.tokens.disconnect(&user.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub mode: Mode,
    pub connected: bool,
    pub integration: Option<IntegrationSummary>,
}

/// Whether the caller has an active connection for `mode`.
async fn connection_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(mode): Path<Mode>,
) -> Result<Json<ConnectionStatus>> {
    let integration = match state.tokens.active_integration(&user.user_id, mode).await {
        Ok(integration) => Some(IntegrationSummary::from(&integration)),
        Err(AppError::NotFound(_)) => None,
        Err(e) => return Err(e),
    };

    Ok(Json(ConnectionStatus {
        mode,
        connected: integration.is_some(),
        integration,
    }))
}
