// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! TAC Broker API Server
//!
//! Connects GunBroker seller accounts and serves their listings and orders
//! to the dashboard.

use std::sync::Arc;
use tac_broker::{
    config::{redact_preview, Config, StoreBackend},
    db::{FirestoreDb, IntegrationStore, MemoryStore},
    models::Mode,
    services::{CredentialVault, KmsService},
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting TAC Broker API");

    for mode in [Mode::Sandbox, Mode::Production] {
        match config.marketplace.resolve(mode) {
            Ok(endpoint) => tracing::info!(
                mode = %mode,
                base_url = %endpoint.base_url,
                dev_key = %redact_preview(&endpoint.dev_key),
                "GunBroker mode configured"
            ),
            Err(e) => tracing::warn!(mode = %mode, error = %e, "GunBroker mode unavailable"),
        }
    }

    // Initialize integration store
    let store: Arc<dyn IntegrationStore> = match config.store_backend {
        StoreBackend::Firestore => Arc::new(FirestoreDb::new(&config.gcp_project_id).await?),
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory integration store; connections are lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    // Initialize credential vault
    let vault = init_vault(&config).await?;
    tracing::info!("Credential vault initialized");

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), store, vault));

    // Build router
    let app = tac_broker::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Cloud KMS, or the offline mock for in-memory debug runs.
async fn init_vault(
    config: &Config,
) -> Result<Arc<dyn CredentialVault>, tac_broker::error::AppError> {
    #[cfg(debug_assertions)]
    {
        if config.store_backend == StoreBackend::Memory {
            tracing::warn!("Using mock KMS (debug build, in-memory store)");
            return Ok(Arc::new(KmsService::new_mock()));
        }
    }

    let kms = KmsService::new(
        &config.gcp_project_id,
        &config.gcp_region,
        &config.kms_key_name,
    )
    .await?;
    Ok(Arc::new(kms))
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tac_broker=debug,info"));

    tracing_subscriber::registry().with(filter).with(format).init();
}
