// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! TAC Broker: GunBroker seller dashboard backend
//!
//! This crate connects users' GunBroker accounts, keeps their access tokens
//! valid, and serves listing and order data to the dashboard.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::IntegrationStore;
use services::{CredentialVault, GunBrokerClient, MarketplaceExecutor, TokenManager};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub tokens: TokenManager,
    pub executor: MarketplaceExecutor,
}

impl AppState {
    /// Wire the token manager and executor from their collaborators.
    pub fn new(
        config: Config,
        store: Arc<dyn IntegrationStore>,
        vault: Arc<dyn CredentialVault>,
    ) -> Self {
        let tokens = TokenManager::new(
            GunBrokerClient::new(),
            config.marketplace.clone(),
            store,
            vault,
        );
        let executor = MarketplaceExecutor::new(tokens.clone());

        Self {
            config,
            tokens,
            executor,
        }
    }
}
