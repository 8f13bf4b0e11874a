// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod executor;
pub mod gunbroker;
pub mod kms;
pub mod token_manager;

pub use executor::MarketplaceExecutor;
pub use gunbroker::{GunBrokerClient, MarketplaceRequest, MarketplaceResponse};
pub use kms::{CredentialVault, KmsService};
pub use token_manager::TokenManager;
