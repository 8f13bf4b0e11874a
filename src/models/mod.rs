// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod integration;
pub mod listing;

pub use integration::{Integration, IntegrationSummary, Mode};
pub use listing::{ItemPage, ItemSummary, OrderPage, OrderSummary};
