// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Dashboard routes backed by GunBroker data calls.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::{ItemPage, ItemSummary, Mode, OrderPage};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

const DEFAULT_PAGE_SIZE: u32 = 25;

/// GunBroker routes (require authentication via JWT).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/gunbroker/{mode}/items", get(list_items))
        .route("/api/gunbroker/{mode}/items/{item_id}", get(get_item))
        .route("/api/gunbroker/{mode}/orders", get(list_orders))
}

#[derive(Deserialize)]
struct PageQuery {
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_page_size")]
    page_size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

/// The seller's active listings.
async fn list_items(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(mode): Path<Mode>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ItemPage>> {
    let integration = state.tokens.active_integration(&user.user_id, mode).await?;
    let page = state
        .executor
        .items_selling(&integration, query.page, query.page_size)
        .await?;
    Ok(Json(page))
}

/// One listing.
async fn get_item(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path((mode, item_id)): Path<(Mode, u64)>,
) -> Result<Json<ItemSummary>> {
    let integration = state.tokens.active_integration(&user.user_id, mode).await?;
    let item = state.executor.item(&integration, item_id).await?;
    Ok(Json(item))
}

/// Orders sold by the seller.
async fn list_orders(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(mode): Path<Mode>,
    Query(query): Query<PageQuery>,
) -> Result<Json<OrderPage>> {
    let integration = state.tokens.active_integration(&user.user_id, mode).await?;
    let page = state
        .executor
        .orders_sold(&integration, query.page, query.page_size)
        .await?;
    Ok(Json(page))
}
