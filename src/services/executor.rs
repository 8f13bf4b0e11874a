// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! GunBroker request executor: one logical call with refresh-and-retry on 401.
//!
//! Per call: `Initial -> TokenObtained -> RequestSent -> Success`, or on a
//! 401 `-> NeedRefresh -> Refreshed -> RetrySent -> Success | Failed`.
//! There is never a second retry, and only 401 triggers a refresh.

use crate::error::AppError;
use crate::models::listing::{GunBrokerItem, GunBrokerOrder, GunBrokerPage};
use crate::models::{Integration, ItemPage, ItemSummary, OrderPage};
use crate::services::gunbroker::{GunBrokerClient, MarketplaceRequest, MarketplaceResponse};
use crate::services::token_manager::TokenManager;

/// GunBroker caps list endpoints at 300 results per page.
pub const MAX_PAGE_SIZE: u32 = 300;

/// States of a single executor call, recorded in trace logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Initial,
    TokenObtained,
    RequestSent,
    NeedRefresh,
    Refreshed,
    RetrySent,
    Success,
    Failed,
}

/// Executes GunBroker data calls on behalf of the API surface.
#[derive(Clone)]
pub struct MarketplaceExecutor {
    tokens: TokenManager,
    client: GunBrokerClient,
}

impl MarketplaceExecutor {
    pub fn new(tokens: TokenManager) -> Self {
        let client = tokens.client().clone();
        Self { tokens, client }
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Perform one GunBroker call with the integration's credentials.
    ///
    /// A 401 triggers exactly one refresh and retry. A 429 surfaces as
    /// [`AppError::RateLimited`] without refreshing; any other non-2xx as
    /// [`AppError::MarketplaceApi`].
    pub async fn call(
        &self,
        integration: &Integration,
        request: &MarketplaceRequest,
    ) -> Result<MarketplaceResponse, AppError> {
        let mut state = CallState::Initial;
        let endpoint = self.tokens.endpoint(integration.mode)?;

        let token = self.tokens.get_valid_token(integration).await?;
        transition(&mut state, CallState::TokenObtained, integration, request);

        let response = self.client.send(&endpoint, &token, request).await?;
        transition(&mut state, CallState::RequestSent, integration, request);

        if response.status != 401 {
            return finish(state, response, integration, request);
        }

        transition(&mut state, CallState::NeedRefresh, integration, request);
        let fresh_token = self.tokens.refresh_rejected(integration, &token).await?;
        transition(&mut state, CallState::Refreshed, integration, request);

        let retried = self.client.send(&endpoint, &fresh_token, request).await?;
        transition(&mut state, CallState::RetrySent, integration, request);

        finish(state, retried, integration, request)
    }

    // ─── API Wrappers ────────────────────────────────────────────────────────

    /// The seller's active listings.
    pub async fn items_selling(
        &self,
        integration: &Integration,
        page: u32,
        page_size: u32,
    ) -> Result<ItemPage, AppError> {
        let request = MarketplaceRequest::get("/Items/Selling")
            .query("PageIndex", page.max(1))
            .query("PageSize", page_size.clamp(1, MAX_PAGE_SIZE));

        let page: GunBrokerPage<GunBrokerItem> = self.call(integration, &request).await?.json()?;
        Ok(page.into())
    }

    /// One listing by ID.
    pub async fn item(
        &self,
        integration: &Integration,
        item_id: u64,
    ) -> Result<ItemSummary, AppError> {
        let request = MarketplaceRequest::get(format!("/Items/{}", item_id));
        let item: GunBrokerItem = self.call(integration, &request).await?.json()?;
        Ok(item.into())
    }

    /// Orders the seller has sold.
    pub async fn orders_sold(
        &self,
        integration: &Integration,
        page: u32,
        page_size: u32,
    ) -> Result<OrderPage, AppError> {
        let request = MarketplaceRequest::get("/OrdersSold")
            .query("PageIndex", page.max(1))
            .query("PageSize", page_size.clamp(1, MAX_PAGE_SIZE));

        let page: GunBrokerPage<GunBrokerOrder> = self.call(integration, &request).await?.json()?;
        Ok(page.into())
    }
}

fn transition(
    state: &mut CallState,
    next: CallState,
    integration: &Integration,
    request: &MarketplaceRequest,
) {
    tracing::trace!(
        integration_id = %integration.id,
        method = %request.method,
        path = %request.path,
        from = ?*state,
        to = ?next,
        "GunBroker call state"
    );
    *state = next;
}

/// Map the final response of a call to the error taxonomy.
fn finish(
    mut state: CallState,
    response: MarketplaceResponse,
    integration: &Integration,
    request: &MarketplaceRequest,
) -> Result<MarketplaceResponse, AppError> {
    if response.is_success() {
        transition(&mut state, CallState::Success, integration, request);
        return Ok(response);
    }

    let retried = state == CallState::RetrySent;
    transition(&mut state, CallState::Failed, integration, request);

    if response.status == 429 {
        tracing::warn!(integration_id = %integration.id, path = %request.path, "GunBroker rate limit hit (429)");
        return Err(AppError::RateLimited);
    }

    tracing::warn!(
        integration_id = %integration.id,
        path = %request.path,
        status = response.status,
        retried,
        "GunBroker call failed"
    );

    Err(AppError::MarketplaceApi {
        status: response.status,
        body: response.error_message(),
    })
}
