// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! GunBroker listing and order payloads, and the shapes the dashboard consumes.

use serde::{Deserialize, Serialize};

// ─── GunBroker wire types ────────────────────────────────────

/// Paged collection as returned by GunBroker list endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: Deserialize<'de>"))]
pub struct GunBrokerPage<T> {
    #[serde(default)]
    pub count: u64,
    #[serde(default = "first_page")]
    pub page_index: u32,
    #[serde(default)]
    pub page_size: u32,
    #[serde(default)]
    pub results: Vec<T>,
}

fn first_page() -> u32 {
    1
}

/// Listing as returned by `/Items/Selling` and `/Items/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct GunBrokerItem {
    #[serde(rename = "itemID")]
    pub item_id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "currentBid", default)]
    pub current_bid: Option<f64>,
    #[serde(rename = "buyNowPrice", default)]
    pub buy_now_price: Option<f64>,
    #[serde(rename = "bidCount", default)]
    pub bid_count: Option<u32>,
    #[serde(rename = "quantity", default)]
    pub quantity: Option<u32>,
    #[serde(rename = "endingDate", default)]
    pub ending_date: Option<String>,
    #[serde(rename = "thumbnailURL", default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GunBrokerBuyer {
    #[serde(rename = "userID", default)]
    pub user_id: Option<u64>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GunBrokerOrderItem {
    #[serde(rename = "itemID")]
    pub item_id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub quantity: Option<u32>,
}

/// Order as returned by `/OrdersSold`.
#[derive(Debug, Clone, Deserialize)]
pub struct GunBrokerOrder {
    #[serde(rename = "orderID")]
    pub order_id: u64,
    #[serde(rename = "orderDate", default)]
    pub order_date: Option<String>,
    #[serde(default)]
    pub buyer: Option<GunBrokerBuyer>,
    #[serde(rename = "totalPrice", alias = "orderTotal", default)]
    pub total_price: Option<f64>,
    #[serde(rename = "orderItemsCollection", default)]
    pub items: Vec<GunBrokerOrderItem>,
    #[serde(rename = "status", alias = "orderStatus", default)]
    pub status: Option<serde_json::Value>,
}

// ─── Dashboard shapes ────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemSummary {
    pub id: u64,
    pub title: String,
    /// Buy-now price when offered, else the current bid
    pub price: Option<f64>,
    pub current_bid: Option<f64>,
    pub buy_now_price: Option<f64>,
    pub bids: u32,
    pub quantity: u32,
    pub ends_at: Option<String>,
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl From<GunBrokerItem> for ItemSummary {
    fn from(item: GunBrokerItem) -> Self {
        Self {
            id: item.item_id,
            title: item.title,
            price: item.buy_now_price.filter(|p| *p > 0.0).or(item.current_bid),
            current_bid: item.current_bid,
            buy_now_price: item.buy_now_price,
            bids: item.bid_count.unwrap_or(0),
            quantity: item.quantity.unwrap_or(1),
            ends_at: item.ending_date,
            thumbnail_url: item.thumbnail_url,
            description: item.description,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemPage {
    pub items: Vec<ItemSummary>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

impl From<GunBrokerPage<GunBrokerItem>> for ItemPage {
    fn from(page: GunBrokerPage<GunBrokerItem>) -> Self {
        Self {
            items: page.results.into_iter().map(ItemSummary::from).collect(),
            total: page.count,
            page: page.page_index,
            page_size: page.page_size,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderSummary {
    pub id: u64,
    pub ordered_at: Option<String>,
    pub buyer: Option<String>,
    pub total: Option<f64>,
    pub status: Option<String>,
    pub item_ids: Vec<u64>,
    pub item_titles: Vec<String>,
}

impl From<GunBrokerOrder> for OrderSummary {
    fn from(order: GunBrokerOrder) -> Self {
        let status = order.status.and_then(|s| match s {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        });

        Self {
            id: order.order_id,
            ordered_at: order.order_date,
            buyer: order.buyer.and_then(|b| b.username),
            total: order.total_price,
            status,
            item_ids: order.items.iter().map(|i| i.item_id).collect(),
            item_titles: order.items.into_iter().map(|i| i.title).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPage {
    pub orders: Vec<OrderSummary>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

impl From<GunBrokerPage<GunBrokerOrder>> for OrderPage {
    fn from(page: GunBrokerPage<GunBrokerOrder>) -> Self {
        Self {
            orders: page.results.into_iter().map(OrderSummary::from).collect(),
            total: page.count,
            page: page.page_index,
            page_size: page.page_size,
        }
    }
}
