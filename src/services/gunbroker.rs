// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! GunBroker HTTP client.
//!
//! Handles:
//! - Access token acquisition (`POST /Users/AccessToken`)
//! - Raw data calls carrying the `X-DevKey` / `X-AccessToken` headers
//!
//! Status interpretation for data calls lives in
//! [`MarketplaceExecutor`](crate::services::executor::MarketplaceExecutor).

use crate::config::{redact_preview, Endpoint, TOKEN_REFRESH_MARGIN_SECS};
use crate::error::AppError;
use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;

pub const DEV_KEY_HEADER: &str = "X-DevKey";
pub const ACCESS_TOKEN_HEADER: &str = "X-AccessToken";

/// Upper bound on upstream error text carried in errors.
const MAX_ERROR_BODY_CHARS: usize = 500;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Response from `POST /Users/AccessToken`.
///
/// Only `accessToken` is reliably present.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub expiration_date: Option<String>,
    #[serde(default, alias = "userID")]
    pub user_id: Option<serde_json::Value>,
}

impl AccessTokenResponse {
    /// Expiry to record for this token.
    ///
    /// Prefers `expiresIn`, then a parseable `expirationDate`, then
    /// `default_lifetime_secs` from now. Never earlier than the refresh
    /// margin from `now`.
    pub fn expires_at(&self, now: DateTime<Utc>, default_lifetime_secs: i64) -> DateTime<Utc> {
        let reported = if let Some(secs) = self.expires_in.filter(|s| *s > 0) {
            now + Duration::seconds(secs)
        } else if let Some(date) = self
            .expiration_date
            .as_deref()
            .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
        {
            date.with_timezone(&Utc)
        } else {
            now + Duration::seconds(default_lifetime_secs)
        };

        reported.max(now + Duration::seconds(TOKEN_REFRESH_MARGIN_SECS))
    }
}

/// One logical GunBroker data call, relative to the mode's base URL.
#[derive(Debug, Clone)]
pub struct MarketplaceRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl MarketplaceRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            query: Vec::new(),
        }
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }
}

/// Status and body of a GunBroker data response.
#[derive(Debug, Clone)]
pub struct MarketplaceResponse {
    pub status: u16,
    /// Parsed JSON, a JSON string for non-JSON text, or `Null` when empty.
    pub body: serde_json::Value,
}

impl MarketplaceResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Deserialize the body into a typed payload.
    pub fn json<T: DeserializeOwned>(self) -> Result<T, AppError> {
        serde_json::from_value(self.body).map_err(|e| {
            AppError::MarketplaceUnavailable(format!("Unexpected GunBroker response shape: {}", e))
        })
    }

    /// Upstream error text suitable for surfacing to the caller.
    pub fn error_message(&self) -> String {
        message_from_value(&self.body)
    }
}

/// GunBroker API client.
#[derive(Clone)]
pub struct GunBrokerClient {
    http: reqwest::Client,
}

impl Default for GunBrokerClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GunBrokerClient {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self { http }
    }

    /// Exchange username/password for an access token.
    ///
    /// 429 maps to [`AppError::RateLimited`]; any other non-2xx to
    /// [`AppError::MarketplaceAuth`].
    pub async fn authenticate(
        &self,
        endpoint: &Endpoint,
        username: &str,
        password: &str,
    ) -> Result<AccessTokenResponse, AppError> {
        let url = format!("{}/Users/AccessToken", endpoint.base_url);

        tracing::debug!(
            url = %url,
            dev_key = %redact_preview(&endpoint.dev_key),
            "Requesting GunBroker access token"
        );

        let response = self
            .http
            .post(&url)
            .header(DEV_KEY_HEADER, &endpoint.dev_key)
            .form(&[("Username", username), ("Password", password)])
            .send()
            .await
            .map_err(|e| {
                AppError::MarketplaceUnavailable(format!("Access token request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                tracing::warn!("GunBroker rate limit hit during authenticate (429)");
                return Err(AppError::RateLimited);
            }

            let message = message_from_text(&body);
            tracing::warn!(status = status.as_u16(), message = %message, "GunBroker authenticate rejected");
            return Err(AppError::MarketplaceAuth {
                status: status.as_u16(),
                message,
            });
        }

        response.json().await.map_err(|e| {
            AppError::MarketplaceUnavailable(format!("Failed to parse access token response: {}", e))
        })
    }

    /// Send a data request and return the raw status and body.
    pub async fn send(
        &self,
        endpoint: &Endpoint,
        access_token: &str,
        request: &MarketplaceRequest,
    ) -> Result<MarketplaceResponse, AppError> {
        let url = format!(
            "{}/{}",
            endpoint.base_url,
            request.path.trim_start_matches('/')
        );

        let mut builder = self
            .http
            .request(request.method.clone(), &url)
            .header(DEV_KEY_HEADER, &endpoint.dev_key)
            .header(ACCESS_TOKEN_HEADER, access_token);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        let response = builder.send().await.map_err(|e| {
            AppError::MarketplaceUnavailable(format!("GunBroker request failed: {}", e))
        })?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| {
            AppError::MarketplaceUnavailable(format!("Failed to read GunBroker response: {}", e))
        })?;

        Ok(MarketplaceResponse {
            status,
            body: parse_body(&text),
        })
    }
}

fn parse_body(text: &str) -> serde_json::Value {
    if text.trim().is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| serde_json::Value::String(text.to_string()))
}

fn message_from_text(text: &str) -> String {
    message_from_value(&parse_body(text))
}

/// Prefer GunBroker's `message` field, else the raw body, truncated.
fn message_from_value(body: &serde_json::Value) -> String {
    let message = match body {
        serde_json::Value::Object(map) => match map.get("message") {
            Some(serde_json::Value::String(m)) => m.clone(),
            _ => body.to_string(),
        },
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    };
    message.chars().take(MAX_ERROR_BODY_CHARS).collect()
}
