// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! GunBroker access token lifecycle.
//!
//! Handles:
//! - Connecting an account (first authenticate, encrypted password storage)
//! - Fast-path reuse of unexpired tokens
//! - Refresh by re-authenticating with the stored credentials
//! - Per-integration locking so concurrent callers share one refresh
//! - Soft-delete on disconnect

use crate::config::{Endpoint, MarketplaceConfig, TOKEN_REFRESH_MARGIN_SECS};
use crate::db::{IntegrationStore, TokenUpdate};
use crate::error::AppError;
use crate::models::{Integration, Mode};
use crate::services::gunbroker::GunBrokerClient;
use crate::services::kms::CredentialVault;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::Instrument;
use uuid::Uuid;

/// Freshest known token for an integration.
#[derive(Clone)]
pub struct CachedToken {
    access_token: String,
    expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expires_at.is_some_and(|expires_at| now + margin < expires_at)
    }

    fn is_unexpired(&self, now: DateTime<Utc>) -> bool {
        self.is_fresh(now, Duration::zero())
    }
}

/// Shared token cache type for use in AppState.
pub type TokenCache = Arc<DashMap<Uuid, CachedToken>>;

/// Shared refresh locks type for use in AppState.
pub type RefreshLocks = Arc<DashMap<Uuid, Arc<Mutex<()>>>>;

/// Owns the GunBroker token lifecycle for every integration.
///
/// Cloning is cheap; clones share the cache, locks, store and vault.
#[derive(Clone)]
pub struct TokenManager {
    client: GunBrokerClient,
    config: Arc<MarketplaceConfig>,
    store: Arc<dyn IntegrationStore>,
    vault: Arc<dyn CredentialVault>,
    /// Newest token per integration, shared across requests.
    token_cache: TokenCache,
    /// Per-integration mutex to serialize refresh operations.
    refresh_locks: RefreshLocks,
}

impl TokenManager {
    pub fn new(
        client: GunBrokerClient,
        config: MarketplaceConfig,
        store: Arc<dyn IntegrationStore>,
        vault: Arc<dyn CredentialVault>,
    ) -> Self {
        Self {
            client,
            config: Arc::new(config),
            store,
            vault,
            token_cache: Arc::new(DashMap::new()),
            refresh_locks: Arc::new(DashMap::new()),
        }
    }

    pub fn client(&self) -> &GunBrokerClient {
        &self.client
    }

    /// Base URL and dev key for a mode.
    pub fn endpoint(&self, mode: Mode) -> Result<Endpoint, AppError> {
        self.config.resolve(mode)
    }

    fn margin() -> Duration {
        Duration::seconds(TOKEN_REFRESH_MARGIN_SECS)
    }

    // ─── Connect / Disconnect ────────────────────────────────────────────────

    /// Authenticate a GunBroker account and store it as the user's active
    /// integration for `mode`, replacing any previous one.
    pub async fn connect(
        &self,
        user_id: &str,
        mode: Mode,
        username: &str,
        password: &str,
    ) -> Result<Integration, AppError> {
        let username = username.trim();
        if user_id.is_empty() {
            return Err(AppError::Unauthorized);
        }
        if username.is_empty() || password.is_empty() {
            return Err(AppError::BadRequest(
                "GunBroker username and password are required".to_string(),
            ));
        }

        let endpoint = self.endpoint(mode)?;
        let token = self.client.authenticate(&endpoint, username, password).await?;

        let encrypted_password = self.vault.encrypt(password).await?;
        let now = Utc::now();

        let integration = Integration {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            username: username.to_string(),
            encrypted_password,
            mode,
            token_expires_at: Some(token.expires_at(now, self.config.default_token_lifetime_secs)),
            access_token: token.access_token,
            is_active: true,
            last_connected_at: now,
            created_at: now,
        };

        let previous = self.store.find_active(user_id, mode).await?;
        self.store.replace_active(&integration).await?;

        if let Some(previous) = previous {
            self.forget(previous.id);
        }
        self.token_cache.insert(
            integration.id,
            CachedToken {
                access_token: integration.access_token.clone(),
                expires_at: integration.token_expires_at,
            },
        );

        tracing::info!(
            integration_id = %integration.id,
            user_id,
            mode = %mode,
            "GunBroker account connected"
        );

        Ok(integration)
    }

    /// Soft-delete an integration. Unknown or already inactive IDs are a no-op.
    pub async fn disconnect(&self, user_id: &str, integration_id: Uuid) -> Result<(), AppError> {
        let deactivated = self.store.deactivate(user_id, integration_id).await?;
        self.forget(integration_id);

        if deactivated {
            tracing::info!(%integration_id, user_id, "GunBroker account disconnected");
        } else {
            tracing::debug!(%integration_id, user_id, "Disconnect of inactive integration ignored");
        }
        Ok(())
    }

    /// The user's active integration for `mode`.
    pub async fn active_integration(
        &self,
        user_id: &str,
        mode: Mode,
    ) -> Result<Integration, AppError> {
        self.store
            .find_active(user_id, mode)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No {} GunBroker connection", mode)))
    }

    /// All of the user's active integrations.
    pub async fn list_integrations(&self, user_id: &str) -> Result<Vec<Integration>, AppError> {
        self.store.list_active(user_id).await
    }

    // ─── Token Management ────────────────────────────────────────────────────

    /// Get a token that is believed valid for this integration.
    ///
    /// 1. Newer token cached by a concurrent refresh (no I/O)
    /// 2. The integration's own token if its expiry is known and ahead (no I/O)
    /// 3. Otherwise refresh
    pub async fn get_valid_token(&self, integration: &Integration) -> Result<String, AppError> {
        let now = Utc::now();

        if let Some(cached) = self.token_cache.get(&integration.id) {
            if cached.is_fresh(now, Self::margin()) {
                return Ok(cached.access_token.clone());
            }
        }

        if integration.token_is_fresh(now, Self::margin()) {
            return Ok(integration.access_token.clone());
        }

        tracing::debug!(integration_id = %integration.id, "GunBroker token stale, refreshing");
        self.refresh_rejected(integration, &integration.access_token)
            .await
    }

    /// Force a new token for this integration.
    pub async fn refresh(&self, integration: &Integration) -> Result<String, AppError> {
        let current = self
            .token_cache
            .get(&integration.id)
            .map(|c| c.access_token.clone())
            .unwrap_or_else(|| integration.access_token.clone());
        self.refresh_rejected(integration, &current).await
    }

    /// Replace `rejected_token` with a new one.
    ///
    /// If another caller already replaced it, the newer token is returned
    /// without authenticating again. The refresh runs on its own task so it
    /// completes and persists even if this caller is dropped.
    pub async fn refresh_rejected(
        &self,
        integration: &Integration,
        rejected_token: &str,
    ) -> Result<String, AppError> {
        let manager = self.clone();
        let integration_id = integration.id;
        let rejected_token = rejected_token.to_string();
        let span = tracing::info_span!("token_refresh", %integration_id, mode = %integration.mode);

        tokio::spawn(
            async move { manager.run_refresh(integration_id, &rejected_token).await }
                .instrument(span),
        )
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Token refresh task failed: {}", e)))?
    }

    async fn run_refresh(
        &self,
        integration_id: Uuid,
        rejected_token: &str,
    ) -> Result<String, AppError> {
        // ─────────────────────────────────────────────────────────────
        // STEP 1: Acquire per-integration refresh lock
        // ─────────────────────────────────────────────────────────────
        let lock = self
            .refresh_locks
            .entry(integration_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let _guard = lock.lock().await;
        let now = Utc::now();

        // ─────────────────────────────────────────────────────────────
        // STEP 2: Re-check cache after acquiring lock
        // A different token was issued after the caller saw the rejected
        // one, so it only has to be unexpired, not outside the margin.
        // ─────────────────────────────────────────────────────────────
        if let Some(cached) = self.token_cache.get(&integration_id) {
            if cached.access_token != rejected_token && cached.is_unexpired(now) {
                tracing::debug!("Token already refreshed by a concurrent caller");
                return Ok(cached.access_token.clone());
            }
        }

        // ─────────────────────────────────────────────────────────────
        // STEP 3: Reload the record (another instance may have refreshed)
        // ─────────────────────────────────────────────────────────────
        let current = self.store.get_active(integration_id).await?.ok_or_else(|| {
            AppError::NotFound(format!("Integration {} is not active", integration_id))
        })?;

        if current.access_token != rejected_token
            && current.token_is_fresh(now, Duration::zero())
        {
            tracing::debug!("Stored token is newer than the rejected one, reusing it");
            self.cache_token(integration_id, &current.access_token, current.token_expires_at);
            return Ok(current.access_token);
        }

        // ─────────────────────────────────────────────────────────────
        // STEP 4: Decrypt the password and re-authenticate
        // ─────────────────────────────────────────────────────────────
        let endpoint = self.endpoint(current.mode)?;

        let password = self.vault.decrypt(&current.encrypted_password).await.map_err(|e| {
            tracing::error!(error = %e, "Stored GunBroker password could not be decrypted");
            match e {
                AppError::Credential(_) => e,
                other => AppError::Credential(other.to_string()),
            }
        })?;

        let response = self
            .client
            .authenticate(&endpoint, &current.username, &password)
            .await?;
        drop(password);

        // ─────────────────────────────────────────────────────────────
        // STEP 5: Persist only after a successful authenticate
        // ─────────────────────────────────────────────────────────────
        let now = Utc::now();
        let update = TokenUpdate {
            access_token: response.access_token.clone(),
            token_expires_at: Some(response.expires_at(now, self.config.default_token_lifetime_secs)),
            last_connected_at: now,
        };

        self.store.update_token(integration_id, &update).await?;
        self.cache_token(integration_id, &update.access_token, update.token_expires_at);

        tracing::info!("GunBroker token refreshed and stored");
        Ok(response.access_token)
    }

    /// Drop cached state for an integration that is no longer active.
    fn forget(&self, integration_id: Uuid) {
        self.token_cache.remove(&integration_id);
        self.refresh_locks.remove(&integration_id);
    }

    fn cache_token(&self, integration_id: Uuid, token: &str, expires_at: Option<DateTime<Utc>>) {
        self.token_cache.insert(
            integration_id,
            CachedToken {
                access_token: token.to_string(),
                expires_at,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModeSettings;
    use crate::db::MemoryStore;
    use crate::services::kms::KmsService;

    /// Both modes point at a closed local port.
    fn unreachable_config() -> MarketplaceConfig {
        let settings = ModeSettings {
            base_url: "http://127.0.0.1:1/v1".to_string(),
            dev_key: Some("sandbox-dev-key-0000".to_string()),
        };
        MarketplaceConfig {
            sandbox: settings.clone(),
            production: settings,
            default_token_lifetime_secs: 86400,
        }
    }

    #[tokio::test]
    async fn test_disconnect_drops_refresh_lock() {
        let store = MemoryStore::new();
        let vault = KmsService::new_mock();
        let manager = TokenManager::new(
            GunBrokerClient::new(),
            unreachable_config(),
            Arc::new(store.clone()),
            Arc::new(KmsService::new_mock()),
        );

        let now = Utc::now();
        let integration = Integration {
            id: Uuid::new_v4(),
            user_id: "u1".to_string(),
            username: "bob".to_string(),
            encrypted_password: vault.encrypt("pw").await.unwrap(),
            mode: Mode::Sandbox,
            access_token: "old".to_string(),
            token_expires_at: None,
            is_active: true,
            last_connected_at: now,
            created_at: now,
        };
        store.replace_active(&integration).await.unwrap();

        // The failed refresh still registers a lock for the integration.
        let err = manager.get_valid_token(&integration).await.unwrap_err();
        assert!(matches!(err, AppError::MarketplaceUnavailable(_)));
        assert!(manager.refresh_locks.contains_key(&integration.id));

        manager.disconnect("u1", integration.id).await.unwrap();

        assert!(!manager.refresh_locks.contains_key(&integration.id));
        assert!(!manager.token_cache.contains_key(&integration.id));
    }

    #[test]
    fn test_cached_token_unexpired_ignores_margin() {
        let now = Utc::now();
        let cached = CachedToken {
            access_token: "tok".to_string(),
            expires_at: Some(now + Duration::seconds(60)),
        };
        assert!(cached.is_unexpired(now));
        assert!(!cached.is_fresh(now, Duration::seconds(TOKEN_REFRESH_MARGIN_SECS)));

        let unknown = CachedToken {
            access_token: "tok".to_string(),
            expires_at: None,
        };
        assert!(!unknown.is_unexpired(now));
    }
}
