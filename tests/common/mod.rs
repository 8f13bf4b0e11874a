// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::{
    extract::{Form, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tac_broker::config::{Config, MarketplaceConfig, ModeSettings};
use tac_broker::db::{FirestoreDb, IntegrationStore, MemoryStore};
use tac_broker::models::{Integration, Mode};
use tac_broker::routes::create_router;
use tac_broker::services::{CredentialVault, GunBrokerClient, KmsService, TokenManager};
use tac_broker::AppState;
use uuid::Uuid;

pub const SANDBOX_DEV_KEY: &str = "sandbox-dev-key-1234";
pub const PRODUCTION_DEV_KEY: &str = "production-dev-key-5678";

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Scripted reply from the mock GunBroker server.
#[derive(Clone)]
pub struct MockReply {
    pub status: u16,
    pub body: Value,
}

#[allow(dead_code)]
impl MockReply {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: json!({ "message": format!("mock status {}", status) }),
        }
    }
}

/// Observations and scripts shared with the mock server handlers.
#[derive(Default)]
pub struct MockState {
    pub auth_calls: AtomicUsize,
    pub data_calls: AtomicUsize,
    auth_script: Mutex<VecDeque<MockReply>>,
    data_script: Mutex<VecDeque<MockReply>>,
    auth_delay: Mutex<Duration>,
    pub auth_dev_keys: Mutex<Vec<String>>,
    pub auth_forms: Mutex<Vec<HashMap<String, String>>>,
    pub data_access_tokens: Mutex<Vec<String>>,
    pub data_dev_keys: Mutex<Vec<String>>,
    pub data_paths: Mutex<Vec<String>>,
}

/// Mock GunBroker API on an ephemeral local port.
///
/// Unscripted authenticate calls succeed with `tok-<n>` (n counts from 1);
/// unscripted data calls return an empty page.
pub struct MockGunBroker {
    pub base_url: String,
    pub state: Arc<MockState>,
}

#[allow(dead_code)]
impl MockGunBroker {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());

        let app = Router::new()
            .route("/v1/Users/AccessToken", post(mock_authenticate))
            .fallback(mock_data)
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}/v1", addr),
            state,
        }
    }

    pub fn push_auth(&self, reply: MockReply) {
        self.state.auth_script.lock().unwrap().push_back(reply);
    }

    pub fn push_data(&self, reply: MockReply) {
        self.state.data_script.lock().unwrap().push_back(reply);
    }

    pub fn set_auth_delay(&self, delay: Duration) {
        *self.state.auth_delay.lock().unwrap() = delay;
    }

    pub fn auth_calls(&self) -> usize {
        self.state.auth_calls.load(Ordering::SeqCst)
    }

    pub fn data_calls(&self) -> usize {
        self.state.data_calls.load(Ordering::SeqCst)
    }

    pub fn data_access_tokens(&self) -> Vec<String> {
        self.state.data_access_tokens.lock().unwrap().clone()
    }

    /// Both modes pointed at this server, with distinct dev keys.
    pub fn marketplace_config(&self) -> MarketplaceConfig {
        MarketplaceConfig {
            sandbox: ModeSettings {
                base_url: self.base_url.clone(),
                dev_key: Some(SANDBOX_DEV_KEY.to_string()),
            },
            production: ModeSettings {
                base_url: self.base_url.clone(),
                dev_key: Some(PRODUCTION_DEV_KEY.to_string()),
            },
            default_token_lifetime_secs: 86400,
        }
    }
}

async fn mock_authenticate(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> impl IntoResponse {
    let n = state.auth_calls.fetch_add(1, Ordering::SeqCst) + 1;
    state
        .auth_dev_keys
        .lock()
        .unwrap()
        .push(header_value(&headers, "X-DevKey"));
    state.auth_forms.lock().unwrap().push(form);

    let delay = *state.auth_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let reply = state
        .auth_script
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| MockReply::ok(json!({ "accessToken": format!("tok-{}", n) })));

    (StatusCode::from_u16(reply.status).unwrap(), Json(reply.body))
}

async fn mock_data(
    State(state): State<Arc<MockState>>,
    uri: axum::http::Uri,
    headers: HeaderMap,
) -> impl IntoResponse {
    state.data_calls.fetch_add(1, Ordering::SeqCst);
    state
        .data_access_tokens
        .lock()
        .unwrap()
        .push(header_value(&headers, "X-AccessToken"));
    state
        .data_dev_keys
        .lock()
        .unwrap()
        .push(header_value(&headers, "X-DevKey"));
    state.data_paths.lock().unwrap().push(uri.to_string());

    let reply = state
        .data_script
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| {
            MockReply::ok(json!({ "count": 0, "pageIndex": 1, "pageSize": 25, "results": [] }))
        });

    (StatusCode::from_u16(reply.status).unwrap(), Json(reply.body))
}

fn header_value(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Token manager wired to the mock server, an in-memory store and mock KMS.
#[allow(dead_code)]
pub fn token_manager(mock: &MockGunBroker) -> (TokenManager, MemoryStore) {
    let store = MemoryStore::new();
    let manager = TokenManager::new(
        GunBrokerClient::new(),
        mock.marketplace_config(),
        Arc::new(store.clone()),
        Arc::new(KmsService::new_mock()),
    );
    (manager, store)
}

/// Insert an active integration directly, bypassing connect.
#[allow(dead_code)]
pub async fn seed_integration(
    store: &MemoryStore,
    user_id: &str,
    mode: Mode,
    access_token: &str,
    token_expires_at: Option<DateTime<Utc>>,
) -> Integration {
    let now = Utc::now();
    let integration = Integration {
        id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        username: "bob".to_string(),
        encrypted_password: KmsService::new_mock().encrypt("pw").await.unwrap(),
        mode,
        access_token: access_token.to_string(),
        token_expires_at,
        is_active: true,
        last_connected_at: now - chrono::Duration::days(2),
        created_at: now - chrono::Duration::days(2),
    };
    store.replace_active(&integration).await.unwrap();
    integration
}

/// Create a test app backed by the mock server and an in-memory store.
#[allow(dead_code)]
pub fn create_test_app(mock: &MockGunBroker) -> (axum::Router, Arc<AppState>, MemoryStore) {
    let mut config = Config::test_default();
    config.marketplace = mock.marketplace_config();

    let store = MemoryStore::new();
    let state = Arc::new(AppState::new(
        config,
        Arc::new(store.clone()),
        Arc::new(KmsService::new_mock()),
    ));

    (create_router(state.clone()), state, store)
}

/// Session JWT for `user_id`.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: &str, signing_key: &[u8]) -> String {
    tac_broker::middleware::auth::create_jwt(user_id, signing_key).unwrap()
}
