// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! GunBroker integration record: one per user and marketplace mode.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// GunBroker deployment mode. Selects base URL and developer key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Sandbox,
    Production,
}

impl Mode {
    pub fn is_sandbox(self) -> bool {
        self == Mode::Sandbox
    }

    pub fn from_sandbox_flag(is_sandbox: bool) -> Self {
        if is_sandbox {
            Mode::Sandbox
        } else {
            Mode::Production
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Sandbox => "sandbox",
            Mode::Production => "production",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sandbox" => Ok(Mode::Sandbox),
            "production" => Ok(Mode::Production),
            other => Err(format!("Unknown GunBroker mode: {}", other)),
        }
    }
}

/// Persists [`Mode`] as the `is_sandbox` boolean column.
mod sandbox_flag {
    use super::Mode;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(mode: &Mode, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bool(mode.is_sandbox())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Mode, D::Error> {
        bool::deserialize(deserializer).map(Mode::from_sandbox_flag)
    }
}

/// Stored integration record.
///
/// `encrypted_password` is KMS ciphertext. `access_token` is replaced whole
/// on every refresh, together with `last_connected_at`.
#[derive(Clone, Serialize, Deserialize)]
pub struct Integration {
    /// Also used as document ID
    pub id: Uuid,
    /// Opaque identity of the owning application user
    pub user_id: String,
    /// GunBroker username
    pub username: String,
    /// Encrypted GunBroker password (base64)
    pub encrypted_password: String,
    #[serde(rename = "is_sandbox", with = "sandbox_flag")]
    pub mode: Mode,
    /// Current GunBroker access token
    pub access_token: String,
    /// Imputed expiry. Advisory only: a 401 is authoritative.
    pub token_expires_at: Option<DateTime<Utc>>,
    /// Soft-delete flag
    pub is_active: bool,
    pub last_connected_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Integration {
    /// Whether the stored token can be used without re-authenticating.
    ///
    /// An unknown expiry counts as stale.
    pub fn token_is_fresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        match self.token_expires_at {
            Some(expires_at) => now + margin < expires_at,
            None => false,
        }
    }
}

impl fmt::Debug for Integration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Integration")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("encrypted_password", &"<redacted>")
            .field("mode", &self.mode)
            .field("access_token", &"<redacted>")
            .field("token_expires_at", &self.token_expires_at)
            .field("is_active", &self.is_active)
            .field("last_connected_at", &self.last_connected_at)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Client-safe view of an integration. Never carries credentials or tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationSummary {
    pub id: Uuid,
    pub username: String,
    pub mode: Mode,
    pub is_active: bool,
    pub has_token: bool,
    pub last_connected_at: DateTime<Utc>,
    pub token_expires_at: Option<DateTime<Utc>>,
}

impl From<&Integration> for IntegrationSummary {
    fn from(integration: &Integration) -> Self {
        Self {
            id: integration.id,
            username: integration.username.clone(),
            mode: integration.mode,
            is_active: integration.is_active,
            has_token: !integration.access_token.is_empty(),
            last_connected_at: integration.last_connected_at,
            token_expires_at: integration.token_expires_at,
        }
    }
}
