//! Application configuration loaded from environment variables.
//!
//! GunBroker developer keys and base URLs are resolved per mode through
//! [`MarketplaceConfig`], which is handed to the token manager at
//! construction instead of being looked up globally.

use crate::error::AppError;
use crate::models::Mode;
use std::env;
use std::fmt;

/// Public GunBroker API hosts.
pub const SANDBOX_BASE_URL: &str = "https://api.sandbox.gunbroker.com/v1";
pub const PRODUCTION_BASE_URL: &str = "https://api.gunbroker.com/v1";

/// GunBroker does not reliably report token lifetimes, so one is imputed.
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 24 * 60 * 60;

/// Margin before token expiration when we proactively refresh (5 minutes).
/// Recorded expiries are never earlier than this from the time of issue.
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Which [`IntegrationStore`](crate::db::IntegrationStore) backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    Memory,
}

/// Settings for one GunBroker deployment mode.
#[derive(Clone)]
pub struct ModeSettings {
    pub base_url: String,
    pub dev_key: Option<String>,
}

impl fmt::Debug for ModeSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModeSettings")
            .field("base_url", &self.base_url)
            .field("dev_key", &self.dev_key.as_deref().map(redact_preview))
            .finish()
    }
}

/// Base URL and developer key resolved for a mode.
#[derive(Clone)]
pub struct Endpoint {
    pub base_url: String,
    pub dev_key: String,
}

/// GunBroker settings for both modes.
#[derive(Debug, Clone)]
pub struct MarketplaceConfig {
    pub sandbox: ModeSettings,
    pub production: ModeSettings,
    /// Lifetime assumed when the auth response carries no `expiresIn`.
    pub default_token_lifetime_secs: i64,
}

impl MarketplaceConfig {
    /// Resolve the endpoint for a mode, failing if the deployment lacks it.
    pub fn resolve(&self, mode: Mode) -> Result<Endpoint, AppError> {
        let settings = match mode {
            Mode::Sandbox => &self.sandbox,
            Mode::Production => &self.production,
        };

        let base_url = settings.base_url.trim_end_matches('/');
        if base_url.is_empty() {
            return Err(AppError::Configuration(format!(
                "GunBroker base URL missing for {} mode",
                mode
            )));
        }

        let dev_key = settings
            .dev_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                AppError::Configuration(format!("GunBroker dev key missing for {} mode", mode))
            })?;

        Ok(Endpoint {
            base_url: base_url.to_string(),
            dev_key: dev_key.to_string(),
        })
    }

    fn from_env() -> Self {
        Self {
            sandbox: ModeSettings {
                base_url: env::var("GUNBROKER_SANDBOX_BASE_URL")
                    .unwrap_or_else(|_| SANDBOX_BASE_URL.to_string()),
                dev_key: env::var("GUNBROKER_SANDBOX_DEV_KEY")
                    .ok()
                    .map(|v| v.trim().to_string()),
            },
            production: ModeSettings {
                base_url: env::var("GUNBROKER_PRODUCTION_BASE_URL")
                    .unwrap_or_else(|_| PRODUCTION_BASE_URL.to_string()),
                dev_key: env::var("GUNBROKER_PRODUCTION_DEV_KEY")
                    .ok()
                    .map(|v| v.trim().to_string()),
            },
            default_token_lifetime_secs: env::var("GUNBROKER_TOKEN_LIFETIME_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// GCP project ID (Firestore + KMS)
    pub gcp_project_id: String,
    /// GCP region of the KMS key ring
    pub gcp_region: String,
    /// KMS key used for GunBroker passwords
    pub kms_key_name: String,
    /// Server port
    pub port: u16,
    /// Integration record backend
    pub store_backend: StoreBackend,

    // --- Secrets ---
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// GunBroker dev keys and base URLs
    pub marketplace: MarketplaceConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let store_backend = match env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "firestore".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "firestore" => StoreBackend::Firestore,
            "memory" => StoreBackend::Memory,
            other => return Err(ConfigError::Invalid("STORE_BACKEND", other.to_string())),
        };

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            gcp_region: env::var("GCP_REGION").unwrap_or_else(|_| "us-central1".to_string()),
            kms_key_name: env::var("KMS_KEY_NAME")
                .unwrap_or_else(|_| "gunbroker-credentials".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            store_backend,
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            marketplace: MarketplaceConfig::from_env(),
        })
    }

    /// Config for tests: in-memory store, dev keys for both modes.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            gcp_region: "us-central1".to_string(),
            kms_key_name: "test-key".to_string(),
            port: 8080,
            store_backend: StoreBackend::Memory,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            marketplace: MarketplaceConfig {
                sandbox: ModeSettings {
                    base_url: SANDBOX_BASE_URL.to_string(),
                    dev_key: Some("sandbox-dev-key-0000".to_string()),
                },
                production: ModeSettings {
                    base_url: PRODUCTION_BASE_URL.to_string(),
                    dev_key: Some("production-dev-key-0000".to_string()),
                },
                default_token_lifetime_secs: DEFAULT_TOKEN_LIFETIME_SECS,
            },
        }
    }
}

/// Short preview of a secret for diagnostics: first and last four characters.
///
/// Secrets of eight characters or fewer are fully masked.
pub fn redact_preview(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
