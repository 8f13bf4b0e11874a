//! Integration record storage (Firestore, or in-memory for local runs and tests).

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

use crate::error::AppError;
use crate::models::{Integration, Mode};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Collection names as constants.
pub mod collections {
    pub const INTEGRATIONS: &str = "integrations";
}

/// Fields written by a successful authenticate. Always replaced together.
#[derive(Clone)]
pub struct TokenUpdate {
    pub access_token: String,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub last_connected_at: DateTime<Utc>,
}

/// Persistence for [`Integration`] records.
///
/// Inactive (soft-deleted) records are retained but never returned.
#[async_trait]
pub trait IntegrationStore: Send + Sync {
    /// Fetch an active integration by ID.
    async fn get_active(&self, id: Uuid) -> Result<Option<Integration>, AppError>;

    /// Fetch the active integration for a user and mode.
    async fn find_active(&self, user_id: &str, mode: Mode)
        -> Result<Option<Integration>, AppError>;

    /// All active integrations for a user.
    async fn list_active(&self, user_id: &str) -> Result<Vec<Integration>, AppError>;

    /// Deactivate every active integration for the new record's user and mode,
    /// then insert the new record.
    async fn replace_active(&self, integration: &Integration) -> Result<(), AppError>;

    /// Overwrite the token fields of an active integration.
    ///
    /// Returns [`AppError::NotFound`] if the integration is gone or inactive.
    async fn update_token(&self, id: Uuid, update: &TokenUpdate) -> Result<(), AppError>;

    /// Soft-delete an integration owned by `user_id`.
    ///
    /// Returns `false` if there was nothing active to deactivate.
    async fn deactivate(&self, user_id: &str, id: Uuid) -> Result<bool, AppError>;
}
