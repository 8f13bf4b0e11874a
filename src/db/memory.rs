// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory integration store for local development and tests.

use crate::db::{IntegrationStore, TokenUpdate};
use crate::error::AppError;
use crate::models::{Integration, Mode};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// DashMap-backed store. Cloning shares the underlying records.
#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<DashMap<Uuid, Integration>>,
    /// Serializes deactivate-then-insert so no reader sees two active rows.
    replace_lock: Arc<Mutex<()>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record for a user, including inactive ones.
    pub fn all_for_user(&self, user_id: &str) -> Vec<Integration> {
        self.records
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.value().clone())
            .collect()
    }
}

#[async_trait]
impl IntegrationStore for MemoryStore {
    async fn get_active(&self, id: Uuid) -> Result<Option<Integration>, AppError> {
        Ok(self
            .records
            .get(&id)
            .filter(|r| r.is_active)
            .map(|r| r.value().clone()))
    }

    async fn find_active(
        &self,
        user_id: &str,
        mode: Mode,
    ) -> Result<Option<Integration>, AppError> {
        Ok(self
            .records
            .iter()
            .find(|r| r.is_active && r.user_id == user_id && r.mode == mode)
            .map(|r| r.value().clone()))
    }

    async fn list_active(&self, user_id: &str) -> Result<Vec<Integration>, AppError> {
        let mut active: Vec<Integration> = self
            .records
            .iter()
            .filter(|r| r.is_active && r.user_id == user_id)
            .map(|r| r.value().clone())
            .collect();
        active.sort_by_key(|i| i.created_at);
        Ok(active)
    }

    async fn replace_active(&self, integration: &Integration) -> Result<(), AppError> {
        let _guard = self.replace_lock.lock().await;

        for mut record in self.records.iter_mut() {
            if record.is_active
                && record.user_id == integration.user_id
                && record.mode == integration.mode
            {
                record.is_active = false;
            }
        }

        self.records.insert(integration.id, integration.clone());
        Ok(())
    }

    async fn update_token(&self, id: Uuid, update: &TokenUpdate) -> Result<(), AppError> {
        let mut record = self
            .records
            .get_mut(&id)
            .filter(|r| r.is_active)
            .ok_or_else(|| AppError::NotFound(format!("Integration {}", id)))?;

        record.access_token = update.access_token.clone();
        record.token_expires_at = update.token_expires_at;
        record.last_connected_at = update.last_connected_at;
        Ok(())
    }

    async fn deactivate(&self, user_id: &str, id: Uuid) -> Result<bool, AppError> {
        match self.records.get_mut(&id) {
            Some(mut record) if record.is_active && record.user_id == user_id => {
                record.is_active = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn integration(user_id: &str, mode: Mode, token: &str) -> Integration {
        let now = Utc::now();
        Integration {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            username: "bob".to_string(),
            encrypted_password: "cGFzcw==".to_string(),
            mode,
            access_token: token.to_string(),
            token_expires_at: None,
            is_active: true,
            last_connected_at: now,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_replace_active_keeps_one_per_mode() {
        let store = MemoryStore::new();
        let first = integration("u1", Mode::Sandbox, "a");
        let prod = integration("u1", Mode::Production, "p");
        let second = integration("u1", Mode::Sandbox, "b");

        store.replace_active(&first).await.unwrap();
        store.replace_active(&prod).await.unwrap();
        store.replace_active(&second).await.unwrap();

        let active = store.find_active("u1", Mode::Sandbox).await.unwrap().unwrap();
        assert_eq!(active.id, second.id);
        assert!(store.get_active(first.id).await.unwrap().is_none());
        assert!(store.get_active(prod.id).await.unwrap().is_some());
        // Soft-deleted rows are retained.
        assert_eq!(store.all_for_user("u1").len(), 3);
    }

    #[tokio::test]
    async fn test_update_token_requires_active_record() {
        let store = MemoryStore::new();
        let record = integration("u1", Mode::Sandbox, "old");
        store.replace_active(&record).await.unwrap();
        assert!(store.deactivate("u1", record.id).await.unwrap());

        let update = TokenUpdate {
            access_token: "new".to_string(),
            token_expires_at: None,
            last_connected_at: Utc::now(),
        };
        let err = store.update_token(record.id, &update).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_deactivate_checks_owner() {
        let store = MemoryStore::new();
        let record = integration("u1", Mode::Sandbox, "t");
        store.replace_active(&record).await.unwrap();

        assert!(!store.deactivate("someone-else", record.id).await.unwrap());
        assert!(store.get_active(record.id).await.unwrap().is_some());
    }
}
