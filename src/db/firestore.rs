// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed integration operations.

use crate::db::{collections, IntegrationStore, TokenUpdate};
use crate::error::AppError;
use crate::models::{Integration, Mode};
use async_trait::async_trait;
use firestore::errors::{BackoffError, FirestoreError};
use firestore::FirestoreResult;
use futures_util::FutureExt;
use uuid::Uuid;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    /// Fetch an integration by ID regardless of its active flag.
    async fn get_any(&self, id: Uuid) -> Result<Option<Integration>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::INTEGRATIONS)
            .obj()
            .one(&id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn query_active(
        &self,
        user_id: &str,
        mode: Option<Mode>,
    ) -> Result<Vec<Integration>, AppError> {
        active_integrations(self.get_client()?, user_id, mode)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

/// Active integrations for a user, optionally restricted to one mode.
///
/// Reads through `client`, so a transaction-bound client reads inside that
/// transaction.
async fn active_integrations(
    client: &firestore::FirestoreDb,
    user_id: &str,
    mode: Option<Mode>,
) -> FirestoreResult<Vec<Integration>> {
    let user_id = user_id.to_string();
    let query = client.fluent().select().from(collections::INTEGRATIONS);

    let query = match mode {
        Some(mode) => query.filter(move |q| {
            q.for_all([
                q.field("user_id").eq(user_id.clone()),
                q.field("is_sandbox").eq(mode.is_sandbox()),
                q.field("is_active").eq(true),
            ])
        }),
        None => query.filter(move |q| {
            q.for_all([
                q.field("user_id").eq(user_id.clone()),
                q.field("is_active").eq(true),
            ])
        }),
    };

    query.obj().query().await
}

#[async_trait]
impl IntegrationStore for FirestoreDb {
    async fn get_active(&self, id: Uuid) -> Result<Option<Integration>, AppError> {
        Ok(self.get_any(id).await?.filter(|i| i.is_active))
    }

    async fn find_active(
        &self,
        user_id: &str,
        mode: Mode,
    ) -> Result<Option<Integration>, AppError> {
        let mut active = self.query_active(user_id, Some(mode)).await?;
        active.sort_by_key(|i| std::cmp::Reverse(i.created_at));
        Ok(active.into_iter().next())
    }

    async fn list_active(&self, user_id: &str) -> Result<Vec<Integration>, AppError> {
        let mut active = self.query_active(user_id, None).await?;
        active.sort_by_key(|i| i.created_at);
        Ok(active)
    }

    /// Read the current active record(s), deactivate them and insert the new
    /// one in a single transaction. Concurrent replaces for the same user and
    /// mode conflict on commit and are retried, so at most one stays active.
    async fn replace_active(&self, integration: &Integration) -> Result<(), AppError> {
        let client = self.get_client()?;

        client
            .run_transaction(|db, transaction| {
                let integration = integration.clone();
                async move {
                    let existing =
                        active_integrations(&db, &integration.user_id, Some(integration.mode))
                            .await?;

                    for mut old in existing {
                        old.is_active = false;
                        db.fluent()
                            .update()
                            .fields(firestore::paths!(Integration::{is_active}))
                            .in_col(collections::INTEGRATIONS)
                            .document_id(old.id.to_string())
                            .object(&old)
                            .add_to_transaction(&mut *transaction)?;
                    }

                    db.fluent()
                        .update()
                        .in_col(collections::INTEGRATIONS)
                        .document_id(integration.id.to_string())
                        .object(&integration)
                        .add_to_transaction(&mut *transaction)?;

                    Ok::<(), BackoffError<FirestoreError>>(())
                }
                .boxed()
            })
            .await
            .map_err(|e| AppError::Database(format!("Replace transaction failed: {}", e)))?;

        tracing::debug!(
            integration_id = %integration.id,
            user_id = %integration.user_id,
            mode = %integration.mode,
            "Active integration replaced"
        );
        Ok(())
    }

    async fn update_token(&self, id: Uuid, update: &TokenUpdate) -> Result<(), AppError> {
        let mut record = self
            .get_active(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Integration {}", id)))?;

        record.access_token = update.access_token.clone();
        record.token_expires_at = update.token_expires_at;
        record.last_connected_at = update.last_connected_at;

        // Field mask keeps a concurrent disconnect's is_active = false intact.
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(firestore::paths!(Integration::{
                access_token,
                token_expires_at,
                last_connected_at
            }))
            .in_col(collections::INTEGRATIONS)
            .document_id(id.to_string())
            .object(&record)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn deactivate(&self, user_id: &str, id: Uuid) -> Result<bool, AppError> {
        let mut record = match self.get_any(id).await? {
            Some(r) if r.is_active && r.user_id == user_id => r,
            _ => return Ok(false),
        };
        record.is_active = false;

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(firestore::paths!(Integration::{is_active}))
            .in_col(collections::INTEGRATIONS)
            .document_id(id.to_string())
            .object(&record)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(true)
    }
}
