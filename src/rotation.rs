use std::sync::Arc;

use axum::{extract::Extension, Json};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;

use crate::config;
use crate::error::AppResult;
use crate::extractor::FunctionKey;
use crate::identity::TokenProvider;
use crate::management::{ApimEndpoint, KeyManagementClient, SubscriptionSecrets};

/// Before/after audit record returned by both rotation workflows. Field
/// names keep the PascalCase wire form consumers already parse. Built
/// fresh per rotation and never persisted.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct KeyPair {
    pub original_key: String,
    pub new_key: String,
}

/// Runs the rotation workflows against one configured gateway
/// subscription. Workflows for the same endpoint are serialized behind a
/// per-endpoint mutex so the read-mutate-read sequence never interleaves
/// with another rotation.
pub struct RotationCoordinator {
    tokens: TokenProvider,
    management: KeyManagementClient,
    endpoint: ApimEndpoint,
    management_scope: String,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl RotationCoordinator {
    pub fn new(
        tokens: TokenProvider,
        management: KeyManagementClient,
        endpoint: ApimEndpoint,
        management_scope: String,
    ) -> Self {
        Self {
            tokens,
            management,
            endpoint,
            management_scope,
            locks: DashMap::new(),
        }
    }

    pub fn from_env() -> AppResult<Self> {
        Ok(Self::new(
            TokenProvider::from_env()?,
            KeyManagementClient::from_env()?,
            ApimEndpoint::from_env(),
            format!("{}/.default", config::MANAGEMENT_BASE_URL.trim_end_matches('/')),
        ))
    }

    fn lock_handle(&self) -> Arc<Mutex<()>> {
        self.locks
            .entry(self.endpoint.lock_key())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Workflow A: snapshot the current primary key, ask the management
    /// plane to regenerate it, snapshot again. The regenerate call must
    /// commit before the second read so `new_key` reflects the mutation.
    pub async fn regenerate_primary_key(&self) -> AppResult<KeyPair> {
        let lock = self.lock_handle();
        let _guard = lock.lock().await;

        let token = self.tokens.acquire(&[self.management_scope.as_str()]).await?;
        let before = self.management.list_secrets(&self.endpoint, &token).await?;
        info!(step = "listSecrets", "captured key before rotation");
        self.management
            .regenerate_primary_key(&self.endpoint, &token)
            .await?;
        info!(step = "regeneratePrimaryKey", "rotation committed");
        let after = self.management.list_secrets(&self.endpoint, &token).await?;
        Ok(KeyPair {
            original_key: before.primary_key,
            new_key: after.primary_key,
        })
    }

    /// Workflow B: snapshot, replace both keys with the caller's pair,
    /// snapshot again. The payload is validated before anything leaves the
    /// process, so a bad payload issues zero remote calls.
    pub async fn set_primary_key(&self, replacement: SubscriptionSecrets) -> AppResult<KeyPair> {
        replacement.validate_replacement()?;

        let lock = self.lock_handle();
        let _guard = lock.lock().await;

        let token = self.tokens.acquire(&[self.management_scope.as_str()]).await?;
        let before = self.management.list_secrets(&self.endpoint, &token).await?;
        info!(step = "listSecrets", "captured key before replacement");
        self.management
            .set_secrets(&self.endpoint, &token, &replacement)
            .await?;
        info!(step = "setSecrets", "replacement committed");
        let after = self.management.list_secrets(&self.endpoint, &token).await?;
        Ok(KeyPair {
            original_key: before.primary_key,
            new_key: after.primary_key,
        })
    }
}

pub async fn regenerate_keys(
    Extension(coordinator): Extension<Arc<RotationCoordinator>>,
    _guard: FunctionKey,
) -> AppResult<Json<KeyPair>> {
    Ok(Json(coordinator.regenerate_primary_key().await?))
}

pub async fn set_keys(
    Extension(coordinator): Extension<Arc<RotationCoordinator>>,
    _guard: FunctionKey,
    Json(payload): Json<SubscriptionSecrets>,
) -> AppResult<Json<KeyPair>> {
    Ok(Json(coordinator.set_primary_key(payload).await?))
}
