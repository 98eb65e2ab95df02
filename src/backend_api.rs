use std::time::Duration;

use reqwest::Client;

use crate::config;
use crate::error::{AppError, AppResult};

const SUBSCRIPTION_KEY_HEADER: &str = "SUBSCRIPTION-KEY";

/// Server-side caller for the protected backend. Keeps the subscription
/// key out of anything browser-visible; the SPA talks to this endpoint
/// instead.
pub struct BackendApiClient {
    client: Client,
    uri: String,
    subscription_key: String,
}

impl BackendApiClient {
    pub fn from_env() -> Option<Self> {
        let uri = config::BACKEND_API_URI.clone()?;
        Some(Self::new(uri, config::BACKEND_SUBSCRIPTION_KEY.clone()))
    }

    pub fn new(uri: impl Into<String>, subscription_key: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("client build"),
            uri: uri.into(),
            subscription_key: subscription_key.into(),
        }
    }

    /// One GET with the configured key attached; the body is relayed
    /// verbatim.
    pub async fn call(&self) -> AppResult<String> {
        let response = self
            .client
            .get(&self.uri)
            .header(SUBSCRIPTION_KEY_HEADER, &self.subscription_key)
            .send()
            .await
            .map_err(|source| AppError::Transport {
                operation: "backend call",
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Remote {
                operation: "backend call",
                status: status.as_u16(),
                body,
            });
        }
        response.text().await.map_err(|source| AppError::Transport {
            operation: "backend call",
            source,
        })
    }
}

pub async fn call_backend() -> AppResult<String> {
    let Some(client) = BackendApiClient::from_env() else {
        return Err(AppError::Message("Backend API not configured".into()));
    };
    client.call().await
}
