use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config;
use crate::error::{AppError, AppResult};
use crate::identity::AccessToken;

const API_VERSION: &str = "2020-12-01";

/// Addressable identity of one gateway subscription within the management
/// plane. Built once from configuration and immutable for the lifetime of
/// the coordinator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApimEndpoint {
    pub subscription_id: String,
    pub resource_group: String,
    pub service_name: String,
    pub apim_subscription_id: String,
}

impl ApimEndpoint {
    pub fn from_env() -> Self {
        Self {
            subscription_id: config::APIM_AZURE_SUBSCRIPTION_ID.clone(),
            resource_group: config::APIM_RESOURCE_GROUP.clone(),
            service_name: config::APIM_SERVICE_NAME.clone(),
            apim_subscription_id: config::APIM_SUBSCRIPTION_ID.clone(),
        }
    }

    /// Resource path under the management base URL.
    pub fn resource_path(&self) -> String {
        format!(
            "subscriptions/{}/resourceGroups/{}/providers/Microsoft.ApiManagement/service/{}/subscriptions/{}",
            self.subscription_id, self.resource_group, self.service_name, self.apim_subscription_id
        )
    }

    /// Stable key used to serialize rotation workflows per endpoint.
    pub fn lock_key(&self) -> String {
        self.resource_path()
    }
}

/// Wire form of the subscription's key pair as the management plane
/// reports it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSecrets {
    #[serde(default)]
    pub primary_key: String,
    #[serde(default)]
    pub secondary_key: String,
}

impl SubscriptionSecrets {
    /// Replacement payloads must carry both keys.
    pub fn validate_replacement(&self) -> AppResult<()> {
        if self.primary_key.is_empty() || self.secondary_key.is_empty() {
            return Err(AppError::Validation(
                "PrimaryKey and/or SecondaryKey must not be NULL".into(),
            ));
        }
        Ok(())
    }
}

/// Typed wrapper over the three key-management calls. Each operation is a
/// single outbound request with a bounded timeout; nothing is retried or
/// cached, and non-success responses keep their status and body for
/// diagnostics.
pub struct KeyManagementClient {
    client: Client,
    base_url: String,
}

impl KeyManagementClient {
    pub fn from_env() -> AppResult<Self> {
        Self::new(
            config::MANAGEMENT_BASE_URL.as_str(),
            Duration::from_secs(*config::MANAGEMENT_TIMEOUT_SECS),
        )
    }

    pub fn new(base_url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| AppError::Message(format!("failed to build management client: {err}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn action_url(&self, endpoint: &ApimEndpoint, action: &str) -> String {
        format!("{}/{}/{}", self.base_url, endpoint.resource_path(), action)
    }

    fn resource_url(&self, endpoint: &ApimEndpoint) -> String {
        format!("{}/{}", self.base_url, endpoint.resource_path())
    }

    pub async fn list_secrets(
        &self,
        endpoint: &ApimEndpoint,
        token: &AccessToken,
    ) -> AppResult<SubscriptionSecrets> {
        let response = self
            .client
            .post(self.action_url(endpoint, "listSecrets"))
            .query(&[("api-version", API_VERSION)])
            .bearer_auth(token.secret())
            .send()
            .await
            .map_err(|source| AppError::Transport {
                operation: "listSecrets",
                source,
            })?;
        let response = check("listSecrets", response).await?;
        response.json().await.map_err(|source| AppError::Transport {
            operation: "listSecrets",
            source,
        })
    }

    /// Server-side primary key rotation. The new value is observable only
    /// via a subsequent `list_secrets`.
    pub async fn regenerate_primary_key(
        &self,
        endpoint: &ApimEndpoint,
        token: &AccessToken,
    ) -> AppResult<()> {
        let response = self
            .client
            .post(self.action_url(endpoint, "regeneratePrimaryKey"))
            .query(&[("api-version", API_VERSION)])
            .bearer_auth(token.secret())
            .send()
            .await
            .map_err(|source| AppError::Transport {
                operation: "regeneratePrimaryKey",
                source,
            })?;
        check("regeneratePrimaryKey", response).await?;
        Ok(())
    }

    /// Replaces both keys in one call. The payload is validated before the
    /// request leaves the process.
    pub async fn set_secrets(
        &self,
        endpoint: &ApimEndpoint,
        token: &AccessToken,
        secrets: &SubscriptionSecrets,
    ) -> AppResult<()> {
        secrets.validate_replacement()?;
        let response = self
            .client
            .patch(self.resource_url(endpoint))
            .query(&[("api-version", API_VERSION)])
            .bearer_auth(token.secret())
            .json(&json!({ "properties": secrets }))
            .send()
            .await
            .map_err(|source| AppError::Transport {
                operation: "setSecrets",
                source,
            })?;
        check("setSecrets", response).await?;
        Ok(())
    }
}

async fn check(operation: &'static str, response: reqwest::Response) -> AppResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AppError::Remote {
        operation,
        status: status.as_u16(),
        body,
    })
}
