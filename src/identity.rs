use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::config;
use crate::error::{AppError, AppResult};

/// Bearer credential scoped to a single workflow invocation. Callers must
/// not hold one past its expiry; nothing here is cached or refreshed.
#[derive(Clone)]
pub struct AccessToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn secret(&self) -> &str {
        &self.token
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Acquires service-identity tokens via the OAuth2 client-credentials
/// grant against a configured authority.
pub struct TokenProvider {
    client: Client,
    token_url: Url,
    client_id: String,
    client_secret: String,
}

impl TokenProvider {
    pub fn from_env() -> AppResult<Self> {
        Self::new(
            config::AZURE_AUTHORITY_INSTANCE.as_str(),
            config::AZURE_TENANT.as_str(),
            config::AZURE_CLIENT_ID.clone(),
            config::AZURE_CLIENT_SECRET.clone(),
        )
    }

    pub fn new(
        instance: &str,
        tenant: &str,
        client_id: String,
        client_secret: String,
    ) -> AppResult<Self> {
        let authority = format!(
            "{}/{}",
            instance.trim_end_matches('/'),
            tenant.trim_matches('/')
        );
        let token_url = Url::parse(&format!("{authority}/oauth2/v2.0/token"))
            .map_err(|err| AppError::Auth(format!("invalid authority {authority}: {err}")))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(*config::MANAGEMENT_TIMEOUT_SECS))
            .build()
            .map_err(|err| AppError::Auth(format!("failed to build identity client: {err}")))?;
        Ok(Self {
            client,
            token_url,
            client_id,
            client_secret,
        })
    }

    /// One token per call. Failures are terminal for the calling workflow;
    /// there is no retry here.
    pub async fn acquire(&self, scopes: &[&str]) -> AppResult<AccessToken> {
        let scope = scopes.join(" ");
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", scope.as_str()),
        ];
        let response = self
            .client
            .post(self.token_url.clone())
            .form(&params)
            .send()
            .await
            .map_err(|err| AppError::Auth(format!("authority unreachable: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Auth(format!("authority returned {status}: {body}")));
        }
        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|err| AppError::Auth(format!("undecodable token response: {err}")))?;
        let expires_at = Utc::now() + chrono::Duration::seconds(parsed.expires_in.unwrap_or(0).max(0));
        Ok(AccessToken {
            token: parsed.access_token,
            expires_at,
        })
    }
}
