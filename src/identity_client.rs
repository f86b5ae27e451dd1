use crate::circuit_breaker::{create_provider_circuit_breaker, ProviderCircuitBreaker};
use crate::config::Config;
use crate::errors::{AccountProvisioningError, AppError, SessionLookupError};
use crate::models::{Account, AccountRow, Session};
use failsafe::futures::CircuitBreaker;
use reqwest::StatusCode;
use serde_json::json;
use std::future::Future;
use std::time::Duration;

/// Client for the hosted identity/data provider.
///
/// Talks to the provider's auth endpoint (`/auth/v1/user`) and its REST
/// interface over the `profiles` table. Every call goes through one shared
/// circuit breaker.
#[derive(Clone)]
pub struct IdentityClient {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    breaker: ProviderCircuitBreaker,
}

impl IdentityClient {
    /// Creates a new `IdentityClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The provider's project URL.
    /// * `anon_key` - The public API key sent as `apikey`.
    /// * `timeout` - Per-request timeout.
    pub fn new(base_url: String, anon_key: String, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create identity client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key,
            breaker: create_provider_circuit_breaker(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Self::new(
            config.provider_url.clone(),
            config.provider_anon_key.clone(),
            Duration::from_secs(config.provider_timeout_secs),
        )
    }

    /// Resolves the session behind an access token.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - The token is missing, expired or revoked.
    /// * `Ok(Some(session))` - The session is valid.
    /// * `Err(SessionLookupError)` - The provider could not answer.
    pub async fn get_session(&self, access_token: &str) -> Result<Option<Session>, SessionLookupError> {
        let url = format!("{}/auth/v1/user", self.base_url);
        tracing::debug!("Resolving session via {}", url);

        self.guarded(async {
            let response = self
                .client
                .get(&url)
                .header("apikey", &self.anon_key)
                .header("Authorization", format!("Bearer {}", access_token))
                .send()
                .await
                .map_err(|e| SessionLookupError::Provider(format!("session request failed: {}", e)))?;

            if matches!(
                response.status(),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
            ) {
                return Ok(None);
            }

            if !response.status().is_success() {
                let status = response.status();
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(SessionLookupError::Provider(format!(
                    "session lookup returned {}: {}",
                    status, error_text
                )));
            }

            let session: Session = response.json().await.map_err(|e| {
                SessionLookupError::Malformed(format!("Failed to parse session: {}", e))
            })?;

            Ok(Some(session))
        })
        .await
    }

    /// Fetches the account record for `account_id`.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - No row exists for this account.
    /// * `Ok(Some(account))` - The account record.
    pub async fn get_account(&self, account_id: &str) -> Result<Option<Account>, SessionLookupError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/rest/v1/profiles", self.base_url),
            &[
                ("id", format!("eq.{}", account_id).as_str()),
                ("select", "id,status,role,is_admin"),
            ],
        )
        .map_err(|e| SessionLookupError::Provider(format!("Failed to build URL: {}", e)))?;

        tracing::debug!("Fetching account {}", account_id);

        self.guarded(async {
            let response = self
                .client
                .get(url)
                .header("apikey", &self.anon_key)
                .header("Authorization", format!("Bearer {}", self.anon_key))
                .send()
                .await
                .map_err(|e| SessionLookupError::Provider(format!("account request failed: {}", e)))?;

            if !response.status().is_success() {
                let status = response.status();
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(SessionLookupError::Provider(format!(
                    "account lookup returned {}: {}",
                    status, error_text
                )));
            }

            let rows: Vec<AccountRow> = response.json().await.map_err(|e| {
                SessionLookupError::Malformed(format!("Failed to parse account rows: {}", e))
            })?;

            Ok(rows.into_iter().next().map(Account::from))
        })
        .await
    }

    /// Inserts the default record for `account`.
    ///
    /// A conflict (the row appeared meanwhile) counts as success.
    pub async fn insert_account(&self, account: &Account) -> Result<(), AccountProvisioningError> {
        let url = format!("{}/rest/v1/profiles", self.base_url);
        tracing::info!("Provisioning default account {}", account.id);

        let body = json!({
            "id": account.id,
            "status": String::from(account.status),
            "role": String::from(account.role),
            "is_admin": account.is_admin_flag,
        });

        let fail = |reason: String| AccountProvisioningError {
            account_id: account.id.clone(),
            reason,
        };

        let result = self
            .breaker
            .call(async {
                let response = self
                    .client
                    .post(&url)
                    .header("apikey", &self.anon_key)
                    .header("Authorization", format!("Bearer {}", self.anon_key))
                    .header("Prefer", "return=minimal")
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| format!("insert request failed: {}", e))?;

                let status = response.status();
                if status.is_success() || status == StatusCode::CONFLICT {
                    return Ok(());
                }

                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                Err(format!("insert returned {}: {}", status, error_text))
            })
            .await;

        match result {
            Ok(()) => {
                tracing::info!("✓ Account {} provisioned", account.id);
                Ok(())
            }
            Err(failsafe::Error::Rejected) => Err(fail("circuit open".to_string())),
            Err(failsafe::Error::Inner(reason)) => Err(fail(reason)),
        }
    }

    async fn guarded<T, F>(&self, call: F) -> Result<T, SessionLookupError>
    where
        F: Future<Output = Result<T, SessionLookupError>>,
    {
        match self.breaker.call(call).await {
            Ok(value) => Ok(value),
            Err(failsafe::Error::Rejected) => Err(SessionLookupError::CircuitOpen),
            Err(failsafe::Error::Inner(e)) => Err(e),
        }
    }
}
