use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tenantdesk_core::{AppError, AppResult, TenantId};
use tokio::sync::RwLock;
use tracing::debug;

use crate::http_transport::{TransportRetry, normalize_base_url, send_with_transport_retry};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_expired(&self, grace_period: Duration, now: DateTime<Utc>) -> bool {
        now + grace_period >= self.expires_at
    }
}

/// Application-only OAuth2 token source for one tenant.
///
/// Tokens are cached per scope and refreshed five minutes before expiry.
pub struct ClientCredentialsTokenProvider {
    http_client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    retry: TransportRetry,
    grace_period: Duration,
    cache: RwLock<HashMap<String, CachedToken>>,
}

impl ClientCredentialsTokenProvider {
    /// Creates a token provider for a tenant's v2 token endpoint.
    pub fn new(
        http_client: reqwest::Client,
        login_base_url: &str,
        tenant_id: TenantId,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> AppResult<Self> {
        let login_base_url = normalize_base_url(login_base_url)?;

        Ok(Self {
            http_client,
            token_url: format!("{login_base_url}/{tenant_id}/oauth2/v2.0/token"),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            retry: TransportRetry::default(),
            grace_period: Duration::minutes(5),
            cache: RwLock::new(HashMap::new()),
        })
    }

    /// Returns a bearer token for `scope`, acquiring a new one when needed.
    pub async fn access_token(&self, scope: &str) -> AppResult<String> {
        {
            let cache = self.cache.read().await;
            if let Some(token) = cache.get(scope)
                && !token.is_expired(self.grace_period, Utc::now())
            {
                return Ok(token.access_token.clone());
            }
        }

        debug!(scope, "acquiring access token");
        let token = self.acquire(scope).await?;
        let access_token = token.access_token.clone();
        self.cache.write().await.insert(scope.to_owned(), token);

        Ok(access_token)
    }

    async fn acquire(&self, scope: &str) -> AppResult<CachedToken> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", scope),
        ];

        let response = send_with_transport_retry(self.retry, "token request", || {
            self.http_client.post(&self.token_url).form(&params)
        })
        .await
        .map_err(|error| AppError::Unauthorized(format!("token request failed: {}", error.detail())))?;

        let token: TokenResponse = response.json().await.map_err(|error| {
            AppError::Unauthorized(format!("failed to parse token response: {error}"))
        })?;

        let expires_at = Utc::now() + Duration::seconds(token.expires_in);
        debug!(scope, expires_at = %expires_at, "acquired access token");

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at,
        })
    }
}
