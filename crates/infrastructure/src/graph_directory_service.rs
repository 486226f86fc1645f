use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tenantdesk_application::DirectoryService;
use tenantdesk_core::{AppError, AppResult};
use tenantdesk_domain::DirectoryEntry;
use tracing::{debug, info};

use crate::client_credentials_token_provider::ClientCredentialsTokenProvider;
use crate::http_transport::{
    TransportRetry, default_scope, normalize_base_url, send_with_transport_retry,
};

const DUPLICATE_REFERENCE: &str = "added object references already exist";

#[derive(Debug, Deserialize)]
struct GroupPage {
    value: Vec<GraphGroup>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphGroup {
    id: String,
    display_name: Option<String>,
    mail: Option<String>,
}

impl GraphGroup {
    fn into_entry(self) -> Option<DirectoryEntry> {
        let display_name = self.display_name.filter(|name| !name.trim().is_empty())?;
        Some(DirectoryEntry::new(self.id, display_name, self.mail))
    }
}

/// Microsoft Graph implementation of the directory service port.
pub struct GraphDirectoryService {
    http_client: reqwest::Client,
    tokens: Arc<ClientCredentialsTokenProvider>,
    base_url: String,
    scope: String,
    retry: TransportRetry,
}

impl GraphDirectoryService {
    /// Creates a Graph adapter rooted at a versioned base URL.
    pub fn new(
        http_client: reqwest::Client,
        tokens: Arc<ClientCredentialsTokenProvider>,
        base_url: &str,
    ) -> AppResult<Self> {
        let base_url = normalize_base_url(base_url)?;
        let scope = default_scope(&base_url)?;

        Ok(Self {
            http_client,
            tokens,
            base_url,
            scope,
            retry: TransportRetry::default(),
        })
    }

    fn member_reference(&self, identity_id: &str) -> serde_json::Value {
        json!({
            "@odata.id": format!("{}/directoryObjects/{identity_id}", self.base_url)
        })
    }
}

#[async_trait]
impl DirectoryService for GraphDirectoryService {
    async fn list_groups(&self) -> AppResult<Vec<DirectoryEntry>> {
        let mut groups = Vec::new();
        let mut next_url = Some(format!(
            "{}/groups?$select=id,displayName,mail&$top=999",
            self.base_url
        ));

        while let Some(url) = next_url.take() {
            let token = self.tokens.access_token(&self.scope).await?;
            debug!(url = %url, "fetching group page");

            let response = send_with_transport_retry(self.retry, "list groups", || {
                self.http_client.get(&url).bearer_auth(&token)
            })
            .await?;
            let page: GroupPage = response.json().await.map_err(|error| {
                AppError::Upstream(format!("failed to parse group page: {error}"))
            })?;

            groups.extend(page.value.into_iter().filter_map(GraphGroup::into_entry));
            next_url = page.next_link;
        }

        Ok(groups)
    }

    async fn add_group_member(&self, group: &DirectoryEntry, identity_id: &str) -> AppResult<()> {
        let token = self.tokens.access_token(&self.scope).await?;
        let url = format!("{}/groups/{}/members/$ref", self.base_url, group.id);
        let body = self.member_reference(identity_id);

        let result = send_with_transport_retry(self.retry, "add group member", || {
            self.http_client.post(&url).bearer_auth(&token).json(&body)
        })
        .await;

        match result {
            Ok(_) => {
                info!(group_id = %group.id, identity_id, "group member added");
                Ok(())
            }
            Err(error) if is_duplicate_reference(error.detail()) => {
                debug!(group_id = %group.id, identity_id, "identity already in group");
                Ok(())
            }
            Err(error) => Err(error),
        }
    }
}

fn is_duplicate_reference(message: &str) -> bool {
    message.to_lowercase().contains(DUPLICATE_REFERENCE)
}
