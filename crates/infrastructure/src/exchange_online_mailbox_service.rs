//! Exchange Online admin API adapter for distribution lists and shared mailboxes.
//!
//! Every operation is a cmdlet invocation posted to the tenant's
//! `InvokeCommand` endpoint. Cmdlet failures come back as error responses
//! whose message carries the cmdlet's own text.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tenantdesk_application::{GrantOutcome, MailboxService};
use tenantdesk_core::{AppError, AppResult, TenantId};
use tenantdesk_domain::{DirectoryEntry, is_already_present};
use tracing::{debug, info};

use crate::client_credentials_token_provider::ClientCredentialsTokenProvider;
use crate::http_transport::{
    TransportRetry, default_scope, normalize_base_url, send_with_transport_retry,
};

const SYSTEM_ANCHOR_MAILBOX: &str = "SystemMailbox{bb558c35-97f1-4cb9-8ff7-d53741dc928c}";

#[derive(Debug, Deserialize)]
struct CommandPage {
    #[serde(default)]
    value: Vec<Value>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Recipient {
    guid: Option<String>,
    identity: Option<String>,
    display_name: Option<String>,
    primary_smtp_address: Option<String>,
    #[serde(rename = "WindowsLiveID")]
    windows_live_id: Option<String>,
}

impl Recipient {
    fn into_entry(self) -> Option<DirectoryEntry> {
        let display_name = self.display_name.filter(|name| !name.trim().is_empty())?;
        let id = self
            .guid
            .or(self.identity)
            .or_else(|| self.primary_smtp_address.clone())?;
        Some(DirectoryEntry::new(id, display_name, self.primary_smtp_address))
    }

    fn principal_names(self) -> impl Iterator<Item = String> {
        [self.windows_live_id, self.primary_smtp_address]
            .into_iter()
            .flatten()
            .filter(|name| !name.is_empty())
    }
}

/// Exchange Online implementation of the mailbox service port.
pub struct ExchangeOnlineMailboxService {
    http_client: reqwest::Client,
    tokens: Arc<ClientCredentialsTokenProvider>,
    command_url: String,
    scope: String,
    anchor_mailbox: Option<String>,
    retry: TransportRetry,
}

impl ExchangeOnlineMailboxService {
    /// Creates an adapter for one tenant.
    ///
    /// `organization` is the tenant's primary domain; when set, requests are
    /// routed with an anchor mailbox header.
    pub fn new(
        http_client: reqwest::Client,
        tokens: Arc<ClientCredentialsTokenProvider>,
        base_url: &str,
        tenant_id: TenantId,
        organization: Option<String>,
    ) -> AppResult<Self> {
        let base_url = normalize_base_url(base_url)?;
        let scope = default_scope(&base_url)?;

        Ok(Self {
            http_client,
            tokens,
            command_url: format!("{base_url}/adminapi/beta/{tenant_id}/InvokeCommand"),
            scope,
            anchor_mailbox: organization
                .filter(|organization| !organization.trim().is_empty())
                .map(|organization| format!("UPN:{SYSTEM_ANCHOR_MAILBOX}@{}", organization.trim())),
            retry: TransportRetry::default(),
        })
    }

    async fn invoke(&self, cmdlet: &str, parameters: Value) -> AppResult<Vec<Value>> {
        let body = command_body(cmdlet, parameters);
        let mut records = Vec::new();
        let mut next_url = Some(self.command_url.clone());

        while let Some(url) = next_url.take() {
            let token = self.tokens.access_token(&self.scope).await?;
            debug!(cmdlet, "invoking mailbox cmdlet");

            let response = send_with_transport_retry(self.retry, cmdlet, || {
                let request = self.http_client.post(&url).bearer_auth(&token).json(&body);
                match &self.anchor_mailbox {
                    Some(anchor) => request.header("X-AnchorMailbox", anchor),
                    None => request,
                }
            })
            .await?;

            let text = response.text().await.map_err(|error| {
                AppError::Upstream(format!("failed to read {cmdlet} response: {error}"))
            })?;
            if text.trim().is_empty() {
                break;
            }
            let page: CommandPage = serde_json::from_str(&text).map_err(|error| {
                AppError::Upstream(format!("failed to parse {cmdlet} response: {error}"))
            })?;

            records.extend(page.value);
            next_url = page.next_link;
        }

        Ok(records)
    }

    async fn list_recipients(&self, cmdlet: &str, parameters: Value) -> AppResult<Vec<DirectoryEntry>> {
        let records = self.invoke(cmdlet, parameters).await?;
        Ok(parse_recipients(records)
            .filter_map(Recipient::into_entry)
            .collect())
    }

    async fn grant(&self, cmdlet: &str, parameters: Value) -> AppResult<GrantOutcome> {
        match self.invoke(cmdlet, parameters).await {
            Ok(_) => Ok(GrantOutcome::Granted),
            Err(error) if is_already_present(error.detail()) => Ok(GrantOutcome::AlreadyExists),
            Err(error) => Err(error),
        }
    }
}

#[async_trait]
impl MailboxService for ExchangeOnlineMailboxService {
    async fn list_distribution_lists(&self) -> AppResult<Vec<DirectoryEntry>> {
        self.list_recipients(
            "Get-DistributionGroup",
            json!({ "ResultSize": "Unlimited" }),
        )
        .await
    }

    async fn list_distribution_list_members(&self, list: &DirectoryEntry) -> AppResult<Vec<String>> {
        let records = self
            .invoke(
                "Get-DistributionGroupMember",
                json!({ "Identity": list.id, "ResultSize": "Unlimited" }),
            )
            .await?;

        Ok(parse_recipients(records)
            .flat_map(Recipient::principal_names)
            .collect())
    }

    async fn add_distribution_list_member(
        &self,
        list: &DirectoryEntry,
        user_principal_name: &str,
    ) -> AppResult<()> {
        self.invoke(
            "Add-DistributionGroupMember",
            json!({
                "Identity": list.id,
                "Member": user_principal_name,
                "BypassSecurityGroupManagerCheck": true,
            }),
        )
        .await?;

        info!(list_id = %list.id, user_principal_name, "distribution list member added");
        Ok(())
    }

    async fn list_shared_mailboxes(&self) -> AppResult<Vec<DirectoryEntry>> {
        self.list_recipients(
            "Get-Mailbox",
            json!({
                "RecipientTypeDetails": "SharedMailbox",
                "ResultSize": "Unlimited",
            }),
        )
        .await
    }

    async fn grant_full_access(
        &self,
        mailbox: &DirectoryEntry,
        user_principal_name: &str,
    ) -> AppResult<GrantOutcome> {
        self.grant(
            "Add-MailboxPermission",
            json!({
                "Identity": mailbox.id,
                "User": user_principal_name,
                "AccessRights": ["FullAccess"],
                "InheritanceType": "All",
                "AutoMapping": true,
            }),
        )
        .await
    }

    async fn grant_send_as(
        &self,
        mailbox: &DirectoryEntry,
        user_principal_name: &str,
    ) -> AppResult<GrantOutcome> {
        self.grant(
            "Add-RecipientPermission",
            json!({
                "Identity": mailbox.id,
                "Trustee": user_principal_name,
                "AccessRights": ["SendAs"],
                "Confirm": false,
            }),
        )
        .await
    }
}

fn command_body(cmdlet: &str, parameters: Value) -> Value {
    json!({
        "CmdletInput": {
            "CmdletName": cmdlet,
            "Parameters": parameters,
        }
    })
}

fn parse_recipients(records: Vec<Value>) -> impl Iterator<Item = Recipient> {
    records
        .into_iter()
        .filter_map(|record| serde_json::from_value::<Recipient>(record).ok())
}
