use async_trait::async_trait;
use tenantdesk_core::AppResult;
use tenantdesk_domain::DirectoryEntry;

/// Result of an idempotent mailbox permission grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantOutcome {
    /// Permission was added by this call.
    Granted,
    /// Permission was already present.
    AlreadyExists,
}

/// Port for the mailbox service that owns distribution lists and shared mailboxes.
#[async_trait]
pub trait MailboxService: Send + Sync {
    /// Lists distribution lists.
    async fn list_distribution_lists(&self) -> AppResult<Vec<DirectoryEntry>>;

    /// Lists member principal names of one distribution list.
    async fn list_distribution_list_members(&self, list: &DirectoryEntry) -> AppResult<Vec<String>>;

    /// Adds a principal to a distribution list.
    async fn add_distribution_list_member(
        &self,
        list: &DirectoryEntry,
        user_principal_name: &str,
    ) -> AppResult<()>;

    /// Lists shared mailboxes.
    async fn list_shared_mailboxes(&self) -> AppResult<Vec<DirectoryEntry>>;

    /// Grants full access on a shared mailbox.
    async fn grant_full_access(
        &self,
        mailbox: &DirectoryEntry,
        user_principal_name: &str,
    ) -> AppResult<GrantOutcome>;

    /// Grants send-as on a shared mailbox.
    async fn grant_send_as(
        &self,
        mailbox: &DirectoryEntry,
        user_principal_name: &str,
    ) -> AppResult<GrantOutcome>;
}
