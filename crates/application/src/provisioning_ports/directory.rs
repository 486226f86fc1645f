use async_trait::async_trait;
use tenantdesk_core::AppResult;
use tenantdesk_domain::DirectoryEntry;

/// Port for the directory service that owns identities and groups.
#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// Lists groups that membership assignments can target.
    async fn list_groups(&self) -> AppResult<Vec<DirectoryEntry>>;

    /// Adds the identity with the given object id to a group.
    ///
    /// Errors carry the service message verbatim so replication lag can be
    /// told apart from permanent failures.
    async fn add_group_member(&self, group: &DirectoryEntry, identity_id: &str) -> AppResult<()>;
}
