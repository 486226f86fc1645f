use tenantdesk_core::AppResult;
use tenantdesk_domain::{DirectoryEntry, Identity, is_already_present};

use super::{AssignmentEngine, AttemptError};
use crate::provisioning_ports::GrantOutcome;

const ALREADY_MEMBER: &str = "already a member";

impl AssignmentEngine {
    pub(super) async fn add_to_group(
        &self,
        identity: &Identity,
        group: &DirectoryEntry,
    ) -> Result<Option<String>, AttemptError> {
        self.directory
            .add_group_member(group, identity.id())
            .await
            .map(|()| None)
            .map_err(AttemptError::from)
    }

    pub(super) async fn add_to_distribution_list(
        &self,
        identity: &Identity,
        list: &DirectoryEntry,
    ) -> Result<Option<String>, AttemptError> {
        let principal = identity.user_principal_name();
        let members = self.mailbox.list_distribution_list_members(list).await?;
        if members
            .iter()
            .any(|member| member.eq_ignore_ascii_case(principal))
        {
            return Ok(Some(ALREADY_MEMBER.to_owned()));
        }

        match self.mailbox.add_distribution_list_member(list, principal).await {
            Ok(()) => Ok(None),
            Err(error) if is_already_present(error.detail()) => Ok(Some(ALREADY_MEMBER.to_owned())),
            Err(error) => Err(error.into()),
        }
    }

    /// Issues both grants every attempt; neither short-circuits the other.
    pub(super) async fn grant_shared_mailbox(
        &self,
        identity: &Identity,
        mailbox: &DirectoryEntry,
    ) -> Result<Option<String>, AttemptError> {
        let principal = identity.user_principal_name();
        let full_access = self.mailbox.grant_full_access(mailbox, principal).await;
        let send_as = self.mailbox.grant_send_as(mailbox, principal).await;

        combine_grants([("FullAccess", full_access), ("SendAs", send_as)])
    }
}

fn combine_grants(
    grants: [(&str, AppResult<GrantOutcome>); 2],
) -> Result<Option<String>, AttemptError> {
    let mut already_present = Vec::new();
    let mut failures: Vec<(&str, AttemptError)> = Vec::new();

    for (grant, result) in grants {
        match result {
            Ok(GrantOutcome::Granted) => {}
            Ok(GrantOutcome::AlreadyExists) => already_present.push(grant),
            Err(error) if is_already_present(error.detail()) => already_present.push(grant),
            Err(error) => failures.push((grant, AttemptError::from(error))),
        }
    }

    if failures.is_empty() {
        return Ok((!already_present.is_empty())
            .then(|| format!("{} already present", already_present.join(" and "))));
    }

    let transient = failures.iter().all(|(_, error)| error.transient);
    let detail = failures
        .iter()
        .map(|(grant, error)| format!("{grant}: {}", error.detail))
        .collect::<Vec<_>>()
        .join("; ");

    Err(AttemptError { detail, transient })
}
