//! Scripted port fakes shared by application tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use tenantdesk_core::{AppError, AppResult};
use tenantdesk_domain::{ActivityEntry, ActivityStatus, DirectoryEntry, Identity};
use tokio::sync::Mutex;

use crate::provisioning_ports::{ActivityLog, DirectoryService, GrantOutcome, MailboxService};

pub(crate) const REPLICATION_LAG: &str =
    "Couldn't find object \"jo@contoso.com\". Please make sure that it was spelled correctly.";

pub(crate) fn lag() -> AppError {
    AppError::Upstream(REPLICATION_LAG.to_owned())
}

pub(crate) fn identity() -> Identity {
    Identity::new("5f1c2b7e-0000-4000-8000-00000000a001", "jo@contoso.com", "Jo Bloggs")
        .unwrap_or_else(|_| unreachable!())
}

#[derive(Default)]
pub(crate) struct FakeDirectory {
    pub(crate) groups: Vec<DirectoryEntry>,
    pub(crate) list_error: Option<String>,
    scripts: Mutex<HashMap<String, VecDeque<AppResult<()>>>>,
    pub(crate) calls: Mutex<Vec<(String, String)>>,
}

impl FakeDirectory {
    pub(crate) fn with_groups(groups: Vec<DirectoryEntry>) -> Self {
        Self {
            groups,
            ..Self::default()
        }
    }

    pub(crate) fn script(mut self, group_id: &str, results: Vec<AppResult<()>>) -> Self {
        self.scripts
            .get_mut()
            .insert(group_id.to_owned(), results.into());
        self
    }

    pub(crate) async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

#[async_trait]
impl DirectoryService for FakeDirectory {
    async fn list_groups(&self) -> AppResult<Vec<DirectoryEntry>> {
        match &self.list_error {
            Some(message) => Err(AppError::Upstream(message.clone())),
            None => Ok(self.groups.clone()),
        }
    }

    async fn add_group_member(&self, group: &DirectoryEntry, identity_id: &str) -> AppResult<()> {
        self.calls
            .lock()
            .await
            .push((group.id.clone(), identity_id.to_owned()));
        self.scripts
            .lock()
            .await
            .get_mut(group.id.as_str())
            .and_then(VecDeque::pop_front)
            .unwrap_or(Ok(()))
    }
}

#[derive(Default)]
pub(crate) struct FakeMailbox {
    pub(crate) distribution_lists: Vec<DirectoryEntry>,
    pub(crate) shared_mailboxes: Vec<DirectoryEntry>,
    members: HashMap<String, Vec<String>>,
    add_scripts: Mutex<HashMap<String, VecDeque<AppResult<()>>>>,
    full_access_scripts: Mutex<HashMap<String, VecDeque<AppResult<GrantOutcome>>>>,
    send_as_scripts: Mutex<HashMap<String, VecDeque<AppResult<GrantOutcome>>>>,
    pub(crate) calls: Mutex<Vec<String>>,
}

impl FakeMailbox {
    pub(crate) fn with_distribution_lists(mut self, lists: Vec<DirectoryEntry>) -> Self {
        self.distribution_lists = lists;
        self
    }

    pub(crate) fn with_shared_mailboxes(mut self, mailboxes: Vec<DirectoryEntry>) -> Self {
        self.shared_mailboxes = mailboxes;
        self
    }

    pub(crate) fn with_members(mut self, list_id: &str, members: Vec<&str>) -> Self {
        self.members.insert(
            list_id.to_owned(),
            members.into_iter().map(ToOwned::to_owned).collect(),
        );
        self
    }

    pub(crate) fn script_add(mut self, list_id: &str, results: Vec<AppResult<()>>) -> Self {
        self.add_scripts
            .get_mut()
            .insert(list_id.to_owned(), results.into());
        self
    }

    pub(crate) fn script_full_access(
        mut self,
        mailbox_id: &str,
        results: Vec<AppResult<GrantOutcome>>,
    ) -> Self {
        self.full_access_scripts
            .get_mut()
            .insert(mailbox_id.to_owned(), results.into());
        self
    }

    pub(crate) fn script_send_as(
        mut self,
        mailbox_id: &str,
        results: Vec<AppResult<GrantOutcome>>,
    ) -> Self {
        self.send_as_scripts
            .get_mut()
            .insert(mailbox_id.to_owned(), results.into());
        self
    }

    pub(crate) async fn calls_matching(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl MailboxService for FakeMailbox {
    async fn list_distribution_lists(&self) -> AppResult<Vec<DirectoryEntry>> {
        Ok(self.distribution_lists.clone())
    }

    async fn list_distribution_list_members(&self, list: &DirectoryEntry) -> AppResult<Vec<String>> {
        self.calls.lock().await.push(format!("members:{}", list.id));
        Ok(self.members.get(list.id.as_str()).cloned().unwrap_or_default())
    }

    async fn add_distribution_list_member(
        &self,
        list: &DirectoryEntry,
        _user_principal_name: &str,
    ) -> AppResult<()> {
        self.calls.lock().await.push(format!("add:{}", list.id));
        self.add_scripts
            .lock()
            .await
            .get_mut(list.id.as_str())
            .and_then(VecDeque::pop_front)
            .unwrap_or(Ok(()))
    }

    async fn list_shared_mailboxes(&self) -> AppResult<Vec<DirectoryEntry>> {
        Ok(self.shared_mailboxes.clone())
    }

    async fn grant_full_access(
        &self,
        mailbox: &DirectoryEntry,
        _user_principal_name: &str,
    ) -> AppResult<GrantOutcome> {
        self.calls
            .lock()
            .await
            .push(format!("full_access:{}", mailbox.id));
        self.full_access_scripts
            .lock()
            .await
            .get_mut(mailbox.id.as_str())
            .and_then(VecDeque::pop_front)
            .unwrap_or(Ok(GrantOutcome::Granted))
    }

    async fn grant_send_as(
        &self,
        mailbox: &DirectoryEntry,
        _user_principal_name: &str,
    ) -> AppResult<GrantOutcome> {
        self.calls.lock().await.push(format!("send_as:{}", mailbox.id));
        self.send_as_scripts
            .lock()
            .await
            .get_mut(mailbox.id.as_str())
            .and_then(VecDeque::pop_front)
            .unwrap_or(Ok(GrantOutcome::Granted))
    }
}

#[derive(Default)]
pub(crate) struct RecordingActivityLog {
    entries: StdMutex<Vec<ActivityEntry>>,
}

impl RecordingActivityLog {
    pub(crate) fn entries(&self) -> Vec<ActivityEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub(crate) fn statuses(&self) -> Vec<ActivityStatus> {
        self.entries
            .lock()
            .map(|entries| entries.iter().map(|entry| entry.status).collect())
            .unwrap_or_default()
    }

    pub(crate) fn count(&self, status: ActivityStatus) -> usize {
        self.statuses()
            .into_iter()
            .filter(|recorded| *recorded == status)
            .count()
    }
}

impl ActivityLog for RecordingActivityLog {
    fn record(&self, entry: ActivityEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }
}
