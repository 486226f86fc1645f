//! Point-in-time view of tenant directory objects used for name resolution.

use serde::{Deserialize, Serialize};

/// Directory or mailbox object that assignments can target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Service-side identifier (Graph object id or Exchange identity).
    pub id: String,
    /// Display name matched against assignment target names.
    pub display_name: String,
    /// Primary SMTP address, when mail-enabled.
    pub mail: Option<String>,
}

impl DirectoryEntry {
    /// Creates a directory entry.
    #[must_use]
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, mail: Option<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            mail,
        }
    }
}

/// Groups, distribution lists and shared mailboxes listed once per batch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TenantSnapshot {
    groups: Vec<DirectoryEntry>,
    distribution_lists: Vec<DirectoryEntry>,
    shared_mailboxes: Vec<DirectoryEntry>,
}

impl TenantSnapshot {
    /// Creates a snapshot from listed directory objects.
    #[must_use]
    pub fn new(
        groups: Vec<DirectoryEntry>,
        distribution_lists: Vec<DirectoryEntry>,
        shared_mailboxes: Vec<DirectoryEntry>,
    ) -> Self {
        Self {
            groups,
            distribution_lists,
            shared_mailboxes,
        }
    }

    /// Returns listed directory groups.
    #[must_use]
    pub fn groups(&self) -> &[DirectoryEntry] {
        &self.groups
    }

    /// Returns listed distribution lists.
    #[must_use]
    pub fn distribution_lists(&self) -> &[DirectoryEntry] {
        &self.distribution_lists
    }

    /// Returns listed shared mailboxes.
    #[must_use]
    pub fn shared_mailboxes(&self) -> &[DirectoryEntry] {
        &self.shared_mailboxes
    }

    /// Resolves a directory group by name.
    #[must_use]
    pub fn resolve_group_by_name(&self, name: &str) -> Option<&DirectoryEntry> {
        match_by_name(&self.groups, name)
    }

    /// Resolves a distribution list by name.
    #[must_use]
    pub fn resolve_distribution_list_by_name(&self, name: &str) -> Option<&DirectoryEntry> {
        match_by_name(&self.distribution_lists, name)
    }

    /// Resolves a shared mailbox by name.
    #[must_use]
    pub fn resolve_shared_mailbox_by_name(&self, name: &str) -> Option<&DirectoryEntry> {
        match_by_name(&self.shared_mailboxes, name)
    }
}

/// Three-tier name match: exact, then case-insensitive, then substring.
///
/// The first entry in listing order wins within a tier.
#[must_use]
pub fn match_by_name<'a>(entries: &'a [DirectoryEntry], name: &str) -> Option<&'a DirectoryEntry> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    if let Some(entry) = entries.iter().find(|entry| entry.display_name == name) {
        return Some(entry);
    }

    let lowered = name.to_lowercase();
    if let Some(entry) = entries
        .iter()
        .find(|entry| entry.display_name.to_lowercase() == lowered)
    {
        return Some(entry);
    }

    entries
        .iter()
        .find(|entry| entry.display_name.to_lowercase().contains(lowered.as_str()))
}

#[cfg(test)]
mod tests {
    use super::{DirectoryEntry, TenantSnapshot, match_by_name};

    fn entries() -> Vec<DirectoryEntry> {
        vec![
            DirectoryEntry::new("g-1", "Sales Leadership", None),
            DirectoryEntry::new("g-2", "SALES", None),
            DirectoryEntry::new("g-3", "Sales", Some("sales@contoso.com".to_owned())),
            DirectoryEntry::new("g-4", "Marketing", None),
        ]
    }

    #[test]
    fn exact_match_beats_earlier_case_insensitive_match() {
        let entries = entries();
        assert_eq!(
            match_by_name(&entries, "Sales").map(|entry| entry.id.as_str()),
            Some("g-3")
        );
    }

    #[test]
    fn case_insensitive_match_beats_substring_match() {
        let entries = entries();
        assert_eq!(
            match_by_name(&entries, "sales").map(|entry| entry.id.as_str()),
            Some("g-2")
        );
    }

    #[test]
    fn substring_match_is_the_last_resort() {
        let entries = entries();
        assert_eq!(
            match_by_name(&entries, "leader").map(|entry| entry.id.as_str()),
            Some("g-1")
        );
        assert!(match_by_name(&entries, "Finance").is_none());
        assert!(match_by_name(&entries, "  ").is_none());
    }

    #[test]
    fn snapshot_resolves_each_collection_independently() {
        let snapshot = TenantSnapshot::new(
            entries(),
            vec![DirectoryEntry::new("dl-1", "All Staff", None)],
            vec![DirectoryEntry::new("mbx-1", "Finance Inbox", None)],
        );

        assert!(snapshot.resolve_group_by_name("All Staff").is_none());
        assert!(snapshot.resolve_distribution_list_by_name("all staff").is_some());
        assert!(snapshot.resolve_shared_mailbox_by_name("Finance").is_some());
    }
}
