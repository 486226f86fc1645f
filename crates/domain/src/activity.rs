use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::assignment::TargetKind;

/// Operator-facing activity categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityCategory {
    /// Batch lifecycle and snapshot refreshes.
    Batch,
    /// Label classification at the input boundary.
    Classification,
    /// Wait for a new identity to reach the mailbox service.
    Propagation,
    /// Directory group membership.
    GroupMembership,
    /// Distribution list membership.
    DistributionList,
    /// Shared mailbox permissions.
    SharedMailbox,
}

impl ActivityCategory {
    /// Returns a stable storage value for this category.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Batch => "batch",
            Self::Classification => "classification",
            Self::Propagation => "propagation",
            Self::GroupMembership => "group_membership",
            Self::DistributionList => "distribution_list",
            Self::SharedMailbox => "shared_mailbox",
        }
    }

    /// Returns the category assignments of a kind are logged under.
    #[must_use]
    pub fn for_target(kind: TargetKind) -> Self {
        match kind {
            TargetKind::SecurityGroup
            | TargetKind::M365Group
            | TargetKind::MailEnabledSecurityGroup => Self::GroupMembership,
            TargetKind::DistributionList => Self::DistributionList,
            TargetKind::SharedMailbox => Self::SharedMailbox,
        }
    }
}

/// Status attached to an activity entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    /// Informational progress.
    Info,
    /// An attempt is about to be issued.
    Attempt,
    /// A transient failure will be retried.
    Retrying,
    /// Work completed.
    Succeeded,
    /// Assignment moved to the second pass.
    Deferred,
    /// Work failed permanently.
    Failed,
    /// Operator follow-up required.
    ManualTask,
    /// Input was skipped.
    Skipped,
    /// Operator cancelled the work.
    Cancelled,
}

impl ActivityStatus {
    /// Returns a stable storage value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Attempt => "attempt",
            Self::Retrying => "retrying",
            Self::Succeeded => "succeeded",
            Self::Deferred => "deferred",
            Self::Failed => "failed",
            Self::ManualTask => "manual_task",
            Self::Skipped => "skipped",
            Self::Cancelled => "cancelled",
        }
    }
}

/// One operator-visible activity record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    /// Activity category.
    pub category: ActivityCategory,
    /// Activity status.
    pub status: ActivityStatus,
    /// Human-readable detail.
    pub detail: String,
    /// When the activity happened.
    pub occurred_at: DateTime<Utc>,
}

impl ActivityEntry {
    /// Creates an entry stamped with the current time.
    #[must_use]
    pub fn new(category: ActivityCategory, status: ActivityStatus, detail: impl Into<String>) -> Self {
        Self {
            category,
            status,
            detail: detail.into(),
            occurred_at: Utc::now(),
        }
    }
}
