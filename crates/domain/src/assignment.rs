//! Assignment requests, target kinds and terminal outcomes.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tenantdesk_core::{AppError, AppResult, NonEmptyString};

/// Kind of membership or permission target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// Directory security group.
    SecurityGroup,
    /// Microsoft 365 (unified) group.
    M365Group,
    /// Mail-enabled security group.
    MailEnabledSecurityGroup,
    /// Exchange distribution list.
    DistributionList,
    /// Exchange shared mailbox.
    SharedMailbox,
}

/// External service an assignment is dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetService {
    /// Directory service (Graph).
    Directory,
    /// Mailbox service (Exchange).
    Mailbox,
}

impl TargetKind {
    /// Returns a stable transport value for this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SecurityGroup => "security_group",
            Self::M365Group => "m365_group",
            Self::MailEnabledSecurityGroup => "mail_enabled_security_group",
            Self::DistributionList => "distribution_list",
            Self::SharedMailbox => "shared_mailbox",
        }
    }

    /// Returns the service that owns targets of this kind.
    #[must_use]
    pub fn service(&self) -> TargetService {
        match self {
            Self::SecurityGroup | Self::M365Group | Self::MailEnabledSecurityGroup => {
                TargetService::Directory
            }
            Self::DistributionList | Self::SharedMailbox => TargetService::Mailbox,
        }
    }
}

impl FromStr for TargetKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "security_group" => Ok(Self::SecurityGroup),
            "m365_group" => Ok(Self::M365Group),
            "mail_enabled_security_group" => Ok(Self::MailEnabledSecurityGroup),
            "distribution_list" => Ok(Self::DistributionList),
            "shared_mailbox" => Ok(Self::SharedMailbox),
            _ => Err(AppError::Validation(format!(
                "unknown target kind '{value}'"
            ))),
        }
    }
}

/// One desired membership or permission grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRequest {
    target_name: NonEmptyString,
    target_kind: TargetKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source_label: Option<String>,
}

impl AssignmentRequest {
    /// Creates a typed assignment request.
    pub fn new(target_name: impl Into<String>, target_kind: TargetKind) -> AppResult<Self> {
        let target_name = target_name.into().trim().to_owned();

        Ok(Self {
            target_name: NonEmptyString::new(target_name)?,
            target_kind,
            source_label: None,
        })
    }

    /// Attaches the display label the request was derived from.
    #[must_use]
    pub fn with_source_label(mut self, label: impl Into<String>) -> Self {
        self.source_label = Some(label.into());
        self
    }

    /// Returns the target name used for directory lookups.
    #[must_use]
    pub fn target_name(&self) -> &str {
        self.target_name.as_str()
    }

    /// Returns the target kind.
    #[must_use]
    pub fn target_kind(&self) -> TargetKind {
        self.target_kind
    }

    /// Returns the originating display label, if any.
    #[must_use]
    pub fn source_label(&self) -> Option<&str> {
        self.source_label.as_deref()
    }
}

/// Status of one assignment outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    /// Membership or permission is in place.
    Succeeded,
    /// Service rejected the assignment with a non-transient error.
    FailedPermanent,
    /// First pass exhausted on transient errors; awaiting the second pass.
    DeferredForRetry,
    /// Both passes exhausted; an operator must finish the assignment.
    ManualTaskRequired,
    /// Operator cancelled the batch before the assignment finished.
    Cancelled,
}

impl AssignmentStatus {
    /// Returns a stable transport value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::FailedPermanent => "failed_permanent",
            Self::DeferredForRetry => "deferred_for_retry",
            Self::ManualTaskRequired => "manual_task_required",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Result of processing one assignment request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentOutcome {
    /// Target name of the originating request.
    pub target_name: String,
    /// Target kind of the originating request.
    pub target_kind: TargetKind,
    /// Outcome status.
    pub status: AssignmentStatus,
    /// Service message or reason for non-succeeded outcomes.
    pub detail: Option<String>,
    /// Attempts issued across all passes.
    pub attempts: u32,
}

impl AssignmentOutcome {
    /// Creates an outcome for a request.
    #[must_use]
    pub fn new(
        request: &AssignmentRequest,
        status: AssignmentStatus,
        detail: Option<String>,
        attempts: u32,
    ) -> Self {
        Self {
            target_name: request.target_name().to_owned(),
            target_kind: request.target_kind(),
            status,
            detail,
            attempts,
        }
    }

    /// Creates a cancelled outcome.
    #[must_use]
    pub fn cancelled(request: &AssignmentRequest, attempts: u32) -> Self {
        Self::new(
            request,
            AssignmentStatus::Cancelled,
            Some("cancelled by operator".to_owned()),
            attempts,
        )
    }

    /// Returns whether the outcome needs operator attention.
    #[must_use]
    pub fn needs_attention(&self) -> bool {
        self.status != AssignmentStatus::Succeeded
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{AssignmentRequest, TargetKind, TargetService};

    #[test]
    fn target_kind_round_trips_through_transport_value() {
        for kind in [
            TargetKind::SecurityGroup,
            TargetKind::M365Group,
            TargetKind::MailEnabledSecurityGroup,
            TargetKind::DistributionList,
            TargetKind::SharedMailbox,
        ] {
            assert_eq!(TargetKind::from_str(kind.as_str()).ok(), Some(kind));
        }
        assert!(TargetKind::from_str("mail_contact").is_err());
    }

    #[test]
    fn exchange_kinds_dispatch_to_mailbox_service() {
        assert_eq!(
            TargetKind::DistributionList.service(),
            TargetService::Mailbox
        );
        assert_eq!(TargetKind::SharedMailbox.service(), TargetService::Mailbox);
        assert_eq!(
            TargetKind::MailEnabledSecurityGroup.service(),
            TargetService::Directory
        );
    }

    #[test]
    fn request_trims_and_rejects_blank_target_names() {
        let request = AssignmentRequest::new("  Sales  ", TargetKind::DistributionList);
        assert_eq!(
            request.map(|value| value.target_name().to_owned()).ok(),
            Some("Sales".to_owned())
        );
        assert!(AssignmentRequest::new(" ", TargetKind::SecurityGroup).is_err());
    }

    #[test]
    fn request_deserializes_typed_assignment() {
        let request = serde_json::from_str::<AssignmentRequest>(
            r#"{"target_name":"Finance","target_kind":"shared_mailbox"}"#,
        );
        assert!(request.is_ok());
        let request = request.unwrap_or_else(|_| unreachable!());
        assert_eq!(request.target_kind(), TargetKind::SharedMailbox);
        assert!(request.source_label().is_none());
    }
}
