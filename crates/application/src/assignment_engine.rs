use std::sync::Arc;

use tenantdesk_core::AppError;
use tenantdesk_domain::{
    ActivityCategory, ActivityEntry, ActivityStatus, AssignmentOutcome, AssignmentRequest,
    AssignmentStatus, AttemptSlot, DirectoryEntry, Identity, RetryPass, RetryPolicy, TargetKind,
    TenantSnapshot, is_transient_not_found,
};
use tracing::{info, warn};

use crate::backoff::{RetryResult, retry_with_backoff};
use crate::provisioning_ports::{ActivityLog, DirectoryService, MailboxService};

mod dispatch;

/// Failure of one assignment attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
struct AttemptError {
    detail: String,
    transient: bool,
}

impl From<AppError> for AttemptError {
    fn from(error: AppError) -> Self {
        let detail = error.detail().to_owned();
        let transient = is_transient_not_found(detail.as_str());
        Self { detail, transient }
    }
}

/// Applies single assignment requests with replication-lag retries.
#[derive(Clone)]
pub struct AssignmentEngine {
    directory: Arc<dyn DirectoryService>,
    mailbox: Arc<dyn MailboxService>,
    activity_log: Arc<dyn ActivityLog>,
}

impl AssignmentEngine {
    /// Creates an engine over the directory and mailbox services.
    #[must_use]
    pub fn new(
        directory: Arc<dyn DirectoryService>,
        mailbox: Arc<dyn MailboxService>,
        activity_log: Arc<dyn ActivityLog>,
    ) -> Self {
        Self {
            directory,
            mailbox,
            activity_log,
        }
    }

    /// Processes one request for one pass.
    ///
    /// Exhausting the first pass yields [`AssignmentStatus::DeferredForRetry`];
    /// exhausting the second yields [`AssignmentStatus::ManualTaskRequired`].
    /// Attempts in the returned outcome count this pass only.
    pub async fn process(
        &self,
        identity: &Identity,
        snapshot: &TenantSnapshot,
        request: &AssignmentRequest,
        pass: RetryPass,
        policy: RetryPolicy,
    ) -> AssignmentOutcome {
        let category = ActivityCategory::for_target(request.target_kind());

        let Some(target) = resolve_target(snapshot, request) else {
            let detail = not_found_detail(request.target_kind());
            self.log(
                category,
                ActivityStatus::Failed,
                format!("'{}': {detail}", request.target_name()),
            );
            warn!(
                target_name = %request.target_name(),
                target_kind = request.target_kind().as_str(),
                "assignment target not found in tenant snapshot"
            );
            return AssignmentOutcome::new(
                request,
                AssignmentStatus::FailedPermanent,
                Some(detail.to_owned()),
                0,
            );
        };

        let result = retry_with_backoff(
            policy,
            |error: &AttemptError| error.transient,
            move |slot| self.attempt(identity, request, target, pass, policy, slot),
        )
        .await;

        let outcome = match result {
            RetryResult::Succeeded { value, attempts } => {
                AssignmentOutcome::new(request, AssignmentStatus::Succeeded, value, attempts)
            }
            RetryResult::Failed { error, attempts } => AssignmentOutcome::new(
                request,
                AssignmentStatus::FailedPermanent,
                Some(error.detail),
                attempts,
            ),
            RetryResult::Exhausted {
                last_error,
                attempts,
            } => {
                let status = match pass {
                    RetryPass::First => AssignmentStatus::DeferredForRetry,
                    RetryPass::Second => AssignmentStatus::ManualTaskRequired,
                };
                let detail = last_error.map_or_else(
                    || "retry budget exhausted".to_owned(),
                    |error| error.detail,
                );
                AssignmentOutcome::new(request, status, Some(detail), attempts)
            }
        };

        self.log_outcome(category, pass, &outcome);
        outcome
    }

    async fn attempt(
        &self,
        identity: &Identity,
        request: &AssignmentRequest,
        target: &DirectoryEntry,
        pass: RetryPass,
        policy: RetryPolicy,
        slot: AttemptSlot,
    ) -> Result<Option<String>, AttemptError> {
        let category = ActivityCategory::for_target(request.target_kind());
        self.log(
            category,
            ActivityStatus::Attempt,
            format!(
                "'{}' for {}: attempt {}/{} ({} pass)",
                request.target_name(),
                identity.user_principal_name(),
                slot.attempt_number,
                policy.max_attempts(),
                pass.as_str()
            ),
        );

        let result = match request.target_kind() {
            TargetKind::SecurityGroup
            | TargetKind::M365Group
            | TargetKind::MailEnabledSecurityGroup => self.add_to_group(identity, target).await,
            TargetKind::DistributionList => {
                self.add_to_distribution_list(identity, target).await
            }
            TargetKind::SharedMailbox => self.grant_shared_mailbox(identity, target).await,
        };

        if let Err(error) = &result
            && error.transient
            && slot.attempt_number < policy.max_attempts()
        {
            self.log(
                category,
                ActivityStatus::Retrying,
                format!(
                    "'{}': not yet visible ({}), retrying in {}s",
                    request.target_name(),
                    error.detail,
                    policy.delay().as_secs()
                ),
            );
        }

        result
    }

    fn log_outcome(&self, category: ActivityCategory, pass: RetryPass, outcome: &AssignmentOutcome) {
        let status = match outcome.status {
            AssignmentStatus::Succeeded => ActivityStatus::Succeeded,
            AssignmentStatus::FailedPermanent => ActivityStatus::Failed,
            AssignmentStatus::DeferredForRetry => ActivityStatus::Deferred,
            AssignmentStatus::ManualTaskRequired => ActivityStatus::ManualTask,
            AssignmentStatus::Cancelled => ActivityStatus::Cancelled,
        };
        let detail = outcome.detail.as_deref().unwrap_or("done");

        info!(
            target_name = %outcome.target_name,
            target_kind = outcome.target_kind.as_str(),
            status = outcome.status.as_str(),
            attempts = outcome.attempts,
            pass = pass.as_str(),
            "assignment pass finished"
        );
        self.log(
            category,
            status,
            format!(
                "'{}' {} after {} attempt(s) in {} pass: {detail}",
                outcome.target_name,
                outcome.status.as_str(),
                outcome.attempts,
                pass.as_str()
            ),
        );
    }

    fn log(&self, category: ActivityCategory, status: ActivityStatus, detail: String) {
        self.activity_log
            .record(ActivityEntry::new(category, status, detail));
    }
}

fn resolve_target<'a>(
    snapshot: &'a TenantSnapshot,
    request: &AssignmentRequest,
) -> Option<&'a DirectoryEntry> {
    match request.target_kind() {
        TargetKind::SecurityGroup | TargetKind::M365Group | TargetKind::MailEnabledSecurityGroup => {
            snapshot.resolve_group_by_name(request.target_name())
        }
        TargetKind::DistributionList => {
            snapshot.resolve_distribution_list_by_name(request.target_name())
        }
        TargetKind::SharedMailbox => snapshot.resolve_shared_mailbox_by_name(request.target_name()),
    }
}

fn not_found_detail(kind: TargetKind) -> &'static str {
    match kind {
        TargetKind::SecurityGroup | TargetKind::M365Group | TargetKind::MailEnabledSecurityGroup => {
            "group not found"
        }
        TargetKind::DistributionList => "distribution list not found",
        TargetKind::SharedMailbox => "shared mailbox not found",
    }
}

#[cfg(test)]
mod tests;
