//! Batch coordination over the assignment engine.
//!
//! A batch refreshes one [`TenantSnapshot`], sweeps every request once with
//! the first-pass policy, then sweeps only the deferred requests again with
//! the slower second-pass policy. Every submitted request ends with exactly
//! one terminal outcome; nothing is raised out of a batch.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tenantdesk_core::AppResult;
use tenantdesk_domain::{
    ActivityCategory, ActivityEntry, ActivityStatus, AssignmentOutcome, AssignmentRequest,
    AssignmentStatus, BatchId, BatchReport, Identity, LabelClassification, RetryPass, TargetKind,
    TargetService, TenantSnapshot, classify_label,
};
use tracing::{info, warn};

use crate::assignment_engine::AssignmentEngine;
use crate::cancellation::CancellationFlag;
use crate::provisioning_ports::{ActivityLog, DirectoryService, MailboxService};

mod config;

pub use config::{MAX_PROPAGATION_DELAY, ProvisioningPolicy};

/// Application service that applies assignment batches to a new identity.
#[derive(Clone)]
pub struct ProvisioningService {
    engine: AssignmentEngine,
    directory: Arc<dyn DirectoryService>,
    mailbox: Arc<dyn MailboxService>,
    activity_log: Arc<dyn ActivityLog>,
    policy: ProvisioningPolicy,
}

impl ProvisioningService {
    /// Creates a provisioning service with the default policy.
    #[must_use]
    pub fn new(
        directory: Arc<dyn DirectoryService>,
        mailbox: Arc<dyn MailboxService>,
        activity_log: Arc<dyn ActivityLog>,
    ) -> Self {
        Self {
            engine: AssignmentEngine::new(directory.clone(), mailbox.clone(), activity_log.clone()),
            directory,
            mailbox,
            activity_log,
            policy: ProvisioningPolicy::default(),
        }
    }

    /// Replaces the wait schedule.
    #[must_use]
    pub fn with_policy(mut self, policy: ProvisioningPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Lists the directory objects needed to resolve the given target kinds.
    pub async fn refresh_snapshot(&self, kinds: &[TargetKind]) -> AppResult<TenantSnapshot> {
        let needs = |predicate: fn(&TargetKind) -> bool| kinds.iter().any(predicate);

        let groups = if needs(|kind| kind.service() == TargetService::Directory) {
            self.directory.list_groups().await?
        } else {
            Vec::new()
        };
        let distribution_lists = if needs(|kind| *kind == TargetKind::DistributionList) {
            self.mailbox.list_distribution_lists().await?
        } else {
            Vec::new()
        };
        let shared_mailboxes = if needs(|kind| *kind == TargetKind::SharedMailbox) {
            self.mailbox.list_shared_mailboxes().await?
        } else {
            Vec::new()
        };

        info!(
            groups = groups.len(),
            distribution_lists = distribution_lists.len(),
            shared_mailboxes = shared_mailboxes.len(),
            "tenant snapshot refreshed"
        );

        Ok(TenantSnapshot::new(
            groups,
            distribution_lists,
            shared_mailboxes,
        ))
    }

    /// Classifies picker labels and provisions the resulting requests.
    ///
    /// Empty and separator labels are skipped and produce no outcome.
    pub async fn provision_labels<S: AsRef<str>>(
        &self,
        identity: &Identity,
        labels: &[S],
        cancellation: &CancellationFlag,
    ) -> BatchReport {
        let requests = self.classify_labels(labels);
        self.provision_requests(identity, requests, cancellation)
            .await
    }

    /// Refreshes the tenant snapshot and provisions typed requests.
    pub async fn provision_requests(
        &self,
        identity: &Identity,
        requests: Vec<AssignmentRequest>,
        cancellation: &CancellationFlag,
    ) -> BatchReport {
        let batch = self.begin_batch(identity, requests.len());
        let kinds: Vec<TargetKind> = requests
            .iter()
            .map(AssignmentRequest::target_kind)
            .collect();

        match self.refresh_snapshot(&kinds).await {
            Ok(snapshot) => {
                self.run_passes(batch, identity, &snapshot, requests, cancellation)
                    .await
            }
            Err(error) => {
                let detail = format!("tenant snapshot refresh failed: {}", error.detail());
                warn!(batch_id = %batch.id, error = %error, "tenant snapshot refresh failed");
                self.log(ActivityCategory::Batch, ActivityStatus::Failed, detail.clone());

                let outcomes = requests
                    .iter()
                    .map(|request| {
                        AssignmentOutcome::new(
                            request,
                            AssignmentStatus::FailedPermanent,
                            Some(detail.clone()),
                            0,
                        )
                    })
                    .collect();

                self.finish_batch(batch, identity, outcomes)
            }
        }
    }

    /// Provisions typed requests against an already refreshed snapshot.
    pub async fn provision_with_snapshot(
        &self,
        identity: &Identity,
        snapshot: &TenantSnapshot,
        requests: Vec<AssignmentRequest>,
        cancellation: &CancellationFlag,
    ) -> BatchReport {
        let batch = self.begin_batch(identity, requests.len());
        self.run_passes(batch, identity, snapshot, requests, cancellation)
            .await
    }

    async fn run_passes(
        &self,
        batch: BatchStart,
        identity: &Identity,
        snapshot: &TenantSnapshot,
        requests: Vec<AssignmentRequest>,
        cancellation: &CancellationFlag,
    ) -> BatchReport {
        let mut outcomes = Vec::with_capacity(requests.len());
        let mut deferred = Vec::new();
        let mut propagation_pending = true;

        for (index, request) in requests.iter().enumerate() {
            if cancellation.is_cancelled() {
                outcomes.push(self.cancel(request, 0));
                continue;
            }

            if propagation_pending && request.target_kind().service() == TargetService::Mailbox {
                self.wait_for_propagation(identity).await;
                propagation_pending = false;
            }

            let outcome = self
                .engine
                .process(
                    identity,
                    snapshot,
                    request,
                    RetryPass::First,
                    self.policy.for_pass(RetryPass::First),
                )
                .await;
            if outcome.status == AssignmentStatus::DeferredForRetry {
                deferred.push(index);
            }
            outcomes.push(outcome);
        }

        if !deferred.is_empty() {
            info!(
                batch_id = %batch.id,
                deferred = deferred.len(),
                "starting second pass over deferred assignments"
            );
            self.log(
                ActivityCategory::Batch,
                ActivityStatus::Info,
                format!("second pass over {} deferred assignment(s)", deferred.len()),
            );
        }

        for index in deferred {
            let (Some(request), Some(first_pass)) = (requests.get(index), outcomes.get(index))
            else {
                continue;
            };
            let prior_attempts = first_pass.attempts;

            let outcome = if cancellation.is_cancelled() {
                self.cancel(request, prior_attempts)
            } else {
                let mut outcome = self
                    .engine
                    .process(
                        identity,
                        snapshot,
                        request,
                        RetryPass::Second,
                        self.policy.for_pass(RetryPass::Second),
                    )
                    .await;
                outcome.attempts += prior_attempts;
                outcome
            };

            if let Some(slot) = outcomes.get_mut(index) {
                *slot = outcome;
            }
        }

        self.finish_batch(batch, identity, outcomes)
    }

    fn begin_batch(&self, identity: &Identity, requests: usize) -> BatchStart {
        let batch = BatchStart {
            id: BatchId::new(),
            started_at: Utc::now(),
        };
        info!(
            batch_id = %batch.id,
            user_principal_name = %identity.user_principal_name(),
            display_name = %identity.display_name(),
            requests,
            "provisioning batch started"
        );
        self.log(
            ActivityCategory::Batch,
            ActivityStatus::Info,
            format!(
                "batch {}: {requests} assignment(s) for {} ({})",
                batch.id,
                identity.display_name(),
                identity.user_principal_name()
            ),
        );
        batch
    }

    fn finish_batch(
        &self,
        batch: BatchStart,
        identity: &Identity,
        outcomes: Vec<AssignmentOutcome>,
    ) -> BatchReport {
        let report = BatchReport {
            batch_id: batch.id,
            user_principal_name: identity.user_principal_name().to_owned(),
            outcomes,
            started_at: batch.started_at,
            finished_at: Utc::now(),
        };
        self.log_summary(&report);
        report
    }

    fn classify_labels<S: AsRef<str>>(&self, labels: &[S]) -> Vec<AssignmentRequest> {
        labels
            .iter()
            .filter_map(|label| match classify_label(label.as_ref()) {
                Ok(LabelClassification::Assignment(request)) => Some(request),
                Ok(LabelClassification::Separator) => None,
                Err(error) => {
                    self.log(
                        ActivityCategory::Classification,
                        ActivityStatus::Skipped,
                        format!("skipped label '{}': {}", label.as_ref(), error.detail()),
                    );
                    None
                }
            })
            .collect()
    }

    async fn wait_for_propagation(&self, identity: &Identity) {
        let delay = self.policy.propagation_delay;
        if delay.is_zero() {
            return;
        }

        info!(
            user_principal_name = %identity.user_principal_name(),
            delay_seconds = delay.as_secs(),
            "waiting for identity to reach the mailbox service"
        );
        self.log(
            ActivityCategory::Propagation,
            ActivityStatus::Info,
            format!(
                "waiting {}s for {} to propagate",
                delay.as_secs(),
                identity.user_principal_name()
            ),
        );
        tokio::time::sleep(delay).await;
    }

    fn cancel(&self, request: &AssignmentRequest, attempts: u32) -> AssignmentOutcome {
        self.log(
            ActivityCategory::for_target(request.target_kind()),
            ActivityStatus::Cancelled,
            format!("'{}' cancelled by operator", request.target_name()),
        );
        AssignmentOutcome::cancelled(request, attempts)
    }

    fn log_summary(&self, report: &BatchReport) {
        let summary = report.summary();
        info!(
            batch_id = %report.batch_id,
            succeeded = summary.succeeded,
            failed_permanent = summary.failed_permanent,
            manual_task_required = summary.manual_task_required,
            cancelled = summary.cancelled,
            "provisioning batch finished"
        );
        self.log(
            ActivityCategory::Batch,
            ActivityStatus::Info,
            format!(
                "batch {} finished: {} succeeded, {} failed, {} manual task(s), {} cancelled",
                report.batch_id,
                summary.succeeded,
                summary.failed_permanent,
                summary.manual_task_required,
                summary.cancelled
            ),
        );
    }

    fn log(&self, category: ActivityCategory, status: ActivityStatus, detail: String) {
        self.activity_log
            .record(ActivityEntry::new(category, status, detail));
    }
}

/// Identity and start time shared by every report path of one batch.
#[derive(Debug, Clone, Copy)]
struct BatchStart {
    id: BatchId,
    started_at: DateTime<Utc>,
}
