use std::sync::Arc;
use std::time::Duration;

use tenantdesk_core::AppError;
use tenantdesk_domain::{
    ActivityStatus, AssignmentRequest, AssignmentStatus, DirectoryEntry, RetryPass, RetryPolicy,
    TargetKind, TenantSnapshot,
};
use tokio::time::Instant;

use super::AssignmentEngine;
use crate::provisioning_ports::GrantOutcome;
use crate::test_support::{FakeDirectory, FakeMailbox, RecordingActivityLog, identity, lag};

fn snapshot() -> TenantSnapshot {
    TenantSnapshot::new(
        vec![
            DirectoryEntry::new("grp-vpn", "VPN Users", None),
            DirectoryEntry::new("grp-orion", "Project Orion", Some("orion@contoso.com".to_owned())),
        ],
        vec![DirectoryEntry::new(
            "dl-sales",
            "Sales",
            Some("sales@contoso.com".to_owned()),
        )],
        vec![DirectoryEntry::new(
            "mbx-finance",
            "Finance Inbox",
            Some("finance@contoso.com".to_owned()),
        )],
    )
}

fn request(name: &str, kind: TargetKind) -> AssignmentRequest {
    AssignmentRequest::new(name, kind).unwrap_or_else(|_| unreachable!())
}

fn engine(
    directory: Arc<FakeDirectory>,
    mailbox: Arc<FakeMailbox>,
    activity_log: Arc<RecordingActivityLog>,
) -> AssignmentEngine {
    AssignmentEngine::new(directory, mailbox, activity_log)
}

#[tokio::test(start_paused = true)]
async fn group_membership_uses_identity_object_id() {
    let directory = Arc::new(FakeDirectory::with_groups(snapshot().groups().to_vec()));
    let log = Arc::new(RecordingActivityLog::default());
    let engine = engine(directory.clone(), Arc::new(FakeMailbox::default()), log.clone());

    let outcome = engine
        .process(
            &identity(),
            &snapshot(),
            &request("vpn users", TargetKind::SecurityGroup),
            RetryPass::First,
            RetryPolicy::first_pass(),
        )
        .await;

    assert_eq!(outcome.status, AssignmentStatus::Succeeded);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(
        *directory.calls.lock().await,
        vec![(
            "grp-vpn".to_owned(),
            "5f1c2b7e-0000-4000-8000-00000000a001".to_owned()
        )]
    );
    assert_eq!(log.count(ActivityStatus::Succeeded), 1);
}

#[tokio::test(start_paused = true)]
async fn unresolved_group_fails_without_calling_the_service() {
    let directory = Arc::new(FakeDirectory::default());
    let engine = engine(
        directory.clone(),
        Arc::new(FakeMailbox::default()),
        Arc::new(RecordingActivityLog::default()),
    );

    let outcome = engine
        .process(
            &identity(),
            &snapshot(),
            &request("Contractors", TargetKind::M365Group),
            RetryPass::First,
            RetryPolicy::first_pass(),
        )
        .await;

    assert_eq!(outcome.status, AssignmentStatus::FailedPermanent);
    assert_eq!(outcome.detail.as_deref(), Some("group not found"));
    assert_eq!(outcome.attempts, 0);
    assert_eq!(directory.call_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn success_on_second_attempt_of_first_pass_is_terminal() {
    let directory =
        Arc::new(FakeDirectory::default().script("grp-vpn", vec![Err(lag()), Ok(())]));
    let log = Arc::new(RecordingActivityLog::default());
    let engine = engine(directory.clone(), Arc::new(FakeMailbox::default()), log.clone());
    let started = Instant::now();

    let outcome = engine
        .process(
            &identity(),
            &snapshot(),
            &request("VPN Users", TargetKind::SecurityGroup),
            RetryPass::First,
            RetryPolicy::first_pass(),
        )
        .await;

    assert_eq!(outcome.status, AssignmentStatus::Succeeded);
    assert_eq!(outcome.attempts, 2);
    assert_eq!(started.elapsed(), Duration::from_secs(30));
    assert_eq!(log.count(ActivityStatus::Retrying), 1);
}

#[tokio::test(start_paused = true)]
async fn non_transient_error_fails_immediately() {
    let directory = Arc::new(FakeDirectory::default().script(
        "grp-vpn",
        vec![Err(AppError::Upstream(
            "Insufficient privileges to complete the operation.".to_owned(),
        ))],
    ));
    let engine = engine(
        directory.clone(),
        Arc::new(FakeMailbox::default()),
        Arc::new(RecordingActivityLog::default()),
    );
    let started = Instant::now();

    let outcome = engine
        .process(
            &identity(),
            &snapshot(),
            &request("VPN Users", TargetKind::SecurityGroup),
            RetryPass::First,
            RetryPolicy::first_pass(),
        )
        .await;

    assert_eq!(outcome.status, AssignmentStatus::FailedPermanent);
    assert_eq!(
        outcome.detail.as_deref(),
        Some("Insufficient privileges to complete the operation.")
    );
    assert_eq!(outcome.attempts, 1);
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(directory.call_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn exhausted_first_pass_defers_and_second_pass_requires_manual_task() {
    let directory = Arc::new(
        FakeDirectory::default().script("grp-vpn", (0..5).map(|_| Err(lag())).collect()),
    );
    let log = Arc::new(RecordingActivityLog::default());
    let engine = engine(directory.clone(), Arc::new(FakeMailbox::default()), log.clone());
    let request = request("VPN Users", TargetKind::SecurityGroup);

    let first = engine
        .process(
            &identity(),
            &snapshot(),
            &request,
            RetryPass::First,
            RetryPolicy::first_pass(),
        )
        .await;
    assert_eq!(first.status, AssignmentStatus::DeferredForRetry);
    assert_eq!(first.attempts, 3);

    let second = engine
        .process(
            &identity(),
            &snapshot(),
            &request,
            RetryPass::Second,
            RetryPolicy::second_pass(),
        )
        .await;
    assert_eq!(second.status, AssignmentStatus::ManualTaskRequired);
    assert_eq!(second.attempts, 2);
    assert!(
        second
            .detail
            .as_deref()
            .is_some_and(|detail| detail.contains("Couldn't find object"))
    );
    assert_eq!(log.count(ActivityStatus::Deferred), 1);
    assert_eq!(log.count(ActivityStatus::ManualTask), 1);
}

#[tokio::test(start_paused = true)]
async fn existing_distribution_list_member_is_not_re_added() {
    let mailbox = Arc::new(
        FakeMailbox::default()
            .with_distribution_lists(snapshot().distribution_lists().to_vec())
            .with_members("dl-sales", vec!["JO@contoso.com"]),
    );
    let engine = engine(
        Arc::new(FakeDirectory::default()),
        mailbox.clone(),
        Arc::new(RecordingActivityLog::default()),
    );

    let outcome = engine
        .process(
            &identity(),
            &snapshot(),
            &request("Sales", TargetKind::DistributionList),
            RetryPass::First,
            RetryPolicy::first_pass(),
        )
        .await;

    assert_eq!(outcome.status, AssignmentStatus::Succeeded);
    assert_eq!(outcome.detail.as_deref(), Some("already a member"));
    assert_eq!(mailbox.calls_matching("add:").await, 0);
}

#[tokio::test(start_paused = true)]
async fn already_member_add_error_is_folded_into_success() {
    let mailbox = Arc::new(FakeMailbox::default().script_add(
        "dl-sales",
        vec![Err(AppError::Upstream(
            "The recipient \"jo@contoso.com\" is already a member of the group \"Sales\".".to_owned(),
        ))],
    ));
    let engine = engine(
        Arc::new(FakeDirectory::default()),
        mailbox,
        Arc::new(RecordingActivityLog::default()),
    );

    let outcome = engine
        .process(
            &identity(),
            &snapshot(),
            &request("Sales", TargetKind::DistributionList),
            RetryPass::First,
            RetryPolicy::first_pass(),
        )
        .await;

    assert_eq!(outcome.status, AssignmentStatus::Succeeded);
}

#[tokio::test(start_paused = true)]
async fn shared_mailbox_already_existing_full_access_still_succeeds() {
    let mailbox = Arc::new(
        FakeMailbox::default()
            .script_full_access("mbx-finance", vec![Ok(GrantOutcome::AlreadyExists)])
            .script_send_as("mbx-finance", vec![Ok(GrantOutcome::Granted)]),
    );
    let engine = engine(
        Arc::new(FakeDirectory::default()),
        mailbox.clone(),
        Arc::new(RecordingActivityLog::default()),
    );

    let outcome = engine
        .process(
            &identity(),
            &snapshot(),
            &request("Finance Inbox", TargetKind::SharedMailbox),
            RetryPass::First,
            RetryPolicy::first_pass(),
        )
        .await;

    assert_eq!(outcome.status, AssignmentStatus::Succeeded);
    assert_eq!(mailbox.calls_matching("send_as:").await, 1);
}

#[tokio::test(start_paused = true)]
async fn shared_mailbox_full_access_failure_does_not_skip_send_as() {
    let mailbox = Arc::new(FakeMailbox::default().script_full_access(
        "mbx-finance",
        vec![Err(AppError::Upstream("access denied".to_owned()))],
    ));
    let engine = engine(
        Arc::new(FakeDirectory::default()),
        mailbox.clone(),
        Arc::new(RecordingActivityLog::default()),
    );
    let started = Instant::now();

    let outcome = engine
        .process(
            &identity(),
            &snapshot(),
            &request("Finance Inbox", TargetKind::SharedMailbox),
            RetryPass::First,
            RetryPolicy::first_pass(),
        )
        .await;

    assert_eq!(outcome.status, AssignmentStatus::FailedPermanent);
    assert_eq!(outcome.detail.as_deref(), Some("FullAccess: access denied"));
    assert_eq!(mailbox.calls_matching("full_access:").await, 1);
    assert_eq!(mailbox.calls_matching("send_as:").await, 1);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn shared_mailbox_retries_while_send_as_lags() {
    let mailbox = Arc::new(
        FakeMailbox::default()
            .script_send_as("mbx-finance", vec![Err(lag()), Ok(GrantOutcome::Granted)])
            .script_full_access(
                "mbx-finance",
                vec![Ok(GrantOutcome::Granted), Ok(GrantOutcome::AlreadyExists)],
            ),
    );
    let engine = engine(
        Arc::new(FakeDirectory::default()),
        mailbox.clone(),
        Arc::new(RecordingActivityLog::default()),
    );

    let outcome = engine
        .process(
            &identity(),
            &snapshot(),
            &request("Finance", TargetKind::SharedMailbox),
            RetryPass::First,
            RetryPolicy::first_pass(),
        )
        .await;

    assert_eq!(outcome.status, AssignmentStatus::Succeeded);
    assert_eq!(outcome.attempts, 2);
    assert_eq!(mailbox.calls_matching("full_access:").await, 2);
}
