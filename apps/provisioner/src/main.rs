//! Tenantdesk provisioner: applies one assignment batch to a new identity.

#![forbid(unsafe_code)]

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tenantdesk_application::{
    ActivityLog, CancellationFlag, ProvisioningPolicy, ProvisioningService,
};
use tenantdesk_core::{AppError, AppResult, TenantId};
use tenantdesk_domain::{AssignmentRequest, BatchReport, Identity, TargetKind};
use tenantdesk_infrastructure::{
    ClientCredentialsTokenProvider, ExchangeOnlineMailboxService, GraphDirectoryService,
    JsonLinesActivityLog, TracingActivityLog,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct ProvisionerConfig {
    tenant_id: TenantId,
    client_id: String,
    client_secret: String,
    exchange_organization: Option<String>,
    graph_base_url: String,
    exchange_base_url: String,
    login_base_url: String,
    propagation_delay: Duration,
    activity_log_path: Option<PathBuf>,
    http_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct BatchFile {
    identity: Identity,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    assignments: Vec<AssignmentInput>,
}

#[derive(Debug, Deserialize)]
struct AssignmentInput {
    target_name: String,
    target_kind: TargetKind,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let batch_path = env::args().nth(1).ok_or_else(|| {
        AppError::Validation("usage: tenantdesk-provisioner <batch-file.json>".to_owned())
    })?;
    let batch = BatchFile::load(Path::new(&batch_path))?;
    let config = ProvisionerConfig::load()?;
    let service = build_provisioning_service(&config)?;

    let cancellation = CancellationFlag::new();
    spawn_cancel_on_ctrl_c(cancellation.clone());

    info!(
        tenant_id = %config.tenant_id,
        user_principal_name = %batch.identity.user_principal_name(),
        labels = batch.labels.len(),
        assignments = batch.assignments.len(),
        propagation_delay_seconds = config.propagation_delay.as_secs(),
        "tenantdesk-provisioner started"
    );

    let report = run_batch(&service, batch, &cancellation).await?;
    log_action_items(&report);

    let rendered = serde_json::to_string_pretty(&report)
        .map_err(|error| AppError::Internal(format!("failed to render batch report: {error}")))?;
    println!("{rendered}");

    Ok(())
}

async fn run_batch(
    service: &ProvisioningService,
    batch: BatchFile,
    cancellation: &CancellationFlag,
) -> AppResult<BatchReport> {
    let BatchFile {
        identity,
        labels,
        assignments,
    } = batch;

    if assignments.is_empty() {
        return Ok(service
            .provision_labels(&identity, &labels, cancellation)
            .await);
    }

    if !labels.is_empty() {
        return Err(AppError::Validation(
            "batch file must contain either labels or assignments, not both".to_owned(),
        ));
    }

    let requests = assignments
        .into_iter()
        .map(|input| AssignmentRequest::new(input.target_name, input.target_kind))
        .collect::<AppResult<Vec<_>>>()?;

    Ok(service
        .provision_requests(&identity, requests, cancellation)
        .await)
}

fn build_provisioning_service(config: &ProvisionerConfig) -> AppResult<ProvisioningService> {
    let http_client = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;

    let tokens = Arc::new(ClientCredentialsTokenProvider::new(
        http_client.clone(),
        config.login_base_url.as_str(),
        config.tenant_id,
        config.client_id.clone(),
        config.client_secret.clone(),
    )?);
    let directory = Arc::new(GraphDirectoryService::new(
        http_client.clone(),
        tokens.clone(),
        config.graph_base_url.as_str(),
    )?);
    let mailbox = Arc::new(ExchangeOnlineMailboxService::new(
        http_client,
        tokens,
        config.exchange_base_url.as_str(),
        config.tenant_id,
        config.exchange_organization.clone(),
    )?);
    let activity_log: Arc<dyn ActivityLog> = match &config.activity_log_path {
        Some(path) => Arc::new(JsonLinesActivityLog::open(path)?),
        None => Arc::new(TracingActivityLog::new()),
    };

    let policy = ProvisioningPolicy::with_propagation_delay(config.propagation_delay)?;

    Ok(ProvisioningService::new(directory, mailbox, activity_log).with_policy(policy))
}

/// Exit status used when a second interrupt aborts the batch.
const FORCED_EXIT_CODE: i32 = 130;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InterruptAction {
    Cancel,
    Exit,
}

impl InterruptAction {
    fn for_signal(received: u32) -> Self {
        if received <= 1 { Self::Cancel } else { Self::Exit }
    }
}

fn spawn_cancel_on_ctrl_c(cancellation: CancellationFlag) {
    tokio::spawn(async move {
        let mut received = 0_u32;
        loop {
            if let Err(error) = tokio::signal::ctrl_c().await {
                warn!(error = %error, "failed to listen for interrupt signal");
                return;
            }
            received = received.saturating_add(1);

            match InterruptAction::for_signal(received) {
                InterruptAction::Cancel => {
                    warn!(
                        "interrupt received; remaining assignments will be cancelled, interrupt again to exit now"
                    );
                    cancellation.cancel();
                }
                InterruptAction::Exit => {
                    warn!("second interrupt received; exiting without a report");
                    std::process::exit(FORCED_EXIT_CODE);
                }
            }
        }
    });
}

fn log_action_items(report: &BatchReport) {
    let summary = report.summary();
    info!(
        batch_id = %report.batch_id,
        succeeded = summary.succeeded,
        failed_permanent = summary.failed_permanent,
        manual_task_required = summary.manual_task_required,
        cancelled = summary.cancelled,
        "batch report ready"
    );

    for outcome in report.action_items() {
        warn!(
            target_name = %outcome.target_name,
            target_kind = outcome.target_kind.as_str(),
            status = outcome.status.as_str(),
            attempts = outcome.attempts,
            detail = outcome.detail.as_deref().unwrap_or_default(),
            "assignment needs operator attention"
        );
    }
}

impl BatchFile {
    fn load(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|error| {
            AppError::Validation(format!(
                "failed to read batch file '{}': {error}",
                path.display()
            ))
        })?;

        Self::parse(&contents)
    }

    fn parse(contents: &str) -> AppResult<Self> {
        serde_json::from_str(contents)
            .map_err(|error| AppError::Validation(format!("invalid batch file: {error}")))
    }
}

impl ProvisionerConfig {
    fn load() -> AppResult<Self> {
        let tenant_id = required_env("AZURE_TENANT_ID")?.parse::<TenantId>()?;
        let client_id = required_env("AZURE_CLIENT_ID")?;
        let client_secret = required_env("AZURE_CLIENT_SECRET")?;
        let exchange_organization = optional_env("EXCHANGE_ORGANIZATION");
        let graph_base_url = env::var("GRAPH_BASE_URL")
            .unwrap_or_else(|_| "https://graph.microsoft.com/v1.0".to_owned());
        let exchange_base_url = env::var("EXCHANGE_BASE_URL")
            .unwrap_or_else(|_| "https://outlook.office365.com".to_owned());
        let login_base_url = env::var("LOGIN_BASE_URL")
            .unwrap_or_else(|_| "https://login.microsoftonline.com".to_owned());
        let propagation_delay_seconds = parse_env_u64("PROVISIONER_PROPAGATION_DELAY_SECONDS", 15)?;
        let activity_log_path = optional_env("PROVISIONER_ACTIVITY_LOG_PATH").map(PathBuf::from);
        let http_timeout_seconds = parse_env_u64("PROVISIONER_HTTP_TIMEOUT_SECONDS", 30)?;

        if http_timeout_seconds == 0 {
            return Err(AppError::Validation(
                "PROVISIONER_HTTP_TIMEOUT_SECONDS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            tenant_id,
            client_id,
            client_secret,
            exchange_organization,
            graph_base_url,
            exchange_base_url,
            login_base_url,
            propagation_delay: Duration::from_secs(propagation_delay_seconds),
            activity_log_path,
            http_timeout: Duration::from_secs(http_timeout_seconds),
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    optional_env(name).ok_or_else(|| AppError::Validation(format!("{name} is required")))
}

fn optional_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(value) => value.parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}
