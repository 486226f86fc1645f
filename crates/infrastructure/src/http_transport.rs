//! Shared HTTP plumbing for the directory and mailbox adapters.
//!
//! Throttling and gateway failures are retried here with their own short
//! budget. Replication lag surfaces as an ordinary error response and is
//! left to the assignment engine.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use tenantdesk_core::{AppError, AppResult};
use tracing::warn;
use url::Url;

const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Transport-level retry budget for one logical request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportRetry {
    max_attempts: u8,
    backoff: Duration,
}

impl TransportRetry {
    /// Creates a retry budget; attempts are clamped to at least one.
    #[must_use]
    pub fn new(max_attempts: u8, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    fn delay_for(&self, attempt: u8, retry_after: Option<Duration>) -> Duration {
        retry_after
            .map(|delay| delay.min(MAX_RETRY_AFTER))
            .unwrap_or_else(|| self.backoff.saturating_mul(u32::from(attempt)))
    }
}

impl Default for TransportRetry {
    fn default() -> Self {
        Self::new(4, Duration::from_secs(2))
    }
}

#[derive(Debug, Deserialize)]
struct ODataError {
    error: ODataErrorBody,
}

#[derive(Debug, Deserialize)]
struct ODataErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Sends a request built by `build`, retrying throttling and gateway errors.
///
/// A 500 is not retried here: the mailbox service reports cmdlet failures
/// that way and the message is needed by the caller.
///
/// Returns the first successful response. Other error statuses are mapped
/// through [`error_from_response`] without retrying.
pub async fn send_with_transport_retry<F>(
    retry: TransportRetry,
    operation: &str,
    mut build: F,
) -> AppResult<reqwest::Response>
where
    F: FnMut() -> reqwest::RequestBuilder,
{
    let mut attempt = 0_u8;
    let mut last_error: Option<String> = None;

    while attempt < retry.max_attempts {
        attempt = attempt.saturating_add(1);

        let retry_after = match build().send().await {
            Ok(response) if response.status().is_success() => return Ok(response),
            Ok(response) if is_retryable_status(response.status()) => {
                let retry_after = retry_after_header(&response);
                last_error = Some(format!(
                    "{operation} returned transient HTTP status {}",
                    response.status()
                ));
                retry_after
            }
            Ok(response) => {
                let status = response.status();
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<response body unavailable>".to_owned());
                return Err(error_from_response(status, &body));
            }
            Err(error) => {
                last_error = Some(format!("{operation} transport error: {error}"));
                None
            }
        };

        if attempt < retry.max_attempts {
            let delay = retry.delay_for(attempt, retry_after);
            warn!(
                operation,
                attempt,
                max_attempts = retry.max_attempts,
                delay_ms = delay.as_millis(),
                error = last_error.as_deref().unwrap_or_default(),
                "retrying HTTP request"
            );
            tokio::time::sleep(delay).await;
        }
    }

    Err(AppError::Upstream(last_error.unwrap_or_else(|| {
        format!("{operation} exhausted transport retries")
    })))
}

/// Maps an error response to an [`AppError`], keeping the service message verbatim.
#[must_use]
pub fn error_from_response(status: StatusCode, body: &str) -> AppError {
    let message = match serde_json::from_str::<ODataError>(body) {
        Ok(parsed) if !parsed.error.message.is_empty() => parsed.error.message,
        Ok(parsed) if !parsed.error.code.is_empty() => parsed.error.code,
        _ if body.trim().is_empty() => format!("HTTP status {status}"),
        _ => body.trim().to_owned(),
    };

    match status {
        StatusCode::UNAUTHORIZED => AppError::Unauthorized(message),
        StatusCode::FORBIDDEN => AppError::Forbidden(message),
        _ => AppError::Upstream(message),
    }
}

/// Validates a service base URL and strips any trailing slash.
pub fn normalize_base_url(value: &str) -> AppResult<String> {
    let parsed = Url::parse(value)
        .map_err(|error| AppError::Validation(format!("invalid base URL '{value}': {error}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::Validation(format!(
            "base URL '{value}' must use http or https"
        )));
    }

    Ok(parsed.as_str().trim_end_matches('/').to_owned())
}

/// Returns the `.default` OAuth2 scope for the service hosting `base_url`.
pub fn default_scope(base_url: &str) -> AppResult<String> {
    let parsed = Url::parse(base_url)
        .map_err(|error| AppError::Validation(format!("invalid base URL '{base_url}': {error}")))?;

    Ok(format!("{}/.default", parsed.origin().ascii_serialization()))
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn retry_after_header(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
