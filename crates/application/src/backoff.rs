//! Generic bounded retry loop driven by a [`RetryPlan`].

use std::future::Future;

use tenantdesk_domain::{AttemptSlot, RetryPlan, RetryPolicy};
use tracing::debug;

/// Final state of one retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryResult<T, E> {
    /// An attempt succeeded.
    Succeeded {
        /// Value returned by the successful attempt.
        value: T,
        /// Attempts issued, including the successful one.
        attempts: u32,
    },
    /// An attempt failed with a non-transient error; no further attempts ran.
    Failed {
        /// Error of the failing attempt.
        error: E,
        /// Attempts issued.
        attempts: u32,
    },
    /// Every attempt of the budget failed transiently.
    Exhausted {
        /// Error of the last attempt.
        last_error: Option<E>,
        /// Attempts issued.
        attempts: u32,
    },
}

impl<T, E> RetryResult<T, E> {
    /// Returns attempts issued by the loop.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. }
            | Self::Failed { attempts, .. }
            | Self::Exhausted { attempts, .. } => *attempts,
        }
    }
}

/// Runs `operation` until it succeeds, fails non-transiently, or the policy's
/// attempt budget is spent.
///
/// Attempts run strictly one after another; the plan's wait is slept before
/// each attempt it schedules one for.
pub async fn retry_with_backoff<T, E, F, Fut, P>(
    policy: RetryPolicy,
    is_transient: P,
    mut operation: F,
) -> RetryResult<T, E>
where
    F: FnMut(AttemptSlot) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut plan = RetryPlan::new(policy);
    let mut last_error: Option<E> = None;

    while let Some(slot) = plan.next_attempt() {
        if !slot.wait.is_zero() {
            debug!(
                attempt = slot.attempt_number,
                wait_seconds = slot.wait.as_secs(),
                "waiting before retry attempt"
            );
            tokio::time::sleep(slot.wait).await;
        }

        match operation(slot).await {
            Ok(value) => {
                return RetryResult::Succeeded {
                    value,
                    attempts: slot.attempt_number,
                };
            }
            Err(error) if is_transient(&error) => last_error = Some(error),
            Err(error) => {
                return RetryResult::Failed {
                    error,
                    attempts: slot.attempt_number,
                };
            }
        }
    }

    RetryResult::Exhausted {
        last_error,
        attempts: plan.attempts(),
    }
}
