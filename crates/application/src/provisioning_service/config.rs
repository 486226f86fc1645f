use std::time::Duration;

use tenantdesk_core::{AppError, AppResult};
use tenantdesk_domain::{RetryPass, RetryPolicy};

/// Longest propagation wait operators are told to expect before lookups.
pub const MAX_PROPAGATION_DELAY: Duration = Duration::from_secs(30);

/// Wait schedule for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisioningPolicy {
    /// Policy for the sweep over every request.
    pub first_pass: RetryPolicy,
    /// Policy for the sweep over deferred requests.
    pub second_pass: RetryPolicy,
    /// One-off wait before the batch's first mailbox-service attempt.
    pub propagation_delay: Duration,
}

impl ProvisioningPolicy {
    /// Returns the default policy with a custom propagation wait.
    pub fn with_propagation_delay(propagation_delay: Duration) -> AppResult<Self> {
        if propagation_delay > MAX_PROPAGATION_DELAY {
            return Err(AppError::Validation(format!(
                "propagation delay must not exceed {} seconds",
                MAX_PROPAGATION_DELAY.as_secs()
            )));
        }

        Ok(Self {
            propagation_delay,
            ..Self::default()
        })
    }

    /// Returns the retry policy for a pass.
    #[must_use]
    pub fn for_pass(&self, pass: RetryPass) -> RetryPolicy {
        match pass {
            RetryPass::First => self.first_pass,
            RetryPass::Second => self.second_pass,
        }
    }
}

impl Default for ProvisioningPolicy {
    fn default() -> Self {
        Self {
            first_pass: RetryPolicy::first_pass(),
            second_pass: RetryPolicy::second_pass(),
            propagation_delay: Duration::from_secs(15),
        }
    }
}
