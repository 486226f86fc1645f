//! Replication-lag retry policy and per-request retry plans.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Message fragments that mean the downstream service cannot see the
/// principal yet.
const TRANSIENT_NOT_FOUND_PATTERNS: &[&str] = &["couldn't find object", "wasn't found"];

/// Message fragments reporting that a membership or permission is already in place.
const ALREADY_PRESENT_PATTERNS: &[&str] = &[
    "already a member",
    "already exist",
    "already has",
    "already granted",
];

/// Retry sweep an assignment is processed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPass {
    /// Sweep over every request in the batch.
    First,
    /// Slower sweep over requests deferred by the first pass.
    Second,
}

impl RetryPass {
    /// Returns a stable transport value for this pass.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Second => "second",
        }
    }
}

/// Fixed attempt budget and wait schedule for one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
    delay_before_first_attempt: bool,
}

impl RetryPolicy {
    /// First pass: 3 attempts, 30 seconds apart, no wait before attempt 1.
    #[must_use]
    pub fn first_pass() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(30),
            delay_before_first_attempt: false,
        }
    }

    /// Second pass: 2 attempts, each preceded by a 15 second wait.
    #[must_use]
    pub fn second_pass() -> Self {
        Self {
            max_attempts: 2,
            delay: Duration::from_secs(15),
            delay_before_first_attempt: true,
        }
    }

    /// Returns the attempt budget.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the wait between attempts.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Returns whether attempt 1 is also preceded by the wait.
    #[must_use]
    pub fn delay_before_first_attempt(&self) -> bool {
        self.delay_before_first_attempt
    }
}

/// One scheduled attempt handed out by a [`RetryPlan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptSlot {
    /// 1-based attempt number within the pass.
    pub attempt_number: u32,
    /// Wait to apply before issuing the attempt.
    pub wait: Duration,
}

/// Attempt bookkeeping for one request in one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPlan {
    policy: RetryPolicy,
    attempts: u32,
}

impl RetryPlan {
    /// Starts a plan with no attempts issued.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
        }
    }

    /// Reserves the next attempt, or `None` once the budget is spent.
    pub fn next_attempt(&mut self) -> Option<AttemptSlot> {
        if self.is_exhausted() {
            return None;
        }

        let wait = if self.attempts == 0 && !self.policy.delay_before_first_attempt() {
            Duration::ZERO
        } else {
            self.policy.delay()
        };
        self.attempts += 1;

        Some(AttemptSlot {
            attempt_number: self.attempts,
            wait,
        })
    }

    /// Returns attempts issued so far.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Returns the attempt budget of the pass.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.policy.max_attempts()
    }

    /// Returns whether every attempt of the pass has been issued.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.policy.max_attempts()
    }
}

/// Returns whether a service message indicates replication lag.
#[must_use]
pub fn is_transient_not_found(message: &str) -> bool {
    let normalized = normalize_message(message);
    TRANSIENT_NOT_FOUND_PATTERNS
        .iter()
        .any(|pattern| normalized.contains(pattern))
}

/// Returns whether a service message reports the grant or membership already exists.
#[must_use]
pub fn is_already_present(message: &str) -> bool {
    let normalized = normalize_message(message);
    ALREADY_PRESENT_PATTERNS
        .iter()
        .any(|pattern| normalized.contains(pattern))
}

fn normalize_message(message: &str) -> String {
    message.to_lowercase().replace(['\u{2019}', '\u{2018}'], "'")
}
