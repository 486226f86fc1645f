//! Batch results as presented to operators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::assignment::{AssignmentOutcome, AssignmentStatus};
use crate::identity::BatchId;

/// Outcome counts for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Assignments in place.
    pub succeeded: usize,
    /// Assignments rejected with a non-transient error.
    pub failed_permanent: usize,
    /// Assignments left for the operator after both passes.
    pub manual_task_required: usize,
    /// Assignments not finished because the batch was cancelled.
    pub cancelled: usize,
}

impl BatchSummary {
    /// Counts statuses across outcomes.
    #[must_use]
    pub fn from_outcomes(outcomes: &[AssignmentOutcome]) -> Self {
        outcomes
            .iter()
            .fold(Self::default(), |mut summary, outcome| {
                match outcome.status {
                    AssignmentStatus::Succeeded => summary.succeeded += 1,
                    AssignmentStatus::FailedPermanent => summary.failed_permanent += 1,
                    AssignmentStatus::ManualTaskRequired => summary.manual_task_required += 1,
                    AssignmentStatus::Cancelled => summary.cancelled += 1,
                    AssignmentStatus::DeferredForRetry => {}
                }
                summary
            })
    }

    /// Returns the number of counted outcomes.
    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded + self.failed_permanent + self.manual_task_required + self.cancelled
    }
}

/// Terminal outcomes of one batch, in submission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Batch identifier.
    pub batch_id: BatchId,
    /// Principal the batch was applied to.
    pub user_principal_name: String,
    /// One outcome per submitted request.
    pub outcomes: Vec<AssignmentOutcome>,
    /// Batch start timestamp.
    pub started_at: DateTime<Utc>,
    /// Batch finish timestamp.
    pub finished_at: DateTime<Utc>,
}

impl BatchReport {
    /// Returns outcome counts.
    #[must_use]
    pub fn summary(&self) -> BatchSummary {
        BatchSummary::from_outcomes(&self.outcomes)
    }

    /// Returns outcomes the operator must follow up on.
    pub fn action_items(&self) -> impl Iterator<Item = &AssignmentOutcome> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.needs_attention())
    }
}
