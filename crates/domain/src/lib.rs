//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod activity;
mod assignment;
mod identity;
mod label;
mod report;
mod retry;
mod tenant;

pub use activity::{ActivityCategory, ActivityEntry, ActivityStatus};
pub use assignment::{
    AssignmentOutcome, AssignmentRequest, AssignmentStatus, TargetKind, TargetService,
};
pub use identity::{BatchId, Identity};
pub use label::{LabelClassification, classify_label};
pub use report::{BatchReport, BatchSummary};
pub use retry::{
    AttemptSlot, RetryPass, RetryPlan, RetryPolicy, is_already_present, is_transient_not_found,
};
pub use tenant::{DirectoryEntry, TenantSnapshot, match_by_name};
