//! Application services and ports.

#![forbid(unsafe_code)]

mod assignment_engine;
mod backoff;
mod cancellation;
mod provisioning_ports;
mod provisioning_service;

#[cfg(test)]
mod test_support;

pub use assignment_engine::AssignmentEngine;
pub use backoff::{RetryResult, retry_with_backoff};
pub use cancellation::CancellationFlag;
pub use provisioning_ports::{ActivityLog, DirectoryService, GrantOutcome, MailboxService};
pub use provisioning_service::{MAX_PROPAGATION_DELAY, ProvisioningPolicy, ProvisioningService};
