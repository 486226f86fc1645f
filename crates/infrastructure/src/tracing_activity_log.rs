use tenantdesk_application::ActivityLog;
use tenantdesk_domain::{ActivityEntry, ActivityStatus};
use tracing::{info, warn};

/// Activity log that forwards entries to tracing output.
#[derive(Clone, Default)]
pub struct TracingActivityLog;

impl TracingActivityLog {
    /// Creates a tracing activity log.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ActivityLog for TracingActivityLog {
    fn record(&self, entry: ActivityEntry) {
        match entry.status {
            ActivityStatus::Failed | ActivityStatus::ManualTask => warn!(
                category = entry.category.as_str(),
                status = entry.status.as_str(),
                "{}",
                entry.detail
            ),
            _ => info!(
                category = entry.category.as_str(),
                status = entry.status.as_str(),
                "{}",
                entry.detail
            ),
        }
    }
}
