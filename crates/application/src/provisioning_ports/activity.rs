use tenantdesk_domain::ActivityEntry;

/// Fire-and-forget sink for operator-facing activity.
///
/// Implementations must not block and must swallow their own failures.
pub trait ActivityLog: Send + Sync {
    /// Records one activity entry.
    fn record(&self, entry: ActivityEntry);
}
