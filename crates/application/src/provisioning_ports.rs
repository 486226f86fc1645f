mod activity;
mod directory;
mod mailbox;

pub use activity::ActivityLog;
pub use directory::DirectoryService;
pub use mailbox::{GrantOutcome, MailboxService};
