//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod client_credentials_token_provider;
mod exchange_online_mailbox_service;
mod graph_directory_service;
mod http_transport;
mod json_lines_activity_log;
mod tracing_activity_log;

pub use client_credentials_token_provider::ClientCredentialsTokenProvider;
pub use exchange_online_mailbox_service::ExchangeOnlineMailboxService;
pub use graph_directory_service::GraphDirectoryService;
pub use http_transport::{
    TransportRetry, default_scope, error_from_response, normalize_base_url,
    send_with_transport_retry,
};
pub use json_lines_activity_log::JsonLinesActivityLog;
pub use tracing_activity_log::TracingActivityLog;
