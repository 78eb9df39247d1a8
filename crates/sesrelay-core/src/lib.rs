//! sesrelay Core - Address filtering and SES delivery
//!
//! This crate provides the relay pipeline: recipients are filtered against
//! the configured policy, the message is prepared for the configured send
//! mode, and the result is delivered through an [`EmailTransport`].

pub mod filter;
pub mod relay;
pub mod report;
pub mod rewrite;
pub mod ses;
pub mod transport;

pub use filter::{filter_addresses, FilterResult, Policy};
pub use relay::{Overrides, RelaySender};
pub use report::{LogEntry, RelayLogger, TracingLogger};
pub use rewrite::HeaderRewriter;
pub use ses::SesClient;
pub use transport::{EmailTransport, SendOutcome, SendRawEmailRequest};
