//! Outbound send capability
//!
//! The relay hands prepared messages to an [`EmailTransport`]. The SES
//! client in [`crate::ses`] is the production implementation.

use async_trait::async_trait;
use sesrelay_common::TransportError;

/// A raw message ready for delivery
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendRawEmailRequest {
    /// Configuration set to attach to the send
    pub configuration_set: Option<String>,
    /// Envelope sender; `None` lets the service derive it from the headers
    pub source: Option<String>,
    /// Envelope recipients; empty lets the service derive them from the headers
    pub destinations: Vec<String>,
    /// Raw RFC 5322 message
    pub raw_message: Vec<u8>,
}

/// Result of a successful send
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOutcome {
    /// Message id assigned by the service
    pub message_id: Option<String>,
}

/// Capability to deliver a prepared raw message
#[async_trait]
pub trait EmailTransport: Send + Sync {
    /// Deliver the message
    async fn send_raw_email(
        &self,
        request: SendRawEmailRequest,
    ) -> Result<SendOutcome, TransportError>;

    /// Returns the name of this transport
    fn name(&self) -> &str;
}
