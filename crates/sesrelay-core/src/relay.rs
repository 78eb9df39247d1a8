//! Relay sender
//!
//! Runs one inbound transaction through the address filter, prepares the
//! message for the configured [`SendMode`] and hands it to the transport.

use crate::filter::Policy;
use crate::report::{RelayLogger, TracingLogger};
use crate::rewrite::HeaderRewriter;
use crate::transport::{EmailTransport, SendRawEmailRequest};
use sesrelay_common::config::{RelayConfig, SendMode};
use sesrelay_common::{RelayError, Transaction};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info, info_span, Instrument};

/// Substitute sender and recipient, fixed at construction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub from: Option<String>,
    pub to: Option<String>,
}

impl Overrides {
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            from: config.from_override.clone(),
            to: config.to_override.clone(),
        }
    }
}

/// Relays filtered transactions through an [`EmailTransport`]
///
/// Holds only read-only state and can be shared across tasks.
pub struct RelaySender {
    policy: Policy,
    mode: SendMode,
    configuration_set: Option<String>,
    overrides: Overrides,
    rewriter: HeaderRewriter,
    transport: Arc<dyn EmailTransport>,
    logger: Arc<dyn RelayLogger>,
}

impl std::fmt::Debug for RelaySender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelaySender")
            .field("policy", &self.policy)
            .field("mode", &self.mode)
            .field("configuration_set", &self.configuration_set)
            .field("overrides", &self.overrides)
            .field("transport", &self.transport.name())
            .finish()
    }
}

impl RelaySender {
    /// Create a sender in structured mode with no overrides
    pub fn new(policy: Policy, transport: Arc<dyn EmailTransport>) -> Self {
        Self {
            policy,
            mode: SendMode::Structured,
            configuration_set: None,
            overrides: Overrides::default(),
            rewriter: HeaderRewriter::new(),
            transport,
            logger: Arc::new(TracingLogger),
        }
    }

    /// Create a sender from the `[relay]` configuration section
    pub fn from_config(
        config: &RelayConfig,
        transport: Arc<dyn EmailTransport>,
    ) -> sesrelay_common::Result<Self> {
        let sender = Self::new(Policy::from_config(config)?, transport)
            .with_mode(config.mode)
            .with_configuration_set(config.configuration_set.clone())
            .with_overrides(Overrides::from_config(config));

        info!(
            mode = ?sender.mode,
            configuration_set = sender.configuration_set.as_deref(),
            from_override = sender.overrides.from.as_deref(),
            to_override = sender.overrides.to.as_deref(),
            transport = sender.transport.name(),
            "Relay sender initialized"
        );

        Ok(sender)
    }

    /// Set the send mode
    pub fn with_mode(mut self, mode: SendMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the configuration set attached to every send
    pub fn with_configuration_set(mut self, configuration_set: Option<String>) -> Self {
        self.configuration_set = configuration_set;
        self
    }

    /// Set the sender and recipient overrides
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Set the logging collaborator
    pub fn with_logger(mut self, logger: Arc<dyn RelayLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Returns the address policy
    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Relay a transaction
    pub async fn relay(&self, transaction: &Transaction) -> Result<(), RelayError> {
        let span = info_span!(
            "relay",
            id = %transaction.id,
            size = transaction.size()
        );
        self.send(
            transaction.origin,
            &transaction.from,
            &transaction.to,
            &transaction.data,
        )
        .instrument(span)
        .await
    }

    /// Filter the recipients and send the message to the allowed ones.
    ///
    /// A filter error is reported right away and returned unless the send
    /// itself fails, in which case the transport error is returned instead.
    pub async fn send(
        &self,
        origin: Option<SocketAddr>,
        from: &str,
        to: &[String],
        data: &[u8],
    ) -> Result<(), RelayError> {
        let filtered = self.policy.filter(from, to);

        if filtered.error.is_some() || !filtered.denied.is_empty() {
            self.logger
                .log(origin, from, &filtered.denied, filtered.error.as_ref());
        }

        if !filtered.has_allowed() {
            debug!(from = %from, denied = filtered.denied.len(), "Nothing to send");
            return filtered.error.map_or(Ok(()), Err);
        }

        let sender = self.overrides.from.as_deref().unwrap_or(from);
        let recipients = match &self.overrides.to {
            Some(to) => vec![to.clone()],
            None => filtered.allowed.clone(),
        };

        let request = match self.mode {
            SendMode::Structured => SendRawEmailRequest {
                configuration_set: self.configuration_set.clone(),
                source: Some(sender.to_string()),
                destinations: recipients.clone(),
                raw_message: data.to_vec(),
            },
            SendMode::HeaderRewrite => {
                let header_to = recipients.first().map(String::as_str).unwrap_or_default();
                SendRawEmailRequest {
                    configuration_set: self.configuration_set.clone(),
                    source: None,
                    destinations: Vec::new(),
                    raw_message: self.rewriter.rewrite(data, sender, header_to),
                }
            }
        };

        let sent = self.transport.send_raw_email(request).await;
        let error = sent.as_ref().err().cloned().map(RelayError::Transport);
        self.logger.log(origin, sender, &recipients, error.as_ref());

        match sent {
            Ok(outcome) => {
                info!(
                    message_id = outcome.message_id.as_deref(),
                    transport = self.transport.name(),
                    recipients = recipients.len(),
                    "Message relayed"
                );
                filtered.error.map_or(Ok(()), Err)
            }
            Err(e) => Err(RelayError::Transport(e)),
        }
    }
}
