//! Address filtering
//!
//! Partitions the recipients of a transaction into allowed and denied sets
//! according to the relay's allow-from and deny-to patterns.

use regex::Regex;
use sesrelay_common::config::RelayConfig;
use sesrelay_common::{Error, RelayError};
use tracing::info;

/// Result of filtering a transaction's addresses
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterResult {
    /// Recipients that may receive the message, in input order
    pub allowed: Vec<String>,
    /// Recipients excluded by policy, in input order
    pub denied: Vec<String>,
    /// Why recipients were denied, if the outcome is an error
    pub error: Option<RelayError>,
}

impl FilterResult {
    /// Whether at least one recipient may receive the message
    pub fn has_allowed(&self) -> bool {
        !self.allowed.is_empty()
    }
}

/// Relay address policy
#[derive(Debug, Clone, Default)]
pub struct Policy {
    allow_from: Option<Regex>,
    deny_to: Option<Regex>,
}

impl Policy {
    /// Create a policy from compiled patterns
    pub fn new(allow_from: Option<Regex>, deny_to: Option<Regex>) -> Self {
        Self {
            allow_from,
            deny_to,
        }
    }

    /// Compile the patterns of a relay configuration
    pub fn from_config(config: &RelayConfig) -> sesrelay_common::Result<Self> {
        let allow_from = compile("relay.allow_from", config.allow_from.as_deref())?;
        let deny_to = compile("relay.deny_to", config.deny_to.as_deref())?;

        info!(
            allow_from = allow_from.as_ref().map(Regex::as_str),
            deny_to = deny_to.as_ref().map(Regex::as_str),
            "Relay policy loaded"
        );

        Ok(Self::new(allow_from, deny_to))
    }

    /// Filter the recipients of a message from `from`
    pub fn filter(&self, from: &str, to: &[String]) -> FilterResult {
        filter_addresses(from, to, self.allow_from.as_ref(), self.deny_to.as_ref())
    }
}

fn compile(key: &str, pattern: Option<&str>) -> sesrelay_common::Result<Option<Regex>> {
    pattern
        .map(|p| {
            Regex::new(p).map_err(|e| Error::Config(format!("Invalid pattern for {}: {}", key, e)))
        })
        .transpose()
}

/// Partition `to` into allowed and denied recipients.
///
/// A sender that fails `allow_from` denies every recipient. Otherwise each
/// recipient matching `deny_to` is denied. An empty allowed set is always an
/// error; a partial denial is not.
pub fn filter_addresses(
    from: &str,
    to: &[String],
    allow_from: Option<&Regex>,
    deny_to: Option<&Regex>,
) -> FilterResult {
    if let Some(allow_from) = allow_from {
        if !allow_from.is_match(from) {
            return FilterResult {
                allowed: Vec::new(),
                denied: to.to_vec(),
                error: Some(RelayError::SenderNotPermitted),
            };
        }
    }

    let (denied, allowed): (Vec<String>, Vec<String>) = to
        .iter()
        .cloned()
        .partition(|recipient| deny_to.is_some_and(|re| re.is_match(recipient)));

    let error = if allowed.is_empty() {
        Some(RelayError::NoPermittedRecipients)
    } else {
        None
    };

    FilterResult {
        allowed,
        denied,
        error,
    }
}
