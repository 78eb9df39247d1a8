//! Relay decision reporting

use chrono::{DateTime, Utc};
use serde::Serialize;
use sesrelay_common::RelayError;
use std::net::SocketAddr;
use tracing::{info, warn};

/// One reported relay decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub time: DateTime<Utc>,
    /// Peer IP, without the port
    pub ip: Option<String>,
    pub from: String,
    pub to: Vec<String>,
    pub error: Option<String>,
}

impl LogEntry {
    pub fn new(
        origin: Option<SocketAddr>,
        from: &str,
        to: &[String],
        error: Option<&RelayError>,
    ) -> Self {
        Self {
            time: Utc::now(),
            ip: origin.map(|addr| addr.ip().to_string()),
            from: from.to_string(),
            to: to.to_vec(),
            error: error.map(ToString::to_string),
        }
    }
}

/// Logging collaborator of the relay sender
///
/// Reports are fire-and-forget; implementations must not fail the relay.
pub trait RelayLogger: Send + Sync {
    fn log(&self, origin: Option<SocketAddr>, from: &str, to: &[String], error: Option<&RelayError>);
}

/// Reports relay decisions as `tracing` events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl RelayLogger for TracingLogger {
    fn log(&self, origin: Option<SocketAddr>, from: &str, to: &[String], error: Option<&RelayError>) {
        let entry = LogEntry::new(origin, from, to, error);
        let json = serde_json::to_string(&entry).unwrap_or_default();

        match error {
            Some(error) => warn!(
                ip = entry.ip.as_deref(),
                from = %entry.from,
                to = ?entry.to,
                error = %error,
                code = error.code(),
                entry = %json,
                "Relay rejected"
            ),
            None => info!(
                ip = entry.ip.as_deref(),
                from = %entry.from,
                to = ?entry.to,
                entry = %json,
                "Relay accepted"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_entry_strips_port() {
        let origin: SocketAddr = "203.0.113.7:41000".parse().unwrap();
        let entry = LogEntry::new(
            Some(origin),
            "a@ex.com",
            &["b@ex.com".to_string()],
            Some(&RelayError::NoPermittedRecipients),
        );

        assert_eq!(entry.ip.as_deref(), Some("203.0.113.7"));
        assert_eq!(entry.error.as_deref(), Some("no permitted recipients"));
    }

    #[test]
    fn test_log_entry_serialization() {
        let entry = LogEntry::new(None, "a@ex.com", &["b@ex.com".to_string()], None);
        let json: serde_json::Value = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["ip"], serde_json::Value::Null);
        assert_eq!(json["from"], "a@ex.com");
        assert_eq!(json["to"], serde_json::json!(["b@ex.com"]));
        assert_eq!(json["error"], serde_json::Value::Null);
        assert!(json["time"].is_string());
    }

    #[test]
    fn test_tracing_logger_does_not_panic() {
        let logger = TracingLogger;
        logger.log(None, "a@ex.com", &[], None);
        logger.log(None, "a@ex.com", &[], Some(&RelayError::SenderNotPermitted));
    }
}
