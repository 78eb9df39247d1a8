//! Common types for sesrelay

use std::net::SocketAddr;
use uuid::Uuid;

/// Unique identifier for a relayed transaction
pub type TransactionId = Uuid;

/// A parsed inbound SMTP transaction, as handed over by the front end
#[derive(Debug, Clone)]
pub struct Transaction {
    /// Correlation id for log lines of this relay call
    pub id: TransactionId,

    /// Network peer that submitted the message
    pub origin: Option<SocketAddr>,

    /// Envelope sender (MAIL FROM)
    pub from: String,

    /// Envelope recipients (RCPT TO), in submission order
    pub to: Vec<String>,

    /// Raw RFC 5322 message
    pub data: Vec<u8>,
}

impl Transaction {
    /// Create a new transaction
    pub fn new(
        origin: Option<SocketAddr>,
        from: impl Into<String>,
        to: Vec<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            origin,
            from: from.into(),
            to,
            data: data.into(),
        }
    }

    /// Size of the raw message in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_transaction() {
        let origin: SocketAddr = "192.0.2.10:2525".parse().unwrap();
        let tx = Transaction::new(
            Some(origin),
            "a@example.com",
            vec!["b@example.com".to_string()],
            "Subject: hi\r\n\r\nbody",
        );

        assert_eq!(tx.origin, Some(origin));
        assert_eq!(tx.from, "a@example.com");
        assert_eq!(tx.to, vec!["b@example.com"]);
        assert_eq!(tx.size(), 19);
    }

    #[test]
    fn test_transaction_ids_are_unique() {
        let a = Transaction::new(None, "a@example.com", vec![], Vec::new());
        let b = Transaction::new(None, "a@example.com", vec![], Vec::new());
        assert_ne!(a.id, b.id);
    }
}
