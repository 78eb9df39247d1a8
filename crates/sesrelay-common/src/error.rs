//! Error types for sesrelay

use thiserror::Error;

/// Main error type for sesrelay
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for sesrelay
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Relay(e) => e.code(),
            Error::Other(_) => "INTERNAL_ERROR",
        }
    }
}

/// Outcome classes of a single relay call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// The sender failed the allow-from check; every recipient was denied
    #[error("sender not permitted")]
    SenderNotPermitted,

    /// No recipient survived the deny-to check
    #[error("no permitted recipients")]
    NoPermittedRecipients,

    /// The send capability failed
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl RelayError {
    /// Returns the error code string
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::SenderNotPermitted => "SENDER_NOT_PERMITTED",
            RelayError::NoPermittedRecipients => "NO_PERMITTED_RECIPIENTS",
            RelayError::Transport(_) => "TRANSPORT_ERROR",
        }
    }

    /// Suggested SMTP reply code for the front end that owns the session.
    ///
    /// Policy denials are permanent, transport failures are temporary so the
    /// client retries later.
    pub fn smtp_code(&self) -> u16 {
        match self {
            RelayError::SenderNotPermitted => 550,
            RelayError::NoPermittedRecipients => 550,
            RelayError::Transport(_) => 451,
        }
    }

    /// Whether this error came from address filtering rather than delivery
    pub fn is_policy_denial(&self) -> bool {
        !matches!(self, RelayError::Transport(_))
    }
}

/// Errors raised by the outbound send capability
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error {code} (status {status}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}
