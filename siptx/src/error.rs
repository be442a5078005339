use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Error on parsing an SIP message.
#[derive(Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SipParseError {
    /// Message in error.
    pub message: String,
}

#[allow(missing_docs)]
impl SipParseError {
    pub fn new<T>(s: T) -> Self
    where
        T: AsRef<str>,
    {
        Self {
            message: s.as_ref().to_string(),
        }
    }
}

impl From<&str> for SipParseError {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SipParseError {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// The error type for this crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    ParseError(#[from] SipParseError),

    #[error("Missing required '{0}' header")]
    MissingRequiredHeader(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error(transparent)]
    TransactionError(#[from] TransactionError),
}

/// Failures raised by the transaction layer itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    /// Timer F, B or H fired before a final response concluded the
    /// transaction.
    #[error("Transaction timed out")]
    Timeout,

    /// A transaction with the same key is already registered. The caller
    /// must generate a fresh Via branch.
    #[error("A transaction with this key already exists")]
    DuplicateTransaction,

    /// No server transaction matches the response being sent.
    #[error("No matching transaction")]
    NoMatchingTransaction,

    /// The method cannot create a transaction (ACK requests are sent
    /// directly through the transport).
    #[error("Method not allowed for a transaction")]
    MethodNotAllowed,

    /// A request with an unexpected method reached an INVITE server
    /// transaction awaiting its ACK.
    #[error("Invalid method for the transaction state")]
    InvalidMethod,

    /// The transport reported a failure while the transaction was running.
    #[error("Transport failure: {0}")]
    TransportFailure(String),
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for Error {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        Self::ChannelClosed
    }
}
