use thiserror::Error;

/// A type alias for handling `Result`s with `Error` in the stack
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the [`SipStack`](crate::SipStack)
#[derive(Error, Debug)]
pub enum Error {
    /// Error from the message layer
    #[error("SIP message error: {0}")]
    Sip(#[from] strata_sip_core::Error),

    /// Error from a transport
    #[error("Transport error: {0}")]
    Transport(#[from] strata_sip_transport::Error),

    /// Error from the transaction layer
    #[error("Transaction error: {0}")]
    Transaction(#[from] strata_transaction_core::Error),

    /// Invalid stack configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request-URI scheme the stack cannot route; a 416 was queued for the TU
    #[error("Unsupported URI scheme: {0}")]
    UnsupportedScheme(String),

    /// The background stack task panicked or was cancelled
    #[error("Stack task failed: {0}")]
    TaskFailed(String),

    /// No address could be found for the next hop
    #[error("Cannot resolve {0}")]
    Unresolvable(String),
}
