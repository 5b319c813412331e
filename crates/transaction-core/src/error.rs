use thiserror::Error;

use crate::key::TransactionKey;

/// A type alias for handling `Result`s with `Error` in the transaction layer
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while matching or creating transactions
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A transaction with the same key is already in the table
    #[error("Transaction already exists: {0}")]
    TransactionExists(TransactionKey),

    /// No transaction matches the key
    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionKey),

    /// The transaction table is full
    #[error("Too many transactions (limit {limit})")]
    TooManyTransactions { limit: usize },

    /// The message carries no Via, so no transaction identifier can be computed
    #[error("Message has no transaction identifier")]
    NoTransactionId,

    /// Error from the message layer
    #[error("SIP message error: {0}")]
    Core(#[from] strata_sip_core::Error),
}
