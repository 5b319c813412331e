use std::str::Utf8Error;
use thiserror::Error;

/// A type alias for handling `Result`s with `Error`
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building, parsing or inspecting SIP messages
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Generic parse failure with a description of what went wrong
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A header value exists but could not be interpreted
    #[error("Invalid {name} header: {reason}")]
    InvalidHeader {
        /// Header name as it appears on the wire
        name: String,
        /// What was wrong with it
        reason: String,
    },

    /// A header required for the requested operation is absent
    #[error("Missing {0} header")]
    MissingHeader(&'static str),

    /// Status code outside 100..=699
    #[error("Invalid status code: {0}")]
    InvalidStatusCode(u16),

    /// Method token is empty or contains illegal characters
    #[error("Invalid method: {0}")]
    InvalidMethod(String),

    /// URI could not be parsed
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    /// Operation only makes sense on a request or on a response
    #[error("Wrong message kind: expected {0}")]
    WrongMessageKind(&'static str),

    /// Bytes are not valid UTF-8
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] Utf8Error),
}

impl Error {
    /// Shorthand for an [`Error::InvalidHeader`]
    pub fn invalid_header(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidHeader {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
