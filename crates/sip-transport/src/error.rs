use std::io;

use strata_sip_core::{PreparseError, TransportType, Tuple};
use thiserror::Error;

/// A type alias for handling `Result`s with `Error`
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the transport layer
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error on a socket
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Bytes on the wire are not a SIP message
    #[error("framing error: {0}")]
    Framing(#[from] PreparseError),

    /// A header needed for framing is present but unusable
    #[error("invalid message: {0}")]
    Sip(#[from] strata_sip_core::Error),

    /// Datagram ended inside the header block
    #[error("datagram ends before the end of the header block")]
    IncompleteHeaders,

    /// Stream messages must declare their body length
    #[error("message on a stream transport has no Content-Length")]
    MissingContentLength,

    /// Declared body exceeds the configured limit
    #[error("body of {length} bytes exceeds the limit of {limit}")]
    BodyTooLarge { length: usize, limit: usize },

    /// A datagram is shorter than its Content-Length says
    #[error("datagram truncated: Content-Length {expected}, {available} bytes present")]
    Truncated { expected: usize, available: usize },

    /// Tried to add a second connection for the same tuple
    #[error("connection to {0} already exists")]
    DuplicateConnection(Tuple),

    /// No connection could be opened to the peer
    #[error("failed to connect to {0}")]
    ConnectionFailed(Tuple),

    /// Transport is closed
    #[error("transport is closed")]
    TransportClosed,

    /// No transport for this protocol
    #[error("unsupported transport: {0}")]
    UnsupportedTransport(TransportType),

    /// Internal channel closed
    #[error("channel closed")]
    ChannelClosed,
}
