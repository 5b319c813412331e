//! SIP message model for the strata stack
//!
//! This crate provides the pieces every other layer builds on:
//!
//! - value types for methods, status codes, URIs, Via, CSeq and name-addr
//! - [`SipMessage`], whose header values are lazily parsed slices of the
//!   receive buffer
//! - the streaming [`Preparser`] that finds message boundaries in bytes
//! - helpers to build responses, failure ACKs and CANCELs
//! - [`Fifo`], the blocking queue used between threads
//!
//! ```rust
//! use bytes::Bytes;
//! use strata_sip_core::prelude::*;
//!
//! let wire = Bytes::from_static(
//!     b"OPTIONS sip:carol@chicago.com SIP/2.0\r\n\
//!       Via: SIP/2.0/UDP pc33.atlanta.com;branch=z9hG4bKhjhs8ass877\r\n\
//!       CSeq: 63104 OPTIONS\r\n\
//!       Content-Length: 0\r\n\r\n",
//! );
//! let mut preparser = Preparser::new(DEFAULT_MAX_HEADER_SIZE);
//! let PreparseStatus::HeadersComplete { header_len } = preparser.process(&wire) else {
//!     panic!("incomplete");
//! };
//! let msg = preparser.build_message(&wire.slice(..header_len)).unwrap();
//! assert_eq!(msg.method(), Some(&Method::Options));
//! assert_eq!(msg.branch(), Some("z9hG4bKhjhs8ass877"));
//! ```

pub mod error;
pub mod fifo;
pub mod helpers;
pub mod message;
pub mod parser;
pub mod preparse;
pub mod types;

pub use error::{Error, Result};
pub use fifo::Fifo;
pub use message::{RequestLine, SipMessage, StartLine, StatusLine, SIP_VERSION};
pub use preparse::{PreparseError, PreparseStatus, Preparser, DEFAULT_MAX_HEADER_SIZE};
pub use types::{
    CSeq, FieldType, HeaderEntry, HeaderFieldValue, HeaderName, Headers, Method, NameAddr, Param,
    Params, StatusCode, TransportType, Tuple, Uri, Via, BRANCH_MAGIC_COOKIE,
};

/// Re-export of common types for easier use
pub mod prelude {
    pub use crate::helpers::{
        generate_branch, generate_call_id, generate_tag, make_cancel, make_failure_ack, make_response,
    };
    pub use crate::{
        CSeq, Error, Fifo, HeaderFieldValue, HeaderName, Headers, Method, NameAddr, PreparseError,
        PreparseStatus, Preparser, Result, SipMessage, StatusCode, TransportType, Tuple, Uri, Via,
        DEFAULT_MAX_HEADER_SIZE,
    };
}
