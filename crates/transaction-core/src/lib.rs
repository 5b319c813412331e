//! # strata-transaction-core
//!
//! RFC 3261 transaction layer for the strata SIP stack.
//!
//! The [`TransactionController`] maps every message to its transaction,
//! runs the four transaction state machines (INVITE and non-INVITE, client
//! and server), retransmits over unreliable transports, absorbs duplicates
//! and reports timeouts to the Transaction User.
//!
//! The crate is I/O free. Transports feed framed messages in, the TU feeds
//! its requests and responses in, and both collect what the controller
//! produced:
//!
//! ```rust
//! use std::time::Instant;
//! use strata_sip_core::helpers::generate_branch;
//! use strata_sip_core::{CSeq, HeaderFieldValue, HeaderName, Method, SipMessage, Tuple, Uri, Via};
//! use strata_transaction_core::{TransactionConfig, TransactionController, TransactionState};
//!
//! let mut request = SipMessage::new_request(Method::Options, Uri::sip("example.com"));
//! request.push_via(Via::new("UDP", "client.example.com", Some(5060)).with_branch(generate_branch()));
//! request.append_header(HeaderName::From, HeaderFieldValue::text_value("<sip:alice@example.com>;tag=1"));
//! request.append_header(HeaderName::To, HeaderFieldValue::text_value("<sip:example.com>"));
//! request.append_header(HeaderName::CallId, HeaderFieldValue::text_value("doc-example"));
//! request.append_header(HeaderName::CSeq, HeaderFieldValue::new(CSeq::new(1, Method::Options)));
//!
//! let mut controller = TransactionController::new(TransactionConfig::default());
//! let server = Tuple::udp("192.0.2.1:5060".parse().unwrap());
//! let key = controller.process_tu(request, server, Instant::now()).unwrap().unwrap();
//!
//! assert_eq!(controller.state(&key), Some(TransactionState::Trying));
//! assert_eq!(controller.drain_transmissions().count(), 1);
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod event;
pub mod key;
pub mod timer;
pub mod transaction;

pub use config::{TransactionConfig, DEFAULT_MAX_TRANSACTIONS};
pub use controller::{TransactionController, RETRY_AFTER_SECS};
pub use error::{Error, Result};
pub use event::{Transmission, TuMessage};
pub use key::TransactionKey;
pub use timer::{TimerSettings, TimerType};
pub use transaction::{TransactionKind, TransactionState};

/// Re-export of common types for easier use
pub mod prelude {
    pub use crate::{
        Error, Result, TimerSettings, TimerType, TransactionConfig, TransactionController,
        TransactionKey, TransactionKind, TransactionState, Transmission, TuMessage,
    };
}
