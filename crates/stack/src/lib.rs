//! The strata SIP stack executive
//!
//! [`SipStack`] ties the layers together: transports deliver framed
//! messages, the [`TransactionController`](strata_transaction_core::TransactionController)
//! matches them and runs the RFC 3261 timers, and the Transaction User
//! exchanges messages with the stack through a pair of queues.
//!
//! Two ways to drive it:
//!
//! - single-threaded: call [`SipStack::process`] in a loop and wait at most
//!   [`SipStack::time_till_next_process`] between calls, or await
//!   [`SipStack::run`]
//! - multi-threaded: [`StackThread::spawn`] moves the stack onto a task and
//!   the TU uses the blocking [`StackHandle::receive_timeout`]
//!
//! ```rust
//! use std::time::Instant;
//! use strata_stack::{SipStack, StackConfig};
//! use strata_sip_core::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> strata_stack::Result<()> {
//! let mut stack = SipStack::new(StackConfig::default())?;
//! let mut request = SipMessage::new_request(Method::Options, Uri::sip("example.com"));
//! request.push_via(Via::new("UDP", "client.example.com", None));
//! request.append_header(HeaderName::From, HeaderFieldValue::text_value("<sip:a@example.com>;tag=1"));
//! request.append_header(HeaderName::To, HeaderFieldValue::text_value("<sip:b@example.com>"));
//! request.append_header(HeaderName::CallId, HeaderFieldValue::text_value("doc-1"));
//! request.append_header(HeaderName::CSeq, HeaderFieldValue::new(CSeq::new(1, Method::Options)));
//!
//! // no UDP transport was added, so the transaction fails and the TU gets a 503
//! let next_hop = Tuple::udp("192.0.2.1:5060".parse().unwrap());
//! stack.send_to(request, next_hop)?;
//! stack.process(Instant::now()).await;
//! assert_eq!(stack.receive().unwrap().status(), Some(StatusCode::SERVICE_UNAVAILABLE));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod stack;
pub mod thread;

pub use config::{StackConfig, DEFAULT_CHANNEL_CAPACITY, DEFAULT_GC_INTERVAL};
pub use error::{Error, Result};
pub use stack::{SipStack, StackHandle};
pub use thread::StackThread;

/// Re-export of common types for easier use
pub mod prelude {
    pub use crate::{Error, Result, SipStack, StackConfig, StackHandle, StackThread};
    pub use strata_transaction_core::{TransactionKey, TuMessage};
}
