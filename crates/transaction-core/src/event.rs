//! What the controller hands to the TU and to the transports

use strata_sip_core::{SipMessage, Tuple};

use crate::key::TransactionKey;
use crate::timer::TimerType;

/// Message delivered to the Transaction User
#[derive(Debug, Clone)]
pub enum TuMessage {
    /// A request or response. `key` is the transaction the message was
    /// matched to, or for an inbound CANCEL the INVITE it cancels. It is
    /// `None` for messages handled outside any transaction, such as an ACK
    /// for a 2xx that arrives after the INVITE transaction is gone.
    Sip {
        message: SipMessage,
        key: Option<TransactionKey>,
    },
    /// Timer B, F or H fired before the transaction completed
    Timeout {
        key: TransactionKey,
        timer: TimerType,
        request: SipMessage,
    },
    /// A transaction left the table. Only delivered after
    /// [`register_for_transaction_termination`](crate::TransactionController::register_for_transaction_termination).
    TransactionTerminated { key: TransactionKey },
}

impl TuMessage {
    pub fn sip(&self) -> Option<&SipMessage> {
        match self {
            TuMessage::Sip { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn into_sip(self) -> Option<SipMessage> {
        match self {
            TuMessage::Sip { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// A message the controller wants put on the wire
#[derive(Debug, Clone)]
pub struct Transmission {
    pub message: SipMessage,
    pub destination: Tuple,
    /// Transaction that sent it; `None` for stateless sends
    pub key: Option<TransactionKey>,
}
