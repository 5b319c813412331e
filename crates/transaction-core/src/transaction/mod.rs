/// # Transaction State Machines
///
/// The four RFC 3261 Section 17 state machines, one module each:
///
/// 1. **INVITE Client Transaction** (Section 17.1.1)
/// 2. **Non-INVITE Client Transaction** (Section 17.1.2)
/// 3. **INVITE Server Transaction** (Section 17.2.1)
/// 4. **Non-INVITE Server Transaction** (Section 17.2.2)
///
/// A machine never performs I/O. It mutates its [`Transaction`] record and
/// records what should happen next in an [`Effects`] value: messages for
/// the wire, messages for the TU, timers to arm, and client requests to
/// start. The controller applies those effects after the machine returns.
///
/// ## INVITE transactions after a 2xx
///
/// RFC 3261 terminates an INVITE transaction as soon as a 2xx passes
/// through it. Both INVITE machines instead enter Terminated and linger in
/// the table for [`TimerSettings::stale`]: the client forwards 2xx
/// retransmissions to the TU, the server forwards the matching ACK to the
/// TU and passes TU 2xx retransmissions to the wire.
mod client_invite;
mod client_non_invite;
pub(crate) mod runner;
mod server_invite;
mod server_non_invite;

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use strata_sip_core::helpers::make_response;
use strata_sip_core::{Method, SipMessage, StatusCode, Tuple};
use tracing::{debug, warn};

use crate::event::{Transmission, TuMessage};
use crate::key::TransactionKey;
use crate::timer::{TimerQueue, TimerSettings, TimerType};

/// Which of the four state machines drives a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    ClientInvite,
    ClientNonInvite,
    ServerInvite,
    ServerNonInvite,
}

impl TransactionKind {
    pub fn for_request(method: &Method, is_server: bool) -> Self {
        match (is_server, method.is_invite()) {
            (false, true) => TransactionKind::ClientInvite,
            (false, false) => TransactionKind::ClientNonInvite,
            (true, true) => TransactionKind::ServerInvite,
            (true, false) => TransactionKind::ServerNonInvite,
        }
    }

    pub fn is_server(&self) -> bool {
        matches!(self, TransactionKind::ServerInvite | TransactionKind::ServerNonInvite)
    }

    pub fn is_invite(&self) -> bool {
        matches!(self, TransactionKind::ClientInvite | TransactionKind::ServerInvite)
    }

    /// State a new transaction of this kind starts in
    pub fn initial_state(&self) -> TransactionState {
        match self {
            TransactionKind::ClientInvite => TransactionState::Calling,
            _ => TransactionState::Trying,
        }
    }
}

/// Transaction states across all four machines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    /// Client INVITE, request sent, no response yet
    Calling,
    /// Non-INVITE transactions before any response, and a server INVITE
    /// before its first provisional
    Trying,
    Proceeding,
    Completed,
    /// Server INVITE, ACK received for a failure response
    Confirmed,
    /// Finished; INVITE transactions linger here after a 2xx
    Terminated,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What the controller does with a transaction after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    Keep,
    Terminate,
}

/// (From tag, Call-ID, CSeq number, CSeq method) of a request without a
/// To tag, used to detect merged requests (RFC 3261 Section 8.2.2.2)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct MergeKey {
    from_tag: String,
    call_id: String,
    seq: u32,
    method: Method,
}

impl MergeKey {
    pub(crate) fn for_request(request: &SipMessage) -> Option<Self> {
        if request.to_tag().is_some() {
            return None;
        }
        let cseq = request.cseq().ok()?;
        Some(Self {
            from_tag: request.from_tag()?.to_string(),
            call_id: request.call_id().ok()?.to_string(),
            seq: cseq.seq,
            method: cseq.method.clone(),
        })
    }
}

/// Per-transaction record owned by the controller's table
#[derive(Debug)]
pub(crate) struct Transaction {
    pub key: TransactionKey,
    /// Distinguishes this transaction from earlier ones with the same key
    pub instance: u64,
    pub kind: TransactionKind,
    pub state: TransactionState,
    pub reliable: bool,
    /// Next hop for client transactions, request source for server ones
    pub peer: Tuple,
    pub request: SipMessage,
    /// Server side: last response sent, retransmitted on duplicates
    pub last_response: Option<SipMessage>,
    /// Client INVITE: ACK sent for a failure response
    pub ack: Option<SipMessage>,
    /// Client INVITE: CANCEL waiting for the first provisional
    pub pending_cancel: Option<SipMessage>,
    /// Server INVITE: a CANCEL arrived, skip the automatic 100
    pub suppress_trying: bool,
    /// Server CANCEL: the INVITE it cancels
    pub cancels: Option<TransactionKey>,
    pub merge: Option<MergeKey>,
}

impl Transaction {
    pub fn new(
        key: TransactionKey,
        instance: u64,
        kind: TransactionKind,
        request: SipMessage,
        peer: Tuple,
    ) -> Self {
        Self {
            key,
            instance,
            kind,
            state: kind.initial_state(),
            reliable: peer.is_reliable(),
            peer,
            request,
            last_response: None,
            ack: None,
            pending_cancel: None,
            suppress_trying: false,
            cancels: None,
            merge: None,
        }
    }

    pub fn transition(&mut self, to: TransactionState) {
        debug!(id = %self.key, from = ?self.state, to = ?to, "state transition");
        self.state = to;
    }

    /// Key reported to the TU with messages from this transaction
    fn tu_key(&self) -> TransactionKey {
        self.cancels.clone().unwrap_or_else(|| self.key.clone())
    }
}

/// Side effects collected while a state machine handles one event
pub(crate) struct Effects<'a> {
    pub now: Instant,
    pub timers: TimerSettings,
    queue: &'a mut TimerQueue,
    wire: &'a mut VecDeque<Transmission>,
    tu: &'a mut VecDeque<TuMessage>,
    spawned: &'a mut Vec<(SipMessage, Tuple)>,
}

impl<'a> Effects<'a> {
    pub fn new(
        now: Instant,
        timers: TimerSettings,
        queue: &'a mut TimerQueue,
        wire: &'a mut VecDeque<Transmission>,
        tu: &'a mut VecDeque<TuMessage>,
        spawned: &'a mut Vec<(SipMessage, Tuple)>,
    ) -> Self {
        Self { now, timers, queue, wire, tu, spawned }
    }

    /// Queues `message` for the transaction's peer
    pub fn send(&mut self, tx: &Transaction, message: SipMessage) {
        self.wire.push_back(Transmission {
            message,
            destination: tx.peer,
            key: Some(tx.key.clone()),
        });
    }

    pub fn start_timer(&mut self, tx: &Transaction, timer: TimerType, duration: Duration) {
        self.queue.add(tx.key.clone(), tx.instance, timer, duration, self.now);
    }

    pub fn to_tu(&mut self, tx: &Transaction, message: SipMessage) {
        self.tu.push_back(TuMessage::Sip {
            message,
            key: Some(tx.tu_key()),
        });
    }

    /// Reports a transaction timeout to the TU
    pub fn timeout(&mut self, tx: &Transaction, timer: TimerType) {
        warn!(id = %tx.key, %timer, "transaction timed out");
        self.tu.push_back(TuMessage::Timeout {
            key: tx.key.clone(),
            timer,
            request: tx.request.clone(),
        });
    }

    /// Hands the TU a locally generated response to the transaction's request
    pub fn synthetic_response(&mut self, tx: &Transaction, code: StatusCode) {
        match make_response(&tx.request, code, None) {
            Ok(response) => self.to_tu(tx, response),
            Err(e) => warn!(id = %tx.key, "cannot build {} response: {}", code, e),
        }
    }

    /// Hands the TU a response to a request that never got a transaction
    /// of its own, such as a CANCEL held for an INVITE
    pub fn answer_locally(&mut self, request: &SipMessage, code: StatusCode) {
        match make_response(request, code, None) {
            Ok(response) => self.tu.push_back(TuMessage::Sip {
                message: response,
                key: None,
            }),
            Err(e) => warn!("cannot build {} response: {}", code, e),
        }
    }

    /// Asks the controller to start a new client transaction
    pub fn start_client(&mut self, request: SipMessage, destination: Tuple) {
        self.spawned.push((request, destination));
    }
}
