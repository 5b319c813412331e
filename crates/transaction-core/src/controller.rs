/// # Transaction Controller
///
/// The controller owns the transaction table and routes every message to
/// the transaction it belongs to, creating server transactions for new
/// requests from the wire and client transactions for new requests from
/// the TU (RFC 3261 Section 17).
///
/// ## Driving the controller
///
/// The controller does no I/O and reads no clock. Callers feed it:
///
/// - [`process_wire`](TransactionController::process_wire) for messages
///   framed by a transport
/// - [`process_tu`](TransactionController::process_tu) for messages the TU
///   sends
/// - [`process_timers`](TransactionController::process_timers) whenever the
///   deadline reported by [`next_timer`](TransactionController::next_timer)
///   has passed
///
/// and collects the results with
/// [`drain_transmissions`](TransactionController::drain_transmissions) and
/// [`drain_tu`](TransactionController::drain_tu). Every call takes the
/// current time, so tests can run the timers on a virtual clock.
///
/// ## Requests outside any transaction
///
/// - ACK that matches nothing is the ACK for a 2xx; it goes to the TU.
/// - CANCEL for an unknown or terminated INVITE is answered 481.
/// - A request without a To tag that looks like one already in progress
///   under a different branch is a merged request and is answered 482
///   (RFC 3261 Section 8.2.2.2).
/// - When the table is full, new requests are answered 503.
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use strata_sip_core::helpers::{generate_branch, make_response};
use strata_sip_core::{HeaderFieldValue, HeaderName, Method, SipMessage, StatusCode, Tuple};
use tracing::{debug, trace, warn};

use crate::config::TransactionConfig;
use crate::error::{Error, Result};
use crate::event::{Transmission, TuMessage};
use crate::key::TransactionKey;
use crate::timer::TimerQueue;
use crate::transaction::runner::{self, TransactionEvent};
use crate::transaction::{
    Disposition, Effects, MergeKey, Transaction, TransactionKind, TransactionState,
};

/// Seconds advertised in the Retry-After of a 503 sent when the table is full
pub const RETRY_AFTER_SECS: u32 = 5;

/// Transaction table plus the queues between it, the transports and the TU
pub struct TransactionController {
    config: TransactionConfig,
    transactions: HashMap<TransactionKey, Transaction>,
    merges: HashMap<MergeKey, TransactionKey>,
    timers: TimerQueue,
    outbound: VecDeque<Transmission>,
    tu: VecDeque<TuMessage>,
    next_instance: u64,
    notify_termination: bool,
}

impl TransactionController {
    pub fn new(config: TransactionConfig) -> Self {
        Self {
            config,
            transactions: HashMap::new(),
            merges: HashMap::new(),
            timers: TimerQueue::new(),
            outbound: VecDeque::new(),
            tu: VecDeque::new(),
            next_instance: 0,
            notify_termination: false,
        }
    }

    pub fn config(&self) -> &TransactionConfig {
        &self.config
    }

    /// Number of live transactions, lingering INVITE transactions included
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn contains(&self, key: &TransactionKey) -> bool {
        self.transactions.contains_key(key)
    }

    /// Current state of a transaction
    pub fn state(&self, key: &TransactionKey) -> Option<TransactionState> {
        self.transactions.get(key).map(|tx| tx.state)
    }

    pub fn kind(&self, key: &TransactionKey) -> Option<TransactionKind> {
        self.transactions.get(key).map(|tx| tx.kind)
    }

    /// Deliver [`TuMessage::TransactionTerminated`] for every transaction
    /// that leaves the table from now on
    pub fn register_for_transaction_termination(&mut self) {
        self.notify_termination = true;
    }

    /// Earliest pending timer deadline
    pub fn next_timer(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// How long the caller may wait before calling
    /// [`process_timers`](Self::process_timers)
    pub fn time_till_next(&self, now: Instant) -> Option<Duration> {
        self.timers.time_till_next(now)
    }

    /// Messages waiting for a transport, in the order they were produced
    pub fn drain_transmissions(&mut self) -> impl Iterator<Item = Transmission> + '_ {
        self.outbound.drain(..)
    }

    /// Messages waiting for the TU, in the order they were produced
    pub fn drain_tu(&mut self) -> impl Iterator<Item = TuMessage> + '_ {
        self.tu.drain(..)
    }

    pub fn has_transmissions(&self) -> bool {
        !self.outbound.is_empty()
    }

    pub fn has_tu_messages(&self) -> bool {
        !self.tu.is_empty()
    }

    /// Handles a message received from the wire on `source`
    pub fn process_wire(&mut self, mut message: SipMessage, source: Tuple, now: Instant) {
        if message.source().is_none() {
            message.set_source(source);
        }
        if message.is_request() {
            self.process_wire_request(message, source, now);
        } else {
            self.process_wire_response(message, now);
        }
    }

    /// Handles a message from the TU.
    ///
    /// Requests other than ACK and CANCEL start a client transaction towards
    /// `destination`; the key of that transaction is returned. A request
    /// whose top Via has no RFC 3261 branch is given one. Responses are
    /// matched to server transactions, and sent statelessly to
    /// `destination` when none matches.
    pub fn process_tu(
        &mut self,
        message: SipMessage,
        destination: Tuple,
        now: Instant,
    ) -> Result<Option<TransactionKey>> {
        if message.is_response() {
            return self.process_tu_response(message, destination, now);
        }
        match message.method() {
            Some(Method::Ack) => {
                debug!(%destination, "sending ACK statelessly");
                self.send_stateless(message, destination);
                Ok(None)
            }
            Some(Method::Cancel) => self.process_tu_cancel(message, now),
            _ => self.create_client(message, destination, now).map(Some),
        }
    }

    /// Fires every timer due at `now`. Returns how many were live.
    pub fn process_timers(&mut self, now: Instant) -> usize {
        let mut fired = 0;
        while let Some(entry) = self.timers.pop_due(now) {
            let live = self
                .transactions
                .get(&entry.key)
                .map_or(false, |tx| tx.instance == entry.instance);
            if !live {
                trace!(id = %entry.key, timer = %entry.timer, "timer for finished transaction");
                continue;
            }
            trace!(id = %entry.key, timer = %entry.timer, "timer fired");
            fired += 1;
            let event = TransactionEvent::Timer {
                timer: entry.timer,
                duration: entry.duration,
            };
            self.run(&entry.key, event, now);
        }
        fired
    }

    /// The transport could not deliver a message for `key`. Client
    /// transactions report a 503 to the TU; the transaction is removed
    /// either way.
    pub fn transport_failed(&mut self, key: &TransactionKey) {
        let Some(tx) = self.transactions.get(key) else {
            return;
        };
        warn!(id = %key, "transport failure");
        if !tx.kind.is_server() {
            if let Ok(response) = make_response(&tx.request, StatusCode::SERVICE_UNAVAILABLE, None) {
                self.tu.push_back(TuMessage::Sip {
                    message: response,
                    key: Some(key.clone()),
                });
            }
        }
        let held = tx.pending_cancel.clone();
        if let Some(cancel) = held {
            self.respond_to_tu(&cancel, StatusCode::CALL_DOES_NOT_EXIST);
        }
        self.remove(key);
    }

    /// No connection to `peer` could be opened, or it broke. Every live
    /// transaction sending to `peer` fails as in
    /// [`transport_failed`](Self::transport_failed). Returns how many did.
    pub fn peer_failed(&mut self, peer: &Tuple) -> usize {
        let keys: Vec<TransactionKey> = self
            .transactions
            .values()
            .filter(|tx| tx.peer == *peer && tx.state != TransactionState::Terminated)
            .map(|tx| tx.key.clone())
            .collect();
        if !keys.is_empty() {
            warn!(%peer, failed = keys.len(), "peer unreachable");
        }
        for key in &keys {
            self.transport_failed(key);
        }
        keys.len()
    }

    fn process_wire_request(&mut self, request: SipMessage, source: Tuple, now: Instant) {
        let key = match TransactionKey::for_request(&request, true) {
            Ok(key) => key,
            Err(e) => {
                warn!(%source, "dropping request: {}", e);
                return;
            }
        };
        if self.transactions.contains_key(&key) {
            self.run(&key, TransactionEvent::Wire(request), now);
            return;
        }

        match request.method() {
            Some(Method::Ack) => {
                debug!(id = %key, "ACK outside any transaction, passing to TU");
                self.tu.push_back(TuMessage::Sip {
                    message: request,
                    key: None,
                });
            }
            Some(Method::Cancel) => self.process_wire_cancel(key, request, source, now),
            _ => self.create_server(key, request, source, None, now),
        }
    }

    fn process_wire_cancel(
        &mut self,
        key: TransactionKey,
        cancel: SipMessage,
        source: Tuple,
        now: Instant,
    ) {
        let invite_key = key.invite_key();
        match self.transactions.get_mut(&invite_key) {
            Some(invite) if invite.state != TransactionState::Terminated => {
                if invite.state == TransactionState::Trying {
                    invite.suppress_trying = true;
                }
                self.create_server(key, cancel, source, Some(invite_key), now);
            }
            _ => {
                debug!(id = %key, "CANCEL matches no INVITE");
                self.respond_stateless(&cancel, StatusCode::CALL_DOES_NOT_EXIST, source);
            }
        }
    }

    fn process_wire_response(&mut self, response: SipMessage, now: Instant) {
        let key = match TransactionKey::for_response(&response, false) {
            Ok(key) => key,
            Err(e) => {
                warn!("dropping response: {}", e);
                return;
            }
        };
        if self.transactions.contains_key(&key) {
            self.run(&key, TransactionEvent::Wire(response), now);
        } else if self.config.discard_stray_responses {
            debug!(id = %key, "discarding stray {}", response.brief());
        } else {
            self.tu.push_back(TuMessage::Sip {
                message: response,
                key: None,
            });
        }
    }

    fn process_tu_response(
        &mut self,
        response: SipMessage,
        destination: Tuple,
        now: Instant,
    ) -> Result<Option<TransactionKey>> {
        let key = TransactionKey::for_response(&response, true)?;
        if self.transactions.contains_key(&key) {
            self.run(&key, TransactionEvent::Tu(response), now);
            Ok(Some(key))
        } else {
            debug!(id = %key, "no server transaction, sending statelessly");
            self.send_stateless(response, destination);
            Ok(None)
        }
    }

    fn process_tu_cancel(&mut self, cancel: SipMessage, now: Instant) -> Result<Option<TransactionKey>> {
        let key = TransactionKey::for_request(&cancel, false)?;
        let invite_key = key.invite_key();
        let Some(invite) = self.transactions.get_mut(&invite_key) else {
            debug!(id = %key, "CANCEL for unknown INVITE");
            self.respond_to_tu(&cancel, StatusCode::CALL_DOES_NOT_EXIST);
            return Ok(None);
        };

        match invite.state {
            TransactionState::Calling => {
                debug!(id = %invite_key, "holding CANCEL until a provisional arrives");
                invite.pending_cancel = Some(cancel);
                Ok(None)
            }
            TransactionState::Proceeding => {
                let destination = invite.peer;
                self.create_client(cancel, destination, now).map(Some)
            }
            _ => {
                debug!(id = %invite_key, "INVITE already final, answering CANCEL locally");
                self.respond_to_tu(&cancel, StatusCode::OK);
                Ok(None)
            }
        }
    }

    fn create_server(
        &mut self,
        key: TransactionKey,
        request: SipMessage,
        source: Tuple,
        cancels: Option<TransactionKey>,
        now: Instant,
    ) {
        let limit = self.config.max_transactions;
        if self.transactions.len() >= limit {
            warn!(id = %key, limit, "transaction table full, rejecting request");
            self.respond_stateless(&request, StatusCode::SERVICE_UNAVAILABLE, source);
            return;
        }

        let merge = MergeKey::for_request(&request);
        if let Some(merge) = &merge {
            if let Some(existing) = self.merges.get(merge) {
                if *existing != key && self.transactions.contains_key(existing) {
                    debug!(id = %key, existing = %existing, "merged request");
                    self.respond_stateless(&request, StatusCode::LOOP_DETECTED, source);
                    return;
                }
            }
            self.merges.insert(merge.clone(), key.clone());
        }

        let method = key.method.clone();
        let instance = self.next_instance();
        let mut tx = Transaction::new(
            key.clone(),
            instance,
            TransactionKind::for_request(&method, true),
            request,
            source,
        );
        tx.cancels = cancels;
        tx.merge = merge;
        debug!(id = %key, kind = ?tx.kind, %source, "new server transaction");
        self.transactions.insert(key.clone(), tx);
        self.run(&key, TransactionEvent::Start, now);
    }

    fn create_client(
        &mut self,
        mut request: SipMessage,
        destination: Tuple,
        now: Instant,
    ) -> Result<TransactionKey> {
        let via = request.top_via().map_err(|_| Error::NoTransactionId)?;
        if !via.is_rfc3261() {
            let via = via.clone().with_branch(generate_branch());
            request.set_top_via(via)?;
        }
        let key = TransactionKey::for_request(&request, false)?;
        if self.transactions.contains_key(&key) {
            return Err(Error::TransactionExists(key));
        }
        let limit = self.config.max_transactions;
        if self.transactions.len() >= limit {
            return Err(Error::TooManyTransactions { limit });
        }

        let method = key.method.clone();
        let instance = self.next_instance();
        let tx = Transaction::new(
            key.clone(),
            instance,
            TransactionKind::for_request(&method, false),
            request,
            destination,
        );
        debug!(id = %key, kind = ?tx.kind, %destination, "new client transaction");
        self.transactions.insert(key.clone(), tx);
        self.run(&key, TransactionEvent::Start, now);
        Ok(key)
    }

    /// Feeds `event` to the transaction and applies what it asked for
    fn run(&mut self, key: &TransactionKey, event: TransactionEvent, now: Instant) {
        let Some(tx) = self.transactions.get_mut(key) else {
            return;
        };
        let mut spawned = Vec::new();
        let disposition = {
            let mut fx = Effects::new(
                now,
                self.config.timers,
                &mut self.timers,
                &mut self.outbound,
                &mut self.tu,
                &mut spawned,
            );
            runner::run(tx, event, &mut fx)
        };

        if disposition == Disposition::Terminate {
            self.remove(key);
        }
        for (request, destination) in spawned {
            if let Err(e) = self.create_client(request, destination, now) {
                warn!(id = %key, "cannot start client transaction: {}", e);
            }
        }
    }

    fn remove(&mut self, key: &TransactionKey) {
        let Some(tx) = self.transactions.remove(key) else {
            return;
        };
        if let Some(merge) = &tx.merge {
            if self.merges.get(merge) == Some(key) {
                self.merges.remove(merge);
            }
        }
        debug!(id = %key, state = ?tx.state, "transaction removed");
        if self.notify_termination {
            self.tu
                .push_back(TuMessage::TransactionTerminated { key: key.clone() });
        }
    }

    fn next_instance(&mut self) -> u64 {
        self.next_instance += 1;
        self.next_instance
    }

    fn send_stateless(&mut self, message: SipMessage, destination: Tuple) {
        self.outbound.push_back(Transmission {
            message,
            destination,
            key: None,
        });
    }

    /// Answers a request from the wire without creating a transaction
    fn respond_stateless(&mut self, request: &SipMessage, code: StatusCode, source: Tuple) {
        match make_response(request, code, None) {
            Ok(mut response) => {
                if code == StatusCode::SERVICE_UNAVAILABLE {
                    response.set_header(HeaderName::RetryAfter, HeaderFieldValue::new(RETRY_AFTER_SECS));
                }
                self.send_stateless(response, source);
            }
            Err(e) => warn!(%source, "cannot build {} response: {}", code, e),
        }
    }

    /// Hands the TU a locally generated response to one of its own requests
    fn respond_to_tu(&mut self, request: &SipMessage, code: StatusCode) {
        match make_response(request, code, None) {
            Ok(response) => self.tu.push_back(TuMessage::Sip {
                message: response,
                key: None,
            }),
            Err(e) => warn!("cannot build {} response: {}", code, e),
        }
    }
}
