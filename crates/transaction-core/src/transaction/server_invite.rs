//! INVITE server transaction (RFC 3261 Section 17.2.1)
//!
//! The transaction starts in Trying with a 100 Trying prepared. If the TU
//! has not answered within T100 the 100 goes out on its own. Failure
//! responses are retransmitted on Timer G until the ACK arrives or Timer H
//! gives up; 2xx responses leave the transaction lingering in Terminated
//! so the end-to-end ACK and TU retransmissions can still pass through.

use std::time::Duration;

use strata_sip_core::helpers::make_response;
use strata_sip_core::{Method, SipMessage, StatusCode};
use tracing::{debug, trace, warn};

use super::runner::TransactionLogic;
use super::{Disposition, Effects, Transaction, TransactionState};
use crate::timer::TimerType;

pub(crate) struct ServerInviteLogic;

impl ServerInviteLogic {
    fn resend_last_response(tx: &Transaction, fx: &mut Effects<'_>) {
        if let Some(response) = &tx.last_response {
            trace!(id = %tx.key, "resending {}", response.brief());
            fx.send(tx, response.clone());
        }
    }

    fn process_ack(tx: &mut Transaction, ack: SipMessage, fx: &mut Effects<'_>) -> Disposition {
        match tx.state {
            TransactionState::Completed => {
                let timer_i = fx.timers.timer_i(tx.reliable);
                if timer_i.is_zero() {
                    return Disposition::Terminate;
                }
                tx.transition(TransactionState::Confirmed);
                fx.start_timer(tx, TimerType::I, timer_i);
                Disposition::Keep
            }
            TransactionState::Terminated => {
                // ACK for a 2xx belongs to the dialog
                fx.to_tu(tx, ack);
                Disposition::Keep
            }
            state => {
                trace!(id = %tx.key, ?state, "absorbing ACK");
                Disposition::Keep
            }
        }
    }
}

impl TransactionLogic for ServerInviteLogic {
    fn start(&self, tx: &mut Transaction, fx: &mut Effects<'_>) -> Disposition {
        match make_response(&tx.request, StatusCode::TRYING, None) {
            Ok(trying) => tx.last_response = Some(trying),
            Err(e) => warn!(id = %tx.key, "cannot build 100 Trying: {}", e),
        }
        let t100 = fx.timers.t100;
        fx.to_tu(tx, tx.request.clone());
        if !tx.suppress_trying {
            fx.start_timer(tx, TimerType::Trying, t100);
        }
        Disposition::Keep
    }

    fn process_message(
        &self,
        tx: &mut Transaction,
        request: SipMessage,
        fx: &mut Effects<'_>,
    ) -> Disposition {
        if request.method() == Some(&Method::Ack) {
            return Self::process_ack(tx, request, fx);
        }

        match tx.state {
            TransactionState::Trying => {
                if !tx.suppress_trying && tx.last_response.is_some() {
                    Self::resend_last_response(tx, fx);
                    tx.transition(TransactionState::Proceeding);
                }
            }
            TransactionState::Proceeding | TransactionState::Completed => {
                Self::resend_last_response(tx, fx);
            }
            state => trace!(id = %tx.key, ?state, "absorbing INVITE retransmission"),
        }
        Disposition::Keep
    }

    fn process_tu_message(
        &self,
        tx: &mut Transaction,
        response: SipMessage,
        fx: &mut Effects<'_>,
    ) -> Disposition {
        let Some(code) = response.status() else {
            debug!(id = %tx.key, "ignoring {} from TU", response.brief());
            return Disposition::Keep;
        };
        let timers = fx.timers;

        match tx.state {
            TransactionState::Trying | TransactionState::Proceeding => {
                fx.send(tx, response.clone());
                tx.last_response = Some(response);
                if code.is_provisional() {
                    if tx.state == TransactionState::Trying {
                        tx.transition(TransactionState::Proceeding);
                    }
                } else if code.is_success() {
                    tx.transition(TransactionState::Terminated);
                    fx.start_timer(tx, TimerType::Stale, timers.stale);
                } else {
                    tx.transition(TransactionState::Completed);
                    if !tx.reliable {
                        fx.start_timer(tx, TimerType::G, timers.t1);
                    }
                    fx.start_timer(tx, TimerType::H, timers.timer_h());
                }
            }
            TransactionState::Terminated if code.is_success() => {
                trace!(id = %tx.key, "passing 2xx retransmission");
                fx.send(tx, response);
            }
            state => {
                warn!(id = %tx.key, ?state, "dropping {} from TU", response.brief());
            }
        }
        Disposition::Keep
    }

    fn handle_timer(
        &self,
        tx: &mut Transaction,
        timer: TimerType,
        duration: Duration,
        fx: &mut Effects<'_>,
    ) -> Disposition {
        let timers = fx.timers;
        match (timer, tx.state) {
            (TimerType::Trying, TransactionState::Trying) if !tx.suppress_trying => {
                Self::resend_last_response(tx, fx);
                tx.transition(TransactionState::Proceeding);
                Disposition::Keep
            }
            (TimerType::G, TransactionState::Completed) => {
                Self::resend_last_response(tx, fx);
                fx.start_timer(tx, TimerType::G, timers.backoff(duration));
                Disposition::Keep
            }
            (TimerType::H, TransactionState::Completed) => {
                fx.timeout(tx, TimerType::H);
                Disposition::Terminate
            }
            (TimerType::I, TransactionState::Confirmed)
            | (TimerType::Stale, TransactionState::Terminated) => Disposition::Terminate,
            _ => Disposition::Keep,
        }
    }
}
