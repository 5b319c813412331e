//! INVITE client transaction (RFC 3261 Section 17.1.1)
//!
//! ```text
//!              Calling --1xx--> Proceeding
//!                 |                 |
//!                 +---- 300-699 ----+--> Completed --Timer D--> gone
//!                 |                 |
//!                 +------ 2xx ------+--> Terminated --Timer Stale--> gone
//! ```

use std::time::Duration;

use strata_sip_core::helpers::make_failure_ack;
use strata_sip_core::{SipMessage, StatusCode};
use tracing::{debug, trace, warn};

use super::runner::TransactionLogic;
use super::{Disposition, Effects, Transaction, TransactionState};
use crate::timer::TimerType;

pub(crate) struct ClientInviteLogic;

impl TransactionLogic for ClientInviteLogic {
    fn start(&self, tx: &mut Transaction, fx: &mut Effects<'_>) -> Disposition {
        let timers = fx.timers;
        fx.send(tx, tx.request.clone());
        if !tx.reliable {
            fx.start_timer(tx, TimerType::A, timers.t1);
        }
        fx.start_timer(tx, TimerType::B, timers.timer_b());
        Disposition::Keep
    }

    fn process_message(
        &self,
        tx: &mut Transaction,
        response: SipMessage,
        fx: &mut Effects<'_>,
    ) -> Disposition {
        let Some(code) = response.status() else {
            return Disposition::Keep;
        };
        let timers = fx.timers;

        match tx.state {
            TransactionState::Calling | TransactionState::Proceeding => {
                if code.is_provisional() {
                    if tx.state == TransactionState::Calling {
                        tx.transition(TransactionState::Proceeding);
                        if let Some(cancel) = tx.pending_cancel.take() {
                            debug!(id = %tx.key, "sending held CANCEL");
                            fx.start_client(cancel, tx.peer);
                        }
                    }
                    fx.to_tu(tx, response);
                    return Disposition::Keep;
                }
                // a CANCEL still held here can no longer be sent
                if let Some(cancel) = tx.pending_cancel.take() {
                    debug!(id = %tx.key, "final response before CANCEL was sent");
                    fx.answer_locally(&cancel, StatusCode::OK);
                }
                if code.is_success() {
                    // the TU acknowledges a 2xx end to end
                    tx.transition(TransactionState::Terminated);
                    fx.to_tu(tx, response);
                    fx.start_timer(tx, TimerType::Stale, timers.stale);
                    Disposition::Keep
                } else {
                    match make_failure_ack(&tx.request, &response) {
                        Ok(ack) => {
                            fx.send(tx, ack.clone());
                            tx.ack = Some(ack);
                        }
                        Err(e) => warn!(id = %tx.key, "cannot build ACK: {}", e),
                    }
                    tx.transition(TransactionState::Completed);
                    fx.to_tu(tx, response);
                    let timer_d = timers.timer_d(tx.reliable);
                    if timer_d.is_zero() {
                        return Disposition::Terminate;
                    }
                    fx.start_timer(tx, TimerType::D, timer_d);
                    Disposition::Keep
                }
            }
            TransactionState::Completed => {
                if code.is_failure() {
                    trace!(id = %tx.key, "final response retransmitted, resending ACK");
                    if let Some(ack) = &tx.ack {
                        fx.send(tx, ack.clone());
                    }
                }
                Disposition::Keep
            }
            TransactionState::Terminated => {
                if code.is_success() {
                    trace!(id = %tx.key, "2xx retransmission");
                    fx.to_tu(tx, response);
                }
                Disposition::Keep
            }
            state => {
                debug!(id = %tx.key, ?state, "ignoring response");
                Disposition::Keep
            }
        }
    }

    fn process_tu_message(
        &self,
        tx: &mut Transaction,
        message: SipMessage,
        _fx: &mut Effects<'_>,
    ) -> Disposition {
        debug!(id = %tx.key, "ignoring {} from TU", message.brief());
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
            (TimerType::A, TransactionState::Calling) => {
                trace!(id = %tx.key, "retransmitting INVITE");
                fx.send(tx, tx.request.clone());
                fx.start_timer(tx, TimerType::A, timers.backoff(duration));
                Disposition::Keep
            }
            (TimerType::B, TransactionState::Calling) => {
                fx.timeout(tx, TimerType::B);
                fx.synthetic_response(tx, StatusCode::REQUEST_TIMEOUT);
                if let Some(cancel) = tx.pending_cancel.take() {
                    fx.answer_locally(&cancel, StatusCode::CALL_DOES_NOT_EXIST);
                }
                Disposition::Terminate
            }
            (TimerType::D, TransactionState::Completed)
            | (TimerType::Stale, TransactionState::Terminated) => Disposition::Terminate,
            _ => Disposition::Keep,
        }
    }
}
