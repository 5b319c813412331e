//! Non-INVITE client transaction (RFC 3261 Section 17.1.2)
//!
//! Over unreliable transports the request is retransmitted on Timer E:
//! doubling from T1 up to T2 while Trying, every T2 once a provisional
//! response has arrived.

use std::time::Duration;

use strata_sip_core::{SipMessage, StatusCode};
use tracing::{debug, trace};

use super::runner::TransactionLogic;
use super::{Disposition, Effects, Transaction, TransactionState};
use crate::timer::TimerType;

pub(crate) struct ClientNonInviteLogic;

impl TransactionLogic for ClientNonInviteLogic {
    fn start(&self, tx: &mut Transaction, fx: &mut Effects<'_>) -> Disposition {
        let timers = fx.timers;
        fx.send(tx, tx.request.clone());
        if !tx.reliable {
            fx.start_timer(tx, TimerType::E1, timers.t1);
        }
        fx.start_timer(tx, TimerType::F, timers.timer_f());
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
            TransactionState::Trying | TransactionState::Proceeding => {
                if code.is_provisional() {
                    if tx.state == TransactionState::Trying {
                        tx.transition(TransactionState::Proceeding);
                        if !tx.reliable {
                            fx.start_timer(tx, TimerType::E2, timers.t2);
                        }
                    }
                    fx.to_tu(tx, response);
                    return Disposition::Keep;
                }
                tx.transition(TransactionState::Completed);
                fx.to_tu(tx, response);
                let timer_k = timers.timer_k(tx.reliable);
                if timer_k.is_zero() {
                    return Disposition::Terminate;
                }
                fx.start_timer(tx, TimerType::K, timer_k);
                Disposition::Keep
            }
            TransactionState::Completed => {
                trace!(id = %tx.key, "absorbing response retransmission");
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
            (TimerType::E1, TransactionState::Trying) => {
                trace!(id = %tx.key, ?duration, "retransmitting request");
                fx.send(tx, tx.request.clone());
                fx.start_timer(tx, TimerType::E1, timers.backoff(duration));
                Disposition::Keep
            }
            (TimerType::E2, TransactionState::Proceeding) => {
                trace!(id = %tx.key, "retransmitting request");
                fx.send(tx, tx.request.clone());
                fx.start_timer(tx, TimerType::E2, timers.t2);
                Disposition::Keep
            }
            (TimerType::F, TransactionState::Trying | TransactionState::Proceeding) => {
                fx.timeout(tx, TimerType::F);
                fx.synthetic_response(tx, StatusCode::REQUEST_TIMEOUT);
                Disposition::Terminate
            }
            (TimerType::K, TransactionState::Completed) => Disposition::Terminate,
            _ => Disposition::Keep,
        }
    }
}
