//! Non-INVITE server transaction (RFC 3261 Section 17.2.2)

use std::time::Duration;

use strata_sip_core::SipMessage;
use tracing::{debug, trace, warn};

use super::runner::TransactionLogic;
use super::{Disposition, Effects, Transaction, TransactionState};
use crate::timer::TimerType;

pub(crate) struct ServerNonInviteLogic;

impl TransactionLogic for ServerNonInviteLogic {
    fn start(&self, tx: &mut Transaction, fx: &mut Effects<'_>) -> Disposition {
        fx.to_tu(tx, tx.request.clone());
        Disposition::Keep
    }

    fn process_message(
        &self,
        tx: &mut Transaction,
        _request: SipMessage,
        fx: &mut Effects<'_>,
    ) -> Disposition {
        match (tx.state, &tx.last_response) {
            (TransactionState::Proceeding | TransactionState::Completed, Some(response)) => {
                trace!(id = %tx.key, "request retransmitted, resending {}", response.brief());
                fx.send(tx, response.clone());
            }
            _ => trace!(id = %tx.key, state = ?tx.state, "absorbing request retransmission"),
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
        if !matches!(tx.state, TransactionState::Trying | TransactionState::Proceeding) {
            warn!(id = %tx.key, state = ?tx.state, "dropping {} from TU", response.brief());
            return Disposition::Keep;
        }

        fx.send(tx, response.clone());
        tx.last_response = Some(response);
        if code.is_provisional() {
            if tx.state == TransactionState::Trying {
                tx.transition(TransactionState::Proceeding);
            }
            return Disposition::Keep;
        }

        tx.transition(TransactionState::Completed);
        let timer_j = fx.timers.timer_j(tx.reliable);
        if timer_j.is_zero() {
            return Disposition::Terminate;
        }
        fx.start_timer(tx, TimerType::J, timer_j);
        Disposition::Keep
    }

    fn handle_timer(
        &self,
        tx: &mut Transaction,
        timer: TimerType,
        _duration: Duration,
        _fx: &mut Effects<'_>,
    ) -> Disposition {
        match (timer, tx.state) {
            (TimerType::J, TransactionState::Completed) => Disposition::Terminate,
            _ => Disposition::Keep,
        }
    }
}
