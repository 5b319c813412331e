/// # Transaction Runner
///
/// Routes events to the state machine that owns a transaction. Each of the
/// four machines implements [`TransactionLogic`]; the runner picks the
/// implementation from the transaction's [`TransactionKind`] so the
/// controller never needs to know which machine it is driving.
///
/// Every handler returns a [`Disposition`]. `Terminate` asks the controller
/// to drop the transaction from its table, which also makes all of its
/// outstanding timers inert.
use std::time::Duration;

use strata_sip_core::SipMessage;

use super::client_invite::ClientInviteLogic;
use super::client_non_invite::ClientNonInviteLogic;
use super::server_invite::ServerInviteLogic;
use super::server_non_invite::ServerNonInviteLogic;
use super::{Disposition, Effects, Transaction, TransactionKind};
use crate::timer::TimerType;

/// Behaviour of one RFC 3261 transaction state machine
pub(crate) trait TransactionLogic {
    /// Initial actions of a freshly created transaction
    fn start(&self, tx: &mut Transaction, fx: &mut Effects<'_>) -> Disposition;

    /// A message from the wire matched this transaction
    fn process_message(&self, tx: &mut Transaction, message: SipMessage, fx: &mut Effects<'_>)
        -> Disposition;

    /// The TU sent a message through this transaction
    fn process_tu_message(
        &self,
        tx: &mut Transaction,
        message: SipMessage,
        fx: &mut Effects<'_>,
    ) -> Disposition;

    /// A timer armed by this transaction fired. `duration` is the interval
    /// it was armed with.
    fn handle_timer(
        &self,
        tx: &mut Transaction,
        timer: TimerType,
        duration: Duration,
        fx: &mut Effects<'_>,
    ) -> Disposition;
}

/// An input for a transaction
pub(crate) enum TransactionEvent {
    Start,
    Wire(SipMessage),
    Tu(SipMessage),
    Timer { timer: TimerType, duration: Duration },
}

fn logic_for(kind: TransactionKind) -> &'static dyn TransactionLogic {
    match kind {
        TransactionKind::ClientInvite => &ClientInviteLogic,
        TransactionKind::ClientNonInvite => &ClientNonInviteLogic,
        TransactionKind::ServerInvite => &ServerInviteLogic,
        TransactionKind::ServerNonInvite => &ServerNonInviteLogic,
    }
}

/// Feeds one event to the transaction's state machine
pub(crate) fn run(tx: &mut Transaction, event: TransactionEvent, fx: &mut Effects<'_>) -> Disposition {
    let logic = logic_for(tx.kind);
    match event {
        TransactionEvent::Start => logic.start(tx, fx),
        TransactionEvent::Wire(message) => logic.process_message(tx, message, fx),
        TransactionEvent::Tu(message) => logic.process_tu_message(tx, message, fx),
        TransactionEvent::Timer { timer, duration } => logic.handle_timer(tx, timer, duration, fx),
    }
}
