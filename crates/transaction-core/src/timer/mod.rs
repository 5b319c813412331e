//! Transaction timers
//!
//! Timers are entries in a single [`TimerQueue`] owned by the controller.
//! They are never removed when a transaction changes state; instead every
//! entry names the transaction instance that armed it, and the state
//! machine ignores a timer that no longer applies when it fires.

pub mod queue;
pub mod settings;

use std::fmt;

pub use queue::{TimerEntry, TimerQueue};
pub use settings::TimerSettings;

/// RFC 3261 transaction timers, plus the 100 Trying and linger timers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerType {
    /// INVITE request retransmit (client INVITE, Calling)
    A,
    /// INVITE transaction timeout
    B,
    /// Wait for response retransmits (client INVITE, Completed)
    D,
    /// Non-INVITE request retransmit while Trying
    E1,
    /// Non-INVITE request retransmit while Proceeding
    E2,
    /// Non-INVITE transaction timeout
    F,
    /// INVITE final response retransmit (server INVITE, Completed)
    G,
    /// Wait for ACK receipt
    H,
    /// Wait for ACK retransmits
    I,
    /// Wait for non-INVITE request retransmits
    J,
    /// Wait for non-INVITE response retransmits
    K,
    /// Automatic 100 Trying for a server INVITE
    Trying,
    /// End of the post-2xx linger period
    Stale,
}

impl fmt::Display for TimerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimerType::A => "Timer A",
            TimerType::B => "Timer B",
            TimerType::D => "Timer D",
            TimerType::E1 => "Timer E1",
            TimerType::E2 => "Timer E2",
            TimerType::F => "Timer F",
            TimerType::G => "Timer G",
            TimerType::H => "Timer H",
            TimerType::I => "Timer I",
            TimerType::J => "Timer J",
            TimerType::K => "Timer K",
            TimerType::Trying => "Timer 100",
            TimerType::Stale => "Timer Stale",
        };
        f.write_str(name)
    }
}
