//! RFC 3261 timer values
//!
//! The base values T1, T2 and T4 come from RFC 3261 Section 17.1.1.1 and
//! Table 4; every transaction timer is derived from them. Timers D, I, J
//! and K collapse to zero on reliable transports, since a reliable
//! transport never delivers retransmissions that would need absorbing.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Base timer values for the transaction layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerSettings {
    /// RTT estimate (500 ms)
    pub t1: Duration,
    /// Maximum retransmit interval for non-INVITE requests and INVITE
    /// responses (4 s)
    pub t2: Duration,
    /// Maximum duration a message remains in the network (5 s)
    pub t4: Duration,
    /// Delay before a server INVITE transaction answers 100 Trying on its
    /// own (200 ms)
    pub t100: Duration,
    /// Wait time for response retransmits in a client INVITE transaction
    /// over unreliable transports (32 s)
    pub timer_d: Duration,
    /// How long an INVITE transaction lingers in Terminated after a 2xx (32 s)
    pub stale: Duration,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            t1: Duration::from_millis(500),
            t2: Duration::from_secs(4),
            t4: Duration::from_secs(5),
            t100: Duration::from_millis(200),
            timer_d: Duration::from_secs(32),
            stale: Duration::from_secs(32),
        }
    }
}

impl TimerSettings {
    pub fn with_t1(mut self, t1: Duration) -> Self {
        self.t1 = t1;
        self
    }

    pub fn with_t2(mut self, t2: Duration) -> Self {
        self.t2 = t2;
        self
    }

    pub fn with_t4(mut self, t4: Duration) -> Self {
        self.t4 = t4;
        self
    }

    pub fn with_t100(mut self, t100: Duration) -> Self {
        self.t100 = t100;
        self
    }

    pub fn with_stale(mut self, stale: Duration) -> Self {
        self.stale = stale;
        self
    }

    /// Next retransmit interval after `current`: doubled, capped at T2
    pub fn backoff(&self, current: Duration) -> Duration {
        (current * 2).min(self.t2)
    }

    /// INVITE transaction timeout (64*T1)
    pub fn timer_b(&self) -> Duration {
        self.t1 * 64
    }

    /// Non-INVITE transaction timeout (64*T1)
    pub fn timer_f(&self) -> Duration {
        self.t1 * 64
    }

    /// Wait time for ACK receipt (64*T1)
    pub fn timer_h(&self) -> Duration {
        self.t1 * 64
    }

    pub fn timer_d(&self, reliable: bool) -> Duration {
        if reliable {
            Duration::ZERO
        } else {
            self.timer_d
        }
    }

    /// Wait time for ACK retransmits
    pub fn timer_i(&self, reliable: bool) -> Duration {
        if reliable {
            Duration::ZERO
        } else {
            self.t4
        }
    }

    /// Wait time for non-INVITE request retransmits
    pub fn timer_j(&self, reliable: bool) -> Duration {
        if reliable {
            Duration::ZERO
        } else {
            self.t1 * 64
        }
    }

    /// Wait time for response retransmits
    pub fn timer_k(&self, reliable: bool) -> Duration {
        if reliable {
            Duration::ZERO
        } else {
            self.t4
        }
    }
}
