use serde::{Deserialize, Serialize};

use crate::timer::TimerSettings;

/// Default cap on live transactions
pub const DEFAULT_MAX_TRANSACTIONS: usize = 10_000;

/// Configuration for a [`TransactionController`](crate::TransactionController)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionConfig {
    /// Base timer values
    pub timers: TimerSettings,
    /// New transactions are refused beyond this many live entries
    pub max_transactions: usize,
    /// Drop responses that match no client transaction instead of handing
    /// them to the TU
    pub discard_stray_responses: bool,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            timers: TimerSettings::default(),
            max_transactions: DEFAULT_MAX_TRANSACTIONS,
            discard_stray_responses: true,
        }
    }
}

impl TransactionConfig {
    pub fn with_timers(mut self, timers: TimerSettings) -> Self {
        self.timers = timers;
        self
    }

    pub fn with_max_transactions(mut self, max_transactions: usize) -> Self {
        self.max_transactions = max_transactions;
        self
    }

    pub fn with_discard_stray_responses(mut self, discard: bool) -> Self {
        self.discard_stray_responses = discard;
        self
    }
}
