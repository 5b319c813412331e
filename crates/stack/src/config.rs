use std::time::Duration;

use serde::{Deserialize, Serialize};
use strata_sip_transport::{ConnectionConfig, ConnectionMapConfig};
use strata_transaction_core::TransactionConfig;

use crate::error::{Error, Result};

/// Default capacity of the transport event channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// Default interval between connection garbage collections
pub const DEFAULT_GC_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for a [`SipStack`](crate::SipStack)
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use strata_stack::StackConfig;
/// use strata_transaction_core::TransactionConfig;
///
/// let config = StackConfig::default()
///     .with_transaction(TransactionConfig::default().with_max_transactions(500))
///     .with_gc_interval(Duration::from_secs(10));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    /// Transaction table and timer settings
    pub transaction: TransactionConfig,
    /// Stream framing limits
    pub connection: ConnectionConfig,
    /// Connection cache tuning
    pub connection_map: ConnectionMapConfig,
    /// Capacity of the channel carrying transport events to the reactor
    pub channel_capacity: usize,
    /// How often idle stream connections are collected
    pub gc_interval: Duration,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            transaction: TransactionConfig::default(),
            connection: ConnectionConfig::default(),
            connection_map: ConnectionMapConfig::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            gc_interval: DEFAULT_GC_INTERVAL,
        }
    }
}

impl StackConfig {
    pub fn with_transaction(mut self, transaction: TransactionConfig) -> Self {
        self.transaction = transaction;
        self
    }

    pub fn with_connection(mut self, connection: ConnectionConfig) -> Self {
        self.connection = connection;
        self
    }

    pub fn with_connection_map(mut self, connection_map: ConnectionMapConfig) -> Self {
        self.connection_map = connection_map;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn with_gc_interval(mut self, interval: Duration) -> Self {
        self.gc_interval = interval;
        self
    }

    /// Checks the values a stack cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(Error::Config("channel_capacity must be greater than 0".to_string()));
        }
        if self.gc_interval.is_zero() {
            return Err(Error::Config("gc_interval must be greater than 0".to_string()));
        }
        if self.transaction.timers.t1.is_zero() {
            return Err(Error::Config("T1 must be greater than 0".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = StackConfig::default();
        assert_eq!(config.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(config.gc_interval, DEFAULT_GC_INTERVAL);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = StackConfig::default().with_channel_capacity(0);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: StackConfig = serde_json::from_str(r#"{"channel_capacity": 16}"#).unwrap();
        assert_eq!(config.channel_capacity, 16);
        assert_eq!(config.gc_interval, DEFAULT_GC_INTERVAL);
        assert_eq!(config.transaction, TransactionConfig::default());
    }
}
