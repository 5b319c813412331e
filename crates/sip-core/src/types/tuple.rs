//! Transport tuples.
//!
//! A [`Tuple`] is the (address, port, protocol) triple that identifies the
//! remote end of a flow. Connections are keyed by it and transactions use
//! it to decide where responses and retransmissions go.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Transport protocol a message travelled or will travel over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportType {
    Udp,
    Tcp,
    Tls,
    Sctp,
}

impl TransportType {
    /// Stream and association transports retransmit on their own; RFC 3261
    /// zeroes timers D, I, J and K for them and never starts A, E or G.
    pub fn is_reliable(&self) -> bool {
        !matches!(self, TransportType::Udp)
    }

    /// Upper-case token used in the Via header
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportType::Udp => "UDP",
            TransportType::Tcp => "TCP",
            TransportType::Tls => "TLS",
            TransportType::Sctp => "SCTP",
        }
    }

    /// Well-known port for the protocol
    pub fn default_port(&self) -> u16 {
        match self {
            TransportType::Tls => 5061,
            _ => 5060,
        }
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("udp") {
            Ok(TransportType::Udp)
        } else if s.eq_ignore_ascii_case("tcp") {
            Ok(TransportType::Tcp)
        } else if s.eq_ignore_ascii_case("tls") {
            Ok(TransportType::Tls)
        } else if s.eq_ignore_ascii_case("sctp") {
            Ok(TransportType::Sctp)
        } else {
            Err(Error::ParseError(format!("unknown transport: {}", s)))
        }
    }
}

/// Remote endpoint identity: socket address plus protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tuple {
    pub addr: SocketAddr,
    pub transport: TransportType,
}

impl Tuple {
    pub fn new(addr: SocketAddr, transport: TransportType) -> Self {
        Self { addr, transport }
    }

    pub fn udp(addr: SocketAddr) -> Self {
        Self::new(addr, TransportType::Udp)
    }

    pub fn tcp(addr: SocketAddr) -> Self {
        Self::new(addr, TransportType::Tcp)
    }

    pub fn is_reliable(&self) -> bool {
        self.transport.is_reliable()
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reliability() {
        assert!(!TransportType::Udp.is_reliable());
        assert!(TransportType::Tcp.is_reliable());
        assert!(TransportType::Tls.is_reliable());
        assert!(TransportType::Sctp.is_reliable());
    }

    #[test]
    fn test_tuple_identity() {
        let addr: SocketAddr = "192.0.2.1:5060".parse().unwrap();
        assert_ne!(Tuple::udp(addr), Tuple::tcp(addr));
        assert_eq!(Tuple::tcp(addr).to_string(), "192.0.2.1:5060/TCP");
        assert_eq!(TransportType::from_str("tls").unwrap(), TransportType::Tls);
    }
}
