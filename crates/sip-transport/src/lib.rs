//! SIP transport layer implementation for the strata stack
//!
//! This crate turns bytes into [`SipMessage`](strata_sip_core::SipMessage)s
//! and back:
//!
//! - [`Connection`] reassembles messages from a byte stream
//! - [`ConnectionMap`] caches stream connections by remote tuple and
//!   reclaims the least recently used ones
//! - [`frame_datagram`] frames a single UDP datagram
//! - [`UdpTransport`] and [`TcpTransport`] move messages over tokio sockets
//!   and report them as [`TransportEvent`]s

pub mod connection;
pub mod connection_map;
pub mod error;
pub mod framing;
pub mod transport;

pub use connection::{Connection, ConnectionConfig, ConnectionStatus};
pub use connection_map::{ConnectionMap, ConnectionMapConfig, Connector};
pub use error::{Error, Result};
pub use framing::frame_datagram;
pub use transport::tcp::TcpTransport;
pub use transport::udp::UdpTransport;
pub use transport::{Transport, TransportEvent};

// Simplified helper functions
/// Bind a UDP transport to the specified address
pub async fn bind_udp(
    addr: std::net::SocketAddr,
) -> Result<(UdpTransport, tokio::sync::mpsc::Receiver<TransportEvent>)> {
    UdpTransport::bind(addr, &ConnectionConfig::default(), None).await
}

/// Bind a TCP transport to the specified address
pub async fn bind_tcp(
    addr: std::net::SocketAddr,
) -> Result<(TcpTransport, tokio::sync::mpsc::Receiver<TransportEvent>)> {
    TcpTransport::bind(addr, ConnectionConfig::default(), ConnectionMapConfig::default(), None).await
}

/// Re-export of common types for easier use
pub mod prelude {
    pub use crate::{
        bind_tcp, bind_udp, Connection, ConnectionConfig, ConnectionMap, ConnectionMapConfig, Error,
        Result, TcpTransport, Transport, TransportEvent, UdpTransport,
    };
}
