pub mod tcp;
pub mod udp;

use std::fmt;
use std::net::SocketAddr;

use async_trait::async_trait;
use strata_sip_core::{SipMessage, TransportType, Tuple};

use crate::error::Result;

/// Events emitted by a transport on its event channel
#[derive(Debug)]
pub enum TransportEvent {
    /// A complete message was received
    MessageReceived {
        message: SipMessage,
        /// Remote end, including the transport protocol
        source: Tuple,
        /// Local address the message arrived on
        destination: SocketAddr,
    },
    /// Something went wrong that did not close the transport
    Error { error: String },
    /// A stream connection went away
    ConnectionClosed { tuple: Tuple },
    /// An outbound stream connection could not be opened
    ConnectionFailed { tuple: Tuple, error: String },
    /// The transport has stopped
    Closed,
}

/// A way of getting SIP messages on and off the network
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    fn local_addr(&self) -> Result<SocketAddr>;

    fn transport_type(&self) -> TransportType;

    /// Serializes `message` and sends it to `destination`
    async fn send_message(&self, message: SipMessage, destination: SocketAddr) -> Result<()>;

    async fn close(&self) -> Result<()>;

    fn is_closed(&self) -> bool;
}
