use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use strata_sip_core::helpers::stamp_received;
use strata_sip_core::{SipMessage, TransportType, Tuple};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, error, info, trace, warn};

use crate::connection::ConnectionConfig;
use crate::error::{Error, Result};
use crate::framing::frame_datagram;
use crate::transport::{Transport, TransportEvent};

// Default channel capacity
const DEFAULT_CHANNEL_CAPACITY: usize = 100;

// Largest possible UDP payload
const MAX_DATAGRAM_SIZE: usize = 65535;

/// UDP transport for SIP messages
#[derive(Clone)]
pub struct UdpTransport {
    inner: Arc<UdpTransportInner>,
}

struct UdpTransportInner {
    socket: UdpSocket,
    local_addr: SocketAddr,
    max_header_size: usize,
    closed: AtomicBool,
    shutdown: Notify,
    events_tx: mpsc::Sender<TransportEvent>,
}

impl UdpTransport {
    /// Creates a new UDP transport bound to the specified address
    pub async fn bind(
        addr: SocketAddr,
        config: &ConnectionConfig,
        channel_capacity: Option<usize>,
    ) -> Result<(Self, mpsc::Receiver<TransportEvent>)> {
        let capacity = channel_capacity.unwrap_or(DEFAULT_CHANNEL_CAPACITY);
        let (events_tx, events_rx) = mpsc::channel(capacity);

        let socket = UdpSocket::bind(addr).await?;
        let local_addr = socket.local_addr()?;
        info!("SIP UDP transport bound to {}", local_addr);

        let transport = UdpTransport {
            inner: Arc::new(UdpTransportInner {
                socket,
                local_addr,
                max_header_size: config.max_header_size,
                closed: AtomicBool::new(false),
                shutdown: Notify::new(),
                events_tx,
            }),
        };

        transport.spawn_receive_loop();

        Ok((transport, events_rx))
    }

    // Spawns a task to receive datagrams from the socket
    fn spawn_receive_loop(&self) {
        let transport = self.clone();

        tokio::spawn(async move {
            let inner = &transport.inner;
            let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

            while !inner.closed.load(Ordering::Relaxed) {
                let result = tokio::select! {
                    result = inner.socket.recv_from(&mut buf) => result,
                    _ = inner.shutdown.notified() => break,
                };

                match result {
                    Ok((len, src)) => {
                        let source = Tuple::udp(src);
                        trace!(%source, len, "received datagram");
                        let datagram = Bytes::copy_from_slice(&buf[..len]);
                        match frame_datagram(datagram, source, inner.max_header_size) {
                            Ok(Some(mut message)) => {
                                if let Err(e) = stamp_received(&mut message, &source) {
                                    debug!(%source, "cannot stamp Via: {}", e);
                                }
                                let event = TransportEvent::MessageReceived {
                                    message,
                                    source,
                                    destination: inner.local_addr,
                                };
                                if let Err(e) = inner.events_tx.send(event).await {
                                    error!("Error sending event: {}", e);
                                    break;
                                }
                            }
                            Ok(None) => trace!(%source, "keep-alive"),
                            Err(e) => {
                                // never answered on the wire
                                warn!(%source, "dropping malformed datagram: {}", e);
                            }
                        }
                    }
                    Err(e) => {
                        if inner.closed.load(Ordering::Relaxed) {
                            break;
                        }
                        error!("Error receiving UDP packet: {}", e);
                        let _ = inner
                            .events_tx
                            .send(TransportEvent::Error {
                                error: format!("Error receiving packet: {}", e),
                            })
                            .await;
                    }
                }
            }

            let _ = inner.events_tx.send(TransportEvent::Closed).await;
            info!("UDP receive loop terminated");
        });
    }
}

#[async_trait::async_trait]
impl Transport for UdpTransport {
    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.local_addr)
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Udp
    }

    async fn send_message(&self, message: SipMessage, destination: SocketAddr) -> Result<()> {
        if self.is_closed() {
            return Err(Error::TransportClosed);
        }

        let bytes = message.encode();
        debug!("Sending {} byte message to {}: {}", bytes.len(), destination, message.brief());

        self.inner.socket.send_to(&bytes, destination).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.inner.closed.store(true, Ordering::Relaxed);
        self.inner.shutdown.notify_one();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UdpTransport({})", self.inner.local_addr)
    }
}
