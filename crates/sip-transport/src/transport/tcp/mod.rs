//! TCP transport
//!
//! Each connection is served by one task that owns its [`Connection`]
//! framing state and reads straight into the framing buffer, plus a writer
//! task fed by an mpsc queue. The tasks are registered in a shared
//! [`ConnectionMap`]; removing an entry from the map aborts its tasks.
//!
//! An outbound connect that fails or times out is reported as
//! [`TransportEvent::ConnectionFailed`] so the messages queued for it can
//! be failed upstream.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::Mutex;
use socket2::{Domain, Protocol, Socket, Type};
use strata_sip_core::helpers::stamp_received;
use strata_sip_core::{SipMessage, TransportType, Tuple};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::connection::{Connection, ConnectionConfig};
use crate::connection_map::{ConnectionMap, ConnectionMapConfig};
use crate::error::{Error, Result};
use crate::transport::{Transport, TransportEvent};

// Default channel capacity
const DEFAULT_CHANNEL_CAPACITY: usize = 100;

// Outbound messages queued per connection
const WRITE_QUEUE_DEPTH: usize = 64;

/// Handle to the tasks serving one TCP connection
struct TcpConnection {
    id: u64,
    writer: mpsc::Sender<Bytes>,
    task: JoinHandle<()>,
}

impl Drop for TcpConnection {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// TCP transport for SIP messages
#[derive(Clone)]
pub struct TcpTransport {
    inner: Arc<TcpTransportInner>,
}

struct TcpTransportInner {
    local_addr: SocketAddr,
    config: ConnectionConfig,
    connections: Mutex<ConnectionMap<TcpConnection>>,
    next_id: AtomicU64,
    closed: AtomicBool,
    shutdown: Notify,
    events_tx: mpsc::Sender<TransportEvent>,
}

impl TcpTransport {
    /// Creates a new TCP transport listening on the specified address
    pub async fn bind(
        addr: SocketAddr,
        config: ConnectionConfig,
        map_config: ConnectionMapConfig,
        channel_capacity: Option<usize>,
    ) -> Result<(Self, mpsc::Receiver<TransportEvent>)> {
        let capacity = channel_capacity.unwrap_or(DEFAULT_CHANNEL_CAPACITY);
        let (events_tx, events_rx) = mpsc::channel(capacity);

        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("SIP TCP transport listening on {}", local_addr);

        let transport = TcpTransport {
            inner: Arc::new(TcpTransportInner {
                local_addr,
                config,
                connections: Mutex::new(ConnectionMap::new(map_config)),
                next_id: AtomicU64::new(1),
                closed: AtomicBool::new(false),
                shutdown: Notify::new(),
                events_tx,
            }),
        };

        transport.spawn_accept_loop(listener);

        Ok((transport, events_rx))
    }

    fn spawn_accept_loop(&self, listener: TcpListener) {
        let inner = self.inner.clone();

        tokio::spawn(async move {
            while !inner.closed.load(Ordering::Relaxed) {
                let result = tokio::select! {
                    result = listener.accept() => result,
                    _ = inner.shutdown.notified() => break,
                };
                match result {
                    Ok((stream, peer)) => {
                        let tuple = Tuple::tcp(peer);
                        debug!(%tuple, "accepted connection");
                        // the task cannot forget itself before it is registered
                        let mut connections = inner.connections.lock();
                        let connection = inner.spawn_connection(tuple, Box::pin(async move { Ok::<_, io::Error>(stream) }));
                        if let Err(e) = connections.add(tuple, connection, Instant::now()) {
                            warn!(%tuple, "rejecting connection: {}", e);
                        }
                    }
                    Err(e) => {
                        if inner.closed.load(Ordering::Relaxed) {
                            break;
                        }
                        error!("Error accepting TCP connection: {}", e);
                        let _ = inner
                            .events_tx
                            .send(TransportEvent::Error {
                                error: format!("Error accepting connection: {}", e),
                            })
                            .await;
                    }
                }
            }

            let dropped = inner.connections.lock().clear();
            drop(dropped);
            let _ = inner.events_tx.send(TransportEvent::Closed).await;
            info!("TCP accept loop terminated");
        });
    }

    /// Closes connections idle for at least `threshold`. Returns how many
    /// were closed.
    pub fn gc(&self, threshold: Duration) -> usize {
        let removed = self.inner.connections.lock().gc(threshold, Instant::now());
        removed.len()
    }

    pub fn connection_count(&self) -> usize {
        self.inner.connections.lock().len()
    }

    /// Remote ends of the open connections, least recently used first
    pub fn connections(&self) -> Vec<Tuple> {
        self.inner.connections.lock().tuples_by_age()
    }
}

type PendingStream = std::pin::Pin<Box<dyn std::future::Future<Output = io::Result<TcpStream>> + Send>>;

impl TcpTransportInner {
    /// Creates the socket for an outbound connection. Fails synchronously
    /// when the process is out of sockets; connecting happens in the
    /// connection task.
    fn open(self: &Arc<Self>, tuple: &Tuple) -> io::Result<TcpConnection> {
        let domain = Domain::for_address(tuple.addr);
        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
        socket.set_nonblocking(true)?;
        socket.set_nodelay(true)?;
        let socket = TcpSocket::from_std_stream(socket.into());
        let addr = tuple.addr;
        let limit = self.config.connect_timeout;
        debug!(%tuple, "opening connection");
        let connect = async move {
            match tokio::time::timeout(limit, socket.connect(addr)).await {
                Ok(result) => result,
                Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "connect timed out")),
            }
        };
        Ok(self.spawn_connection(*tuple, Box::pin(connect)))
    }

    fn spawn_connection(self: &Arc<Self>, tuple: Tuple, stream: PendingStream) -> TcpConnection {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (writer, rx) = mpsc::channel(WRITE_QUEUE_DEPTH);
        let inner = self.clone();
        let task = tokio::spawn(async move {
            let event = match stream.await {
                Ok(stream) => {
                    inner.serve(id, tuple, stream, rx).await;
                    TransportEvent::ConnectionClosed { tuple }
                }
                Err(e) => {
                    warn!(%tuple, "connect failed: {}", e);
                    TransportEvent::ConnectionFailed {
                        tuple,
                        error: e.to_string(),
                    }
                }
            };
            // dropping the handle aborts this task
            let handle = inner.forget(id, &tuple);
            let _ = inner.events_tx.send(event).await;
            drop(handle);
        });
        TcpConnection { id, writer, task }
    }

    /// Runs until either direction of the connection stops
    async fn serve(&self, id: u64, tuple: Tuple, stream: TcpStream, mut rx: mpsc::Receiver<Bytes>) {
        let (reader, mut writer) = stream.into_split();
        let mut write_task = tokio::spawn(async move {
            while let Some(bytes) = rx.recv().await {
                if let Err(e) = writer.write_all(&bytes).await {
                    warn!(%tuple, "write failed: {}", e);
                    break;
                }
            }
        });

        tokio::select! {
            _ = self.read_loop(id, tuple, reader) => {}
            _ = &mut write_task => debug!(%tuple, id, "writer stopped"),
        }
        write_task.abort();
    }

    async fn read_loop(&self, id: u64, tuple: Tuple, mut reader: OwnedReadHalf) {
        let mut framing = Connection::new(tuple, self.config.clone());
        let mut received = Vec::new();
        loop {
            let n = match reader.read(framing.write_buffer()).await {
                Ok(0) => {
                    debug!(%tuple, id, "peer closed connection");
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    debug!(%tuple, id, "read failed: {}", e);
                    break;
                }
            };
            self.connections.lock().touch(&tuple, Instant::now());

            let result = framing.process(n, &mut received);
            for mut message in received.drain(..) {
                if let Err(e) = stamp_received(&mut message, &tuple) {
                    debug!(%tuple, "cannot stamp Via: {}", e);
                }
                let event = TransportEvent::MessageReceived {
                    message,
                    source: tuple,
                    destination: self.local_addr,
                };
                if self.events_tx.send(event).await.is_err() {
                    return;
                }
            }
            match result {
                Ok(status) => trace!(%tuple, ?status, "read {} bytes", n),
                Err(e) => {
                    // framing cannot recover, drop the connection
                    warn!(%tuple, "closing connection: {}", e);
                    break;
                }
            }
        }
    }

    /// Removes the map entry if it still belongs to connection `id`
    fn forget(&self, id: u64, tuple: &Tuple) -> Option<TcpConnection> {
        let mut connections = self.connections.lock();
        if connections.lookup(tuple).map(|c| c.id) == Some(id) {
            connections.close(tuple)
        } else {
            None
        }
    }
}

#[async_trait::async_trait]
impl Transport for TcpTransport {
    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.local_addr)
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Tcp
    }

    async fn send_message(&self, mut message: SipMessage, destination: SocketAddr) -> Result<()> {
        if self.is_closed() {
            return Err(Error::TransportClosed);
        }

        message.update_content_length();
        let bytes = message.encode();
        let tuple = Tuple::tcp(destination);
        debug!("Sending {} byte message to {}: {}", bytes.len(), tuple, message.brief());

        // a connection whose tasks have ended is replaced once
        for _ in 0..2 {
            let (id, writer) = {
                let inner = &self.inner;
                let mut connector = |t: &Tuple| inner.open(t);
                let mut connections = inner.connections.lock();
                connections
                    .get(&tuple, Instant::now(), &mut connector)
                    .map(|c| (c.id, c.writer.clone()))
                    .ok_or(Error::ConnectionFailed(tuple))?
            };
            if writer.send(bytes.clone()).await.is_ok() {
                return Ok(());
            }
            debug!(%tuple, id, "connection gone, reopening");
            drop(self.inner.forget(id, &tuple));
        }
        Err(Error::ChannelClosed)
    }

    async fn close(&self) -> Result<()> {
        self.inner.closed.store(true, Ordering::Relaxed);
        self.inner.shutdown.notify_one();
        let dropped = self.inner.connections.lock().clear();
        drop(dropped);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TcpTransport({})", self.inner.local_addr)
    }
}
