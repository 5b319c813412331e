//! The executive: one reactor that owns the transaction controller and the
//! transports, and the queues the TU talks to it through.
//!
//! A [`SipStack`] is driven either by calling [`SipStack::process`] from an
//! application loop, using [`SipStack::time_till_next_process`] to bound the
//! wait, or by awaiting [`SipStack::run`]. The TU side of the stack is a pair
//! of [`Fifo`]s shared through a [`StackHandle`], so a TU on another thread
//! can send and receive while the reactor runs on a tokio task.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use strata_sip_core::helpers::make_response;
use strata_sip_core::{
    Fifo, HeaderName, Method, NameAddr, SipMessage, StatusCode, TransportType, Tuple, Uri, Via,
};
use strata_sip_transport::{TcpTransport, Transport, TransportEvent, UdpTransport};
use strata_transaction_core::{Transmission, TransactionController, TuMessage};
use tokio::sync::{mpsc, Notify};
use tracing::{debug, error, info, trace, warn};

use crate::config::StackConfig;
use crate::error::{Error, Result};

/// A message the TU asked the stack to send
#[derive(Debug)]
struct Outgoing {
    message: SipMessage,
    /// Explicit next hop; computed from the message when `None`
    destination: Option<Tuple>,
}

/// Queues shared between the reactor and its TUs
#[derive(Debug, Default)]
struct TuQueues {
    outgoing: Fifo<Outgoing>,
    incoming: Fifo<TuMessage>,
    wakeup: Notify,
}

/// A bound transport and the name it puts in Via headers
#[derive(Debug)]
struct RegisteredTransport {
    transport: Arc<dyn Transport>,
    hostname: String,
    local_addr: SocketAddr,
}

/// TU-side access to a running stack. Cheap to clone and safe to use from
/// any thread.
#[derive(Debug, Clone)]
pub struct StackHandle {
    queues: Arc<TuQueues>,
}

impl StackHandle {
    /// Queues `message` for transmission. The next hop is taken from the top
    /// Route, else the Request-URI; responses follow their top Via.
    ///
    /// A request whose Request-URI scheme is not `sip`, `sips` or `tel` is
    /// not sent: a 416 is queued for the TU instead and
    /// [`Error::UnsupportedScheme`] is returned.
    pub fn send(&self, message: SipMessage) -> Result<()> {
        self.enqueue(message, None)
    }

    /// Queues `message` for transmission to `destination`
    pub fn send_to(&self, message: SipMessage, destination: Tuple) -> Result<()> {
        self.enqueue(message, Some(destination))
    }

    fn enqueue(&self, message: SipMessage, destination: Option<Tuple>) -> Result<()> {
        if let Some(uri) = message.request_uri() {
            if !uri.is_supported_scheme() {
                let scheme = uri.scheme.clone();
                warn!(%scheme, "rejecting request with unsupported URI scheme");
                match make_response(&message, StatusCode::UNSUPPORTED_URI_SCHEME, None) {
                    Ok(response) => self.queues.incoming.add(TuMessage::Sip {
                        message: response,
                        key: None,
                    }),
                    Err(e) => warn!("cannot build 416: {}", e),
                }
                return Err(Error::UnsupportedScheme(scheme));
            }
        }
        self.queues.outgoing.add(Outgoing { message, destination });
        self.queues.wakeup.notify_one();
        Ok(())
    }

    /// Next SIP message for the TU, skipping other event kinds
    pub fn receive(&self) -> Option<SipMessage> {
        while let Some(msg) = self.queues.incoming.try_get() {
            match msg {
                TuMessage::Sip { message, .. } => return Some(message),
                other => trace!(?other, "receive() skipping non-SIP event"),
            }
        }
        None
    }

    /// Next event of any kind for the TU
    pub fn receive_any(&self) -> Option<TuMessage> {
        self.queues.incoming.try_get()
    }

    /// Waits up to `timeout` for the next event. Blocks the calling thread,
    /// so call it from a TU thread rather than from async code.
    pub fn receive_timeout(&self, timeout: Duration) -> Option<TuMessage> {
        self.queues.incoming.get_next_timeout(timeout)
    }
}

/// The SIP stack executive
pub struct SipStack {
    config: StackConfig,
    controller: TransactionController,
    transports: Vec<RegisteredTransport>,
    tcp: Vec<TcpTransport>,
    aliases: HashSet<(String, u16)>,
    handle: StackHandle,
    events_tx: mpsc::Sender<TransportEvent>,
    events_rx: mpsc::Receiver<TransportEvent>,
    shutdown: Arc<Notify>,
    last_gc: Instant,
}

impl SipStack {
    pub fn new(config: StackConfig) -> Result<Self> {
        config.validate()?;
        let (events_tx, events_rx) = mpsc::channel(config.channel_capacity);
        Ok(Self {
            controller: TransactionController::new(config.transaction.clone()),
            config,
            transports: Vec::new(),
            tcp: Vec::new(),
            aliases: HashSet::new(),
            handle: StackHandle {
                queues: Arc::new(TuQueues::default()),
            },
            events_tx,
            events_rx,
            shutdown: Arc::new(Notify::new()),
            last_gc: Instant::now(),
        })
    }

    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    /// A handle the TU can keep after the stack moves into a task
    pub fn handle(&self) -> StackHandle {
        self.handle.clone()
    }

    /// Asks a running [`run`](Self::run) loop to return
    pub fn shutdown_signal(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    pub fn controller(&self) -> &TransactionController {
        &self.controller
    }

    /// Delivers [`TuMessage::TransactionTerminated`] for every transaction
    /// that leaves the table from now on
    pub fn register_for_transaction_termination(&mut self) {
        self.controller.register_for_transaction_termination();
    }

    /// Binds a transport on `nic` (all interfaces when `None`) and `port`
    /// (ephemeral when 0). `hostname` is what goes into Via sent-by and is
    /// registered as an alias; it defaults to the bound address.
    ///
    /// Returns the bound local address.
    pub async fn add_transport(
        &mut self,
        protocol: TransportType,
        port: u16,
        hostname: Option<&str>,
        nic: Option<IpAddr>,
    ) -> Result<SocketAddr> {
        let bind_addr = SocketAddr::new(nic.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)), port);
        let capacity = Some(self.config.channel_capacity);
        let (transport, events): (Arc<dyn Transport>, _) = match protocol {
            TransportType::Udp => {
                let (udp, events) = UdpTransport::bind(bind_addr, &self.config.connection, capacity).await?;
                (Arc::new(udp), events)
            }
            TransportType::Tcp => {
                let (tcp, events) = TcpTransport::bind(
                    bind_addr,
                    self.config.connection.clone(),
                    self.config.connection_map.clone(),
                    capacity,
                )
                .await?;
                self.tcp.push(tcp.clone());
                (Arc::new(tcp), events)
            }
            other => return Err(strata_sip_transport::Error::UnsupportedTransport(other).into()),
        };

        let local_addr = transport.local_addr()?;
        let hostname = hostname
            .map(str::to_string)
            .unwrap_or_else(|| local_addr.ip().to_string());
        self.add_alias(&hostname, local_addr.port());
        self.forward_events(events);
        info!(%protocol, %local_addr, %hostname, "transport added");
        self.transports.push(RegisteredTransport {
            transport,
            hostname,
            local_addr,
        });
        Ok(local_addr)
    }

    // Merges one transport's event channel into the reactor's
    fn forward_events(&self, mut events: mpsc::Receiver<TransportEvent>) {
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });
    }

    /// Registers `domain` on `port` as one this stack answers for
    pub fn add_alias(&mut self, domain: &str, port: u16) {
        debug!(%domain, port, "adding alias");
        self.aliases.insert((domain.to_ascii_lowercase(), port));
    }

    /// True when `domain` is one of ours. A `port` of 0 matches the domain on
    /// any port.
    pub fn is_my_domain(&self, domain: &str, port: u16) -> bool {
        let domain = domain.to_ascii_lowercase();
        if port == 0 {
            return self.aliases.iter().any(|(d, _)| *d == domain);
        }
        self.aliases.contains(&(domain, port))
    }

    /// See [`StackHandle::send`]
    pub fn send(&self, message: SipMessage) -> Result<()> {
        self.handle.send(message)
    }

    /// See [`StackHandle::send_to`]
    pub fn send_to(&self, message: SipMessage, destination: Tuple) -> Result<()> {
        self.handle.send_to(message, destination)
    }

    pub fn receive(&self) -> Option<SipMessage> {
        self.handle.receive()
    }

    pub fn receive_any(&self) -> Option<TuMessage> {
        self.handle.receive_any()
    }

    /// Runs one reactor iteration at `now`
    pub async fn process(&mut self, now: Instant) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_transport_event(event, now);
        }

        for outgoing in self.handle.queues.outgoing.drain() {
            self.dispatch(outgoing, now).await;
        }

        let fired = self.controller.process_timers(now);
        if fired > 0 {
            trace!(fired, "timers fired");
        }

        self.flush().await;
        self.deliver();

        if now.saturating_duration_since(self.last_gc) >= self.config.gc_interval {
            self.last_gc = now;
            let threshold = self.config.connection_map.max_last_used;
            for tcp in &self.tcp {
                let closed = tcp.gc(threshold);
                if closed > 0 {
                    debug!(closed, "collected idle connections");
                }
            }
        }
    }

    /// How long the reactor may wait before the next call to
    /// [`process`](Self::process) has work to do
    pub fn time_till_next_process(&self, now: Instant) -> Duration {
        if !self.handle.queues.outgoing.is_empty() {
            return Duration::ZERO;
        }
        let gc = (self.last_gc + self.config.gc_interval).saturating_duration_since(now);
        match self.controller.time_till_next(now) {
            Some(timer) => timer.min(gc),
            None => gc,
        }
    }

    /// Drives the stack until the [`shutdown_signal`](Self::shutdown_signal)
    /// is notified
    pub async fn run(&mut self) {
        info!("SIP stack running");
        let shutdown = self.shutdown.clone();
        let queues = self.handle.queues.clone();
        loop {
            let now = Instant::now();
            self.process(now).await;
            let wait = self.time_till_next_process(now);

            let event = tokio::select! {
                event = self.events_rx.recv() => event,
                _ = queues.wakeup.notified() => None,
                _ = tokio::time::sleep(wait) => None,
                _ = shutdown.notified() => break,
            };
            if let Some(event) = event {
                self.handle_transport_event(event, Instant::now());
            }
        }
        info!("SIP stack stopped");
    }

    /// Closes every transport
    pub async fn close(&self) -> Result<()> {
        for registered in &self.transports {
            registered.transport.close().await?;
        }
        Ok(())
    }

    fn handle_transport_event(&mut self, event: TransportEvent, now: Instant) {
        match event {
            TransportEvent::MessageReceived { message, source, .. } => {
                trace!(%source, "received {}", message.brief());
                self.controller.process_wire(message, source, now);
            }
            TransportEvent::Error { error } => warn!("transport error: {}", error),
            TransportEvent::ConnectionClosed { tuple } => debug!(%tuple, "connection closed"),
            TransportEvent::ConnectionFailed { tuple, error } => {
                let failed = self.controller.peer_failed(&tuple);
                warn!(%tuple, failed, "cannot connect: {}", error);
            }
            TransportEvent::Closed => info!("transport closed"),
        }
    }

    async fn dispatch(&mut self, outgoing: Outgoing, now: Instant) {
        let Outgoing {
            mut message,
            destination,
        } = outgoing;

        let destination = match destination {
            Some(destination) => destination,
            None => match next_hop(&message).await {
                Ok(destination) => destination,
                Err(e) => {
                    warn!("cannot route {}: {}", message.brief(), e);
                    self.reject(&message, StatusCode::SERVICE_UNAVAILABLE);
                    return;
                }
            },
        };

        if message.is_request() && message.top_via().is_err() {
            if let Some(via) = self.local_via(destination.transport) {
                message.push_via(via);
            }
        }

        let request = match message.method() {
            Some(Method::Ack) | None => None,
            Some(_) => Some(message.clone()),
        };
        match self.controller.process_tu(message, destination, now) {
            Ok(Some(key)) => trace!(id = %key, "client transaction started"),
            Ok(None) => {}
            Err(strata_transaction_core::Error::TooManyTransactions { limit }) => {
                warn!(limit, "transaction table full");
                if let Some(request) = request {
                    self.reject(&request, StatusCode::SERVICE_UNAVAILABLE);
                }
            }
            Err(strata_transaction_core::Error::NoTransactionId) => {
                warn!(%destination, "no transport for Via");
                if let Some(request) = request {
                    self.reject(&request, StatusCode::SERVICE_UNAVAILABLE);
                }
            }
            Err(e) => warn!(%destination, "TU message not sent: {}", e),
        }
    }

    // Queues a locally generated response to a TU request
    fn reject(&self, request: &SipMessage, code: StatusCode) {
        if !request.is_request() || request.method() == Some(&Method::Ack) {
            return;
        }
        match make_response(request, code, None) {
            Ok(response) => self.handle.queues.incoming.add(TuMessage::Sip {
                message: response,
                key: None,
            }),
            Err(e) => error!("cannot build {} response: {}", code, e),
        }
    }

    fn local_via(&self, transport: TransportType) -> Option<Via> {
        self.transport_for(transport).map(|registered| {
            Via::new(
                transport.as_str(),
                registered.hostname.clone(),
                Some(registered.local_addr.port()),
            )
        })
    }

    fn transport_for(&self, transport: TransportType) -> Option<&RegisteredTransport> {
        self.transports
            .iter()
            .find(|registered| registered.transport.transport_type() == transport)
    }

    async fn flush(&mut self) {
        let pending: Vec<Transmission> = self.controller.drain_transmissions().collect();
        for Transmission {
            message,
            destination,
            key,
        } in pending
        {
            let result = match self.transport_for(destination.transport) {
                Some(registered) => {
                    registered
                        .transport
                        .send_message(message, destination.addr)
                        .await
                }
                None => Err(strata_sip_transport::Error::UnsupportedTransport(
                    destination.transport,
                )),
            };
            if let Err(e) = result {
                warn!(%destination, "send failed: {}", e);
                if let Some(key) = key {
                    self.controller.transport_failed(&key);
                }
            }
        }
    }

    // Moves controller output to the TU queue
    fn deliver(&mut self) {
        let incoming = &self.handle.queues.incoming;
        for msg in self.controller.drain_tu() {
            incoming.add(msg);
        }
    }
}

/// Where a TU message goes when the TU did not say
async fn next_hop(message: &SipMessage) -> Result<Tuple> {
    if message.is_response() {
        return via_destination(message.top_via()?).await;
    }
    let uri: &Uri = match message.header(&HeaderName::Route) {
        Some(route) => &route.parse::<NameAddr>()?.uri,
        None => message
            .request_uri()
            .ok_or(strata_sip_core::Error::WrongMessageKind("request"))?,
    };
    let transport = match uri.transport_param() {
        Some(t) => t.parse()?,
        None => TransportType::Udp,
    };
    let port = uri.port.unwrap_or_else(|| transport.default_port());
    Ok(Tuple::new(resolve(&uri.host, port).await?, transport))
}

/// Response routing per RFC 3261 Section 18.2.2: `received` and `rport`
/// override the sent-by
async fn via_destination(via: &Via) -> Result<Tuple> {
    let transport: TransportType = via.transport.parse()?;
    let host = via.received().unwrap_or(&via.host);
    let port = match via.rport() {
        Some(Some(port)) => port,
        _ => via.port_or_default(),
    };
    Ok(Tuple::new(resolve(host, port).await?, transport))
}

async fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = bare.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }
    tokio::net::lookup_host((bare, port))
        .await
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| Error::Unresolvable(format!("{}:{}", host, port)))
}
