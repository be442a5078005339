#![warn(missing_docs)]
//! SIP Transport Layer.
//!
//! Concrete transports hand received packets to the endpoint through an
//! event channel; the transaction layer sees them only through the
//! [`Transport`] handle and its reliability flag.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::endpoint::Endpoint;
use crate::error::Result;

mod decoder;
mod incoming;
mod outgoing;

pub mod tcp;
pub mod udp;

pub use crate::message::TransportType;
pub use incoming::{IncomingMessageInfo, IncomingRequest, IncomingResponse};
pub use outgoing::{OutgoingRequest, OutgoingResponse, SendInfo};

/// CRLF keep-alive probe (RFC 5626 §3.5.1).
pub(crate) const KEEP_ALIVE_REQUEST: &[u8] = b"\r\n\r\n";
/// CRLF keep-alive answer.
pub(crate) const KEEP_ALIVE_RESPONSE: &[u8] = b"\r\n";

/// This trait represents an abstraction over a SIP transport implementation.
#[async_trait::async_trait]
pub trait SipTransport: Sync + Send + 'static {
    /// Sends a buffer to the specified remote socket address.
    ///
    /// Returns the number of bytes sent or an I/O error.
    async fn send_msg(&self, buf: &[u8], addr: &SocketAddr) -> Result<usize>;

    /// Returns the transport type (e.g., UDP, TCP, TLS).
    fn protocol(&self) -> TransportType;

    /// Returns the local socket address bound to this transport.
    fn local_addr(&self) -> SocketAddr;

    /// Returns the remote peer for connection oriented transports.
    fn remote_addr(&self) -> Option<SocketAddr>;
}

/// A cheaply cloneable handle to a [`SipTransport`].
#[derive(Clone)]
pub struct Transport(Arc<dyn SipTransport>);

impl Transport {
    /// Wraps a transport implementation.
    pub fn new(transport: impl SipTransport) -> Self {
        Self(Arc::new(transport))
    }

    /// Sends a buffer to the specified remote socket address.
    pub async fn send_msg(&self, buf: &[u8], addr: &SocketAddr) -> Result<usize> {
        self.0.send_msg(buf, addr).await
    }

    /// Returns the transport type.
    pub fn protocol(&self) -> TransportType {
        self.0.protocol()
    }

    /// Returns the local socket address.
    pub fn local_addr(&self) -> SocketAddr {
        self.0.local_addr()
    }

    /// Returns the remote peer for connection oriented transports.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.0.remote_addr()
    }

    /// Returns `true` if the transport is connection oriented.
    ///
    /// Reliable transports suppress the transaction retransmission timers
    /// (RFC 3261 §17).
    pub fn is_reliable(&self) -> bool {
        self.protocol().is_reliable()
    }

    /// Checks if the provided address belongs to the same IP address family
    /// (IPv4 vs IPv6) as the local socket address.
    pub fn is_same_af(&self, addr: &SocketAddr) -> bool {
        let our_addr = self.local_addr();

        (addr.is_ipv4() && our_addr.is_ipv4()) || (addr.is_ipv6() && our_addr.is_ipv6())
    }

    /// Returns the key that uniquely identifies this transport.
    pub fn key(&self) -> TransportKey {
        let addr = self.remote_addr().unwrap_or_else(|| self.local_addr());

        TransportKey::new(addr, self.protocol())
    }

    fn use_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

/// This type represents a key used to identify a transport.
///
/// Connection oriented transports are keyed by their remote peer so
/// outbound lookups find an existing connection.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TransportKey {
    addr: SocketAddr,
    kind: TransportType,
}

impl TransportKey {
    /// Creates a new `TransportKey`.
    pub fn new(addr: SocketAddr, kind: TransportType) -> Self {
        TransportKey { addr, kind }
    }
}

/// This trait represents a factory for creating SIP transports.
///
/// Used by connection oriented transports like TCP to open outbound
/// connections on demand.
#[async_trait::async_trait]
pub trait Factory: Sync + Send {
    /// Creates a new transport connected to the given address.
    async fn create(&self, addr: SocketAddr) -> Result<Transport>;

    /// Returns the transport type this factory creates.
    fn transport_kind(&self) -> TransportType;
}

/// This type represents a received SIP packet.
#[derive(Clone)]
pub struct Packet {
    /// The packet payload.
    pub payload: Bytes,
    /// The address of the sender.
    pub source: SocketAddr,
    /// The time the packet was received.
    pub time: SystemTime,
}

impl Packet {
    /// Creates a new `Packet` received now.
    pub fn new(payload: Bytes, source: SocketAddr) -> Self {
        Self {
            payload,
            source,
            time: SystemTime::now(),
        }
    }
}

/// A packet paired with the transport it arrived on.
#[derive(Clone)]
pub struct TransportMessage {
    /// The received packet.
    pub packet: Packet,
    /// The transport that received it.
    pub transport: Transport,
}

/// Events flowing from transport tasks into the endpoint loop.
pub(crate) enum TransportEvent {
    /// A packet was received.
    PacketReceived(TransportMessage),
    /// A new transport was created.
    TransportCreated(Transport),
    /// A transport was closed.
    TransportClosed(TransportKey),
    /// A factory became available.
    FactoryCreated(Box<dyn Factory>),
}

pub(crate) type TransportTx = mpsc::Sender<TransportEvent>;
type TransportRx = mpsc::Receiver<TransportEvent>;

/// A trait to start a transport listener.
#[async_trait::async_trait]
pub(crate) trait TransportStartup: Sync + Send {
    async fn start(&self, tx: TransportTx) -> Result<()>;

    fn kind(&self) -> TransportType;
}

/// Transport Layer for SIP messages.
///
/// Holds every live transport plus the factories able to open new ones,
/// and owns the event channel the transports feed.
pub struct TransportLayer {
    transports: Mutex<HashMap<TransportKey, Transport>>,
    factories: Mutex<Vec<Arc<dyn Factory>>>,
    transport_tx: TransportTx,
    transport_rx: Mutex<Option<TransportRx>>,
}

impl Default for TransportLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportLayer {
    pub(crate) fn new() -> Self {
        let (transport_tx, transport_rx) = mpsc::channel(1_000);
        let transport_rx = Mutex::new(Some(transport_rx));

        Self {
            transport_tx,
            transport_rx,
            transports: Default::default(),
            factories: Default::default(),
        }
    }

    pub(crate) fn transport_count(&self) -> usize {
        self.transports.lock().expect("Lock failed").len()
    }

    pub(crate) fn add_transport(&self, transport: Transport) {
        self.transports
            .lock()
            .expect("Lock failed")
            .insert(transport.key(), transport);
    }

    pub(crate) fn remove_transport(&self, key: TransportKey) -> Option<Transport> {
        self.transports.lock().expect("Lock failed").remove(&key)
    }

    pub(crate) fn add_factory(&self, factory: Box<dyn Factory>) {
        self.factories.lock().expect("Lock failed").push(factory.into());
    }

    pub(crate) fn sender(&self) -> &TransportTx {
        &self.transport_tx
    }

    /// Finds a suitable transport for the given destination address and
    /// transport type.
    pub fn find(&self, dst: SocketAddr, kind: TransportType) -> Option<Transport> {
        log::debug!("Finding suitable transport={} for={}", kind, dst);

        let transports = self.transports.lock().expect("Lock failed");

        // Find by remote addr.
        let key = TransportKey::new(dst, kind);
        if let Some(transport) = transports.get(&key) {
            return Some(transport.clone());
        }

        // Find by transport type and address family.
        transports
            .values()
            .filter(|handle| handle.protocol() == kind && handle.is_same_af(&dst))
            .min_by_key(|handle| handle.use_count())
            .cloned()
    }

    /// Finds a transport as [`TransportLayer::find`], opening a new
    /// connection through a registered factory when none exists.
    pub(crate) async fn find_or_create(
        &self,
        dst: SocketAddr,
        kind: TransportType,
    ) -> Result<Option<Transport>> {
        if let Some(transport) = self.find(dst, kind) {
            return Ok(Some(transport));
        }

        // Clone the factory handle out of the lock; connecting performs I/O.
        let factory = {
            let factories = self.factories.lock().expect("Lock failed");
            factories
                .iter()
                .find(|f| f.transport_kind() == kind)
                .cloned()
        };

        let Some(factory) = factory else {
            return Ok(None);
        };

        let transport = factory.create(dst).await?;
        self.add_transport(transport.clone());

        Ok(Some(transport))
    }

    pub(crate) async fn handle_events(&self, endpoint: &Endpoint) -> Result<()> {
        let mut rx = self
            .transport_rx
            .lock()
            .expect("Lock failed")
            .take()
            .expect("Transport events already being handled");

        while let Some(event) = rx.recv().await {
            match event {
                TransportEvent::PacketReceived(msg) => {
                    let endpoint = endpoint.clone();
                    tokio::spawn(async move {
                        if let Err(err) = endpoint.handle_transport_message(msg).await {
                            log::warn!("Failed to handle incoming packet: {}", err);
                        }
                    });
                }
                TransportEvent::TransportCreated(transport) => {
                    self.add_transport(transport);
                }
                TransportEvent::TransportClosed(key) => {
                    self.remove_transport(key);
                }
                TransportEvent::FactoryCreated(factory) => {
                    self.add_factory(factory);
                }
            }
        }

        Ok(())
    }
}
