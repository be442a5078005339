//! SIP UDP Transport.
//!
//! This module provides the implementation of the SIP transport layer over
//! UDP.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::net::{ToSocketAddrs, UdpSocket};

use crate::error::Result;
use crate::message::TransportType;

use super::{
    Packet, SipTransport, Transport, TransportEvent, TransportMessage, TransportStartup,
    TransportTx,
};

#[derive(Debug)]
struct Inner {
    sock: UdpSocket,
    addr: SocketAddr,
}

/// UDP transport implementation.
#[derive(Debug, Clone)]
pub struct UdpTransport(Arc<Inner>);

impl UdpTransport {
    /// Binds a UDP transport to the specified address.
    pub async fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let sock = UdpSocket::bind(addr).await?;
        let addr = sock.local_addr()?;

        Ok(Self(Arc::new(Inner { sock, addr })))
    }

    async fn recv_loop(self, sender: TransportTx) -> Result<()> {
        let transport = Transport::new(self.clone());
        let mut buf = vec![0u8; 4000];

        loop {
            let (len, source) = self.0.sock.recv_from(&mut buf).await?;

            let payload = Bytes::copy_from_slice(&buf[..len]);
            let packet = Packet::new(payload, source);

            sender
                .send(TransportEvent::PacketReceived(TransportMessage {
                    packet,
                    transport: transport.clone(),
                }))
                .await?;
        }
    }
}

#[async_trait::async_trait]
impl SipTransport for UdpTransport {
    async fn send_msg(&self, buf: &[u8], addr: &SocketAddr) -> Result<usize> {
        Ok(self.0.sock.send_to(buf, addr).await?)
    }

    fn protocol(&self) -> TransportType {
        TransportType::Udp
    }

    fn local_addr(&self) -> SocketAddr {
        self.0.addr
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        None
    }
}

pub(crate) struct UdpStartup {
    addr: SocketAddr,
}

impl UdpStartup {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }
}

#[async_trait::async_trait]
impl TransportStartup for UdpStartup {
    async fn start(&self, sender: TransportTx) -> Result<()> {
        let udp = UdpTransport::bind(self.addr).await?;

        log::debug!(
            "SIP {} transport started, listening on {}",
            TransportType::Udp,
            crate::get_local_name(&udp.local_addr())
        );

        sender
            .send(TransportEvent::TransportCreated(Transport::new(udp.clone())))
            .await?;

        tokio::spawn(udp.recv_loop(sender));

        Ok(())
    }

    fn kind(&self) -> TransportType {
        TransportType::Udp
    }
}
