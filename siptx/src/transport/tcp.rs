//! SIP TCP Transport.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf, split};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::Mutex;
use tokio_stream::StreamExt;
use tokio_util::codec::FramedRead;

use crate::error::Result;
use crate::message::TransportType;

use super::decoder::StreamingDecoder;
use super::{
    Factory, Packet, SipTransport, Transport, TransportEvent, TransportMessage, TransportStartup,
    TransportTx,
};

type TcpRead = FramedRead<ReadHalf<TcpStream>, StreamingDecoder>;
type TcpWrite = Arc<Mutex<WriteHalf<TcpStream>>>;

/// TCP transport implementation, one per connection.
#[derive(Clone)]
pub struct TcpTransport {
    addr: SocketAddr,
    remote_addr: SocketAddr,
    write: TcpWrite,
}

#[async_trait::async_trait]
impl SipTransport for TcpTransport {
    async fn send_msg(&self, buf: &[u8], _: &SocketAddr) -> Result<usize> {
        let mut writer = self.write.lock().await;

        writer.write_all(buf).await?;
        writer.flush().await?;

        Ok(buf.len())
    }

    fn protocol(&self) -> TransportType {
        TransportType::Tcp
    }

    fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        Some(self.remote_addr)
    }
}

// Registers a connected stream and pumps its frames into the event channel.
async fn serve_stream(stream: TcpStream, sender: TransportTx) -> Result<()> {
    let local_addr = stream.local_addr()?;
    let remote_addr = stream.peer_addr()?;
    let (read, write) = split(stream);

    let reader = FramedRead::new(read, StreamingDecoder);
    let write = Arc::new(Mutex::new(write));

    let transport = Transport::new(TcpTransport {
        addr: local_addr,
        remote_addr,
        write,
    });

    sender
        .send(TransportEvent::TransportCreated(transport.clone()))
        .await?;

    tokio::spawn(async move {
        if let Err(err) = stream_read(reader, remote_addr, transport, sender).await {
            log::warn!("TCP stream from {} failed: {}", remote_addr, err);
        }
    });

    Ok(())
}

async fn stream_read(
    mut reader: TcpRead,
    source: SocketAddr,
    transport: Transport,
    sender: TransportTx,
) -> Result<()> {
    let key = transport.key();

    loop {
        match reader.next().await {
            Some(Ok(payload)) => {
                let packet = Packet::new(payload, source);
                let msg = TransportMessage {
                    packet,
                    transport: transport.clone(),
                };

                sender.send(TransportEvent::PacketReceived(msg)).await?;
            }
            Some(Err(err)) => {
                sender.send(TransportEvent::TransportClosed(key)).await?;
                return Err(err.into());
            }
            None => {
                sender.send(TransportEvent::TransportClosed(key)).await?;
                return Ok(());
            }
        }
    }
}

/// A TCP server accepting incoming connections.
pub struct TcpServer {
    sock: TcpListener,
    addr: SocketAddr,
}

impl TcpServer {
    /// Creates a new TCP server bound to the given address.
    pub async fn create<A>(addr: A) -> Result<Self>
    where
        A: ToSocketAddrs,
    {
        let sock = TcpListener::bind(addr).await?;
        let addr = sock.local_addr()?;

        Ok(Self { sock, addr })
    }

    /// Returns the bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serves incoming TCP connections by accepting and handling them.
    pub(crate) async fn handle_incoming(self, sender: TransportTx) -> Result<()> {
        loop {
            let (stream, addr) = match self.sock.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    log::error!("Failed to accept connection: {}", err);
                    continue;
                }
            };

            log::debug!("Got incoming TCP connection from {}", addr);
            if let Err(err) = serve_stream(stream, sender.clone()).await {
                log::warn!("Failed to set up TCP connection from {}: {}", addr, err);
            }
        }
    }
}

/// Factory opening outbound TCP connections.
pub struct TcpFactory {
    sender: TransportTx,
}

impl TcpFactory {
    pub(crate) fn new(sender: TransportTx) -> Self {
        Self { sender }
    }
}

#[async_trait::async_trait]
impl Factory for TcpFactory {
    async fn create(&self, addr: SocketAddr) -> Result<Transport> {
        let stream = TcpStream::connect(addr).await?;
        let local_addr = stream.local_addr()?;
        let remote_addr = stream.peer_addr()?;

        let (read, write) = split(stream);
        let reader = FramedRead::new(read, StreamingDecoder);
        let write = Arc::new(Mutex::new(write));

        let transport = Transport::new(TcpTransport {
            addr: local_addr,
            remote_addr,
            write,
        });

        let sender = self.sender.clone();
        let read_transport = transport.clone();
        tokio::spawn(async move {
            if let Err(err) = stream_read(reader, remote_addr, read_transport, sender).await {
                log::warn!("TCP stream to {} failed: {}", remote_addr, err);
            }
        });

        Ok(transport)
    }

    fn transport_kind(&self) -> TransportType {
        TransportType::Tcp
    }
}

pub(crate) struct TcpStartup {
    addr: SocketAddr,
}

impl TcpStartup {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }
}

#[async_trait::async_trait]
impl TransportStartup for TcpStartup {
    async fn start(&self, sender: TransportTx) -> Result<()> {
        let tcp_server = TcpServer::create(self.addr).await?;

        log::debug!(
            "SIP {} transport ready for incoming connections at {}",
            TransportType::Tcp,
            crate::get_local_name(&tcp_server.local_addr())
        );

        sender
            .send(TransportEvent::FactoryCreated(Box::new(TcpFactory::new(
                sender.clone(),
            ))))
            .await?;

        tokio::spawn(tcp_server.handle_incoming(sender));

        Ok(())
    }

    fn kind(&self) -> TransportType {
        TransportType::Tcp
    }
}
