use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};

use crate::error::Error;
use crate::message::{Request, Response, SipMessage, TransportType};
use crate::parser::Parser;
use crate::transport::SipTransport;

/// A mock transport recording everything sent through it.
#[derive(Clone)]
pub struct MockTransport {
    sent: Arc<Mutex<Vec<(Vec<u8>, SocketAddr)>>>,
    addr: SocketAddr,
    tp_type: TransportType,
    fail_at: Option<usize>,
}

impl MockTransport {
    pub fn with_transport_type(tp_type: TransportType) -> Self {
        let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let port = tp_type.default_port();

        Self {
            sent: Default::default(),
            addr: SocketAddr::new(ip, port),
            tp_type,
            fail_at: None,
        }
    }

    pub fn new_udp() -> Self {
        Self::with_transport_type(TransportType::Udp)
    }

    pub fn new_tcp() -> Self {
        Self::with_transport_type(TransportType::Tcp)
    }

    /// Makes the n-th send (1-based) fail with a transport error.
    pub fn fail_at(mut self, nth: usize) -> Self {
        self.fail_at = Some(nth);
        self
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn last_buffer(&self) -> Option<Vec<u8>> {
        let guard = self.sent.lock().unwrap();
        guard.last().map(|(buf, _)| buf).cloned()
    }

    pub fn last_sip_msg(&self) -> Option<SipMessage> {
        self.last_buffer().map(|buf| Parser::parse(&buf).unwrap())
    }

    pub fn get_last_request(&self) -> Option<Request> {
        self.last_sip_msg().and_then(|msg| msg.into_request().ok())
    }

    pub fn get_last_response(&self) -> Option<Response> {
        self.last_sip_msg().and_then(|msg| msg.into_response().ok())
    }

    fn push_msg(&self, sent: (Vec<u8>, SocketAddr)) -> usize {
        let mut guard = self.sent.lock().unwrap();
        guard.push(sent);
        guard.len()
    }
}

#[async_trait::async_trait]
impl SipTransport for MockTransport {
    async fn send_msg(&self, buf: &[u8], addr: &SocketAddr) -> crate::Result<usize> {
        let current_count = self.push_msg((buf.to_vec(), *addr));

        if let Some(fail_at) = self.fail_at
            && fail_at == current_count
        {
            return Err(Error::TransportError("Simulated failure".into()));
        }

        Ok(buf.len())
    }

    fn protocol(&self) -> TransportType {
        self.tp_type
    }

    fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        None
    }
}
