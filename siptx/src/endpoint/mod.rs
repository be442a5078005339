#![deny(missing_docs)]
//! SIP Endpoint.
//!
//! The endpoint is the router between the transport layer, the
//! transaction registry and the Transaction User: every message entering
//! or leaving the stack passes through here.

mod builder;

pub use builder::EndpointBuilder;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use util::DnsResolver;

use crate::error::{Error, Result, TransactionError};
use crate::message::headers::{Header, Via};
use crate::message::{
    Host, MandatoryHeaders, Request, Response, SipMessage, StatusCode, StatusLine, TransportType,
};
use crate::parser::Parser;
use crate::transaction::key::TsxKey;
use crate::transaction::{ClientTransaction, ServerTransaction, TransactionLayer, TransactionMessage};
use crate::transport::{
    IncomingMessageInfo, IncomingRequest, IncomingResponse, KEEP_ALIVE_REQUEST,
    KEEP_ALIVE_RESPONSE, OutgoingResponse, SendInfo, Transport, TransportLayer, TransportMessage,
    TransportStartup,
};
use crate::tu::TransactionUser;

pub(crate) struct Inner {
    /// The name of the endpoint.
    name: String,
    /// The transport layer.
    transports: TransportLayer,
    /// The transaction layer.
    transactions: Option<TransactionLayer>,
    /// The Transaction User above this endpoint.
    tu: Option<Arc<dyn TransactionUser>>,
    /// The resolver for DNS lookups.
    resolver: DnsResolver,
    /// Listeners to start when the endpoint runs.
    transport_start: Mutex<Vec<Box<dyn TransportStartup>>>,
}

/// The SIP endpoint.
///
/// An endpoint receives messages from its transports, routes them through
/// the transaction layer and hands whatever is left to the TU; in the
/// other direction it creates client transactions and feeds responses
/// into server transactions.
#[derive(Clone)]
pub struct Endpoint(Arc<Inner>);

impl Endpoint {
    pub(crate) fn from_parts(
        name: String,
        transports: TransportLayer,
        transactions: Option<TransactionLayer>,
        tu: Option<Arc<dyn TransactionUser>>,
        resolver: DnsResolver,
        transport_start: Vec<Box<dyn TransportStartup>>,
    ) -> Self {
        Self(Arc::new(Inner {
            name,
            transports,
            transactions,
            tu,
            resolver,
            transport_start: Mutex::new(transport_start),
        }))
    }

    /// Returns a builder to create an `Endpoint`.
    pub fn builder() -> EndpointBuilder {
        EndpointBuilder::new()
    }

    /// Returns the endpoint name.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Returns the transaction layer.
    pub fn transactions(&self) -> &TransactionLayer {
        self.0
            .transactions
            .as_ref()
            .expect("Transaction layer not set")
    }

    /// Returns the transport layer.
    pub fn transports(&self) -> &TransportLayer {
        &self.0.transports
    }

    /// Runs the endpoint: starts the configured listeners and processes
    /// transport events until the channel closes.
    pub async fn run(self) -> Result<()> {
        let startups = std::mem::take(&mut *self.0.transport_start.lock().expect("Lock failed"));
        for startup in startups {
            startup.start(self.0.transports.sender().clone()).await?;
        }

        self.0.transports.handle_events(&self).await
    }

    /// Runs the endpoint, stopping after the given duration.
    pub async fn run_with_timeout(self, timeout: Duration) -> Result<()> {
        let _ = tokio::time::timeout(timeout, self.run()).await;

        Ok(())
    }

    /// Tears down every live transaction.
    pub async fn shutdown(&self) {
        self.transactions().terminate_all().await;
    }

    /// Entry point for raw messages handed up by a transport.
    ///
    /// Parses the packet, validates the mandatory headers, stamps the
    /// topmost Via of requests with `received`/`rport` and routes the
    /// message. Unparsable packets are logged and dropped.
    pub async fn handle_transport_message(&self, msg: TransportMessage) -> Result<()> {
        let TransportMessage { packet, transport } = msg;

        // CRLF keep-alive handling (RFC 5626 §3.5.1).
        if packet.payload.as_ref() == KEEP_ALIVE_REQUEST {
            transport
                .send_msg(KEEP_ALIVE_RESPONSE, &packet.source)
                .await?;
            return Ok(());
        } else if packet.payload.as_ref() == KEEP_ALIVE_RESPONSE {
            return Ok(());
        }

        let mut message = match Parser::parse(&packet.payload) {
            Ok(message) => message,
            Err(err) => {
                log::warn!(
                    "Ignoring {} bytes packet from {} {}: {}",
                    packet.payload.len(),
                    transport.protocol(),
                    packet.source,
                    err,
                );
                return Err(err);
            }
        };

        if let SipMessage::Request(request) = &mut message
            && let Some(via) = request.headers.top_via_mut()
        {
            update_via_source(via, packet.source);
        }

        let mandatory_headers = match MandatoryHeaders::try_from(message.headers()) {
            Ok(headers) => headers,
            Err(err) => {
                log::warn!("Dropping message from {}: {}", packet.source, err);
                return Err(err);
            }
        };

        let info = IncomingMessageInfo::new(TransportMessage { packet, transport }, mandatory_headers);

        match message {
            SipMessage::Request(request) => {
                self.process_request(IncomingRequest::new(request, info)).await
            }
            SipMessage::Response(response) => {
                self.process_response(IncomingResponse::new(response, info))
                    .await
            }
        }
    }

    /// Routes a received request: to its server transaction, or to a new
    /// one, or (for ACK) up to the TU.
    pub(crate) async fn process_request(&self, request: IncomingRequest) -> Result<()> {
        log::debug!("<= Request {} from /{}", request.method(), request.source());

        let unmatched = self.transactions().handle_request(request).await?;
        let Some(request) = unmatched else {
            return Ok(());
        };

        if request.method().is_ack() {
            // An ACK matching no INVITE transaction acknowledges a 2xx
            // final; that handshake belongs to the dialog above us.
            self.notify_request(request).await;
            return Ok(());
        }

        match ServerTransaction::from_request(request.clone(), self) {
            Ok(_) => Ok(()),
            Err(Error::TransactionError(TransactionError::DuplicateTransaction)) => {
                // Lost the race against a retransmission; deliver to the
                // transaction that won it.
                self.transactions().handle_request(request).await?;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Routes a received response: to its client transaction, or up to
    /// the TU (a retransmitted 2xx, or a late response).
    pub(crate) async fn process_response(&self, response: IncomingResponse) -> Result<()> {
        log::debug!(
            "<= Response {} {} from /{}",
            response.status_code(),
            response.message.status_line.reason,
            response.source()
        );

        let unmatched = self.transactions().handle_response(response).await?;
        if let Some(response) = unmatched {
            self.notify_response(response).await;
        }

        Ok(())
    }

    /// Starts a client transaction for `request`.
    ///
    /// See [`ClientTransaction::send_request`].
    pub async fn send_request(
        &self,
        request: Request,
        target: Option<(Transport, SocketAddr)>,
    ) -> Result<ClientTransaction> {
        ClientTransaction::send_request(self, request, target).await
    }

    /// Feeds a response into the matching server transaction.
    ///
    /// The transaction is identified by the response's topmost Via and
    /// CSeq. Fails with `NoMatchingTransaction` when none is registered.
    pub async fn send_response(&self, response: OutgoingResponse) -> Result<TsxKey> {
        let key = TsxKey::server_from_response(&response.message)?;

        let entry = self
            .transactions()
            .get_entry(&key)
            .ok_or(TransactionError::NoMatchingTransaction)?;

        entry
            .send(TransactionMessage::Respond(response))
            .await
            .map_err(|_| TransactionError::NoMatchingTransaction)?;

        Ok(key)
    }

    /// Reports an asynchronous transport failure to the transaction with
    /// the given key, if it is still alive.
    pub async fn transaction_error(&self, key: &TsxKey, reason: impl Into<String>) {
        if let Some(entry) = self.transactions().get_entry(key) {
            let _ = entry
                .send(TransactionMessage::TransportError(reason.into()))
                .await;
        }
    }

    /// Administratively cancels the transaction with the given key.
    pub async fn terminate(&self, key: &TsxKey) {
        if let Some(entry) = self.transactions().get_entry(key) {
            let _ = entry.send(TransactionMessage::Terminate).await;
        }
    }

    /// Creates a response to an incoming request.
    ///
    /// Copies the Via chain, Record-Route set, Call-ID, From, To and CSeq
    /// from the request; a To tag is added to non-100 responses that lack
    /// one (RFC 3261 §8.2.6.2). The send target is derived from the
    /// topmost Via's `rport`/`received` parameters.
    pub fn create_response(
        &self,
        request: &IncomingRequest,
        code: StatusCode,
        reason: Option<&str>,
    ) -> Result<OutgoingResponse> {
        let mandatory = &request.info.mandatory_headers;
        let mut headers = crate::message::headers::Headers::with_capacity(7);

        // Via chain: the stamped topmost Via first, then the rest.
        headers.push(Header::Via(mandatory.via.clone()));
        headers.extend(
            request
                .message
                .headers
                .iter()
                .filter(|h| matches!(h, Header::Via(_)))
                .skip(1)
                .cloned(),
        );

        headers.extend(
            request
                .message
                .headers
                .iter()
                .filter(|h| matches!(h, Header::RecordRoute(_)))
                .cloned(),
        );

        headers.push(Header::From(mandatory.from.clone()));

        let mut to = mandatory.to.clone();
        if to.tag().is_none() && code != StatusCode::Trying {
            to.set_tag(mandatory.via.branch());
        }
        headers.push(Header::To(to));

        headers.push(Header::CallId(mandatory.call_id.clone()));
        headers.push(Header::CSeq(mandatory.cseq.clone()));

        let reason = reason.unwrap_or_else(|| code.reason());
        let response = Response::with_headers(StatusLine::new(code, reason), headers);

        let send_info = SendInfo {
            target: response_target(&mandatory.via, request.source()),
            transport: request.transport().clone(),
        };

        OutgoingResponse::new(response, send_info)
    }

    /// Resolves the destination and transport for a request from its URI.
    pub(crate) async fn resolve_request_target(
        &self,
        request: &Request,
    ) -> Result<(Transport, SocketAddr)> {
        let uri = &request.req_line.uri;

        let kind = match uri.transport_param() {
            Some(kind) => kind.parse()?,
            None if uri.scheme == crate::message::Scheme::Sips => TransportType::Tls,
            None => TransportType::Udp,
        };

        let port = uri.host_port.port.unwrap_or_else(|| kind.default_port());
        let ip = match &uri.host_port.host {
            Host::IpAddr(ip) => *ip,
            Host::DomainName(domain) => self.0.resolver.resolve(domain).await?,
        };
        let addr = SocketAddr::new(ip, port);

        let transport = self
            .transports()
            .find_or_create(addr, kind)
            .await?
            .ok_or_else(|| {
                Error::TransportError(format!("No {} transport available for {}", kind, addr))
            })?;

        Ok((transport, addr))
    }

    pub(crate) async fn notify_request(&self, request: IncomingRequest) {
        match &self.0.tu {
            Some(tu) => tu.on_request(self, request).await,
            None => log::debug!(
                "Request {} from /{} was unhandled",
                request.method(),
                request.source()
            ),
        }
    }

    pub(crate) async fn notify_response(&self, response: IncomingResponse) {
        match &self.0.tu {
            Some(tu) => tu.on_response(self, response).await,
            None => log::debug!(
                "Response {} from /{} was unhandled",
                response.status_code(),
                response.source()
            ),
        }
    }

    pub(crate) async fn notify_error(&self, key: &TsxKey, error: TransactionError) {
        log::debug!("Transaction {} failed: {}", key, error);
        if let Some(tu) = &self.0.tu {
            tu.on_transaction_error(self, key, error).await;
        }
    }
}

// Stamps the topmost Via of a received request (RFC 3261 §18.2.1 and
// RFC 3581): `received` when the source address differs from the sent-by
// host, `rport` when the source port differs from the sent-by port.
fn update_via_source(via: &mut Via, source: SocketAddr) {
    if !via.sent_by.host.matches_ip(&source.ip()) {
        via.set_received(source.ip());
    }

    let sent_by_port = via.sent_by.port.unwrap_or_else(|| via.transport.default_port());
    if sent_by_port != source.port() || via.rport_requested() {
        via.set_rport(source.port());
    }
}

/// Where responses to a request carrying this Via must be sent
/// (RFC 3261 §18.2.2, RFC 3581).
pub(crate) fn response_target(via: &Via, source: SocketAddr) -> SocketAddr {
    let ip = via
        .received
        .or_else(|| match &via.sent_by.host {
            Host::IpAddr(ip) => Some(*ip),
            Host::DomainName(_) => None,
        })
        .unwrap_or_else(|| source.ip());

    let port = via
        .rport
        .or(via.sent_by.port)
        .unwrap_or_else(|| via.transport.default_port());

    SocketAddr::new(ip, port)
}
