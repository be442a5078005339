use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;

use crate::endpoint::{Endpoint, EndpointBuilder};
use crate::error::TransactionError;
use crate::headers;
use crate::message::headers::{Header, MaxForwards};
use crate::message::{MandatoryHeaders, Method, Request, StatusCode};
use crate::transaction::key::TsxKey;
use crate::transaction::{T1, T2, TransactionMessage, fsm};
use crate::transport::{
    IncomingMessageInfo, IncomingRequest, IncomingResponse, Packet, Transport, TransportMessage,
};
use crate::tu::TransactionUser;

const FROM_HDR_STR: &str = "Alice <sip:alice@localhost>;tag=1928301774";
const TO_HDR_STR: &str = "Bob <sip:bob@localhost>";
const CALLID_STR: &str = "a84b4c76e66710@pc33.atlanta.com";

/// Asserts that the next state observed on the watcher equals the
/// expected one.
#[macro_export]
macro_rules! assert_state_eq {
    ($watcher:expr, $state:expr $(,)?) => {{
        $crate::test_utils::transaction::wait_state_change(&mut $watcher).await;
        assert_eq!(*$watcher.borrow(), $state);
    }};

    ($watcher:expr, $state:expr, $($arg:tt)*) => {{
        $crate::test_utils::transaction::wait_state_change(&mut $watcher).await;
        assert_eq!(*$watcher.borrow(), $state, $($arg)*);
    }};
}

pub async fn wait_state_change(state: &mut watch::Receiver<fsm::State>) {
    timeout(Duration::from_secs(1), state.changed())
        .await
        .expect("timeout reached and no state change received")
        .expect("The state channel has been closed");
}

pub fn create_test_endpoint() -> Endpoint {
    EndpointBuilder::new()
        .with_transaction(Default::default())
        .build()
}

/// An endpoint whose TU deliveries are captured in channels.
pub fn create_test_endpoint_with_tu() -> (Endpoint, TuEvents) {
    let (requests_tx, requests) = mpsc::unbounded_channel();
    let (responses_tx, responses) = mpsc::unbounded_channel();
    let (errors_tx, errors) = mpsc::unbounded_channel();

    let endpoint = EndpointBuilder::new()
        .with_transaction(Default::default())
        .with_transaction_user(CapturingTu {
            requests_tx,
            responses_tx,
            errors_tx,
        })
        .build();

    (
        endpoint,
        TuEvents {
            requests,
            responses,
            errors,
        },
    )
}

struct CapturingTu {
    requests_tx: mpsc::UnboundedSender<IncomingRequest>,
    responses_tx: mpsc::UnboundedSender<IncomingResponse>,
    errors_tx: mpsc::UnboundedSender<(TsxKey, TransactionError)>,
}

#[async_trait::async_trait]
impl TransactionUser for CapturingTu {
    async fn on_request(&self, _endpoint: &Endpoint, request: IncomingRequest) {
        let _ = self.requests_tx.send(request);
    }

    async fn on_response(&self, _endpoint: &Endpoint, response: IncomingResponse) {
        let _ = self.responses_tx.send(response);
    }

    async fn on_transaction_error(
        &self,
        _endpoint: &Endpoint,
        key: &TsxKey,
        error: TransactionError,
    ) {
        let _ = self.errors_tx.send((key.clone(), error));
    }
}

/// Receivers for everything the endpoint delivered to the TU.
pub struct TuEvents {
    pub requests: mpsc::UnboundedReceiver<IncomingRequest>,
    pub responses: mpsc::UnboundedReceiver<IncomingResponse>,
    pub errors: mpsc::UnboundedReceiver<(TsxKey, TransactionError)>,
}

impl TuEvents {
    /// Returns the next response delivered to the TU within a second.
    pub async fn expect_response(&mut self) -> IncomingResponse {
        timeout(Duration::from_secs(1), self.responses.recv())
            .await
            .expect("timeout waiting for a TU response")
            .expect("TU channel closed")
    }

    /// Returns the next request delivered to the TU within a second.
    pub async fn expect_request(&mut self) -> IncomingRequest {
        timeout(Duration::from_secs(1), self.requests.recv())
            .await
            .expect("timeout waiting for a TU request")
            .expect("TU channel closed")
    }

    /// Returns the next error delivered to the TU within a second.
    pub async fn expect_error(&mut self) -> (TsxKey, TransactionError) {
        timeout(Duration::from_secs(1), self.errors.recv())
            .await
            .expect("timeout waiting for a TU error")
            .expect("TU channel closed")
    }

    /// Returns `true` when no response is pending.
    pub fn no_pending_response(&mut self) -> bool {
        self.responses.try_recv().is_err()
    }
}

pub fn create_test_request(method: Method, transport: Transport) -> IncomingRequest {
    create_test_request_with_branch(method, transport, &crate::generate_branch(None))
}

pub fn create_test_request_with_branch(
    method: Method,
    transport: Transport,
    branch: &str,
) -> IncomingRequest {
    let headers = headers! {
        Header::Via(
            format!("SIP/2.0/{} localhost:5060;branch={}", transport.protocol(), branch)
                .parse()
                .unwrap()
        ),
        Header::From(FROM_HDR_STR.parse().unwrap()),
        Header::To(TO_HDR_STR.parse().unwrap()),
        Header::CallId(CALLID_STR.into()),
        Header::CSeq(format!("1 {}", method).parse().unwrap()),
        Header::MaxForwards(MaxForwards::new(70)),
    };
    let mandatory_headers = MandatoryHeaders::try_from(&headers).unwrap();

    IncomingRequest::new(
        Request::with_headers(method, "sip:localhost".parse().unwrap(), headers),
        IncomingMessageInfo::new(
            TransportMessage {
                packet: Packet::new(Bytes::new(), transport.local_addr()),
                transport,
            },
            mandatory_headers,
        ),
    )
}

/// Plays the server role against a client transaction by injecting
/// responses straight into its inbox.
pub struct MockServerTransaction {
    pub sender: mpsc::Sender<TransactionMessage>,
    pub request: IncomingRequest,
    pub endpoint: Endpoint,
}

impl MockServerTransaction {
    pub async fn respond(&self, code: StatusCode) {
        let response = self
            .endpoint
            .create_response(&self.request, code, None)
            .unwrap();
        let mandatory_headers = MandatoryHeaders::try_from(&response.message.headers).unwrap();

        let packet = Packet::new(response.encoded, response.send_info.target);
        let transport = TransportMessage {
            packet,
            transport: response.send_info.transport,
        };

        let response = IncomingResponse::new(
            response.message,
            IncomingMessageInfo::new(transport, mandatory_headers),
        );

        self.sender
            .send(TransactionMessage::Response(response))
            .await
            .unwrap();
        tokio::task::yield_now().await;
    }
}

/// Plays the client role against a server transaction by injecting
/// request retransmissions straight into its inbox.
pub struct MockClientTransaction {
    pub sender: mpsc::Sender<TransactionMessage>,
    pub request: IncomingRequest,
}

impl MockClientTransaction {
    pub async fn retransmit_request(&self) {
        self.sender
            .send(TransactionMessage::Request(self.request.clone()))
            .await
            .unwrap();
        tokio::task::yield_now().await;
    }

    pub async fn retransmit_n_times(&self, n: usize) {
        for _ in 0..n {
            self.retransmit_request().await;
        }
    }

    pub async fn send_request_with_method(&self, method: Method) {
        let mut request = self.request.clone();
        request.message.req_line.method = method;
        self.sender
            .send(TransactionMessage::Request(request))
            .await
            .unwrap();
        tokio::task::yield_now().await;
    }

    pub async fn send_ack_request(&mut self) {
        self.send_request_with_method(Method::Ack).await;
    }
}

/// Advances virtual time along the doubling retransmission schedule.
pub struct TestRetransmissionTimer {
    interval: Duration,
}

impl TestRetransmissionTimer {
    pub fn new() -> Self {
        Self { interval: T1 }
    }

    pub async fn wait_for_retransmissions(&mut self, n: usize) {
        for _ in 0..n {
            tokio::time::sleep(self.interval + Duration::from_millis(1)).await;
            self.interval = std::cmp::min(self.interval * 2, T2);
            tokio::task::yield_now().await;
        }
    }
}
