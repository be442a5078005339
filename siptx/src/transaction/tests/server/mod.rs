use tokio::sync::watch;

use crate::message::Method;
use crate::test_utils::transaction::{
    MockClientTransaction, TuEvents, create_test_endpoint_with_tu, create_test_request,
};
use crate::test_utils::transport::MockTransport;
use crate::transaction::{ServerTransaction, fsm};
use crate::transport::Transport;

mod invite;
mod non_invite;

fn setup_test_server_state(
    method: Method,
    transport: MockTransport,
) -> (ServerTransaction, watch::Receiver<fsm::State>, TuEvents) {
    let request = create_test_request(method, Transport::new(transport));
    let (endpoint, tu) = create_test_endpoint_with_tu();

    let server = ServerTransaction::from_request(request, &endpoint).unwrap();
    let state = server.subscribe_state();

    (server, state, tu)
}

fn setup_test_server_state_unreliable(
    method: Method,
) -> (ServerTransaction, watch::Receiver<fsm::State>, TuEvents) {
    setup_test_server_state(method, MockTransport::new_udp())
}

fn setup_test_server_state_reliable(
    method: Method,
) -> (ServerTransaction, watch::Receiver<fsm::State>, TuEvents) {
    setup_test_server_state(method, MockTransport::new_tcp())
}

fn setup_test_server_retransmission(
    method: Method,
) -> (
    MockClientTransaction,
    MockTransport,
    ServerTransaction,
    TuEvents,
) {
    let transport = MockTransport::new_udp();
    let request = create_test_request(method, Transport::new(transport.clone()));

    let (endpoint, tu) = create_test_endpoint_with_tu();
    let server = ServerTransaction::from_request(request.clone(), &endpoint).unwrap();

    let sender = endpoint
        .transactions()
        .get_entry(server.transaction_key())
        .unwrap();

    let client = MockClientTransaction { sender, request };

    (client, transport, server, tu)
}
