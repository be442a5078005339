use tokio::time::{self, Duration};

use crate::error::TransactionError;
use crate::message::Method;
use crate::test_utils::transaction::{create_test_endpoint_with_tu, create_test_request};
use crate::test_utils::transport::MockTransport;
use crate::transaction::{ServerTransaction, T1, fsm};
use crate::transport::Transport;
use crate::assert_state_eq;

use super::{
    setup_test_server_retransmission, setup_test_server_state_reliable,
    setup_test_server_state_unreliable,
};

#[tokio::test]
async fn notifies_the_tu_of_the_new_request() {
    let (server, _state, mut tu) = setup_test_server_state_unreliable(Method::Options);

    let request = tu.expect_request().await;

    assert_eq!(request.method(), &Method::Options);
    assert_eq!(request.tsx_key(), Some(server.transaction_key()));
}

#[tokio::test]
async fn transition_to_proceeding_after_1xx_from_tu() {
    let (server_tsx, mut tsx_state, _tu) = setup_test_server_state_reliable(Method::Options);

    server_tsx
        .respond_with_provisional_code(super::super::PROVISIONAL_1XX_STATUS_CODE)
        .await
        .expect("transaction should send provisional response with the provided code");

    assert_state_eq!(
        tsx_state,
        fsm::State::Proceeding,
        "should move to Proceeding when sending a provisional response"
    );
}

#[tokio::test]
async fn transition_to_completed_after_non_2xx_final_response_from_tu() {
    let (server_tsx, mut tsx_state, _tu) = setup_test_server_state_unreliable(Method::Options);

    server_tsx
        .respond_with_final_code(super::super::FINAL_NON_2XX_STATUS_CODE)
        .await
        .expect("should send final response with the provided code");

    assert_state_eq!(
        tsx_state,
        fsm::State::Completed,
        "must move to Completed after a 200-699 from the TU"
    );
}

#[tokio::test]
async fn reliable_transition_to_terminated_immediately_after_final_from_tu() {
    let (server_tsx, mut tsx_state, _tu) = setup_test_server_state_reliable(Method::Options);

    server_tsx
        .respond_with_final_code(super::super::FINAL_2XX_STATUS_CODE)
        .await
        .expect("transaction should send final response with the provided code");

    assert_state_eq!(
        tsx_state,
        fsm::State::Terminated,
        "must terminate immediately when sending a final response over a reliable transport"
    );
}

#[tokio::test]
async fn absorbs_retransmissions_in_trying_state() {
    let (client, transport, _server_tsx, mut tu) =
        setup_test_server_retransmission(Method::Options);
    let expected_retrans_count = 0;

    tu.expect_request().await;

    client.retransmit_n_times(2).await;

    assert_eq!(
        transport.sent_count(),
        expected_retrans_count,
        "nothing to replay before the first response"
    );
    assert!(
        tu.requests.try_recv().is_err(),
        "retransmissions must not reach the TU again"
    );
}

#[tokio::test]
async fn retransmit_provisional_response_in_proceeding_state() {
    let (client, transport, server, _tu) = setup_test_server_retransmission(Method::Options);
    let expected_response_count = 1;
    let expected_retrans_count = 4;

    server
        .respond_with_provisional_code(super::super::PROVISIONAL_1XX_STATUS_CODE)
        .await
        .expect("transaction should send provisional response with the provided code");

    client.retransmit_n_times(expected_retrans_count).await;

    assert_eq!(
        transport.sent_count(),
        expected_response_count + expected_retrans_count
    );
}

#[tokio::test]
async fn retransmit_final_response_in_completed_state() {
    let (client, transport, server_tsx, _tu) = setup_test_server_retransmission(Method::Register);
    let expected_response_count = 1;
    let expected_retrans_count = 2;

    server_tsx
        .respond_with_final_code(super::super::FINAL_2XX_STATUS_CODE)
        .await
        .expect("transaction should send final response with the provided code");

    client.retransmit_n_times(expected_retrans_count).await;

    assert_eq!(
        transport.sent_count(),
        expected_response_count + expected_retrans_count
    );
}

#[tokio::test]
async fn transport_failure_terminates_and_notifies_the_tu() {
    let transport = MockTransport::new_udp().fail_at(1);
    let request = create_test_request(Method::Options, Transport::new(transport));
    let (endpoint, mut tu) = create_test_endpoint_with_tu();

    let server = ServerTransaction::from_request(request, &endpoint).unwrap();
    let mut state = server.subscribe_state();

    server
        .respond_with_final_code(super::super::FINAL_NON_2XX_STATUS_CODE)
        .await
        .expect("the response is queued; the failure surfaces in the transaction");

    let (key, error) = tu.expect_error().await;
    assert_eq!(&key, server.transaction_key());
    assert_matches!(error, TransactionError::TransportFailure(_));

    assert_state_eq!(
        state,
        fsm::State::Terminated,
        "a transport failure tears the transaction down"
    );
}

#[tokio::test(start_paused = true)]
async fn timer_j() {
    let (server_tsx, mut tsx_state, _tu) = setup_test_server_state_unreliable(Method::Bye);

    server_tsx
        .respond_with_final_code(super::super::FINAL_2XX_STATUS_CODE)
        .await
        .expect("transaction should send final response with the provided code");

    assert_state_eq!(
        tsx_state,
        fsm::State::Completed,
        "the transaction must not terminate immediately over an unreliable transport"
    );

    time::sleep(T1 * 64 + Duration::from_millis(1)).await;

    assert_state_eq!(
        tsx_state,
        fsm::State::Terminated,
        "must terminate after timer J fires"
    );
}
