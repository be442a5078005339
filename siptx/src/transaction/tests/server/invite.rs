use tokio::time::{self, Duration};

use crate::error::TransactionError;
use crate::message::{Method, StatusCode};
use crate::test_utils::transaction::TestRetransmissionTimer;
use crate::transaction::{T1, T4, fsm};
use crate::assert_state_eq;

use super::{
    setup_test_server_retransmission, setup_test_server_state_reliable,
    setup_test_server_state_unreliable,
};

const TRYING_DELAY: Duration = Duration::from_millis(200);

// ===== transaction state tests =====

#[tokio::test]
async fn enters_proceeding_and_notifies_the_tu() {
    let (server, _state, mut tu) = setup_test_server_state_unreliable(Method::Invite);

    let request = tu.expect_request().await;

    assert_eq!(request.method(), &Method::Invite);
    assert_eq!(request.tsx_key(), Some(server.transaction_key()));
    assert_eq!(server.state(), fsm::State::Proceeding);
}

#[tokio::test]
async fn transitions_to_confirmed_state_after_receive_ack() {
    let (mut client, _transport, server_tsx, _tu) =
        setup_test_server_retransmission(Method::Invite);
    let mut state = server_tsx.subscribe_state();

    server_tsx
        .respond_with_final_code(super::super::STATUS_CODE_301_MOVED_PERMANENTLY)
        .await
        .expect("Error sending final response");

    assert_state_eq!(
        state,
        fsm::State::Completed,
        "must move to Completed after sending a non-2xx final response"
    );

    client.send_ack_request().await;

    assert_state_eq!(
        state,
        fsm::State::Confirmed,
        "must move to Confirmed after receiving the ACK"
    );
}

#[tokio::test]
async fn unreliable_transition_to_terminated_immediately_when_sending_2xx_response() {
    let (server_tsx, mut tsx_state, _tu) = setup_test_server_state_unreliable(Method::Invite);

    server_tsx
        .respond_with_final_code(super::super::STATUS_CODE_202_ACCEPTED)
        .await
        .expect("should send final response with the provided code");

    assert_state_eq!(
        tsx_state,
        fsm::State::Terminated,
        "a 2xx final is handed off to the TU and ends the INVITE server transaction"
    );
}

#[tokio::test]
async fn reliable_transition_to_terminated_immediately_after_2xx_from_tu() {
    let (server_tsx, mut tsx_state, _tu) = setup_test_server_state_reliable(Method::Invite);

    server_tsx
        .respond_with_final_code(super::super::STATUS_CODE_202_ACCEPTED)
        .await
        .expect("should send final response with the provided code");

    assert_state_eq!(
        tsx_state,
        fsm::State::Terminated,
        "must terminate immediately when sending a final 2xx response"
    );
}

// ===== provisional response tests =====

#[tokio::test(start_paused = true)]
async fn sends_100_trying_when_the_tu_stays_silent() {
    let (_client, transport, server, _tu) = setup_test_server_retransmission(Method::Invite);

    assert_eq!(transport.sent_count(), 0);

    time::sleep(TRYING_DELAY + Duration::from_millis(1)).await;
    tokio::task::yield_now().await;

    assert_eq!(transport.sent_count(), 1);
    let response = transport.get_last_response().expect("a response");
    assert_eq!(response.code(), StatusCode::Trying);
    assert_eq!(server.state(), fsm::State::Proceeding);
}

#[tokio::test(start_paused = true)]
async fn does_not_send_100_trying_after_a_tu_response() {
    let (_client, transport, server, _tu) = setup_test_server_retransmission(Method::Invite);

    server
        .respond_with_provisional_code(StatusCode::Ringing)
        .await
        .expect("Error sending provisional response");

    time::sleep(TRYING_DELAY + Duration::from_millis(50)).await;
    tokio::task::yield_now().await;

    assert_eq!(
        transport.sent_count(),
        1,
        "only the TU's 180 must be on the wire"
    );
    assert_eq!(
        transport.get_last_response().unwrap().code(),
        StatusCode::Ringing
    );
}

#[tokio::test]
async fn retransmits_the_last_response_on_invite_retransmission() {
    let (client, transport, server, _tu) = setup_test_server_retransmission(Method::Invite);

    server
        .respond_with_provisional_code(StatusCode::Ringing)
        .await
        .expect("Error sending provisional response");

    client.retransmit_n_times(3).await;

    assert_eq!(transport.sent_count(), 1 + 3);
}

// ===== retransmission tests =====

#[tokio::test]
async fn server_must_retransmit_final_non_2xx_response() {
    let (client, transport, server_tsx, _tu) = setup_test_server_retransmission(Method::Invite);
    let expected_responses = 1;
    let expected_retrans = 3;

    server_tsx
        .respond_with_final_code(super::super::FINAL_NON_2XX_STATUS_CODE)
        .await
        .expect("Error sending final response");

    client.retransmit_n_times(expected_retrans).await;

    assert_eq!(
        transport.sent_count(),
        expected_responses + expected_retrans
    );
}

#[tokio::test(start_paused = true)]
async fn test_timer_g_for_server_transaction() {
    let (_client, transport, server_tsx, _tu) = setup_test_server_retransmission(Method::Invite);
    let mut timer = TestRetransmissionTimer::new();
    let expected_responses = 1;
    let expected_retrans = 5;

    server_tsx
        .respond_with_final_code(super::super::FINAL_NON_2XX_STATUS_CODE)
        .await
        .expect("Error sending final response");

    timer.wait_for_retransmissions(5).await;

    assert_eq!(
        transport.sent_count(),
        expected_responses + expected_retrans,
        "sent count should match {expected_responses} responses and {expected_retrans} retransmissions"
    );
}

#[tokio::test(start_paused = true)]
async fn server_transaction_must_cease_retransmission_when_receive_ack() {
    let (mut client, transport, server_tsx, _tu) = setup_test_server_retransmission(Method::Invite);
    let mut timer = TestRetransmissionTimer::new();
    let expected_responses = 1;
    let expected_retrans = 2;

    server_tsx
        .respond_with_final_code(super::super::FINAL_NON_2XX_STATUS_CODE)
        .await
        .expect("Error sending final response");

    timer.wait_for_retransmissions(2).await;

    client.send_ack_request().await;

    timer.wait_for_retransmissions(2).await;

    assert_eq!(
        transport.sent_count(),
        expected_responses + expected_retrans,
        "retransmissions must stop once the ACK arrives"
    );
}

#[tokio::test(start_paused = true)]
async fn reliable_transport_does_not_arm_timer_g() {
    let (_client, transport, server_tsx, _tu) = {
        let transport = crate::test_utils::transport::MockTransport::new_tcp();
        let request = crate::test_utils::transaction::create_test_request(
            Method::Invite,
            crate::transport::Transport::new(transport.clone()),
        );
        let (endpoint, tu) = crate::test_utils::transaction::create_test_endpoint_with_tu();
        let server =
            crate::transaction::ServerTransaction::from_request(request.clone(), &endpoint)
                .unwrap();
        let sender = endpoint
            .transactions()
            .get_entry(server.transaction_key())
            .unwrap();
        let client = crate::test_utils::transaction::MockClientTransaction { sender, request };
        (client, transport, server, tu)
    };
    let mut timer = TestRetransmissionTimer::new();

    server_tsx
        .respond_with_final_code(super::super::FINAL_NON_2XX_STATUS_CODE)
        .await
        .expect("Error sending final response");

    timer.wait_for_retransmissions(3).await;

    assert_eq!(
        transport.sent_count(),
        1,
        "reliable transports never retransmit the final response"
    );
}

// ===== transaction timer tests =====

#[tokio::test(start_paused = true)]
async fn timer_h_fires_when_no_ack_arrives() {
    let (server_tsx, mut tsx_state, mut tu) = setup_test_server_state_unreliable(Method::Invite);

    server_tsx
        .respond_with_final_code(super::super::FINAL_NON_2XX_STATUS_CODE)
        .await
        .expect("Error sending final response");

    assert_state_eq!(tsx_state, fsm::State::Completed);

    time::sleep(T1 * 64 + Duration::from_millis(1)).await;

    let (key, error) = tu.expect_error().await;
    assert_eq!(&key, server_tsx.transaction_key());
    assert_eq!(error, TransactionError::Timeout);

    assert_state_eq!(
        tsx_state,
        fsm::State::Terminated,
        "must terminate after timer H fires without an ACK"
    );
}

#[tokio::test(start_paused = true)]
async fn timer_i_terminates_the_confirmed_transaction() {
    let (mut client, _transport, server_tsx, _tu) =
        setup_test_server_retransmission(Method::Invite);
    let mut state = server_tsx.subscribe_state();

    server_tsx
        .respond_with_final_code(super::super::FINAL_NON_2XX_STATUS_CODE)
        .await
        .expect("Error sending final response");

    client.send_ack_request().await;
    assert_state_eq!(state, fsm::State::Confirmed);

    // Duplicate ACKs in Confirmed are absorbed.
    client.send_ack_request().await;
    assert_eq!(server_tsx.state(), fsm::State::Confirmed);

    time::sleep(T4 + Duration::from_millis(1)).await;

    assert_state_eq!(
        state,
        fsm::State::Terminated,
        "must terminate after timer I fires"
    );
}

#[tokio::test]
async fn unexpected_method_while_waiting_for_ack_terminates() {
    let (client, _transport, server_tsx, mut tu) = setup_test_server_retransmission(Method::Invite);
    let mut state = server_tsx.subscribe_state();

    server_tsx
        .respond_with_final_code(super::super::FINAL_NON_2XX_STATUS_CODE)
        .await
        .expect("Error sending final response");

    assert_state_eq!(state, fsm::State::Completed);

    client.send_request_with_method(Method::Bye).await;

    let (key, error) = tu.expect_error().await;
    assert_eq!(&key, server_tsx.transaction_key());
    assert_eq!(error, TransactionError::InvalidMethod);

    assert_state_eq!(state, fsm::State::Terminated);
}
