use tokio::time::{self, Duration};

use crate::error::TransactionError;
use crate::message::Method;
use crate::test_utils::TestContext;
use crate::transaction::tests::{
    STATUS_CODE_100_TRYING, STATUS_CODE_180_RINGING, STATUS_CODE_202_ACCEPTED,
    STATUS_CODE_301_MOVED_PERMANENTLY, STATUS_CODE_404_NOT_FOUND, STATUS_CODE_504_SERVER_TIMEOUT,
    STATUS_CODE_603_DECLINE,
};
use crate::transaction::{ClientTransaction, T1, T4, fsm};
use crate::assert_state_eq;

use super::{
    ReceiveResponseTestContext, ReliableTransportTestContext, RetransmissionTestContext,
    TestContextSendRequest,
};

#[tokio::test]
async fn transitions_to_trying_when_request_sent() {
    let ctx = TestContextSendRequest::setup(Method::Bye);

    let uac = ClientTransaction::send_request(&ctx.endpoint, ctx.request, Some(ctx.target))
        .await
        .expect("failure sending request");

    assert_eq!(
        uac.state(),
        fsm::State::Trying,
        "should transition to Trying after initiating a new transaction and sending the request"
    );
}

#[tokio::test]
async fn rejects_ack_requests() {
    let ctx = TestContextSendRequest::setup(Method::Ack);

    let err = ClientTransaction::send_request(&ctx.endpoint, ctx.request, Some(ctx.target))
        .await
        .err();

    assert_matches!(
        err,
        Some(crate::Error::TransactionError(TransactionError::MethodNotAllowed)),
        "ACK requests are sent directly through the transport, never as a transaction"
    );
}

#[tokio::test(start_paused = true)]
async fn should_not_start_timer_e_when_transport_is_reliable() {
    let mut ctx = ReliableTransportTestContext::setup_async(Method::Options).await;
    let expected_requests = 1;
    let expected_retrans = 0;

    time::sleep(64 * T1 + Duration::from_millis(1)).await;

    let (_, error) = ctx.tu.expect_error().await;
    assert_eq!(error, TransactionError::Timeout);

    assert_eq!(
        ctx.transport.sent_count(),
        expected_requests + expected_retrans,
        "sent count should match {expected_requests} requests and {expected_retrans} retransmissions"
    );
    assert_eq!(ctx.client.state(), fsm::State::Terminated);
}

#[tokio::test]
async fn transitions_from_trying_to_proceeding_when_receiving_1xx_response() {
    let mut ctx = ReceiveResponseTestContext::setup_async(Method::Register).await;

    ctx.server.respond(STATUS_CODE_100_TRYING).await;

    let response = ctx.tu.expect_response().await;
    assert_eq!(response.status_code(), STATUS_CODE_100_TRYING);

    assert_eq!(
        ctx.client.state(),
        fsm::State::Proceeding,
        "should transition to Proceeding after receiving 1xx response"
    );
}

#[tokio::test]
async fn transitions_from_trying_to_completed_when_receiving_2xx_response() {
    let mut ctx = ReceiveResponseTestContext::setup_async(Method::Options).await;

    ctx.server.respond(STATUS_CODE_202_ACCEPTED).await;
    ctx.tu.expect_response().await;

    assert_state_eq!(
        ctx.client_state,
        fsm::State::Completed,
        "should transition to Completed after receiving 2xx response"
    );
}

#[tokio::test]
async fn transitions_from_trying_to_completed_when_receiving_3xx_response() {
    let mut ctx = ReceiveResponseTestContext::setup_async(Method::Options).await;

    ctx.server.respond(STATUS_CODE_301_MOVED_PERMANENTLY).await;
    ctx.tu.expect_response().await;

    assert_state_eq!(
        ctx.client_state,
        fsm::State::Completed,
        "should transition to Completed after receiving 3xx response"
    );
}

#[tokio::test]
async fn transitions_from_trying_to_completed_when_receiving_4xx_response() {
    let mut ctx = ReceiveResponseTestContext::setup_async(Method::Options).await;

    ctx.server.respond(STATUS_CODE_404_NOT_FOUND).await;
    ctx.tu.expect_response().await;

    assert_state_eq!(
        ctx.client_state,
        fsm::State::Completed,
        "should transition to Completed after receiving 4xx response"
    );
}

#[tokio::test]
async fn transitions_from_trying_to_completed_when_receiving_5xx_response() {
    let mut ctx = ReceiveResponseTestContext::setup_async(Method::Options).await;

    ctx.server.respond(STATUS_CODE_504_SERVER_TIMEOUT).await;
    ctx.tu.expect_response().await;

    assert_state_eq!(
        ctx.client_state,
        fsm::State::Completed,
        "should transition to Completed after receiving 5xx response"
    );
}

#[tokio::test]
async fn transitions_from_trying_to_completed_when_receiving_6xx_response() {
    let mut ctx = ReceiveResponseTestContext::setup_async(Method::Register).await;

    ctx.server.respond(STATUS_CODE_603_DECLINE).await;
    ctx.tu.expect_response().await;

    assert_state_eq!(
        ctx.client_state,
        fsm::State::Completed,
        "should transition to Completed after receiving 6xx response"
    );
}

#[tokio::test]
async fn transitions_from_proceeding_to_completed_when_receiving_final_response() {
    let mut ctx = ReceiveResponseTestContext::setup_async(Method::Options).await;

    ctx.server.respond(STATUS_CODE_100_TRYING).await;
    ctx.tu.expect_response().await;
    assert_eq!(ctx.client.state(), fsm::State::Proceeding);

    ctx.server.respond(STATUS_CODE_404_NOT_FOUND).await;
    ctx.tu.expect_response().await;

    assert_state_eq!(
        ctx.client_state,
        fsm::State::Completed,
        "should transition to Completed after receiving a final response in Proceeding"
    );
}

#[tokio::test]
async fn should_pass_provisional_responses_to_tu_in_proceeding_state() {
    let mut ctx = ReceiveResponseTestContext::setup_async(Method::Options).await;

    ctx.server.respond(STATUS_CODE_100_TRYING).await;
    ctx.server.respond(STATUS_CODE_180_RINGING).await;

    let response = ctx.tu.expect_response().await;
    assert_eq!(response.status_code(), STATUS_CODE_100_TRYING);

    let response = ctx.tu.expect_response().await;
    assert_eq!(response.status_code(), STATUS_CODE_180_RINGING);
}

#[tokio::test(start_paused = true)]
async fn timer_e_retransmission_schedule() {
    let ctx = RetransmissionTestContext::setup_async(Method::Options).await;

    assert_eq!(ctx.transport.sent_count(), 1);

    // For the default values of T1 and T2, this results in intervals of
    // 500 ms, 1 s, 2 s, 4 s, 4 s.
    time::sleep(Duration::from_millis(500 + 1)).await;
    tokio::task::yield_now().await;
    assert_eq!(ctx.transport.sent_count(), 2);

    time::sleep(Duration::from_secs(1) + Duration::from_millis(1)).await;
    tokio::task::yield_now().await;
    assert_eq!(ctx.transport.sent_count(), 3);

    time::sleep(Duration::from_secs(2) + Duration::from_millis(1)).await;
    tokio::task::yield_now().await;
    assert_eq!(ctx.transport.sent_count(), 4);

    time::sleep(Duration::from_secs(4) + Duration::from_millis(1)).await;
    tokio::task::yield_now().await;
    assert_eq!(ctx.transport.sent_count(), 5);

    time::sleep(Duration::from_secs(4) + Duration::from_millis(1)).await;
    tokio::task::yield_now().await;
    assert_eq!(ctx.transport.sent_count(), 6);

    assert_eq!(ctx.client.state(), fsm::State::Trying);
}

#[tokio::test(start_paused = true)]
async fn timer_e_flattens_to_t2_in_proceeding_state() {
    let mut ctx = RetransmissionTestContext::setup_async(Method::Options).await;

    ctx.server.respond(STATUS_CODE_100_TRYING).await;
    ctx.tu.expect_response().await;
    assert_eq!(ctx.client.state(), fsm::State::Proceeding);

    let sent_before = ctx.transport.sent_count();

    // In Proceeding the retransmission interval stays flat at T2.
    time::sleep(Duration::from_secs(4) + Duration::from_millis(2)).await;
    tokio::task::yield_now().await;
    assert_eq!(ctx.transport.sent_count(), sent_before + 1);

    time::sleep(Duration::from_secs(4) + Duration::from_millis(2)).await;
    tokio::task::yield_now().await;
    assert_eq!(ctx.transport.sent_count(), sent_before + 2);
}

#[tokio::test(start_paused = true)]
async fn transitions_from_trying_to_terminated_when_timer_f_fires() {
    let mut ctx = ReceiveResponseTestContext::setup_async(Method::Register).await;

    time::sleep(64 * T1 + Duration::from_millis(1)).await;

    let (key, error) = ctx.tu.expect_error().await;
    assert_eq!(&key, ctx.client.transaction_key());
    assert_eq!(error, TransactionError::Timeout);

    assert_eq!(
        ctx.client.state(),
        fsm::State::Terminated,
        "should transition to Terminated after timer F fires"
    );
}

#[tokio::test(start_paused = true)]
async fn transitions_from_completed_to_terminated_when_timer_k_fires() {
    let mut ctx = ReceiveResponseTestContext::setup_async(Method::Options).await;

    ctx.server.respond(STATUS_CODE_202_ACCEPTED).await;
    ctx.tu.expect_response().await;

    assert_state_eq!(ctx.client_state, fsm::State::Completed);

    time::sleep(T4 + Duration::from_millis(1)).await;
    tokio::task::yield_now().await;

    assert_state_eq!(
        ctx.client_state,
        fsm::State::Terminated,
        "should transition to Terminated after timer K fires"
    );
}

#[tokio::test]
async fn terminates_immediately_in_completed_when_transport_is_reliable() {
    let transport = crate::transport::Transport::new(
        crate::test_utils::transport::MockTransport::new_tcp(),
    );
    let request =
        crate::test_utils::transaction::create_test_request(Method::Options, transport.clone());
    let (endpoint, mut tu) = crate::test_utils::transaction::create_test_endpoint_with_tu();
    let target = (transport, request.info.transport.packet.source);

    let client = ClientTransaction::send_request(&endpoint, request.message.clone(), Some(target))
        .await
        .unwrap();
    let mut state = client.subscribe_state();

    let sender = endpoint
        .transactions()
        .get_entry(client.transaction_key())
        .unwrap();
    let server = crate::test_utils::transaction::MockServerTransaction {
        sender,
        request,
        endpoint,
    };

    server.respond(STATUS_CODE_202_ACCEPTED).await;
    tu.expect_response().await;

    assert_state_eq!(
        state,
        fsm::State::Terminated,
        "reliable transports skip the Completed absorption window"
    );
}

#[tokio::test]
async fn absorbs_response_retransmissions_in_completed_state() {
    let mut ctx = ReceiveResponseTestContext::setup_async(Method::Options).await;

    ctx.server.respond(STATUS_CODE_404_NOT_FOUND).await;
    ctx.server.respond(STATUS_CODE_404_NOT_FOUND).await;
    ctx.server.respond(STATUS_CODE_404_NOT_FOUND).await;

    // The TU sees the final response exactly once.
    ctx.tu.expect_response().await;
    assert!(
        ctx.tu.no_pending_response(),
        "retransmitted final responses must not reach the TU again"
    );
}

#[tokio::test]
async fn transport_error_terminates_and_notifies_tu() {
    let mut ctx = ReceiveResponseTestContext::setup_async(Method::Options).await;

    ctx.server
        .endpoint
        .transaction_error(ctx.client.transaction_key(), "connection reset")
        .await;

    let (key, error) = ctx.tu.expect_error().await;
    assert_eq!(&key, ctx.client.transaction_key());
    assert_matches!(error, TransactionError::TransportFailure(_));

    assert_state_eq!(ctx.client_state, fsm::State::Terminated);
}
