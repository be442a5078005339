use std::cmp;
use std::time::Duration;

use bytes::Bytes;

use crate::error::{Result, TransactionError};
use crate::message::{Method, StatusCode};
use crate::transaction::{T1, T2, T4, TRYING_DELAY, TransactionMessage};
use crate::transport::{IncomingRequest, OutgoingResponse};

use super::{State, Timer, TransactionContext, TransactionFsm, fail_transaction};

/// The INVITE server transaction (RFC 3261 §17.2.1).
///
/// `Proceeding -> Completed -> Confirmed -> Terminated`
pub(crate) struct ServerInvite {
    /// The INVITE that created the transaction, kept to synthesize the
    /// `100 Trying` when the TU stays silent past the provisional delay.
    request: IncomingRequest,
    /// The last response sent, retransmitted by timer G and on INVITE
    /// retransmissions.
    last_response: Option<Bytes>,
    /// The current timer G interval.
    interval_g: Duration,
}

impl ServerInvite {
    pub(crate) fn new(request: IncomingRequest) -> Self {
        Self {
            request,
            last_response: None,
            interval_g: T1,
        }
    }

    async fn retransmit_response(&self, ctx: &mut TransactionContext) {
        if let Some(response) = &self.last_response
            && let Err(err) = ctx.send_frame(response).await
        {
            fail_transaction(ctx, err.to_string()).await;
        }
    }

    async fn on_request(
        &mut self,
        ctx: &mut TransactionContext,
        request: IncomingRequest,
    ) -> Result<()> {
        match ctx.state() {
            State::Proceeding => self.retransmit_response(ctx).await,
            State::Completed => match request.method() {
                Method::Ack => self.enter_confirmed(ctx),
                Method::Invite => self.retransmit_response(ctx).await,
                method => {
                    log::warn!(
                        "Transaction {}: unexpected {} while waiting for ACK",
                        ctx.key,
                        method
                    );
                    ctx.notify_error(TransactionError::InvalidMethod).await;
                    ctx.set_state(State::Terminated);
                }
            },
            // Duplicate ACK.
            State::Confirmed => {}
            _ => {}
        }

        Ok(())
    }

    async fn on_respond(
        &mut self,
        ctx: &mut TransactionContext,
        response: OutgoingResponse,
    ) -> Result<()> {
        if ctx.state() != State::Proceeding {
            log::debug!(
                "Transaction {}: response from TU dropped in {} state",
                ctx.key,
                ctx.state()
            );
            return Ok(());
        }

        if let Err(err) = ctx.send_frame(&response.encoded).await {
            fail_transaction(ctx, err.to_string()).await;
            return Ok(());
        }
        self.last_response = Some(response.encoded.clone());
        ctx.timers.cancel(Timer::Trying100);

        match response.status_code().class() {
            1 => {}
            // A 2xx final is handed off to the TU for UAS-driven
            // retransmission in the dialog layer.
            2 => ctx.set_state(State::Terminated),
            _ => {
                ctx.set_state(State::Completed);
                ctx.timers.arm(Timer::H, 64 * T1);
                if !ctx.is_reliable() {
                    ctx.timers.arm(Timer::G, self.interval_g);
                }
            }
        }

        Ok(())
    }

    fn enter_confirmed(&mut self, ctx: &mut TransactionContext) {
        ctx.set_state(State::Confirmed);
        ctx.timers.cancel(Timer::G);
        ctx.timers.cancel(Timer::H);

        if ctx.is_reliable() {
            ctx.set_state(State::Terminated);
        } else {
            // Timer I absorbs ACK retransmissions still in flight.
            ctx.timers.arm(Timer::I, T4);
        }
    }

    async fn send_trying(&mut self, ctx: &mut TransactionContext) {
        let response = ctx
            .endpoint
            .create_response(&self.request, StatusCode::Trying, None);

        let response = match response {
            Ok(response) => response,
            Err(err) => {
                fail_transaction(ctx, err.to_string()).await;
                return;
            }
        };

        if let Err(err) = ctx.send_frame(&response.encoded).await {
            fail_transaction(ctx, err.to_string()).await;
            return;
        }
        self.last_response = Some(response.encoded);
    }
}

#[async_trait::async_trait]
impl TransactionFsm for ServerInvite {
    async fn start(&mut self, ctx: &mut TransactionContext) -> Result<()> {
        ctx.set_state(State::Proceeding);
        ctx.notify_request(self.request.clone()).await;

        // If the TU has not responded shortly, answer the INVITE
        // retransmissions with a synthetic 100 Trying.
        ctx.timers.arm(Timer::Trying100, TRYING_DELAY);

        Ok(())
    }

    async fn on_message(
        &mut self,
        ctx: &mut TransactionContext,
        msg: TransactionMessage,
    ) -> Result<()> {
        match msg {
            TransactionMessage::Request(request) => self.on_request(ctx, request).await,
            TransactionMessage::Respond(response) => self.on_respond(ctx, response).await,
            _ => {
                log::debug!("Transaction {}: unexpected event dropped", ctx.key);
                Ok(())
            }
        }
    }

    async fn on_timer(&mut self, ctx: &mut TransactionContext, timer: Timer) -> Result<()> {
        match timer {
            Timer::Trying100 => {
                if self.last_response.is_none() {
                    self.send_trying(ctx).await;
                }
            }
            Timer::G => {
                self.retransmit_response(ctx).await;
                self.interval_g = cmp::min(self.interval_g * 2, T2);
                ctx.timers.arm(Timer::G, self.interval_g);
            }
            Timer::H => {
                ctx.notify_error(TransactionError::Timeout).await;
                ctx.set_state(State::Terminated);
            }
            Timer::I => {
                ctx.set_state(State::Terminated);
            }
            _ => {}
        }

        Ok(())
    }
}
