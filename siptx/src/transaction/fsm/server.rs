use bytes::Bytes;

use crate::error::Result;
use crate::transaction::{T1, TransactionMessage};
use crate::transport::OutgoingResponse;

use super::{State, Timer, TransactionContext, TransactionFsm, fail_transaction};

/// The non-INVITE server transaction (RFC 3261 §17.2.2).
///
/// `Trying -> Proceeding -> Completed -> Terminated`
pub(crate) struct ServerNonInvite {
    /// The request that created the transaction, handed to the TU on start.
    request: Option<crate::transport::IncomingRequest>,
    /// The last response sent, replayed on request retransmissions.
    last_response: Option<Bytes>,
}

impl ServerNonInvite {
    pub(crate) fn new(request: crate::transport::IncomingRequest) -> Self {
        Self {
            request: Some(request),
            last_response: None,
        }
    }

    async fn retransmit_response(&self, ctx: &mut TransactionContext) {
        if let Some(response) = &self.last_response
            && let Err(err) = ctx.send_frame(response).await
        {
            fail_transaction(ctx, err.to_string()).await;
        }
    }

    async fn on_respond(
        &mut self,
        ctx: &mut TransactionContext,
        response: OutgoingResponse,
    ) -> Result<()> {
        match ctx.state() {
            State::Trying | State::Proceeding => {}
            state => {
                log::debug!(
                    "Transaction {}: response from TU dropped in {} state",
                    ctx.key,
                    state
                );
                return Ok(());
            }
        }

        if let Err(err) = ctx.send_frame(&response.encoded).await {
            fail_transaction(ctx, err.to_string()).await;
            return Ok(());
        }
        self.last_response = Some(response.encoded.clone());

        if response.status_code().is_provisional() {
            ctx.set_state(State::Proceeding);
        } else {
            ctx.set_state(State::Completed);
            if ctx.is_reliable() {
                ctx.set_state(State::Terminated);
            } else {
                // Timer J absorbs request retransmissions still in flight.
                ctx.timers.arm(Timer::J, 64 * T1);
            }
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl TransactionFsm for ServerNonInvite {
    async fn start(&mut self, ctx: &mut TransactionContext) -> Result<()> {
        ctx.set_state(State::Trying);

        if let Some(request) = self.request.take() {
            ctx.notify_request(request).await;
        }

        Ok(())
    }

    async fn on_message(
        &mut self,
        ctx: &mut TransactionContext,
        msg: TransactionMessage,
    ) -> Result<()> {
        match msg {
            TransactionMessage::Request(_) => {
                match ctx.state() {
                    // No response yet; the retransmission is absorbed
                    // without another TU notification.
                    State::Trying => {}
                    State::Proceeding | State::Completed => {
                        self.retransmit_response(ctx).await;
                    }
                    _ => {}
                }
                Ok(())
            }
            TransactionMessage::Respond(response) => self.on_respond(ctx, response).await,
            _ => {
                log::debug!("Transaction {}: unexpected event dropped", ctx.key);
                Ok(())
            }
        }
    }

    async fn on_timer(&mut self, ctx: &mut TransactionContext, timer: Timer) -> Result<()> {
        if timer == Timer::J {
            ctx.set_state(State::Terminated);
        }

        Ok(())
    }
}
