use std::cmp;
use std::time::Duration;

use bytes::Bytes;

use crate::error::{Result, TransactionError};
use crate::transaction::{T1, T2, T4, TransactionMessage};
use crate::transport::IncomingResponse;

use super::{State, Timer, TransactionContext, TransactionFsm, fail_transaction};

/// The non-INVITE client transaction (RFC 3261 §17.1.2).
///
/// `Trying -> Proceeding -> Completed -> Terminated`
pub(crate) struct ClientNonInvite {
    /// The encoded request, retransmitted by timer E.
    request: Bytes,
    /// The current timer E interval.
    interval_e: Duration,
}

impl ClientNonInvite {
    pub(crate) fn new(request: Bytes) -> Self {
        Self {
            request,
            interval_e: T1,
        }
    }

    async fn on_response(
        &mut self,
        ctx: &mut TransactionContext,
        response: IncomingResponse,
    ) -> Result<()> {
        let code = response.status_code();

        match ctx.state() {
            State::Trying | State::Proceeding if code.is_provisional() => {
                ctx.notify_response(response).await;
                ctx.set_state(State::Proceeding);
            }
            State::Trying | State::Proceeding => {
                ctx.notify_response(response).await;
                self.enter_completed(ctx);
            }
            // Retransmission absorption window: the TU already saw this
            // final response.
            State::Completed => {}
            _ => {}
        }

        Ok(())
    }

    fn enter_completed(&mut self, ctx: &mut TransactionContext) {
        ctx.set_state(State::Completed);
        ctx.timers.cancel(Timer::E);
        ctx.timers.cancel(Timer::F);

        if ctx.is_reliable() {
            ctx.set_state(State::Terminated);
        } else {
            // Timer K absorbs response retransmissions still in flight.
            ctx.timers.arm(Timer::K, T4);
        }
    }
}

#[async_trait::async_trait]
impl TransactionFsm for ClientNonInvite {
    async fn start(&mut self, ctx: &mut TransactionContext) -> Result<()> {
        ctx.set_state(State::Trying);

        if !ctx.is_reliable() {
            ctx.timers.arm(Timer::E, self.interval_e);
        }
        ctx.timers.arm(Timer::F, 64 * T1);

        Ok(())
    }

    async fn on_message(
        &mut self,
        ctx: &mut TransactionContext,
        msg: TransactionMessage,
    ) -> Result<()> {
        match msg {
            TransactionMessage::Response(response) => self.on_response(ctx, response).await,
            _ => {
                log::debug!("Transaction {}: unexpected event dropped", ctx.key);
                Ok(())
            }
        }
    }

    async fn on_timer(&mut self, ctx: &mut TransactionContext, timer: Timer) -> Result<()> {
        match timer {
            Timer::E => {
                if let Err(err) = ctx.send_frame(&self.request).await {
                    fail_transaction(ctx, err.to_string()).await;
                    return Ok(());
                }

                self.interval_e = match ctx.state() {
                    State::Trying => cmp::min(self.interval_e * 2, T2),
                    _ => T2,
                };
                ctx.timers.arm(Timer::E, self.interval_e);
            }
            Timer::F => {
                ctx.notify_error(TransactionError::Timeout).await;
                ctx.set_state(State::Terminated);
            }
            Timer::K => {
                ctx.set_state(State::Terminated);
            }
            _ => {}
        }

        Ok(())
    }
}
