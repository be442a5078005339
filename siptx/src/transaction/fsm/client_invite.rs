use std::time::Duration;

use bytes::Bytes;
use util::ArcStr;

use crate::error::{Error, Result, TransactionError};
use crate::message::headers::{CSeq, CallId, From as FromHdr, Header, Headers, MaxForwards, To, Via};
use crate::message::{Method, Request, RequestLine};
use crate::transaction::{T1, TIMER_D, TransactionMessage};
use crate::transport::{IncomingResponse, OutgoingRequest, SendInfo};

use super::{State, Timer, TransactionContext, TransactionFsm, fail_transaction};

/// The INVITE client transaction (RFC 3261 §17.1.1).
///
/// `Calling -> Proceeding -> Completed -> Terminated`
pub(crate) struct ClientInvite {
    /// The original INVITE, kept for ACK construction.
    request: Request,
    /// The encoded INVITE, retransmitted by timer A.
    encoded: Bytes,
    /// The ACK built for the first non-2xx final, replayed on duplicates.
    ack: Option<Bytes>,
    /// The current timer A interval.
    interval_a: Duration,
}

impl ClientInvite {
    pub(crate) fn new(request: Request, encoded: Bytes) -> Self {
        Self {
            request,
            encoded,
            ack: None,
            interval_a: T1,
        }
    }

    async fn on_response(
        &mut self,
        ctx: &mut TransactionContext,
        response: IncomingResponse,
    ) -> Result<()> {
        let code = response.status_code();

        match ctx.state() {
            State::Calling | State::Proceeding if code.is_provisional() => {
                ctx.notify_response(response).await;
                ctx.timers.cancel(Timer::A);
                ctx.set_state(State::Proceeding);
            }
            State::Calling | State::Proceeding if code.class() == 2 => {
                // 2xx acceptance is a dialog concern; the transaction ends
                // here and the TU takes over ACK generation.
                ctx.notify_response(response).await;
                ctx.set_state(State::Terminated);
            }
            State::Calling | State::Proceeding => {
                let to_tag = response.info.mandatory_headers.to.tag().cloned();
                ctx.notify_response(response).await;
                self.enter_completed(ctx, to_tag).await;
            }
            State::Completed if code.is_final() && code.class() != 2 => {
                // A retransmitted final re-triggers the ACK but never
                // reaches the TU again.
                if let Some(ack) = &self.ack
                    && let Err(err) = ctx.send_frame(ack).await
                {
                    fail_transaction(ctx, err.to_string()).await;
                }
            }
            _ => {}
        }

        Ok(())
    }

    async fn enter_completed(&mut self, ctx: &mut TransactionContext, to_tag: Option<ArcStr>) {
        ctx.set_state(State::Completed);
        ctx.timers.cancel(Timer::A);
        ctx.timers.cancel(Timer::B);

        let ack = match self.create_ack(ctx, to_tag) {
            Ok(ack) => ack,
            Err(err) => {
                fail_transaction(ctx, err.to_string()).await;
                return;
            }
        };

        if let Err(err) = ctx.send_frame(&ack.encoded).await {
            fail_transaction(ctx, err.to_string()).await;
            return;
        }
        self.ack = Some(ack.encoded);

        if ctx.is_reliable() {
            ctx.set_state(State::Terminated);
        } else {
            ctx.timers.arm(Timer::D, TIMER_D);
        }
    }

    // Builds the transaction-layer ACK for a non-2xx final response
    // (RFC 3261 §17.1.1.3): same branch, same Request-URI, CSeq method
    // rewritten, To tag taken from the final response.
    fn create_ack(&self, ctx: &TransactionContext, to_tag: Option<ArcStr>) -> Result<OutgoingRequest> {
        let invite = &self.request;

        let via = invite
            .headers
            .top_via()
            .ok_or(Error::MissingRequiredHeader(Via::NAME))?
            .clone();
        let from = invite
            .headers
            .from()
            .ok_or(Error::MissingRequiredHeader(FromHdr::NAME))?
            .clone();
        let call_id = invite
            .headers
            .call_id()
            .ok_or(Error::MissingRequiredHeader(CallId::NAME))?
            .clone();
        let cseq = invite
            .headers
            .cseq()
            .ok_or(Error::MissingRequiredHeader(CSeq::NAME))?;

        let mut to = invite
            .headers
            .to()
            .ok_or(Error::MissingRequiredHeader(To::NAME))?
            .clone();
        if let Some(tag) = &to_tag {
            to.set_tag(Some(tag));
        }

        let cseq = CSeq::new(cseq.cseq, Method::Ack);

        let mut ack_headers = Headers::with_capacity(6);
        ack_headers.push(Header::Via(via));
        ack_headers.push(Header::From(from));
        ack_headers.push(Header::To(to));
        ack_headers.push(Header::CallId(call_id));
        ack_headers.push(Header::CSeq(cseq));
        ack_headers.push(Header::MaxForwards(MaxForwards::new(70)));
        ack_headers.extend(invite.headers.routes().cloned().map(Header::Route));

        let ack = Request {
            req_line: RequestLine {
                method: Method::Ack,
                uri: invite.req_line.uri.clone(),
            },
            headers: ack_headers,
            body: None,
        };

        OutgoingRequest::new(
            ack,
            SendInfo {
                target: ctx.target,
                transport: ctx.transport.clone(),
            },
        )
    }
}

#[async_trait::async_trait]
impl TransactionFsm for ClientInvite {
    async fn start(&mut self, ctx: &mut TransactionContext) -> Result<()> {
        ctx.set_state(State::Calling);

        if !ctx.is_reliable() {
            ctx.timers.arm(Timer::A, self.interval_a);
        }
        ctx.timers.arm(Timer::B, 64 * T1);

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
            Timer::A => {
                if let Err(err) = ctx.send_frame(&self.encoded).await {
                    fail_transaction(ctx, err.to_string()).await;
                    return Ok(());
                }

                // Timer A doubles without cap; timer B bounds the total.
                self.interval_a *= 2;
                ctx.timers.arm(Timer::A, self.interval_a);
            }
            Timer::B => {
                ctx.notify_error(TransactionError::Timeout).await;
                ctx.set_state(State::Terminated);
            }
            Timer::D => {
                ctx.set_state(State::Terminated);
            }
            _ => {}
        }

        Ok(())
    }
}
