//! The transaction state machine runtime.
//!
//! One [`TransactionFsm`] instance runs per transaction, driven by its
//! inbox and its private timer wheel. All four RFC 3261 §17 machines live
//! in the submodules.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use tokio::sync::watch;
use tokio_util::time::delay_queue::{self, DelayQueue};

use crate::endpoint::Endpoint;
use crate::error::{Result, TransactionError};
use crate::transaction::TransactionMessage;
use crate::transaction::key::TsxKey;
use crate::transport::{IncomingRequest, IncomingResponse, Transport};

mod client;
mod client_invite;
mod server;
mod server_invite;

pub(crate) use client::ClientNonInvite;
pub(crate) use client_invite::ClientInvite;
pub(crate) use server::ServerNonInvite;
pub(crate) use server_invite::ServerInvite;

/// The possible states of a SIP transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    /// Not yet started.
    #[default]
    Initial,
    /// Calling state (client INVITE).
    Calling,
    /// Trying state.
    Trying,
    /// Proceeding state.
    Proceeding,
    /// Completed state.
    Completed,
    /// Confirmed state (server INVITE).
    Confirmed,
    /// Terminated state.
    Terminated,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Initial => "Initial",
            State::Calling => "Calling",
            State::Trying => "Trying",
            State::Proceeding => "Proceeding",
            State::Completed => "Completed",
            State::Confirmed => "Confirmed",
            State::Terminated => "Terminated",
        };
        write!(f, "{}", name)
    }
}

/// The named transaction timers (RFC 3261 §17, plus the provisional
/// response delay of the INVITE server transaction).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Timer {
    /// INVITE request retransmission.
    A,
    /// INVITE transaction timeout.
    B,
    /// Wait for response retransmissions (client INVITE).
    D,
    /// Non-INVITE request retransmission.
    E,
    /// Non-INVITE transaction timeout.
    F,
    /// INVITE final response retransmission.
    G,
    /// Wait for ACK.
    H,
    /// Wait for ACK retransmissions.
    I,
    /// Wait for request retransmissions (server non-INVITE).
    J,
    /// Wait for response retransmissions (client non-INVITE).
    K,
    /// Deadline for sending `100 Trying` when the TU stays silent.
    Trying100,
}

/// Per-transaction timer wheel.
///
/// At most one firing is outstanding per timer name; re-arming resets the
/// wheel entry in place.
pub(crate) struct Timers {
    queue: DelayQueue<Timer>,
    keys: HashMap<Timer, delay_queue::Key>,
}

impl Timers {
    fn new() -> Self {
        Self {
            queue: DelayQueue::new(),
            keys: HashMap::new(),
        }
    }

    /// Arms (or re-arms) the given timer.
    pub(crate) fn arm(&mut self, timer: Timer, duration: Duration) {
        match self.keys.get(&timer) {
            Some(key) => self.queue.reset(key, duration),
            None => {
                let key = self.queue.insert(timer, duration);
                self.keys.insert(timer, key);
            }
        }
    }

    /// Cancels the given timer if armed.
    pub(crate) fn cancel(&mut self, timer: Timer) {
        if let Some(key) = self.keys.remove(&timer) {
            self.queue.try_remove(&key);
        }
    }

    /// Cancels every armed timer.
    pub(crate) fn clear(&mut self) {
        for (_, key) in self.keys.drain() {
            self.queue.try_remove(&key);
        }
    }

    /// Returns the number of armed timers.
    pub(crate) fn armed(&self) -> usize {
        self.keys.len()
    }

    /// Waits for the next expiration. Resolves to `None` while no timer is
    /// armed.
    pub(crate) async fn next_expired(&mut self) -> Option<Timer> {
        let expired = self.queue.next().await?;
        let timer = expired.into_inner();
        self.keys.remove(&timer);

        Some(timer)
    }
}

/// Everything a state machine needs to produce side effects: the transport,
/// the TU (through the endpoint), its timers and its published state.
pub(crate) struct TransactionContext {
    pub(crate) key: TsxKey,
    pub(crate) endpoint: Endpoint,
    pub(crate) transport: Transport,
    pub(crate) target: SocketAddr,
    pub(crate) timers: Timers,
    state_tx: watch::Sender<State>,
}

impl TransactionContext {
    pub(crate) fn new(
        key: TsxKey,
        endpoint: Endpoint,
        transport: Transport,
        target: SocketAddr,
    ) -> (Self, watch::Receiver<State>) {
        let (state_tx, state_rx) = watch::channel(State::Initial);

        let ctx = Self {
            key,
            endpoint,
            transport,
            target,
            timers: Timers::new(),
            state_tx,
        };

        (ctx, state_rx)
    }

    /// Returns the current state.
    pub(crate) fn state(&self) -> State {
        *self.state_tx.borrow()
    }

    /// Publishes a state transition.
    pub(crate) fn set_state(&mut self, state: State) {
        let old = self.state_tx.send_replace(state);
        if old != state {
            log::trace!("Transaction {}: state {} -> {}", self.key, old, state);
        }
    }

    /// Returns `true` when the underlying transport is connection oriented.
    pub(crate) fn is_reliable(&self) -> bool {
        self.transport.is_reliable()
    }

    /// Hands an encoded frame to the transport.
    pub(crate) async fn send_frame(&self, frame: &Bytes) -> Result<usize> {
        self.transport.send_msg(frame, &self.target).await
    }

    /// Passes a request up to the TU, tagged with this transaction's key.
    pub(crate) async fn notify_request(&self, mut request: IncomingRequest) {
        request.info.tsx_key = Some(self.key.clone());
        self.endpoint.notify_request(request).await;
    }

    /// Passes a response up to the TU, tagged with this transaction's key.
    pub(crate) async fn notify_response(&self, mut response: IncomingResponse) {
        response.info.tsx_key = Some(self.key.clone());
        self.endpoint.notify_response(response).await;
    }

    /// Reports a transaction failure to the TU.
    pub(crate) async fn notify_error(&self, error: TransactionError) {
        self.endpoint.notify_error(&self.key, error).await;
    }
}

/// One of the four RFC 3261 §17 state machines.
#[async_trait::async_trait]
pub(crate) trait TransactionFsm: Send + 'static {
    /// Runs the entry actions of the initial state. Called exactly once,
    /// before any event is processed.
    async fn start(&mut self, ctx: &mut TransactionContext) -> Result<()>;

    /// Handles one inbox event.
    async fn on_message(
        &mut self,
        ctx: &mut TransactionContext,
        msg: TransactionMessage,
    ) -> Result<()>;

    /// Handles a timer expiration.
    async fn on_timer(&mut self, ctx: &mut TransactionContext, timer: Timer) -> Result<()>;
}

// Shared failure path: a send that fails while the machine is running
// takes the TransportError policy (notify the TU, then terminate).
pub(crate) async fn fail_transaction(ctx: &mut TransactionContext, reason: String) {
    log::warn!("Transaction {}: transport failure: {}", ctx.key, reason);
    ctx.notify_error(TransactionError::TransportFailure(reason)).await;
    ctx.set_state(State::Terminated);
}
