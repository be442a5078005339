use tokio::sync::watch;

use crate::endpoint::Endpoint;
use crate::error::{Error, Result, TransactionError};
use crate::message::{Method, StatusCode};
use crate::transport::{IncomingRequest, OutgoingResponse};

use super::fsm::{self, TransactionContext};
use super::key::TsxKey;
use super::runner::TransactionRunner;
use super::{TransactionMessage, TsxSender, transaction_channel};

/// Handle to a running server transaction.
///
/// Created by [`ServerTransaction::from_request`] when an unmatched
/// request arrives. The TU answers through [`ServerTransaction::respond`]
/// (or the status-code shorthands); retransmissions, the 100 Trying
/// deadline and the ACK handshake are handled by the transaction task.
#[derive(Clone)]
pub struct ServerTransaction {
    key: TsxKey,
    state: watch::Receiver<fsm::State>,
    sender: TsxSender,
    endpoint: Endpoint,
    request: IncomingRequest,
}

impl ServerTransaction {
    /// Creates a server transaction for an incoming request and registers
    /// it. The TU is notified from the transaction task.
    pub fn from_request(request: IncomingRequest, endpoint: &Endpoint) -> Result<Self> {
        if request.method().is_ack() {
            // An ACK never creates a transaction; it either matches its
            // INVITE or belongs to the dialog.
            return Err(TransactionError::MethodNotAllowed.into());
        }

        let key = TsxKey::server_from_request(&request)?;

        let transport = request.transport().clone();
        let target =
            crate::endpoint::response_target(&request.info.mandatory_headers.via, request.source());

        let (sender, rx) = transaction_channel();
        let (ctx, state) =
            TransactionContext::new(key.clone(), endpoint.clone(), transport, target);

        endpoint.transactions().register(key.clone(), sender.clone())?;

        if request.method() == &Method::Invite {
            let machine = fsm::ServerInvite::new(request.clone());
            TransactionRunner::new(rx, sender.clone(), machine, ctx).spawn_and_start();
        } else {
            let machine = fsm::ServerNonInvite::new(request.clone());
            TransactionRunner::new(rx, sender.clone(), machine, ctx).spawn_and_start();
        }

        Ok(ServerTransaction {
            key,
            state,
            sender,
            endpoint: endpoint.clone(),
            request,
        })
    }

    /// Hands a response to the transaction for sending.
    pub async fn respond(&self, response: OutgoingResponse) -> Result<()> {
        self.sender
            .send(TransactionMessage::Respond(response))
            .await
            .map_err(|_| Error::ChannelClosed)
    }

    /// Builds and sends a provisional response with the given code.
    pub async fn respond_with_provisional_code(&self, code: StatusCode) -> Result<()> {
        assert!(
            code.is_provisional(),
            "Expected a provisional status code, got: {}",
            code
        );
        self.respond_with_code(code).await
    }

    /// Builds and sends a final response with the given code.
    pub async fn respond_with_final_code(&self, code: StatusCode) -> Result<()> {
        assert!(code.is_final(), "Expected a final status code, got: {}", code);
        self.respond_with_code(code).await
    }

    async fn respond_with_code(&self, code: StatusCode) -> Result<()> {
        let response = self.endpoint.create_response(&self.request, code, None)?;
        self.respond(response).await
    }

    /// Returns the current transaction state.
    pub fn state(&self) -> fsm::State {
        *self.state.borrow()
    }

    /// Returns a watcher over the transaction state.
    pub fn subscribe_state(&self) -> watch::Receiver<fsm::State> {
        self.state.clone()
    }

    /// Returns the key identifying this transaction.
    pub fn transaction_key(&self) -> &TsxKey {
        &self.key
    }

    /// Returns the request that created this transaction.
    pub fn request(&self) -> &IncomingRequest {
        &self.request
    }

    /// Administratively cancels the transaction.
    pub async fn terminate(&self) {
        let _ = self.sender.send(TransactionMessage::Terminate).await;
    }
}
