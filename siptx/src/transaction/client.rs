use std::net::SocketAddr;

use tokio::sync::watch;

use crate::endpoint::Endpoint;
use crate::error::{Error, Result, TransactionError};
use crate::message::headers::Via;
use crate::message::{Method, Request};
use crate::transport::{OutgoingRequest, SendInfo, Transport};

use super::fsm::{self, TransactionContext, TransactionFsm};
use super::key::TsxKey;
use super::runner::TransactionRunner;
use super::{TransactionMessage, TsxSender, transaction_channel};

/// Handle to a running client transaction.
///
/// Created by [`ClientTransaction::send_request`]; the transaction itself
/// runs as its own task. Responses and errors are delivered to the
/// endpoint's [`TransactionUser`](crate::TransactionUser).
#[derive(Clone)]
pub struct ClientTransaction {
    key: TsxKey,
    state: watch::Receiver<fsm::State>,
    sender: TsxSender,
}

impl ClientTransaction {
    /// Starts a new client transaction by sending `request`.
    ///
    /// The request must carry a topmost `Via`; a missing branch parameter
    /// is filled in with a freshly generated one. When `target` is absent
    /// the destination is resolved from the request URI.
    ///
    /// ACK requests never create a transaction: the ACK for a non-2xx
    /// final belongs to the INVITE client transaction, and the ACK for a
    /// 2xx is generated by the TU inside the dialog.
    pub async fn send_request(
        endpoint: &Endpoint,
        mut request: Request,
        target: Option<(Transport, SocketAddr)>,
    ) -> Result<ClientTransaction> {
        if request.method().is_ack() {
            return Err(TransactionError::MethodNotAllowed.into());
        }

        {
            let via = request
                .headers
                .top_via_mut()
                .ok_or(Error::MissingRequiredHeader(Via::NAME))?;
            if via.branch().is_none() {
                via.set_branch(&crate::generate_branch(None));
            }
        }

        let key = TsxKey::client_from_request(&request)?;

        let (transport, target) = match target {
            Some(target) => target,
            None => endpoint.resolve_request_target(&request).await?,
        };

        let outgoing = OutgoingRequest::new(
            request,
            SendInfo {
                target,
                transport: transport.clone(),
            },
        )?;

        let (sender, rx) = transaction_channel();
        let (mut ctx, state) =
            TransactionContext::new(key.clone(), endpoint.clone(), transport, target);

        endpoint.transactions().register(key.clone(), sender.clone())?;

        log::debug!("<= Request {} to /{}", outgoing.message.req_line.method, target);
        if let Err(err) = ctx.send_frame(&outgoing.encoded).await {
            endpoint.transactions().unregister(&key, &sender);
            return Err(err);
        }

        // Run the entry actions before returning so the caller observes
        // Trying/Calling, then hand the machine to its task.
        let started = if outgoing.message.method() == &Method::Invite {
            let mut machine = fsm::ClientInvite::new(outgoing.message, outgoing.encoded);
            machine
                .start(&mut ctx)
                .await
                .map(|()| TransactionRunner::new(rx, sender.clone(), machine, ctx).spawn())
        } else {
            let mut machine = fsm::ClientNonInvite::new(outgoing.encoded);
            machine
                .start(&mut ctx)
                .await
                .map(|()| TransactionRunner::new(rx, sender.clone(), machine, ctx).spawn())
        };

        if let Err(err) = started {
            endpoint.transactions().unregister(&key, &sender);
            return Err(err);
        }

        Ok(ClientTransaction { key, state, sender })
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

    /// Administratively cancels the transaction.
    pub async fn terminate(&self) {
        let _ = self.sender.send(TransactionMessage::Terminate).await;
    }
}
