use crate::endpoint::Endpoint;
use crate::error::TransactionError;
use crate::transaction::key::TsxKey;
use crate::transport::{IncomingRequest, IncomingResponse};

/// The Transaction User: the layer above the transaction layer (proxy,
/// UAC, UAS or registrar logic).
///
/// The endpoint delivers every request and response that reaches the TU
/// exactly once. Messages that were matched to a transaction carry its key
/// in `info.tsx_key`; out-of-transaction messages (an ACK for a 2xx final,
/// a late or retransmitted 2xx response) carry none.
#[async_trait::async_trait]
#[allow(unused_variables)]
pub trait TransactionUser: Sync + Send + 'static {
    /// Called for a new server transaction's request, and for requests
    /// that match no transaction.
    async fn on_request(&self, endpoint: &Endpoint, request: IncomingRequest) {}

    /// Called once per response passed up by a client transaction, and
    /// for responses that match no transaction.
    async fn on_response(&self, endpoint: &Endpoint, response: IncomingResponse) {}

    /// Called when a transaction fails: timeout (timers B, F, H), a
    /// transport failure, or an invalid method reaching an INVITE server
    /// transaction.
    async fn on_transaction_error(
        &self,
        endpoint: &Endpoint,
        key: &TsxKey,
        error: TransactionError,
    ) {
    }
}
