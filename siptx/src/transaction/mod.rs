#![deny(missing_docs)]
//! SIP Transaction Layer.
//!
//! Implements the four RFC 3261 §17 state machines plus the registry that
//! demultiplexes incoming messages onto them. Each transaction runs as its
//! own task with an event inbox; the registry holds nothing but the inbox
//! senders.

use std::collections::HashMap;
use std::hash::{BuildHasher, RandomState};
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::{Result, TransactionError};
use crate::transport::{IncomingRequest, IncomingResponse, OutgoingResponse};

use self::key::TsxKey;

pub mod fsm;
pub mod key;

mod client;
mod runner;
mod server;


pub use client::ClientTransaction;
pub use server::ServerTransaction;

/// Estimated round-trip time (RTT) for message exchanges.
///
/// This value is the baseline when computing retransmission intervals.
pub const T1: Duration = Duration::from_millis(500);

/// Maximum retransmission interval for non-INVITE requests and INVITE
/// responses.
pub const T2: Duration = Duration::from_secs(4);

/// Maximum duration a message may remain in the network.
pub const T4: Duration = Duration::from_secs(5);

/// How long a completed INVITE client transaction absorbs response
/// retransmissions.
pub(crate) const TIMER_D: Duration = Duration::from_secs(32);

/// How long an INVITE server transaction waits for the TU before sending
/// `100 Trying` itself.
pub(crate) const TRYING_DELAY: Duration = Duration::from_millis(200);

/// Capacity of each transaction inbox.
const INBOX_CAPACITY: usize = 32;

/// An event delivered into a transaction's inbox.
pub(crate) enum TransactionMessage {
    /// A request matched to this (server) transaction.
    Request(IncomingRequest),
    /// A response matched to this (client) transaction.
    Response(IncomingResponse),
    /// A response handed down by the TU (server transactions).
    Respond(OutgoingResponse),
    /// The transport reported an asynchronous failure.
    TransportError(String),
    /// Administrative cancel; the transaction tears down immediately.
    Terminate,
}

impl std::fmt::Debug for TransactionMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionMessage::Request(_) => write!(f, "Request(..)"),
            TransactionMessage::Response(_) => write!(f, "Response(..)"),
            TransactionMessage::Respond(_) => write!(f, "Respond(..)"),
            TransactionMessage::TransportError(e) => write!(f, "TransportError({:?})", e),
            TransactionMessage::Terminate => write!(f, "Terminate"),
        }
    }
}

pub(crate) type TsxSender = mpsc::Sender<TransactionMessage>;
pub(crate) type TsxReceiver = mpsc::Receiver<TransactionMessage>;

pub(crate) fn transaction_channel() -> (TsxSender, TsxReceiver) {
    mpsc::channel(INBOX_CAPACITY)
}

struct Shard {
    entries: Mutex<HashMap<TsxKey, TsxSender>>,
}

/// The transaction registry: a concurrent mapping from key to the owning
/// transaction's inbox.
///
/// Partitioned by key hash so unrelated transactions do not contend; no
/// shard lock is ever held across a channel send.
pub struct TransactionLayer {
    shards: Box<[Shard]>,
    hasher: RandomState,
}

impl Default for TransactionLayer {
    fn default() -> Self {
        let shards = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Self::with_shards(shards)
    }
}

impl TransactionLayer {
    /// Creates a registry with the given number of shards.
    pub fn with_shards(shards: usize) -> Self {
        let shards = shards.max(1);
        let shards = (0..shards)
            .map(|_| Shard {
                entries: Mutex::new(HashMap::new()),
            })
            .collect();

        Self {
            shards,
            hasher: RandomState::new(),
        }
    }

    fn shard(&self, key: &TsxKey) -> &Shard {
        let hash = self.hasher.hash_one(key) as usize;
        &self.shards[hash % self.shards.len()]
    }

    /// Registers a transaction. Fails when the key is already taken.
    pub(crate) fn register(&self, key: TsxKey, sender: TsxSender) -> Result<()> {
        let mut entries = self.shard(&key).entries.lock().expect("Lock failed");

        match entries.entry(key) {
            std::collections::hash_map::Entry::Occupied(_) => {
                Err(TransactionError::DuplicateTransaction.into())
            }
            std::collections::hash_map::Entry::Vacant(vacant) => {
                vacant.insert(sender);
                Ok(())
            }
        }
    }

    /// Returns the inbox sender registered for the given key.
    pub(crate) fn get_entry(&self, key: &TsxKey) -> Option<TsxSender> {
        self.shard(key)
            .entries
            .lock()
            .expect("Lock failed")
            .get(key)
            .cloned()
    }

    /// Removes the entry for `key`, but only while it still belongs to
    /// `sender`. Keeps a terminating transaction from evicting a successor
    /// that re-registered the key.
    pub(crate) fn unregister(&self, key: &TsxKey, sender: &TsxSender) {
        let mut entries = self.shard(key).entries.lock().expect("Lock failed");

        if let Some(current) = entries.get(key)
            && current.same_channel(sender)
        {
            entries.remove(key);
        }
    }

    /// Returns the number of live transactions.
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.entries.lock().expect("Lock failed").len())
            .sum()
    }

    /// Returns `true` when no transaction is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Asks every live transaction to tear down. Used on endpoint
    /// shutdown.
    pub(crate) async fn terminate_all(&self) {
        let entries: Vec<TsxSender> = self
            .shards
            .iter()
            .flat_map(|shard| {
                shard
                    .entries
                    .lock()
                    .expect("Lock failed")
                    .values()
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();

        for entry in entries {
            let _ = entry.send(TransactionMessage::Terminate).await;
        }
    }

    /// Routes a received request to its server transaction. Returns the
    /// request back when no transaction matches.
    pub(crate) async fn handle_request(
        &self,
        request: IncomingRequest,
    ) -> Result<Option<IncomingRequest>> {
        let key = TsxKey::server_from_request(&request)?;

        let Some(entry) = self.get_entry(&key) else {
            return Ok(Some(request));
        };

        let mut request = request;
        request.info.tsx_key = Some(key);

        match entry.send(TransactionMessage::Request(request)).await {
            Ok(()) => Ok(None),
            // The transaction terminated between lookup and delivery;
            // treat the message as unmatched (§17.2.3 late retransmission).
            Err(mpsc::error::SendError(TransactionMessage::Request(mut request))) => {
                request.info.tsx_key = None;
                Ok(Some(request))
            }
            Err(_) => Ok(None),
        }
    }

    /// Routes a received response to its client transaction. Returns the
    /// response back when no transaction matches.
    pub(crate) async fn handle_response(
        &self,
        response: IncomingResponse,
    ) -> Result<Option<IncomingResponse>> {
        let key = TsxKey::client_from_response(&response)?;

        let Some(entry) = self.get_entry(&key) else {
            return Ok(Some(response));
        };

        let mut response = response;
        response.info.tsx_key = Some(key);

        match entry.send(TransactionMessage::Response(response)).await {
            Ok(()) => Ok(None),
            Err(mpsc::error::SendError(TransactionMessage::Response(mut response))) => {
                response.info.tsx_key = None;
                Ok(Some(response))
            }
            Err(_) => Ok(None),
        }
    }
}
