//! # siptx
//!
//! A Rust implementation of the SIP transaction layer (RFC 3261 §17).
//!
//! The crate sits between the transport layer (UDP/TCP) and the
//! Transaction User above it. Every request/response pair runs through one
//! of the four RFC 3261 state machines, which handle retransmissions, ACK
//! matching, absolute timeouts and TU notification, so the TU sees
//! reliable request/response semantics even over unreliable transports.
//!
//! ```no_run
//! use siptx::{Endpoint, TransactionLayer};
//!
//! # async fn run() -> siptx::Result<()> {
//! let endpoint = Endpoint::builder()
//!     .with_name("example")
//!     .with_udp("127.0.0.1:5060".parse().unwrap())
//!     .with_transaction(TransactionLayer::default())
//!     .build();
//!
//! endpoint.run().await
//! # }
//! ```

pub mod endpoint;
pub mod error;
pub mod message;
pub mod parser;
pub mod transaction;
pub mod transport;

mod macros;
mod tu;

pub use endpoint::{Endpoint, EndpointBuilder};
pub use error::{Error, Result};
pub use message::{Method, SipMessage, StatusCode};
pub use transaction::key::TsxKey;
pub use transaction::{ClientTransaction, ServerTransaction, TransactionLayer};
pub use tu::TransactionUser;

#[cfg(test)]
#[macro_use]
extern crate assert_matches;


use std::net::SocketAddr;

use rand::Rng;

use crate::message::headers::BRANCH_MAGIC_COOKIE;

const DEFAULT_BRANCH_SUFFIX_LEN: usize = 16;

/// Generates a transaction branch: the RFC 3261 magic cookie followed by a
/// random alphanumeric suffix.
pub fn generate_branch(suffix_len: Option<usize>) -> String {
    let suffix_len = suffix_len.unwrap_or(DEFAULT_BRANCH_SUFFIX_LEN);
    let mut branch = String::with_capacity(BRANCH_MAGIC_COOKIE.len() + suffix_len);

    branch.push_str(BRANCH_MAGIC_COOKIE);
    branch.extend(
        rand::rng()
            .sample_iter(rand::distr::Alphanumeric)
            .take(suffix_len)
            .map(char::from),
    );

    branch
}

pub(crate) fn get_local_name(addr: &SocketAddr) -> String {
    let ip = local_ip_address::local_ip().unwrap_or(addr.ip());

    format!("{}:{}", ip, addr.port())
}
