//! Transaction keys.
//!
//! A key uniquely identifies a transaction (RFC 3261 §17.1.3 / §17.2.3) and
//! is how the registry demultiplexes incoming messages onto the owning
//! state machine.

use std::fmt;

use util::ArcStr;

use crate::error::{Error, Result, SipParseError};
use crate::message::headers::{CSeq, Via};
use crate::message::{HostPort, Method, Request, Response};
use crate::transport::{IncomingRequest, IncomingResponse};

// INVITE and ACK are represented as None so transaction-level ACK requests
// match their INVITE transaction without a second registry entry.
fn filter_method(method: &Method) -> Option<Method> {
    Some(method)
        .filter(|&m| !(matches!(m, &Method::Invite | &Method::Ack)))
        .cloned()
}

/// Key identifying a client transaction: topmost Via branch plus the
/// request method (the CSeq method on the response side).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientTsxKey {
    branch: ArcStr,
    method: Option<Method>,
}

/// Key identifying a server transaction. The Via `sent-by` participates
/// because branches are not globally unique on the wire (RFC 3261 §17.2.3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServerTsxKey {
    branch: ArcStr,
    method: Option<Method>,
    sent_by: HostPort,
}

/// A transaction key, client or server side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TsxKey {
    /// A client transaction key.
    Client(ClientTsxKey),
    /// A server transaction key.
    Server(ServerTsxKey),
}

impl TsxKey {
    /// Builds a client key from a branch and method.
    pub fn client(branch: &str, method: &Method) -> Self {
        TsxKey::Client(ClientTsxKey {
            branch: branch.into(),
            method: filter_method(method),
        })
    }

    /// Builds a server key from its raw parts.
    pub fn server(branch: &str, method: &Method, sent_by: HostPort) -> Self {
        TsxKey::Server(ServerTsxKey {
            branch: branch.into(),
            method: filter_method(method),
            sent_by,
        })
    }

    /// Derives the client key for a request about to be sent.
    pub fn client_from_request(request: &Request) -> Result<Self> {
        let via = request
            .headers
            .top_via()
            .ok_or(Error::MissingRequiredHeader(Via::NAME))?;
        let branch = via
            .branch()
            .ok_or_else(|| SipParseError::new("Via has no branch parameter"))?;

        Ok(Self::client(branch, request.method()))
    }

    /// Derives the client key for a received response: topmost Via branch
    /// plus the CSeq method.
    pub fn client_from_response(response: &IncomingResponse) -> Result<Self> {
        let headers = &response.info.mandatory_headers;
        let branch = headers
            .via
            .branch()
            .ok_or_else(|| SipParseError::new("Via has no branch parameter"))?;

        Ok(Self::client(branch, headers.cseq.method()))
    }

    /// Derives the server key for a received request. For ACK the key
    /// equals the INVITE transaction's key.
    pub fn server_from_request(request: &IncomingRequest) -> Result<Self> {
        let via = &request.info.mandatory_headers.via;
        let branch = via
            .branch()
            .ok_or_else(|| SipParseError::new("Via has no branch parameter"))?;

        Ok(Self::server(branch, request.method(), via.sent_by.clone()))
    }

    /// Derives the server key for a response the server side is sending:
    /// topmost Via branch and sent-by plus the CSeq method.
    pub fn server_from_response(response: &Response) -> Result<Self> {
        let via = response
            .headers
            .top_via()
            .ok_or(Error::MissingRequiredHeader(Via::NAME))?;
        let branch = via
            .branch()
            .ok_or_else(|| SipParseError::new("Via has no branch parameter"))?;
        let cseq = response
            .headers
            .cseq()
            .ok_or(Error::MissingRequiredHeader(CSeq::NAME))?;

        Ok(Self::server(branch, cseq.method(), via.sent_by.clone()))
    }

    /// Returns `true` for a server key.
    pub fn is_server(&self) -> bool {
        matches!(self, TsxKey::Server(_))
    }

    /// Returns `true` for a key of the INVITE class.
    pub fn is_invite(&self) -> bool {
        match self {
            TsxKey::Client(key) => key.method.is_none(),
            TsxKey::Server(key) => key.method.is_none(),
        }
    }

    /// Returns the branch of this key.
    pub fn branch(&self) -> &ArcStr {
        match self {
            TsxKey::Client(key) => &key.branch,
            TsxKey::Server(key) => &key.branch,
        }
    }
}

impl fmt::Display for TsxKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (role, method) = match self {
            TsxKey::Client(key) => ("client", &key.method),
            TsxKey::Server(key) => ("server", &key.method),
        };

        write!(f, "{}:{}:", role, self.branch())?;
        match method {
            Some(method) => write!(f, "{}", method),
            None => write!(f, "{}", Method::Invite),
        }
    }
}
