use std::net::SocketAddr;
use std::ops;

use crate::message::{MandatoryHeaders, Method, Request, Response, StatusCode};
use crate::transaction::key::TsxKey;

use super::{Transport, TransportMessage};

/// Context attached to every message entering the stack.
#[derive(Clone)]
pub struct IncomingMessageInfo {
    /// The mandatory headers extracted from the message.
    pub mandatory_headers: MandatoryHeaders,
    /// The received transport packet.
    pub transport: TransportMessage,
    /// The transaction this message was matched to, if any.
    pub tsx_key: Option<TsxKey>,
}

impl IncomingMessageInfo {
    /// Creates a new info block for an unmatched message.
    pub fn new(transport: TransportMessage, mandatory_headers: MandatoryHeaders) -> Self {
        Self {
            mandatory_headers,
            transport,
            tsx_key: None,
        }
    }
}

/// This type represents a received SIP request.
#[derive(Clone)]
pub struct IncomingRequest {
    /// The SIP message.
    pub message: Request,
    /// Incoming message info.
    pub info: Box<IncomingMessageInfo>,
}

impl IncomingRequest {
    /// Creates a new incoming request.
    pub fn new(message: Request, info: IncomingMessageInfo) -> Self {
        Self {
            message,
            info: Box::new(info),
        }
    }

    /// Returns the request method.
    pub fn method(&self) -> &Method {
        self.message.method()
    }

    /// Returns the source address of the packet.
    pub fn source(&self) -> SocketAddr {
        self.info.transport.packet.source
    }

    /// Returns the transport the request arrived on.
    pub fn transport(&self) -> &Transport {
        &self.info.transport.transport
    }

    /// Returns the key of the transaction this request was matched to.
    pub fn tsx_key(&self) -> Option<&TsxKey> {
        self.info.tsx_key.as_ref()
    }
}

impl ops::Deref for IncomingRequest {
    type Target = Request;

    fn deref(&self) -> &Self::Target {
        &self.message
    }
}

/// This type represents a received SIP response.
#[derive(Clone)]
pub struct IncomingResponse {
    /// The SIP message.
    pub message: Response,
    /// Incoming message info.
    pub info: Box<IncomingMessageInfo>,
}

impl IncomingResponse {
    /// Creates a new incoming response.
    pub fn new(message: Response, info: IncomingMessageInfo) -> Self {
        Self {
            message,
            info: Box::new(info),
        }
    }

    /// Returns the response status code.
    pub fn status_code(&self) -> StatusCode {
        self.message.code()
    }

    /// Returns the source address of the packet.
    pub fn source(&self) -> SocketAddr {
        self.info.transport.packet.source
    }

    /// Returns the transport the response arrived on.
    pub fn transport(&self) -> &Transport {
        &self.info.transport.transport
    }

    /// Returns the key of the transaction this response was matched to.
    pub fn tsx_key(&self) -> Option<&TsxKey> {
        self.info.tsx_key.as_ref()
    }
}

impl ops::Deref for IncomingResponse {
    type Target = Response;

    fn deref(&self) -> &Self::Target {
        &self.message
    }
}
