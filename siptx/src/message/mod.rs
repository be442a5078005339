#![deny(missing_docs)]
//! SIP message types.
//!
//! The module provides the [`SipMessage`] enum that can be a
//! [`SipMessage::Request`] or [`SipMessage::Response`].

use std::fmt;

use bytes::Bytes;
use enum_as_inner::EnumAsInner;
use util::ArcStr;

pub mod headers;

mod code;
mod method;
mod params;
mod protocol;
mod uri;

pub use code::*;
pub use method::*;
pub use params::*;
pub use protocol::*;
pub use uri::*;

pub use headers::MandatoryHeaders;

use headers::Headers;

pub(crate) const SIP_VERSION: &str = "SIP/2.0";

/// An SIP message, either Request or Response.
#[derive(Debug, Clone, EnumAsInner)]
pub enum SipMessage {
    /// An SIP Request.
    Request(Request),
    /// An SIP Response.
    Response(Response),
}

impl SipMessage {
    /// Returns a reference to the headers of the message.
    pub fn headers(&self) -> &Headers {
        match self {
            SipMessage::Request(request) => &request.headers,
            SipMessage::Response(response) => &response.headers,
        }
    }

    /// Returns a mutable reference to the headers of the message.
    pub fn headers_mut(&mut self) -> &mut Headers {
        match self {
            SipMessage::Request(request) => &mut request.headers,
            SipMessage::Response(response) => &mut response.headers,
        }
    }

    /// Returns a reference to the message body.
    pub fn body(&self) -> Option<&Bytes> {
        match self {
            SipMessage::Request(request) => request.body.as_ref(),
            SipMessage::Response(response) => response.body.as_ref(),
        }
    }
}

impl From<Request> for SipMessage {
    fn from(request: Request) -> Self {
        SipMessage::Request(request)
    }
}

impl From<Response> for SipMessage {
    fn from(response: Response) -> Self {
        SipMessage::Response(response)
    }
}

/// The first line of a request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestLine {
    /// The request method.
    pub method: Method,
    /// The request URI.
    pub uri: Uri,
}

impl fmt::Display for RequestLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.method, self.uri, SIP_VERSION)
    }
}

/// An SIP request.
#[derive(Debug, Clone)]
pub struct Request {
    /// The request line.
    pub req_line: RequestLine,
    /// The request headers.
    pub headers: Headers,
    /// The request body, if any.
    pub body: Option<Bytes>,
}

impl Request {
    /// Creates a new request without headers.
    pub fn new(method: Method, uri: Uri) -> Self {
        Self::with_headers(method, uri, Headers::new())
    }

    /// Creates a new request with the given headers.
    pub fn with_headers(method: Method, uri: Uri, headers: Headers) -> Self {
        Self {
            req_line: RequestLine { method, uri },
            headers,
            body: None,
        }
    }

    /// Returns the request method.
    pub fn method(&self) -> &Method {
        &self.req_line.method
    }

    /// Returns `true` if the message method matches the given method.
    pub fn is_method(&self, method: &Method) -> bool {
        self.method() == method
    }
}

/// The first line of a response.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusLine {
    /// The status code.
    pub code: StatusCode,
    /// The reason phrase.
    pub reason: ArcStr,
}

impl StatusLine {
    /// Creates a new status line.
    pub fn new(code: StatusCode, reason: &str) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", SIP_VERSION, self.code, self.reason)
    }
}

/// An SIP response.
#[derive(Debug, Clone)]
pub struct Response {
    /// The status line.
    pub status_line: StatusLine,
    /// The response headers.
    pub headers: Headers,
    /// The response body, if any.
    pub body: Option<Bytes>,
}

impl Response {
    /// Creates a new response without headers.
    pub fn new(status_line: StatusLine) -> Self {
        Self::with_headers(status_line, Headers::new())
    }

    /// Creates a new response with the given headers.
    pub fn with_headers(status_line: StatusLine, headers: Headers) -> Self {
        Self {
            status_line,
            headers,
            body: None,
        }
    }

    /// Returns the status code.
    pub fn code(&self) -> StatusCode {
        self.status_line.code
    }
}
