//! Typed SIP headers.
//!
//! Only the headers the transaction layer inspects get a typed
//! representation; everything else rides along in [`Header::Other`].

use std::fmt;

use enum_as_inner::EnumAsInner;
use util::ArcStr;

use crate::error::Error;

mod call_id;
mod content_length;
mod cseq;
mod fromto;
mod max_forwards;
mod route;
mod via;

pub use call_id::CallId;
pub use content_length::ContentLength;
pub use cseq::CSeq;
pub use fromto::{From, NameAddr, To};
pub use max_forwards::MaxForwards;
pub use route::{RecordRoute, Route};
pub use via::{BRANCH_MAGIC_COOKIE, Via};

/// A single SIP header.
#[derive(Debug, Clone, PartialEq, EnumAsInner)]
pub enum Header {
    /// A `Via` header.
    Via(Via),
    /// A `From` header.
    From(From),
    /// A `To` header.
    To(To),
    /// A `Call-ID` header.
    CallId(CallId),
    /// A `CSeq` header.
    CSeq(CSeq),
    /// A `Max-Forwards` header.
    MaxForwards(MaxForwards),
    /// A `Content-Length` header.
    ContentLength(ContentLength),
    /// A `Route` header.
    Route(Route),
    /// A `Record-Route` header.
    RecordRoute(RecordRoute),
    /// Any header this crate does not interpret, kept as raw name/value.
    Other(ArcStr, ArcStr),
}

impl Header {
    /// Returns the header name.
    pub fn name(&self) -> &str {
        match self {
            Header::Via(_) => Via::NAME,
            Header::From(_) => From::NAME,
            Header::To(_) => To::NAME,
            Header::CallId(_) => CallId::NAME,
            Header::CSeq(_) => CSeq::NAME,
            Header::MaxForwards(_) => MaxForwards::NAME,
            Header::ContentLength(_) => ContentLength::NAME,
            Header::Route(_) => Route::NAME,
            Header::RecordRoute(_) => RecordRoute::NAME,
            Header::Other(name, _) => name,
        }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.name())?;
        match self {
            Header::Via(via) => write!(f, "{}", via),
            Header::From(from) => write!(f, "{}", from),
            Header::To(to) => write!(f, "{}", to),
            Header::CallId(call_id) => write!(f, "{}", call_id),
            Header::CSeq(cseq) => write!(f, "{}", cseq),
            Header::MaxForwards(max_forwards) => write!(f, "{}", max_forwards),
            Header::ContentLength(content_length) => write!(f, "{}", content_length),
            Header::Route(route) => write!(f, "{}", route),
            Header::RecordRoute(record_route) => write!(f, "{}", record_route),
            Header::Other(_, value) => write!(f, "{}", value),
        }
    }
}

/// An ordered collection of SIP headers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Headers(Vec<Header>);

impl Headers {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Creates an empty collection with the given capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    /// Appends a header.
    pub fn push(&mut self, header: Header) {
        self.0.push(header);
    }

    /// Returns the number of headers.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no headers.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the headers.
    pub fn iter(&self) -> std::slice::Iter<'_, Header> {
        self.0.iter()
    }

    /// Iterates mutably over the headers.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Header> {
        self.0.iter_mut()
    }

    /// Returns the topmost `Via` header.
    pub fn top_via(&self) -> Option<&Via> {
        self.0.iter().find_map(|h| h.as_via())
    }

    /// Returns the topmost `Via` header mutably.
    pub fn top_via_mut(&mut self) -> Option<&mut Via> {
        self.0.iter_mut().find_map(|h| h.as_via_mut())
    }

    /// Returns the `CSeq` header.
    pub fn cseq(&self) -> Option<&CSeq> {
        self.0.iter().find_map(|h| h.as_c_seq())
    }

    /// Returns the `From` header.
    pub fn from(&self) -> Option<&From> {
        self.0.iter().find_map(|h| h.as_from())
    }

    /// Returns the `To` header.
    pub fn to(&self) -> Option<&To> {
        self.0.iter().find_map(|h| h.as_to())
    }

    /// Returns the `To` header mutably.
    pub fn to_mut(&mut self) -> Option<&mut To> {
        self.0.iter_mut().find_map(|h| h.as_to_mut())
    }

    /// Returns the `Call-ID` header.
    pub fn call_id(&self) -> Option<&CallId> {
        self.0.iter().find_map(|h| h.as_call_id())
    }

    /// Returns the `Content-Length` header.
    pub fn content_length(&self) -> Option<&ContentLength> {
        self.0.iter().find_map(|h| h.as_content_length())
    }

    /// Iterates over the `Route` headers in order.
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.0.iter().filter_map(|h| h.as_route())
    }
}

impl<const N: usize> std::convert::From<[Header; N]> for Headers {
    fn from(headers: [Header; N]) -> Self {
        Self(headers.into())
    }
}

impl Extend<Header> for Headers {
    fn extend<T: IntoIterator<Item = Header>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

impl IntoIterator for Headers {
    type Item = Header;
    type IntoIter = std::vec::IntoIter<Header>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'h> IntoIterator for &'h Headers {
    type Item = &'h Header;
    type IntoIter = std::slice::Iter<'h, Header>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// The headers every routable SIP message must carry.
///
/// Extracted once when a message enters the stack; the transaction layer
/// keys and matches on these without walking the header list again.
#[derive(Debug, Clone)]
pub struct MandatoryHeaders {
    /// The topmost `Via` header.
    pub via: Via,
    /// The `From` header.
    pub from: From,
    /// The `To` header.
    pub to: To,
    /// The `Call-ID` header.
    pub call_id: CallId,
    /// The `CSeq` header.
    pub cseq: CSeq,
}

impl TryFrom<&Headers> for MandatoryHeaders {
    type Error = Error;

    fn try_from(headers: &Headers) -> Result<Self, Self::Error> {
        let via = headers
            .top_via()
            .ok_or(Error::MissingRequiredHeader(Via::NAME))?
            .clone();
        let from = headers
            .from()
            .ok_or(Error::MissingRequiredHeader(From::NAME))?
            .clone();
        let to = headers
            .to()
            .ok_or(Error::MissingRequiredHeader(To::NAME))?
            .clone();
        let call_id = headers
            .call_id()
            .ok_or(Error::MissingRequiredHeader(CallId::NAME))?
            .clone();
        let cseq = headers
            .cseq()
            .ok_or(Error::MissingRequiredHeader(CSeq::NAME))?
            .clone();

        Ok(Self {
            via,
            from,
            to,
            call_id,
            cseq,
        })
    }
}
