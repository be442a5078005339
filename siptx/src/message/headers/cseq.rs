use std::fmt;
use std::str::FromStr;

use crate::error::SipParseError;
use crate::message::Method;

/// The `CSeq` header: a sequence number paired with a method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CSeq {
    /// The sequence number.
    pub cseq: u32,
    /// The method.
    pub method: Method,
}

impl CSeq {
    /// The header name.
    pub const NAME: &'static str = "CSeq";

    /// Creates a new `CSeq`.
    pub fn new(cseq: u32, method: Method) -> Self {
        Self { cseq, method }
    }

    /// Returns the method.
    pub fn method(&self) -> &Method {
        &self.method
    }
}

impl FromStr for CSeq {
    type Err = SipParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (cseq, method) = s
            .trim()
            .split_once(char::is_whitespace)
            .ok_or_else(|| SipParseError::new(format!("Invalid CSeq: {:?}", s)))?;

        let cseq = cseq
            .parse()
            .map_err(|_| SipParseError::new(format!("Invalid CSeq number: {:?}", cseq)))?;

        Ok(Self::new(cseq, method.trim().parse()?))
    }
}

impl fmt::Display for CSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.cseq, self.method)
    }
}
