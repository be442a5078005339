use std::fmt;
use std::str::FromStr;

use crate::error::SipParseError;

/// The `Content-Length` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContentLength(u32);

impl ContentLength {
    /// The header name.
    pub const NAME: &'static str = "Content-Length";
    /// The compact header name.
    pub const SHORT_NAME: &'static str = "l";

    /// Creates a new `Content-Length`.
    pub fn new(length: u32) -> Self {
        Self(length)
    }

    /// Returns the body length in bytes.
    pub fn len(&self) -> u32 {
        self.0
    }

    /// Returns `true` for an empty body.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if `name` is this header's long or compact name,
    /// compared case-insensitively.
    pub fn matches_name(name: &[u8]) -> bool {
        name.eq_ignore_ascii_case(Self::NAME.as_bytes())
            || name.eq_ignore_ascii_case(Self::SHORT_NAME.as_bytes())
    }
}

impl FromStr for ContentLength {
    type Err = SipParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse()
            .map(Self)
            .map_err(|_| SipParseError::new(format!("Invalid Content-Length: {:?}", s)))
    }
}

impl fmt::Display for ContentLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
