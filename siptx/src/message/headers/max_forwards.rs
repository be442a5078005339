use std::fmt;
use std::str::FromStr;

use crate::error::SipParseError;

/// The `Max-Forwards` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxForwards(u8);

impl MaxForwards {
    /// The header name.
    pub const NAME: &'static str = "Max-Forwards";

    /// Creates a new `Max-Forwards`.
    pub fn new(hops: u8) -> Self {
        Self(hops)
    }

    /// Returns the remaining hop count.
    pub fn count(&self) -> u8 {
        self.0
    }
}

impl FromStr for MaxForwards {
    type Err = SipParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse()
            .map(Self)
            .map_err(|_| SipParseError::new(format!("Invalid Max-Forwards: {:?}", s)))
    }
}

impl fmt::Display for MaxForwards {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
