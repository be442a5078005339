use std::fmt;
use std::str::FromStr;

use util::ArcStr;

use crate::error::SipParseError;

/// The `Call-ID` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallId(ArcStr);

impl CallId {
    /// The header name.
    pub const NAME: &'static str = "Call-ID";
    /// The compact header name.
    pub const SHORT_NAME: &'static str = "i";

    /// Creates a new `Call-ID`.
    pub fn new(id: impl Into<ArcStr>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CallId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl FromStr for CallId {
    type Err = SipParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(SipParseError::new("Empty Call-ID"));
        }
        Ok(Self::new(s))
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
