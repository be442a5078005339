use std::fmt;
use std::str::FromStr;

use util::ArcStr;

use crate::error::SipParseError;
use crate::message::{Param, Params, Uri};

/// A `name-addr` value: an optional display name plus a URI.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NameAddr {
    /// The display name, if present.
    pub display_name: Option<ArcStr>,
    /// The URI.
    pub uri: Uri,
}

impl NameAddr {
    /// Creates a `NameAddr` from a bare URI.
    pub fn new(uri: Uri) -> Self {
        Self {
            display_name: None,
            uri,
        }
    }
}

impl fmt::Display for NameAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.display_name {
            write!(f, "{} ", name)?;
        }
        write!(f, "<{}>", self.uri)
    }
}

// Parses a name-addr (or addr-spec) followed by header parameters. In the
// bracketless form every `;param` belongs to the header, not the URI
// (RFC 3261 §20.10).
fn parse_name_addr(s: &str) -> Result<(NameAddr, Params), SipParseError> {
    let s = s.trim();

    let (name_addr, rest) = if let Some(open) = s.find('<') {
        let display_name = s[..open].trim();
        let rest = &s[open + 1..];
        let close = rest
            .find('>')
            .ok_or_else(|| SipParseError::new(format!("Unterminated name-addr: {:?}", s)))?;

        let uri: Uri = rest[..close].parse()?;
        let name_addr = NameAddr {
            display_name: (!display_name.is_empty())
                .then(|| display_name.trim_matches('"').into()),
            uri,
        };

        (name_addr, &rest[close + 1..])
    } else {
        let (addr, rest) = match s.split_once(';') {
            Some((addr, _)) => (addr, &s[addr.len()..]),
            None => (s, ""),
        };
        (NameAddr::new(addr.trim().parse()?), rest)
    };

    let mut params = Params::new();
    for segment in rest.split(';').filter(|seg| !seg.trim().is_empty()) {
        params.push(Param::parse(segment)?);
    }

    Ok((name_addr, params))
}

fn take_tag(params: &mut Params) -> Option<ArcStr> {
    params.remove("tag").and_then(|p| p.value)
}

/// The `From` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct From {
    /// The originator address.
    pub addr: NameAddr,
    /// The `tag` parameter.
    pub tag: Option<ArcStr>,
    /// Any other header parameters.
    pub params: Params,
}

impl From {
    /// The header name.
    pub const NAME: &'static str = "From";
    /// The compact header name.
    pub const SHORT_NAME: &'static str = "f";

    /// Returns the tag parameter.
    pub fn tag(&self) -> Option<&ArcStr> {
        self.tag.as_ref()
    }
}

impl FromStr for From {
    type Err = SipParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, mut params) = parse_name_addr(s)?;
        let tag = take_tag(&mut params);

        Ok(Self { addr, tag, params })
    }
}

impl fmt::Display for From {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.addr)?;
        if let Some(tag) = &self.tag {
            write!(f, ";tag={}", tag)?;
        }
        write!(f, "{}", self.params)
    }
}

/// The `To` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct To {
    /// The recipient address.
    pub addr: NameAddr,
    /// The `tag` parameter, added by the UAS.
    pub tag: Option<ArcStr>,
    /// Any other header parameters.
    pub params: Params,
}

impl To {
    /// The header name.
    pub const NAME: &'static str = "To";
    /// The compact header name.
    pub const SHORT_NAME: &'static str = "t";

    /// Returns the tag parameter.
    pub fn tag(&self) -> Option<&ArcStr> {
        self.tag.as_ref()
    }

    /// Sets the tag parameter.
    pub fn set_tag(&mut self, tag: Option<&ArcStr>) {
        self.tag = tag.cloned();
    }
}

impl FromStr for To {
    type Err = SipParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, mut params) = parse_name_addr(s)?;
        let tag = take_tag(&mut params);

        Ok(Self { addr, tag, params })
    }
}

impl fmt::Display for To {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.addr)?;
        if let Some(tag) = &self.tag {
            write!(f, ";tag={}", tag)?;
        }
        write!(f, "{}", self.params)
    }
}
