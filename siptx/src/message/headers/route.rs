use std::fmt;
use std::str::FromStr;

use crate::error::SipParseError;
use crate::message::{Param, Params};

use super::NameAddr;

/// The `Route` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// The route address.
    pub addr: NameAddr,
    /// Any header parameters.
    pub params: Params,
}

impl Route {
    /// The header name.
    pub const NAME: &'static str = "Route";
}

impl FromStr for Route {
    type Err = SipParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, params) = parse_route_value(s)?;
        Ok(Self { addr, params })
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.addr, self.params)
    }
}

/// The `Record-Route` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRoute {
    /// The recorded route address.
    pub addr: NameAddr,
    /// Any header parameters.
    pub params: Params,
}

impl RecordRoute {
    /// The header name.
    pub const NAME: &'static str = "Record-Route";
}

impl FromStr for RecordRoute {
    type Err = SipParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, params) = parse_route_value(s)?;
        Ok(Self { addr, params })
    }
}

impl fmt::Display for RecordRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.addr, self.params)
    }
}

// Route values are name-addrs; loose-routing (`;lr`) lives inside the URI.
fn parse_route_value(s: &str) -> Result<(NameAddr, Params), SipParseError> {
    let s = s.trim();
    let Some(open) = s.find('<') else {
        return Err(SipParseError::new(format!("Route requires a name-addr: {:?}", s)));
    };

    let display_name = s[..open].trim();
    let rest = &s[open + 1..];
    let close = rest
        .find('>')
        .ok_or_else(|| SipParseError::new(format!("Unterminated route: {:?}", s)))?;

    let addr = NameAddr {
        display_name: (!display_name.is_empty()).then(|| display_name.trim_matches('"').into()),
        uri: rest[..close].parse()?,
    };

    let mut params = Params::new();
    for segment in rest[close + 1..].split(';').filter(|seg| !seg.trim().is_empty()) {
        params.push(Param::parse(segment)?);
    }

    Ok((addr, params))
}
