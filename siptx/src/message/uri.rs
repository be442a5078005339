use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use util::ArcStr;

use crate::error::SipParseError;

use super::{Param, Params};

/// The URI scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scheme {
    /// Plain `sip:` scheme.
    #[default]
    Sip,
    /// Secure `sips:` scheme.
    Sips,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Sip => write!(f, "sip"),
            Scheme::Sips => write!(f, "sips"),
        }
    }
}

/// A host, either an IP address or a domain name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Host {
    /// An IP address.
    IpAddr(IpAddr),
    /// A domain name.
    DomainName(ArcStr),
}

impl Host {
    /// Returns `true` if this host names the given IP address.
    pub fn matches_ip(&self, ip: &IpAddr) -> bool {
        matches!(self, Host::IpAddr(host_ip) if host_ip == ip)
    }
}

impl Default for Host {
    fn default() -> Self {
        Host::DomainName("localhost".into())
    }
}

impl From<&str> for Host {
    fn from(s: &str) -> Self {
        match s.parse::<IpAddr>() {
            Ok(ip) => Host::IpAddr(ip),
            Err(_) => Host::DomainName(s.into()),
        }
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Host::IpAddr(IpAddr::V6(ip)) => write!(f, "[{}]", ip),
            Host::IpAddr(IpAddr::V4(ip)) => write!(f, "{}", ip),
            Host::DomainName(domain) => write!(f, "{}", domain),
        }
    }
}

/// A host with an optional port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct HostPort {
    /// The host part.
    pub host: Host,
    /// The port, if present.
    pub port: Option<u16>,
}

impl HostPort {
    /// Creates a new `HostPort`.
    pub fn new(host: Host, port: Option<u16>) -> Self {
        Self { host, port }
    }
}

impl FromStr for HostPort {
    type Err = SipParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(SipParseError::new("Empty host"));
        }

        // Bracketed IPv6 literal.
        if let Some(rest) = s.strip_prefix('[') {
            let Some((ip, rest)) = rest.split_once(']') else {
                return Err(SipParseError::new(format!("Unterminated IPv6 host: {}", s)));
            };
            let ip: IpAddr = ip
                .parse()
                .map_err(|_| SipParseError::new(format!("Invalid IPv6 host: {}", ip)))?;
            let port = match rest.strip_prefix(':') {
                Some(port) => Some(parse_port(port)?),
                None if rest.is_empty() => None,
                None => return Err(SipParseError::new(format!("Invalid host: {}", s))),
            };
            return Ok(HostPort::new(Host::IpAddr(ip), port));
        }

        match s.rsplit_once(':') {
            Some((host, port)) => Ok(HostPort::new(parse_host(host)?, Some(parse_port(port)?))),
            None => Ok(HostPort::new(parse_host(s)?, None)),
        }
    }
}

fn parse_host(s: &str) -> Result<Host, SipParseError> {
    if s.is_empty()
        || !s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_'))
    {
        return Err(SipParseError::new(format!("Invalid host: {:?}", s)));
    }
    Ok(Host::from(s))
}

fn parse_port(s: &str) -> Result<u16, SipParseError> {
    s.parse()
        .map_err(|_| SipParseError::new(format!("Invalid port: {}", s)))
}

impl fmt::Display for HostPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        Ok(())
    }
}

/// An SIP URI.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Uri {
    /// The URI scheme.
    pub scheme: Scheme,
    /// The user part, if present.
    pub user: Option<ArcStr>,
    /// The host and optional port.
    pub host_port: HostPort,
    /// The URI parameters.
    pub params: Params,
}

impl Uri {
    /// Creates a new URI from its host and port.
    pub fn new(host_port: HostPort) -> Self {
        Self {
            host_port,
            ..Default::default()
        }
    }

    /// Returns the `transport` URI parameter, if present.
    pub fn transport_param(&self) -> Option<&ArcStr> {
        self.params.get("transport")
    }

    /// Returns `true` if the `lr` parameter is present.
    pub fn is_loose_router(&self) -> bool {
        self.params.contains("lr")
    }
}

impl FromStr for Uri {
    type Err = SipParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (scheme, rest) = if let Some(rest) = s.strip_prefix("sips:") {
            (Scheme::Sips, rest)
        } else if let Some(rest) = s.strip_prefix("sip:") {
            (Scheme::Sip, rest)
        } else {
            return Err(SipParseError::new(format!("Invalid URI scheme: {:?}", s)));
        };

        let (addr, params) = match rest.split_once(';') {
            Some((addr, params)) => (addr, Some(params)),
            None => (rest, None),
        };

        let (user, host) = match addr.split_once('@') {
            Some((user, host)) => (Some(ArcStr::from(user)), host),
            None => (None, addr),
        };

        let host_port: HostPort = host.parse()?;

        let mut uri = Uri {
            scheme,
            user,
            host_port,
            params: Params::new(),
        };

        if let Some(params) = params {
            for segment in params.split(';') {
                uri.params.push(Param::parse(segment)?);
            }
        }

        Ok(uri)
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.scheme)?;
        if let Some(user) = &self.user {
            write!(f, "{}@", user)?;
        }
        write!(f, "{}{}", self.host_port, self.params)
    }
}
