use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use util::ArcStr;

use crate::error::SipParseError;
use crate::message::{HostPort, Param, Params, TransportType};

/// Prefix required on every RFC 3261 compliant branch parameter.
pub const BRANCH_MAGIC_COOKIE: &str = "z9hG4bK";

const SIP_VERSION_PREFIX: &str = "SIP/2.0/";

/// The `Via` header.
///
/// The topmost `Via` carries the branch that identifies the transaction on
/// the wire, plus the `received`/`rport` parameters filled in by the server
/// side (RFC 3261 §18.2.1, RFC 3581).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Via {
    /// The transport this hop used.
    pub transport: TransportType,
    /// The `sent-by` host and optional port.
    pub sent_by: HostPort,
    /// The `branch` parameter.
    pub branch: Option<ArcStr>,
    /// The `received` parameter.
    pub received: Option<IpAddr>,
    /// The `rport` parameter value, when filled in.
    pub rport: Option<u16>,
    /// `;rport` was present without a value.
    rport_requested: bool,
    /// Any other parameters, in order of appearance.
    pub params: Params,
}

impl Via {
    /// The header name.
    pub const NAME: &'static str = "Via";
    /// The compact header name.
    pub const SHORT_NAME: &'static str = "v";

    /// Creates a new `Via` for the given transport and sent-by.
    pub fn new(transport: TransportType, sent_by: HostPort, branch: Option<&str>) -> Self {
        Self {
            transport,
            sent_by,
            branch: branch.map(Into::into),
            received: None,
            rport: None,
            rport_requested: false,
            params: Params::new(),
        }
    }

    /// Returns the branch parameter.
    pub fn branch(&self) -> Option<&ArcStr> {
        self.branch.as_ref()
    }

    /// Replaces the branch parameter.
    pub fn set_branch(&mut self, branch: &str) {
        self.branch = Some(branch.into());
    }

    /// Returns `true` if the branch carries the RFC 3261 magic cookie.
    pub fn is_rfc3261_branch(&self) -> bool {
        self.branch
            .as_ref()
            .is_some_and(|b| b.starts_with(BRANCH_MAGIC_COOKIE))
    }

    /// Sets the `received` parameter.
    pub fn set_received(&mut self, ip: IpAddr) {
        self.received = Some(ip);
    }

    /// Sets the `rport` parameter value.
    pub fn set_rport(&mut self, port: u16) {
        self.rport = Some(port);
    }

    /// Returns `true` if the sender asked for `rport` handling.
    pub fn rport_requested(&self) -> bool {
        self.rport_requested || self.rport.is_some()
    }
}

impl FromStr for Via {
    type Err = SipParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let rest = s
            .strip_prefix(SIP_VERSION_PREFIX)
            .ok_or_else(|| SipParseError::new(format!("Invalid Via protocol: {:?}", s)))?;

        let (transport, rest) = rest
            .split_once(char::is_whitespace)
            .ok_or_else(|| SipParseError::new(format!("Missing Via sent-by: {:?}", s)))?;
        let transport: TransportType = transport.parse()?;

        let (sent_by, params) = match rest.trim_start().split_once(';') {
            Some((sent_by, params)) => (sent_by, Some(params)),
            None => (rest.trim_start(), None),
        };
        let sent_by: HostPort = sent_by.parse()?;

        let mut via = Via::new(transport, sent_by, None);

        if let Some(params) = params {
            for segment in params.split(';') {
                let param = Param::parse(segment)?;
                match (param.name.as_str(), param.value.as_deref()) {
                    ("branch", Some(branch)) => via.branch = Some(branch.into()),
                    ("received", Some(ip)) => {
                        via.received = Some(ip.parse().map_err(|_| {
                            SipParseError::new(format!("Invalid received parameter: {}", ip))
                        })?);
                    }
                    ("rport", Some(port)) => {
                        via.rport = Some(port.parse().map_err(|_| {
                            SipParseError::new(format!("Invalid rport parameter: {}", port))
                        })?);
                    }
                    ("rport", None) => via.rport_requested = true,
                    _ => via.params.push(param),
                }
            }
        }

        Ok(via)
    }
}

impl fmt::Display for Via {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{} {}{}",
            SIP_VERSION_PREFIX, self.transport, self.sent_by, self.params
        )?;
        match self.rport {
            Some(port) => write!(f, ";rport={}", port)?,
            None if self.rport_requested => write!(f, ";rport")?,
            None => {}
        }
        if let Some(received) = &self.received {
            write!(f, ";received={}", received)?;
        }
        if let Some(branch) = &self.branch {
            write!(f, ";branch={}", branch)?;
        }
        Ok(())
    }
}
