use std::fmt;
use std::str::FromStr;

use crate::error::SipParseError;

/// The transport protocol carrying an SIP message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransportType {
    /// UDP transport.
    #[default]
    Udp,
    /// TCP transport.
    Tcp,
    /// TLS over TCP transport.
    Tls,
}

impl TransportType {
    /// Returns the canonical token used in `Via` headers.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportType::Udp => "UDP",
            TransportType::Tcp => "TCP",
            TransportType::Tls => "TLS",
        }
    }

    /// Returns `true` for connection oriented transports.
    ///
    /// Transaction retransmission timers are disabled on reliable
    /// transports (RFC 3261 §17).
    pub fn is_reliable(&self) -> bool {
        matches!(self, TransportType::Tcp | TransportType::Tls)
    }

    /// Returns `true` for encrypted transports.
    pub fn is_secure(&self) -> bool {
        matches!(self, TransportType::Tls)
    }

    /// Returns the default port for this transport.
    pub fn default_port(&self) -> u16 {
        match self {
            TransportType::Udp | TransportType::Tcp => 5060,
            TransportType::Tls => 5061,
        }
    }
}

impl FromStr for TransportType {
    type Err = SipParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("UDP") {
            Ok(TransportType::Udp)
        } else if s.eq_ignore_ascii_case("TCP") {
            Ok(TransportType::Tcp)
        } else if s.eq_ignore_ascii_case("TLS") {
            Ok(TransportType::Tls)
        } else {
            Err(SipParseError::new(format!("Unknown transport: {:?}", s)))
        }
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
