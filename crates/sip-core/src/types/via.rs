//! # SIP Via Header
//!
//! One Via entry as defined in
//! [RFC 3261 Section 20.42](https://datatracker.ietf.org/doc/html/rfc3261#section-20.42).
//! Comma-separated Via lists are split by the preparser, so each
//! [`HeaderFieldValue`](crate::types::headers::HeaderFieldValue) of a Via
//! header holds exactly one entry.
//!
//! ```text
//! Via: SIP/2.0/UDP pc33.atlanta.com:5060;branch=z9hG4bK776asdhds
//! ```
//!
//! ## Parameters the stack cares about
//!
//! - `branch`: transaction identifier; RFC 3261 agents prefix it with [`BRANCH_MAGIC_COOKIE`]
//! - `received`: source IP stamped by the receiver when it differs from sent-by
//! - `rport`: symmetric response routing (RFC 3581)
//!
//! ```rust
//! use strata_sip_core::Via;
//! use std::str::FromStr;
//!
//! let via = Via::from_str("SIP/2.0/UDP pc33.atlanta.com;branch=z9hG4bK776asdhds;rport").unwrap();
//! assert_eq!(via.branch(), Some("z9hG4bK776asdhds"));
//! assert!(via.is_rfc3261());
//! assert_eq!(via.sent_by(), "pc33.atlanta.com:5060");
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::parser;
use crate::types::param::Params;

/// Branch prefix that marks an RFC 3261 compliant transaction identifier
pub const BRANCH_MAGIC_COOKIE: &str = "z9hG4bK";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Via {
    /// Protocol name and version, normally `SIP/2.0`
    pub protocol: String,
    /// Transport token as written (`UDP`, `TCP`, ...)
    pub transport: String,
    pub host: String,
    pub port: Option<u16>,
    pub params: Params,
}

impl Via {
    pub fn new(transport: impl Into<String>, host: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            protocol: "SIP/2.0".to_string(),
            transport: transport.into(),
            host: host.into(),
            port,
            params: Params::new(),
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.set_branch(branch);
        self
    }

    pub fn branch(&self) -> Option<&str> {
        self.params.get("branch")
    }

    pub fn set_branch(&mut self, branch: impl Into<String>) {
        self.params.set("branch", Some(branch.into()));
    }

    /// True when the branch carries the RFC 3261 magic cookie
    pub fn is_rfc3261(&self) -> bool {
        self.branch()
            .map_or(false, |b| b.starts_with(BRANCH_MAGIC_COOKIE))
    }

    pub fn received(&self) -> Option<&str> {
        self.params.get("received")
    }

    /// `None` when absent, `Some(None)` for a bare `;rport`
    pub fn rport(&self) -> Option<Option<u16>> {
        if !self.params.contains("rport") {
            return None;
        }
        Some(self.params.get("rport").and_then(|v| v.parse().ok()))
    }

    /// Effective port, defaulting per transport
    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or_else(|| {
            if self.transport.eq_ignore_ascii_case("tls") {
                5061
            } else {
                5060
            }
        })
    }

    /// `host:port` with the default port filled in, used for transaction matching
    pub fn sent_by(&self) -> String {
        format!("{}:{}", self.host.to_ascii_lowercase(), self.port_or_default())
    }
}

impl fmt::Display for Via {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} {}", self.protocol, self.transport, self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        write!(f, "{}", self.params)
    }
}

impl FromStr for Via {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parser::parse_complete(parser::headers::via, s.as_bytes())
            .map_err(|reason| Error::invalid_header("Via", reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let raw = "SIP/2.0/TCP client.biloxi.com:5070;branch=z9hG4bKnashds7;received=192.0.2.4";
        let via = Via::from_str(raw).unwrap();
        assert_eq!(via.transport, "TCP");
        assert_eq!(via.port, Some(5070));
        assert_eq!(via.received(), Some("192.0.2.4"));
        assert_eq!(via.to_string(), raw);
    }

    #[test]
    fn test_lenient_spacing() {
        let via = Via::from_str("SIP / 2.0 / UDP  host.example.com ;branch=1234").unwrap();
        assert_eq!(via.protocol, "SIP/2.0");
        assert_eq!(via.host, "host.example.com");
        assert!(!via.is_rfc3261());
        assert_eq!(via.sent_by(), "host.example.com:5060");
    }

    #[test]
    fn test_rport() {
        let mut via = Via::new("UDP", "10.0.0.1", Some(5060)).with_branch("z9hG4bKx");
        assert_eq!(via.rport(), None);
        via.params.set("rport", None);
        assert_eq!(via.rport(), Some(None));
        via.params.set("rport", Some("6000".to_string()));
        assert_eq!(via.rport(), Some(Some(6000)));
    }

    #[test]
    fn test_missing_sent_by() {
        assert!(Via::from_str("SIP/2.0/UDP").is_err());
    }
}
