//! # SIP URIs
//!
//! A deliberately small URI model: enough to route a request (scheme, host,
//! port and the `transport` parameter) and to round-trip what was received.
//!
//! ```rust
//! use strata_sip_core::Uri;
//! use std::str::FromStr;
//!
//! let uri = Uri::from_str("sip:bob@biloxi.com:5062;transport=tcp").unwrap();
//! assert_eq!(uri.host, "biloxi.com");
//! assert_eq!(uri.port, Some(5062));
//! assert_eq!(uri.transport_param(), Some("tcp"));
//! assert_eq!(uri.to_string(), "sip:bob@biloxi.com:5062;transport=tcp");
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::parser;
use crate::types::param::Params;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Uri {
    /// Lower-cased scheme (`sip`, `sips`, `tel`, ...)
    pub scheme: String,
    /// User part, including any `:password`
    pub user: Option<String>,
    /// Host, or the scheme-specific part for non-SIP schemes
    pub host: String,
    pub port: Option<u16>,
    pub params: Params,
    /// Raw `?headers` component without the question mark
    pub headers: Option<String>,
}

impl Uri {
    /// A `sip:` URI for `host` with nothing else set
    pub fn sip(host: impl Into<String>) -> Self {
        Self {
            scheme: "sip".to_string(),
            user: None,
            host: host.into(),
            port: None,
            params: Params::new(),
            headers: None,
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_param(mut self, name: &str, value: Option<&str>) -> Self {
        self.params.set(name, value.map(str::to_string));
        self
    }

    /// `sip` or `sips`
    pub fn is_sip(&self) -> bool {
        self.scheme == "sip" || self.scheme == "sips"
    }

    /// Schemes this stack can route requests to
    pub fn is_supported_scheme(&self) -> bool {
        self.is_sip() || self.scheme == "tel"
    }

    pub fn transport_param(&self) -> Option<&str> {
        self.params.get("transport")
    }

    /// `host[:port]` as it would appear in a Via sent-by
    pub fn host_port(&self) -> String {
        match self.port {
            Some(p) => format!("{}:{}", self.host, p),
            None => self.host.clone(),
        }
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.scheme)?;
        if let Some(user) = &self.user {
            write!(f, "{}@", user)?;
        }
        f.write_str(&self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        write!(f, "{}", self.params)?;
        if let Some(headers) = &self.headers {
            write!(f, "?{}", headers)?;
        }
        Ok(())
    }
}

impl FromStr for Uri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match parser::uri::uri(s.as_bytes()) {
            Ok((rest, uri)) if rest.is_empty() => Ok(uri),
            Ok((rest, _)) => Err(Error::InvalidUri(format!(
                "trailing characters {:?} in {:?}",
                String::from_utf8_lossy(rest),
                s
            ))),
            Err(e) => Err(Error::InvalidUri(format!("{:?}: {}", s, e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_display() {
        let uri = Uri::sip("example.com")
            .with_user("alice")
            .with_port(5080)
            .with_param("transport", Some("udp"));
        assert_eq!(uri.to_string(), "sip:alice@example.com:5080;transport=udp");
        assert_eq!(uri.host_port(), "example.com:5080");
    }

    #[test]
    fn test_scheme_support() {
        assert!(Uri::from_str("sips:a@b.com").unwrap().is_supported_scheme());
        assert!(Uri::from_str("tel:+15551234").unwrap().is_supported_scheme());
        assert!(!Uri::from_str("mailto:someone@example.com").unwrap().is_supported_scheme());
    }

    #[test]
    fn test_invalid() {
        assert!(Uri::from_str("no-scheme").is_err());
        assert!(Uri::from_str("sip:host with space").is_err());
    }
}
