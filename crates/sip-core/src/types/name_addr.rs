//! `name-addr` / `addr-spec` values used by From, To, Contact, Route and
//! Record-Route.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::parser;
use crate::types::param::Params;
use crate::types::uri::Uri;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NameAddr {
    /// Display name exactly as received, quotes included
    pub display_name: Option<String>,
    pub uri: Uri,
    /// Header parameters (after the closing `>`)
    pub params: Params,
    /// Whether the URI was enclosed in angle brackets
    pub angle_brackets: bool,
}

impl NameAddr {
    pub fn new(uri: Uri) -> Self {
        Self {
            display_name: None,
            uri,
            params: Params::new(),
            angle_brackets: true,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn tag(&self) -> Option<&str> {
        self.params.get("tag")
    }

    pub fn set_tag(&mut self, tag: impl Into<String>) {
        self.params.set("tag", Some(tag.into()));
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.set_tag(tag);
        self
    }
}

impl fmt::Display for NameAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.display_name {
            write!(f, "{} ", name)?;
        }
        // a display name or URI parameters force the bracketed form
        if self.angle_brackets || self.display_name.is_some() || !self.uri.params.is_empty() {
            write!(f, "<{}>", self.uri)?;
        } else {
            write!(f, "{}", self.uri)?;
        }
        write!(f, "{}", self.params)
    }
}

impl FromStr for NameAddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parser::parse_complete(parser::headers::name_addr, s.as_bytes())
            .map_err(|reason| Error::invalid_header("name-addr", reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_display_name() {
        let raw = "\"Bob\" <sips:bob@biloxi.com>;tag=a48s";
        let na = NameAddr::from_str(raw).unwrap();
        assert_eq!(na.display_name.as_deref(), Some("\"Bob\""));
        assert_eq!(na.uri.scheme, "sips");
        assert_eq!(na.tag(), Some("a48s"));
        assert_eq!(na.to_string(), raw);
    }

    #[test]
    fn test_token_display_name() {
        let na = NameAddr::from_str("Anonymous <sip:c8oqz84zk7z@privacy.org>;tag=hyh8").unwrap();
        assert_eq!(na.display_name.as_deref(), Some("Anonymous"));
        assert_eq!(na.uri.user.as_deref(), Some("c8oqz84zk7z"));
    }

    #[test]
    fn test_addr_spec() {
        let na = NameAddr::from_str("sip:+12125551212@phone2net.com;tag=887s").unwrap();
        assert!(!na.angle_brackets);
        assert_eq!(na.tag(), Some("887s"));
        assert!(na.uri.params.is_empty());
        assert_eq!(na.to_string(), "sip:+12125551212@phone2net.com;tag=887s");
    }

    #[test]
    fn test_set_tag() {
        let mut na = NameAddr::from_str("<sip:alice@atlanta.com>").unwrap();
        assert_eq!(na.tag(), None);
        na.set_tag("1928301774");
        assert_eq!(na.to_string(), "<sip:alice@atlanta.com>;tag=1928301774");
    }
}
