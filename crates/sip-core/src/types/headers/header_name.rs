use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::parser::token::is_token_char;

/// SIP header names known to the stack
///
/// Header names are case-insensitive in SIP. Parsing accepts any case and
/// the RFC 3261 Section 7.3.3 compact forms; [`HeaderName::as_str`] always
/// yields the canonical long form. Unknown headers keep their original
/// spelling in [`HeaderName::Other`].
///
/// # Examples
///
/// ```rust
/// use strata_sip_core::HeaderName;
/// use std::str::FromStr;
///
/// assert_eq!(HeaderName::from_str("v").unwrap(), HeaderName::Via);
/// assert_eq!(HeaderName::from_str("content-length").unwrap().as_str(), "Content-Length");
/// assert!(HeaderName::Via.is_comma_tokenizing());
/// assert!(!HeaderName::Subject.is_comma_tokenizing());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HeaderName {
    Accept,
    AcceptEncoding,
    AcceptLanguage,
    AlertInfo,
    Allow,
    AllowEvents,
    CallId,
    CallInfo,
    Contact,
    ContentEncoding,
    ContentLanguage,
    ContentLength,
    ContentType,
    CSeq,
    ErrorInfo,
    Event,
    Expires,
    From,
    InReplyTo,
    MaxForwards,
    Path,
    ProxyRequire,
    RecordRoute,
    ReferTo,
    ReferredBy,
    Require,
    RequestDisposition,
    RetryAfter,
    Route,
    Server,
    SessionExpires,
    Subject,
    Supported,
    Timestamp,
    To,
    Unsupported,
    UserAgent,
    Via,
    Warning,
    /// Any other header, spelled as received
    Other(String),
}

impl HeaderName {
    /// Canonical long-form name
    pub fn as_str(&self) -> &str {
        match self {
            HeaderName::Accept => "Accept",
            HeaderName::AcceptEncoding => "Accept-Encoding",
            HeaderName::AcceptLanguage => "Accept-Language",
            HeaderName::AlertInfo => "Alert-Info",
            HeaderName::Allow => "Allow",
            HeaderName::AllowEvents => "Allow-Events",
            HeaderName::CallId => "Call-ID",
            HeaderName::CallInfo => "Call-Info",
            HeaderName::Contact => "Contact",
            HeaderName::ContentEncoding => "Content-Encoding",
            HeaderName::ContentLanguage => "Content-Language",
            HeaderName::ContentLength => "Content-Length",
            HeaderName::ContentType => "Content-Type",
            HeaderName::CSeq => "CSeq",
            HeaderName::ErrorInfo => "Error-Info",
            HeaderName::Event => "Event",
            HeaderName::Expires => "Expires",
            HeaderName::From => "From",
            HeaderName::InReplyTo => "In-Reply-To",
            HeaderName::MaxForwards => "Max-Forwards",
            HeaderName::Path => "Path",
            HeaderName::ProxyRequire => "Proxy-Require",
            HeaderName::RecordRoute => "Record-Route",
            HeaderName::ReferTo => "Refer-To",
            HeaderName::ReferredBy => "Referred-By",
            HeaderName::Require => "Require",
            HeaderName::RequestDisposition => "Request-Disposition",
            HeaderName::RetryAfter => "Retry-After",
            HeaderName::Route => "Route",
            HeaderName::Server => "Server",
            HeaderName::SessionExpires => "Session-Expires",
            HeaderName::Subject => "Subject",
            HeaderName::Supported => "Supported",
            HeaderName::Timestamp => "Timestamp",
            HeaderName::To => "To",
            HeaderName::Unsupported => "Unsupported",
            HeaderName::UserAgent => "User-Agent",
            HeaderName::Via => "Via",
            HeaderName::Warning => "Warning",
            HeaderName::Other(name) => name,
        }
    }

    /// Headers whose grammar is a comma-separated list of elements. The
    /// preparser splits these into one field value per element.
    pub fn is_comma_tokenizing(&self) -> bool {
        matches!(
            self,
            HeaderName::Via
                | HeaderName::Contact
                | HeaderName::Route
                | HeaderName::RecordRoute
                | HeaderName::Allow
                | HeaderName::AllowEvents
                | HeaderName::Supported
                | HeaderName::Require
                | HeaderName::ProxyRequire
                | HeaderName::Unsupported
                | HeaderName::Accept
                | HeaderName::AcceptEncoding
                | HeaderName::AcceptLanguage
                | HeaderName::ContentEncoding
                | HeaderName::ContentLanguage
                | HeaderName::InReplyTo
                | HeaderName::Path
                | HeaderName::Warning
                | HeaderName::AlertInfo
                | HeaderName::CallInfo
                | HeaderName::ErrorInfo
        )
    }

    /// Case-insensitive comparison, also for [`HeaderName::Other`]
    pub fn matches(&self, other: &HeaderName) -> bool {
        match (self, other) {
            (HeaderName::Other(a), HeaderName::Other(b)) => a.eq_ignore_ascii_case(b),
            (a, b) => a == b,
        }
    }

    fn from_compact(c: u8) -> Option<HeaderName> {
        Some(match c.to_ascii_lowercase() {
            b'v' => HeaderName::Via,
            b'f' => HeaderName::From,
            b't' => HeaderName::To,
            b'i' => HeaderName::CallId,
            b'm' => HeaderName::Contact,
            b'l' => HeaderName::ContentLength,
            b'c' => HeaderName::ContentType,
            b'k' => HeaderName::Supported,
            b's' => HeaderName::Subject,
            b'e' => HeaderName::ContentEncoding,
            b'o' => HeaderName::Event,
            b'r' => HeaderName::ReferTo,
            b'b' => HeaderName::ReferredBy,
            b'u' => HeaderName::AllowEvents,
            b'x' => HeaderName::SessionExpires,
            b'd' => HeaderName::RequestDisposition,
            _ => return None,
        })
    }

    /// Header name from raw wire bytes
    pub fn from_bytes(raw: &[u8]) -> Result<HeaderName> {
        let name = std::str::from_utf8(raw)?;
        name.parse()
    }
}

impl fmt::Display for HeaderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HeaderName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() || !s.bytes().all(is_token_char) {
            return Err(Error::invalid_header(s, "header name is not a token"));
        }
        if s.len() == 1 {
            if let Some(name) = HeaderName::from_compact(s.as_bytes()[0]) {
                return Ok(name);
            }
        }
        let lower = s.to_ascii_lowercase();
        Ok(match lower.as_str() {
            "accept" => HeaderName::Accept,
            "accept-encoding" => HeaderName::AcceptEncoding,
            "accept-language" => HeaderName::AcceptLanguage,
            "alert-info" => HeaderName::AlertInfo,
            "allow" => HeaderName::Allow,
            "allow-events" => HeaderName::AllowEvents,
            "call-id" => HeaderName::CallId,
            "call-info" => HeaderName::CallInfo,
            "contact" => HeaderName::Contact,
            "content-encoding" => HeaderName::ContentEncoding,
            "content-language" => HeaderName::ContentLanguage,
            "content-length" => HeaderName::ContentLength,
            "content-type" => HeaderName::ContentType,
            "cseq" => HeaderName::CSeq,
            "error-info" => HeaderName::ErrorInfo,
            "event" => HeaderName::Event,
            "expires" => HeaderName::Expires,
            "from" => HeaderName::From,
            "in-reply-to" => HeaderName::InReplyTo,
            "max-forwards" => HeaderName::MaxForwards,
            "path" => HeaderName::Path,
            "proxy-require" => HeaderName::ProxyRequire,
            "record-route" => HeaderName::RecordRoute,
            "refer-to" => HeaderName::ReferTo,
            "referred-by" => HeaderName::ReferredBy,
            "require" => HeaderName::Require,
            "request-disposition" => HeaderName::RequestDisposition,
            "retry-after" => HeaderName::RetryAfter,
            "route" => HeaderName::Route,
            "server" => HeaderName::Server,
            "session-expires" => HeaderName::SessionExpires,
            "subject" => HeaderName::Subject,
            "supported" => HeaderName::Supported,
            "timestamp" => HeaderName::Timestamp,
            "to" => HeaderName::To,
            "unsupported" => HeaderName::Unsupported,
            "user-agent" => HeaderName::UserAgent,
            "via" => HeaderName::Via,
            "warning" => HeaderName::Warning,
            _ => HeaderName::Other(s.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_forms() {
        let pairs = [
            ("v", HeaderName::Via),
            ("F", HeaderName::From),
            ("t", HeaderName::To),
            ("i", HeaderName::CallId),
            ("m", HeaderName::Contact),
            ("l", HeaderName::ContentLength),
            ("c", HeaderName::ContentType),
            ("k", HeaderName::Supported),
            ("s", HeaderName::Subject),
            ("e", HeaderName::ContentEncoding),
            ("o", HeaderName::Event),
            ("r", HeaderName::ReferTo),
            ("b", HeaderName::ReferredBy),
            ("u", HeaderName::AllowEvents),
            ("x", HeaderName::SessionExpires),
            ("d", HeaderName::RequestDisposition),
        ];
        for (compact, long) in pairs {
            assert_eq!(HeaderName::from_str(compact).unwrap(), long, "compact form {}", compact);
        }
        // single letters without a compact meaning are extension headers
        assert_eq!(HeaderName::from_str("y").unwrap(), HeaderName::Other("y".to_string()));
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(HeaderName::from_str("CALL-ID").unwrap(), HeaderName::CallId);
        assert_eq!(HeaderName::from_str("cseq").unwrap().to_string(), "CSeq");
        let a = HeaderName::from_str("X-Custom").unwrap();
        let b = HeaderName::from_str("x-custom").unwrap();
        assert!(a.matches(&b));
        assert_eq!(a.as_str(), "X-Custom");
    }

    #[test]
    fn test_invalid_names() {
        assert!(HeaderName::from_str("").is_err());
        assert!(HeaderName::from_str("Bad Name").is_err());
        assert!(HeaderName::from_bytes(b"Via:").is_err());
    }
}
