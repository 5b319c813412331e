//! # SIP Messages
//!
//! [`SipMessage`] is a request or response made of a start line, an ordered
//! header multimap and a body. Messages built by the preparser keep their
//! header values as zero-copy slices of the receive buffer and only parse
//! the ones that are asked for.
//!
//! ```rust
//! use strata_sip_core::{HeaderFieldValue, HeaderName, Method, SipMessage, Uri};
//!
//! let mut msg = SipMessage::new_request(Method::Options, Uri::sip("example.com"));
//! msg.append_header(HeaderName::CallId, HeaderFieldValue::text_value("a84b4c76e66710"));
//! assert_eq!(msg.call_id().unwrap(), "a84b4c76e66710");
//! assert!(msg.encode().starts_with(b"OPTIONS sip:example.com SIP/2.0\r\n"));
//! ```

use std::fmt;
use std::time::Instant;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::types::{
    CSeq, HeaderFieldValue, HeaderName, Headers, Method, NameAddr, StatusCode, Tuple, Uri, Via,
};

pub const SIP_VERSION: &str = "SIP/2.0";

#[derive(Debug, Clone, PartialEq)]
pub struct RequestLine {
    pub method: Method,
    pub uri: Uri,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusLine {
    pub code: StatusCode,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StartLine {
    Request(RequestLine),
    Response(StatusLine),
}

impl fmt::Display for StartLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartLine::Request(r) => write!(f, "{} {} {}", r.method, r.uri, SIP_VERSION),
            StartLine::Response(s) => write!(f, "{} {} {}", SIP_VERSION, s.code, s.reason),
        }
    }
}

/// A parsed SIP request or response
#[derive(Debug, Clone)]
pub struct SipMessage {
    start_line: StartLine,
    /// Start line as received; dropped as soon as the start line is modified
    raw_start_line: Option<Bytes>,
    headers: Headers,
    body: Bytes,
    source: Option<Tuple>,
    external: bool,
    received_at: Option<Instant>,
}

impl SipMessage {
    fn with_start_line(start_line: StartLine) -> Self {
        Self {
            start_line,
            raw_start_line: None,
            headers: Headers::new(),
            body: Bytes::new(),
            source: None,
            external: false,
            received_at: None,
        }
    }

    pub fn new_request(method: Method, uri: Uri) -> Self {
        Self::with_start_line(StartLine::Request(RequestLine { method, uri }))
    }

    /// A response with the given code; `reason` defaults to the standard phrase
    pub fn new_response(code: StatusCode, reason: Option<&str>) -> Self {
        let reason = reason.unwrap_or(code.reason_phrase()).to_string();
        Self::with_start_line(StartLine::Response(StatusLine { code, reason }))
    }

    /// Assembles a message received from the wire
    pub(crate) fn from_wire(start_line: StartLine, raw_start_line: Bytes, headers: Headers) -> Self {
        Self {
            start_line,
            raw_start_line: Some(raw_start_line),
            headers,
            body: Bytes::new(),
            source: None,
            external: true,
            received_at: None,
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(self.start_line, StartLine::Request(_))
    }

    pub fn is_response(&self) -> bool {
        matches!(self.start_line, StartLine::Response(_))
    }

    pub fn start_line(&self) -> &StartLine {
        &self.start_line
    }

    /// Mutable start line; the message will be re-encoded from the parsed form
    pub fn start_line_mut(&mut self) -> &mut StartLine {
        self.raw_start_line = None;
        &mut self.start_line
    }

    /// Method of a request, `None` for responses
    pub fn method(&self) -> Option<&Method> {
        match &self.start_line {
            StartLine::Request(r) => Some(&r.method),
            StartLine::Response(_) => None,
        }
    }

    pub fn request_uri(&self) -> Option<&Uri> {
        match &self.start_line {
            StartLine::Request(r) => Some(&r.uri),
            StartLine::Response(_) => None,
        }
    }

    /// Status code of a response, `None` for requests
    pub fn status(&self) -> Option<StatusCode> {
        match &self.start_line {
            StartLine::Response(s) => Some(s.code),
            StartLine::Request(_) => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match &self.start_line {
            StartLine::Response(s) => Some(&s.reason),
            StartLine::Request(_) => None,
        }
    }

    /// True for INVITE requests and for responses to INVITE
    pub fn is_invite(&self) -> bool {
        match self.method() {
            Some(m) => m.is_invite(),
            None => self.cseq().map_or(false, |c| c.method.is_invite()),
        }
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn header(&self, name: &HeaderName) -> Option<&HeaderFieldValue> {
        self.headers.first(name)
    }

    pub fn append_header(&mut self, name: HeaderName, value: HeaderFieldValue) {
        self.headers.append(name, value);
    }

    pub fn set_header(&mut self, name: HeaderName, value: HeaderFieldValue) {
        self.headers.set(name, value);
    }

    fn required(&self, name: HeaderName, label: &'static str) -> Result<&HeaderFieldValue> {
        self.headers.first(&name).ok_or(Error::MissingHeader(label))
    }

    /// Top-most Via entry
    pub fn top_via(&self) -> Result<&Via> {
        self.required(HeaderName::Via, "Via")?.parse::<Via>()
    }

    /// Replaces the top-most Via entry
    pub fn set_top_via(&mut self, via: Via) -> Result<()> {
        let field = self
            .headers
            .first_mut(&HeaderName::Via)
            .ok_or(Error::MissingHeader("Via"))?;
        field.set(via);
        Ok(())
    }

    /// Pushes a new top-most Via, as done when forwarding or originating a request
    pub fn push_via(&mut self, via: Via) {
        self.headers.prepend(HeaderName::Via, HeaderFieldValue::new(via));
    }

    /// Branch of the top Via, if any
    pub fn branch(&self) -> Option<&str> {
        self.top_via().ok().and_then(|v| v.branch())
    }

    pub fn cseq(&self) -> Result<&CSeq> {
        self.required(HeaderName::CSeq, "CSeq")?.parse::<CSeq>()
    }

    pub fn call_id(&self) -> Result<&str> {
        self.required(HeaderName::CallId, "Call-ID")?.as_str()
    }

    pub fn from(&self) -> Result<&NameAddr> {
        self.required(HeaderName::From, "From")?.parse::<NameAddr>()
    }

    pub fn to(&self) -> Result<&NameAddr> {
        self.required(HeaderName::To, "To")?.parse::<NameAddr>()
    }

    pub fn from_tag(&self) -> Option<&str> {
        self.from().ok().and_then(|f| f.tag())
    }

    pub fn to_tag(&self) -> Option<&str> {
        self.to().ok().and_then(|t| t.tag())
    }

    /// Declared Content-Length, `None` when the header is absent
    pub fn content_length(&self) -> Result<Option<u32>> {
        match self.headers.first(&HeaderName::ContentLength) {
            Some(field) => field.parse::<u32>().map(|n| Some(*n)),
            None => Ok(None),
        }
    }

    /// Sets Content-Length to the current body length
    pub fn update_content_length(&mut self) {
        let len = self.body.len() as u32;
        self.headers
            .set(HeaderName::ContentLength, HeaderFieldValue::new(len));
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Replaces the body and keeps Content-Length in step
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
        self.update_content_length();
    }

    /// Attaches a body exactly as framed from the wire, leaving headers alone
    pub fn attach_body(&mut self, body: Bytes) {
        self.body = body;
    }

    pub fn source(&self) -> Option<Tuple> {
        self.source
    }

    pub fn set_source(&mut self, source: Tuple) {
        self.source = Some(source);
    }

    /// True if the message came from the network rather than the TU
    pub fn is_external(&self) -> bool {
        self.external
    }

    pub fn set_external(&mut self, external: bool) {
        self.external = external;
    }

    pub fn received_at(&self) -> Option<Instant> {
        self.received_at
    }

    pub fn set_received_at(&mut self, at: Instant) {
        self.received_at = Some(at);
    }

    /// Serializes the message: start line, one `Name: value` line per field
    /// value, blank line, body.
    pub fn encode(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(512 + self.body.len());
        match &self.raw_start_line {
            Some(raw) => out.put_slice(raw),
            None => out.put_slice(self.start_line.to_string().as_bytes()),
        }
        out.put_slice(b"\r\n");
        for entry in self.headers.iter() {
            for value in &entry.values {
                out.put_slice(entry.name.as_str().as_bytes());
                out.put_slice(b": ");
                out.put_slice(value.raw());
                out.put_slice(b"\r\n");
            }
        }
        out.put_slice(b"\r\n");
        out.put_slice(&self.body);
        out.freeze()
    }

    /// One-line summary for logs
    pub fn brief(&self) -> String {
        let cseq = self
            .cseq()
            .map(|c| c.to_string())
            .unwrap_or_else(|_| "?".to_string());
        match &self.start_line {
            StartLine::Request(r) => format!("{} {} cseq={}", r.method, r.uri, cseq),
            StartLine::Response(s) => format!("{} {} cseq={}", s.code, s.reason, cseq),
        }
    }
}

impl fmt::Display for SipMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.encode()))
    }
}
