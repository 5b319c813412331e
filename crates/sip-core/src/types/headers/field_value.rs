//! Lazily parsed header field values.
//!
//! A [`HeaderFieldValue`] starts life as a zero-copy [`Bytes`] slice of the
//! buffer a message was received into. Nothing is interpreted until a typed
//! accessor asks for it; the result is cached next to the raw bytes. Setting
//! a new value replaces the slice with a freshly encoded buffer, so the
//! original receive buffer is never written to.

use std::fmt;
use std::sync::OnceLock;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::parser::whitespace::unfold_lws;
use crate::types::cseq::CSeq;
use crate::types::name_addr::NameAddr;
use crate::types::via::Via;

/// The parsed form of a field, one variant per supported type
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedField {
    Via(Via),
    CSeq(CSeq),
    NameAddr(NameAddr),
    Uint(u32),
}

/// Types a header field value can be interpreted as
pub trait FieldType: Sized + fmt::Display {
    /// Used in error messages
    const NAME: &'static str;

    fn parse_field(text: &str) -> Result<Self>;
    fn wrap(self) -> ParsedField;
    fn peek(parsed: &ParsedField) -> Option<&Self>;
}

impl FieldType for Via {
    const NAME: &'static str = "Via";

    fn parse_field(text: &str) -> Result<Self> {
        text.parse()
    }
    fn wrap(self) -> ParsedField {
        ParsedField::Via(self)
    }
    fn peek(parsed: &ParsedField) -> Option<&Self> {
        match parsed {
            ParsedField::Via(v) => Some(v),
            _ => None,
        }
    }
}

impl FieldType for CSeq {
    const NAME: &'static str = "CSeq";

    fn parse_field(text: &str) -> Result<Self> {
        text.parse()
    }
    fn wrap(self) -> ParsedField {
        ParsedField::CSeq(self)
    }
    fn peek(parsed: &ParsedField) -> Option<&Self> {
        match parsed {
            ParsedField::CSeq(c) => Some(c),
            _ => None,
        }
    }
}

impl FieldType for NameAddr {
    const NAME: &'static str = "name-addr";

    fn parse_field(text: &str) -> Result<Self> {
        text.parse()
    }
    fn wrap(self) -> ParsedField {
        ParsedField::NameAddr(self)
    }
    fn peek(parsed: &ParsedField) -> Option<&Self> {
        match parsed {
            ParsedField::NameAddr(n) => Some(n),
            _ => None,
        }
    }
}

impl FieldType for u32 {
    const NAME: &'static str = "integer";

    fn parse_field(text: &str) -> Result<Self> {
        text.parse()
            .map_err(|_| Error::invalid_header(Self::NAME, format!("{:?} is not a number", text)))
    }
    fn wrap(self) -> ParsedField {
        ParsedField::Uint(self)
    }
    fn peek(parsed: &ParsedField) -> Option<&Self> {
        match parsed {
            ParsedField::Uint(n) => Some(n),
            _ => None,
        }
    }
}

/// One header field value: raw bytes plus a parse-on-first-access cache
#[derive(Clone)]
pub struct HeaderFieldValue {
    raw: Bytes,
    parsed: OnceLock<ParsedField>,
}

impl HeaderFieldValue {
    /// Wraps a slice of a receive buffer without looking at it
    pub fn from_wire(raw: Bytes) -> Self {
        Self {
            raw,
            parsed: OnceLock::new(),
        }
    }

    /// Encodes a typed value into an owned buffer; the value is already parsed
    pub fn new<T: FieldType>(value: T) -> Self {
        let raw = Bytes::from(value.to_string());
        Self {
            raw,
            parsed: OnceLock::from(value.wrap()),
        }
    }

    /// Plain text value that has no typed form (Call-ID, Subject, ...)
    pub fn text_value(text: impl Into<String>) -> Self {
        Self::from_wire(Bytes::from(text.into()))
    }

    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// True once a typed accessor has interpreted the bytes
    pub fn is_parsed(&self) -> bool {
        self.parsed.get().is_some()
    }

    /// The raw value as text, without unfolding
    pub fn as_str(&self) -> Result<&str> {
        Ok(std::str::from_utf8(&self.raw)?.trim())
    }

    /// Interprets the value as `T`, parsing on first access
    pub fn parse<T: FieldType>(&self) -> Result<&T> {
        if self.parsed.get().is_none() {
            let unfolded = unfold_lws(&self.raw);
            let text = std::str::from_utf8(&unfolded)?;
            let value = T::parse_field(text.trim())?;
            // a concurrent reader may have won the race; its value is equivalent
            let _ = self.parsed.set(value.wrap());
        }
        self.parsed
            .get()
            .and_then(T::peek)
            .ok_or_else(|| Error::invalid_header(T::NAME, "value was already interpreted as another type"))
    }

    /// Replaces the value. The old bytes are dropped, never modified.
    pub fn set<T: FieldType>(&mut self, value: T) {
        *self = Self::new(value);
    }
}

impl fmt::Debug for HeaderFieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderFieldValue")
            .field("raw", &String::from_utf8_lossy(&self.raw))
            .field("parsed", &self.is_parsed())
            .finish()
    }
}

impl PartialEq for HeaderFieldValue {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::method::Method;

    #[test]
    fn test_lazy_parse_and_cache() {
        let buffer = Bytes::from_static(b"CSeq: 4711 INVITE\r\n");
        let field = HeaderFieldValue::from_wire(buffer.slice(6..17));
        assert!(!field.is_parsed());
        let cseq = field.parse::<CSeq>().unwrap();
        assert_eq!(cseq.seq, 4711);
        assert_eq!(cseq.method, Method::Invite);
        assert!(field.is_parsed());
        // a second access hits the cache and a different type is refused
        assert_eq!(field.parse::<CSeq>().unwrap().seq, 4711);
        assert!(field.parse::<u32>().is_err());
    }

    #[test]
    fn test_folded_value() {
        let field = HeaderFieldValue::from_wire(Bytes::from_static(b"SIP/2.0/UDP\r\n  host.example.com;branch=z9hG4bK9"));
        let via = field.parse::<Via>().unwrap();
        assert_eq!(via.host, "host.example.com");
        assert_eq!(via.branch(), Some("z9hG4bK9"));
    }

    #[test]
    fn test_copy_on_write() {
        let wire = Bytes::from_static(b"SIP/2.0/UDP a.example.com;branch=z9hG4bK1");
        let mut field = HeaderFieldValue::from_wire(wire.clone());
        let mut via = field.parse::<Via>().unwrap().clone();
        via.params.set("received", Some("192.0.2.9".to_string()));
        field.set(via);
        assert_eq!(
            field.as_str().unwrap(),
            "SIP/2.0/UDP a.example.com;branch=z9hG4bK1;received=192.0.2.9"
        );
        assert!(field.is_parsed());
        assert_eq!(&wire[..], b"SIP/2.0/UDP a.example.com;branch=z9hG4bK1");
    }

    #[test]
    fn test_parse_error_leaves_value_unparsed() {
        let field = HeaderFieldValue::from_wire(Bytes::from_static(b"not-a-number"));
        assert!(field.parse::<u32>().is_err());
        assert!(!field.is_parsed());
    }
}
