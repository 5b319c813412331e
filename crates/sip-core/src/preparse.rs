//! # Streaming preparser
//!
//! The preparser finds the boundaries of a SIP message in a byte buffer
//! before any semantic parsing happens. It scans the start line and header
//! block one byte at a time, records the byte range of every header name
//! and value, and stops at the blank line that separates headers from the
//! body.
//!
//! Scanning is incremental: the same [`Preparser`] is handed the growing
//! buffer again after each read and resumes where it left off. All ranges
//! it records are offsets from the start of that buffer, so they remain
//! valid after the buffer is reallocated.
//!
//! Header values of list-valued headers (see
//! [`HeaderName::is_comma_tokenizing`]) are split at commas that are not
//! inside a quoted string or an angle-bracketed URI. Folded continuation
//! lines are kept as part of the value; unfolding happens when a value is
//! parsed.
//!
//! ```rust
//! use strata_sip_core::preparse::{Preparser, PreparseStatus};
//!
//! let mut pp = Preparser::new(4096);
//! let wire = b"OPTIONS sip:a@b.com SIP/2.0\r\nCall-ID: 1\r\n";
//! assert_eq!(pp.process(wire), PreparseStatus::Fragmented);
//! let mut more = wire.to_vec();
//! more.extend_from_slice(b"\r\n");
//! assert_eq!(pp.process(&more), PreparseStatus::HeadersComplete { header_len: more.len() });
//! ```

use std::ops::Range;

use bytes::Bytes;
use thiserror::Error;

use crate::message::SipMessage;
use crate::parser::{self, token::is_token_char};
use crate::types::{HeaderFieldValue, HeaderName, Headers};

/// Default upper bound on the size of a start line plus header block
pub const DEFAULT_MAX_HEADER_SIZE: usize = 64 * 1024;

/// Wire-format errors. Any of these makes the message unrecoverable: a
/// datagram is dropped, a stream connection is closed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreparseError {
    #[error("malformed start line")]
    MalformedStartLine,

    #[error("header block exceeds {limit} bytes")]
    HeaderTooLarge { limit: usize },

    #[error("malformed header at offset {offset}")]
    MalformedHeader { offset: usize },

    #[error("CR not followed by LF at offset {offset}")]
    BadLineEnding { offset: usize },
}

/// Outcome of one [`Preparser::process`] call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreparseStatus {
    /// Nothing usable yet, not even one complete header field
    MoreDataNeeded,
    /// Some header fields were recorded but the header block is not finished
    Fragmented,
    /// The blank line was found; the header block is `header_len` bytes long
    /// counted from the start of the buffer
    HeadersComplete { header_len: usize },
    /// The buffer can never become a valid message
    Error(PreparseError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Skipping CRLF keep-alives in front of a message
    NewMsg,
    StartLine,
    /// At or inside a header name
    BuildHdr,
    /// Whitespace between a header name and the colon
    EwsPostHdr,
    /// Whitespace after the colon or after a list comma
    EwsPostColon,
    BuildData,
    InQ,
    InQEsc,
    InAng,
    InAngQ,
    InAngQEsc,
    /// After a line end inside a header: folding or next header?
    CheckCont,
    Done,
    Failed,
}

/// Byte ranges of one header line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawHeader {
    pub name: Range<usize>,
    pub values: Vec<Range<usize>>,
}

enum LineEnd {
    /// Line ends before `end`; scanning continues at `next`
    Eol { end: usize, next: usize },
    /// A CR is the last byte available
    Wait,
    Bad,
}

/// Incremental frame detector for one message at a time
#[derive(Debug, Clone)]
pub struct Preparser {
    max_header_size: usize,
    state: ScanState,
    pos: usize,
    msg_start: usize,
    line_start: usize,
    start_line: Option<Range<usize>>,
    headers: Vec<RawHeader>,
    name: Range<usize>,
    tokenizing: bool,
    values: Vec<Range<usize>>,
    value_start: usize,
    value_end: usize,
    /// Where a folded line picks up again
    resume: ScanState,
    header_len: usize,
    error: Option<PreparseError>,
}

impl Preparser {
    pub fn new(max_header_size: usize) -> Self {
        Self {
            max_header_size,
            state: ScanState::NewMsg,
            pos: 0,
            msg_start: 0,
            line_start: 0,
            start_line: None,
            headers: Vec::new(),
            name: 0..0,
            tokenizing: false,
            values: Vec::new(),
            value_start: 0,
            value_end: 0,
            resume: ScanState::BuildData,
            header_len: 0,
            error: None,
        }
    }

    /// Forgets everything about the current message
    pub fn reset(&mut self) {
        *self = Self::new(self.max_header_size);
    }

    /// Offset of the first byte of the start line, after skipped keep-alives
    pub fn message_start(&self) -> usize {
        self.msg_start
    }

    /// True while only keep-alive line breaks have been seen
    pub fn is_idle(&self) -> bool {
        self.state == ScanState::NewMsg
    }

    pub fn headers(&self) -> &[RawHeader] {
        &self.headers
    }

    /// Scans `buf`, which must start at the same byte as on the previous call
    /// and extend what was passed then.
    pub fn process(&mut self, buf: &[u8]) -> PreparseStatus {
        match self.state {
            ScanState::Done => {
                return PreparseStatus::HeadersComplete {
                    header_len: self.header_len,
                }
            }
            ScanState::Failed => {
                return PreparseStatus::Error(
                    self.error.clone().unwrap_or(PreparseError::MalformedStartLine),
                )
            }
            _ => {}
        }

        while self.pos < buf.len() {
            if self.state != ScanState::NewMsg && self.pos - self.msg_start >= self.max_header_size {
                return self.fail(PreparseError::HeaderTooLarge {
                    limit: self.max_header_size,
                });
            }
            let c = buf[self.pos];
            match self.state {
                ScanState::NewMsg => {
                    if c == b'\r' || c == b'\n' {
                        self.pos += 1;
                        self.msg_start = self.pos;
                    } else {
                        self.line_start = self.pos;
                        self.state = ScanState::StartLine;
                    }
                }
                ScanState::StartLine => {
                    if c != b'\r' && c != b'\n' {
                        self.pos += 1;
                        continue;
                    }
                    match self.line_end(buf) {
                        LineEnd::Wait => break,
                        LineEnd::Bad => return self.bad_line_ending(),
                        LineEnd::Eol { end, next } => {
                            self.start_line = Some(self.line_start..end);
                            self.pos = next;
                            self.line_start = next;
                            self.state = ScanState::BuildHdr;
                        }
                    }
                }
                ScanState::BuildHdr => {
                    if self.pos == self.line_start {
                        match c {
                            b'\r' | b'\n' => match self.line_end(buf) {
                                LineEnd::Wait => break,
                                LineEnd::Bad => return self.bad_line_ending(),
                                LineEnd::Eol { next, .. } => {
                                    self.header_len = next;
                                    self.pos = next;
                                    self.state = ScanState::Done;
                                    return PreparseStatus::HeadersComplete { header_len: next };
                                }
                            },
                            b' ' | b'\t' => return self.malformed(),
                            _ => {}
                        }
                    }
                    if is_token_char(c) {
                        self.pos += 1;
                    } else if c == b':' && self.pos > self.line_start {
                        self.begin_header(buf, self.line_start..self.pos);
                        self.pos += 1;
                        self.state = ScanState::EwsPostColon;
                    } else if (c == b' ' || c == b'\t') && self.pos > self.line_start {
                        self.begin_header(buf, self.line_start..self.pos);
                        self.pos += 1;
                        self.state = ScanState::EwsPostHdr;
                    } else {
                        return self.malformed();
                    }
                }
                ScanState::EwsPostHdr => match c {
                    b' ' | b'\t' => self.pos += 1,
                    b':' => {
                        self.pos += 1;
                        self.state = ScanState::EwsPostColon;
                    }
                    _ => return self.malformed(),
                },
                ScanState::EwsPostColon => match c {
                    b' ' | b'\t' => self.pos += 1,
                    _ => {
                        self.value_start = self.pos;
                        self.state = ScanState::BuildData;
                    }
                },
                ScanState::BuildData => match c {
                    b'\r' | b'\n' => match self.line_end(buf) {
                        LineEnd::Wait => break,
                        LineEnd::Bad => return self.bad_line_ending(),
                        LineEnd::Eol { end, next } => {
                            self.value_end = end;
                            self.pos = next;
                            self.resume = ScanState::BuildData;
                            self.state = ScanState::CheckCont;
                        }
                    },
                    b'"' if self.tokenizing => {
                        self.pos += 1;
                        self.state = ScanState::InQ;
                    }
                    b'<' if self.tokenizing => {
                        self.pos += 1;
                        self.state = ScanState::InAng;
                    }
                    b',' if self.tokenizing => {
                        self.push_value(buf, self.value_start..self.pos);
                        self.pos += 1;
                        self.state = ScanState::EwsPostColon;
                    }
                    _ => self.pos += 1,
                },
                ScanState::InQ | ScanState::InQEsc | ScanState::InAng | ScanState::InAngQ | ScanState::InAngQEsc => {
                    if c == b'\r' || c == b'\n' {
                        match self.line_end(buf) {
                            LineEnd::Wait => break,
                            LineEnd::Bad => return self.bad_line_ending(),
                            LineEnd::Eol { end, next } => {
                                // quote or bracket stays open across a fold,
                                // a line break cannot be escaped
                                self.resume = match self.state {
                                    ScanState::InQEsc => ScanState::InQ,
                                    ScanState::InAngQEsc => ScanState::InAngQ,
                                    state => state,
                                };
                                self.value_end = end;
                                self.pos = next;
                                self.state = ScanState::CheckCont;
                            }
                        }
                        continue;
                    }
                    self.state = match (self.state, c) {
                        (ScanState::InQ, b'\\') => ScanState::InQEsc,
                        (ScanState::InQ, b'"') => ScanState::BuildData,
                        (ScanState::InQEsc, _) => ScanState::InQ,
                        (ScanState::InAng, b'>') => ScanState::BuildData,
                        (ScanState::InAng, b'"') => ScanState::InAngQ,
                        (ScanState::InAngQ, b'\\') => ScanState::InAngQEsc,
                        (ScanState::InAngQ, b'"') => ScanState::InAng,
                        (ScanState::InAngQEsc, _) => ScanState::InAngQ,
                        (state, _) => state,
                    };
                    self.pos += 1;
                }
                ScanState::CheckCont => {
                    if c == b' ' || c == b'\t' {
                        // folded line, the value continues
                        self.state = self.resume;
                    } else {
                        self.push_value(buf, self.value_start..self.value_end);
                        self.finish_header();
                        self.line_start = self.pos;
                        self.state = ScanState::BuildHdr;
                    }
                }
                ScanState::Done | ScanState::Failed => break,
            }
        }

        if self.headers.is_empty() {
            PreparseStatus::MoreDataNeeded
        } else {
            PreparseStatus::Fragmented
        }
    }

    fn line_end(&self, buf: &[u8]) -> LineEnd {
        match buf[self.pos] {
            b'\n' => LineEnd::Eol {
                end: self.pos,
                next: self.pos + 1,
            },
            _ => match buf.get(self.pos + 1) {
                None => LineEnd::Wait,
                Some(b'\n') => LineEnd::Eol {
                    end: self.pos,
                    next: self.pos + 2,
                },
                Some(_) => LineEnd::Bad,
            },
        }
    }

    fn begin_header(&mut self, buf: &[u8], name: Range<usize>) {
        self.tokenizing = HeaderName::from_bytes(&buf[name.clone()])
            .map(|n| n.is_comma_tokenizing())
            .unwrap_or(false);
        self.name = name;
        self.values.clear();
    }

    fn push_value(&mut self, buf: &[u8], range: Range<usize>) {
        let mut end = range.end;
        while end > range.start && matches!(buf[end - 1], b' ' | b'\t' | b'\r' | b'\n') {
            end -= 1;
        }
        if end == range.start && self.tokenizing {
            return;
        }
        self.values.push(range.start..end);
    }

    fn finish_header(&mut self) {
        let mut values = std::mem::take(&mut self.values);
        if values.is_empty() {
            values.push(self.value_end..self.value_end);
        }
        self.headers.push(RawHeader {
            name: self.name.clone(),
            values,
        });
    }

    fn fail(&mut self, error: PreparseError) -> PreparseStatus {
        self.state = ScanState::Failed;
        self.error = Some(error.clone());
        PreparseStatus::Error(error)
    }

    fn malformed(&mut self) -> PreparseStatus {
        let offset = self.pos;
        self.fail(PreparseError::MalformedHeader { offset })
    }

    fn bad_line_ending(&mut self) -> PreparseStatus {
        let offset = self.pos;
        self.fail(PreparseError::BadLineEnding { offset })
    }

    /// Builds a message from a completed header block. `head` must hold the
    /// first `header_len` bytes of the buffer that was scanned; header values
    /// become zero-copy slices of it.
    pub fn build_message(&self, head: &Bytes) -> Result<SipMessage, PreparseError> {
        let range = match (&self.state, &self.start_line) {
            (ScanState::Done, Some(range)) if head.len() >= self.header_len => range.clone(),
            _ => return Err(PreparseError::MalformedStartLine),
        };
        let raw_start = head.slice(range);
        let start_line = parser::parse_complete(parser::start_line::start_line, &raw_start)
            .map_err(|_| PreparseError::MalformedStartLine)?;

        let mut headers = Headers::new();
        for raw in &self.headers {
            let name = HeaderName::from_bytes(&head[raw.name.clone()]).map_err(|_| {
                PreparseError::MalformedHeader {
                    offset: raw.name.start,
                }
            })?;
            for value in &raw.values {
                headers.append(name.clone(), HeaderFieldValue::from_wire(head.slice(value.clone())));
            }
        }
        Ok(SipMessage::from_wire(start_line, raw_start, headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Method, NameAddr, Via};

    const REGISTER: &[u8] = b"REGISTER sip:registrar.biloxi.com SIP/2.0\r\n\
Via: SIP/2.0/UDP bobspc.biloxi.com:5060;branch=z9hG4bKnashds7\r\n\
Max-Forwards: 70\r\n\
To: Bob <sip:bob@biloxi.com>\r\n\
From: Bob <sip:bob@biloxi.com>;tag=456248\r\n\
Call-ID: 843817637684230@998sdasdh09\r\n\
CSeq: 1826 REGISTER\r\n\
Contact: <sip:bob@192.0.2.4>\r\n\
Expires: 7200\r\n\
Content-Length: 0\r\n\
\r\n";

    fn complete(pp: &mut Preparser, buf: &[u8]) -> usize {
        match pp.process(buf) {
            PreparseStatus::HeadersComplete { header_len } => header_len,
            other => panic!("expected complete headers, got {:?}", other),
        }
    }

    #[test]
    fn test_whole_message() {
        let mut pp = Preparser::new(DEFAULT_MAX_HEADER_SIZE);
        let len = complete(&mut pp, REGISTER);
        assert_eq!(len, REGISTER.len());
        assert_eq!(pp.headers().len(), 9);
        let msg = pp.build_message(&Bytes::from_static(REGISTER)).unwrap();
        assert_eq!(msg.method(), Some(&Method::Register));
        assert_eq!(msg.cseq().unwrap().seq, 1826);
        assert_eq!(msg.content_length().unwrap(), Some(0));
        assert!(msg.is_external());
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut pp = Preparser::new(DEFAULT_MAX_HEADER_SIZE);
        let mut saw_more = false;
        let mut saw_fragmented = false;
        for end in 1..REGISTER.len() {
            match pp.process(&REGISTER[..end]) {
                PreparseStatus::MoreDataNeeded => {
                    assert!(!saw_fragmented, "went back to MoreDataNeeded at {}", end);
                    saw_more = true;
                }
                PreparseStatus::Fragmented => saw_fragmented = true,
                other => panic!("unexpected {:?} at {}", other, end),
            }
        }
        assert!(saw_more && saw_fragmented);
        assert_eq!(complete(&mut pp, REGISTER), REGISTER.len());

        let mut oneshot = Preparser::new(DEFAULT_MAX_HEADER_SIZE);
        complete(&mut oneshot, REGISTER);
        assert_eq!(oneshot.headers(), pp.headers());
    }

    #[test]
    fn test_comma_tokenizing() {
        let wire = b"SIP/2.0 200 OK\r\n\
Contact: \"Doe, John\" <sip:jd@example.com;x=a,b>, <sip:other@example.com>\r\n\
v: SIP/2.0/UDP a.example.com;branch=z9hG4bK1 , SIP/2.0/UDP b.example.com;branch=z9hG4bK2\r\n\
Subject: lunch, maybe\r\n\r\n";
        let mut pp = Preparser::new(DEFAULT_MAX_HEADER_SIZE);
        complete(&mut pp, wire);
        let msg = pp.build_message(&Bytes::copy_from_slice(wire)).unwrap();
        let contacts = msg.headers().get(&HeaderName::Contact).unwrap();
        assert_eq!(contacts.len(), 2);
        assert_eq!(
            contacts[0].as_str().unwrap(),
            "\"Doe, John\" <sip:jd@example.com;x=a,b>"
        );
        let first = contacts[0].parse::<NameAddr>().unwrap();
        assert_eq!(first.uri.user.as_deref(), Some("jd"));
        let vias = msg.headers().get(&HeaderName::Via).unwrap();
        assert_eq!(vias.len(), 2);
        assert_eq!(vias[1].parse::<Via>().unwrap().host, "b.example.com");
        assert_eq!(msg.headers().get(&HeaderName::Subject).unwrap().len(), 1);
    }

    #[test]
    fn test_folding_and_bare_lf() {
        let wire = b"MESSAGE sip:a@b.com SIP/2.0\n\
Subject: first line\n\
  continued\n\
Call-ID : abc\n\
\n";
        let mut pp = Preparser::new(DEFAULT_MAX_HEADER_SIZE);
        assert_eq!(complete(&mut pp, wire), wire.len());
        let msg = pp.build_message(&Bytes::copy_from_slice(wire)).unwrap();
        let subject = msg.header(&HeaderName::Subject).unwrap();
        assert_eq!(subject.raw().as_ref(), b"first line\n  continued");
        assert_eq!(msg.call_id().unwrap(), "abc");
    }

    #[test]
    fn test_folded_quote_keeps_comma() {
        let wire = b"SIP/2.0 200 OK\r\n\
Contact: \"Doe\r\n , John\" <sip:jd@example.com>, <sip:x@example.com\r\n\t;a=b,c>\r\n\
Call-ID: fold\r\n\r\n";
        let mut pp = Preparser::new(DEFAULT_MAX_HEADER_SIZE);
        assert_eq!(complete(&mut pp, wire), wire.len());
        let msg = pp.build_message(&Bytes::copy_from_slice(wire)).unwrap();
        let contacts = msg.headers().get(&HeaderName::Contact).unwrap();
        assert_eq!(contacts.len(), 2);
        assert_eq!(
            contacts[0].raw().as_ref(),
            b"\"Doe\r\n , John\" <sip:jd@example.com>"
        );
        assert_eq!(contacts[1].raw().as_ref(), b"<sip:x@example.com\r\n\t;a=b,c>");
        assert_eq!(msg.call_id().unwrap(), "fold");

        // an unterminated quote ends with its header
        let wire = b"SIP/2.0 200 OK\r\nContact: \"open\r\nCall-ID: q\r\n\r\n";
        let mut pp = Preparser::new(DEFAULT_MAX_HEADER_SIZE);
        complete(&mut pp, wire);
        let msg = pp.build_message(&Bytes::copy_from_slice(wire)).unwrap();
        assert_eq!(msg.call_id().unwrap(), "q");
    }

    #[test]
    fn test_leading_keepalives_skipped() {
        let mut wire = b"\r\n\r\n".to_vec();
        wire.extend_from_slice(REGISTER);
        let mut pp = Preparser::new(DEFAULT_MAX_HEADER_SIZE);
        assert_eq!(pp.process(&wire[..4]), PreparseStatus::MoreDataNeeded);
        assert!(pp.is_idle());
        assert_eq!(complete(&mut pp, &wire), wire.len());
        assert_eq!(pp.message_start(), 4);
        let msg = pp.build_message(&Bytes::from(wire)).unwrap();
        assert_eq!(msg.call_id().unwrap(), "843817637684230@998sdasdh09");
    }

    #[test]
    fn test_errors() {
        let mut pp = Preparser::new(DEFAULT_MAX_HEADER_SIZE);
        assert_eq!(
            pp.process(b"INVITE sip:a@b SIP/2.0\rX"),
            PreparseStatus::Error(PreparseError::BadLineEnding { offset: 22 })
        );
        // errors are sticky
        assert!(matches!(pp.process(b"anything"), PreparseStatus::Error(_)));

        let mut pp = Preparser::new(DEFAULT_MAX_HEADER_SIZE);
        assert!(matches!(
            pp.process(b"INVITE sip:a@b SIP/2.0\r\nBad[Name]: x\r\n"),
            PreparseStatus::Error(PreparseError::MalformedHeader { .. })
        ));

        let mut pp = Preparser::new(64);
        let mut big = b"INVITE sip:a@b SIP/2.0\r\nSubject: ".to_vec();
        big.extend(std::iter::repeat(b'x').take(100));
        assert_eq!(
            pp.process(&big),
            PreparseStatus::Error(PreparseError::HeaderTooLarge { limit: 64 })
        );

        let mut pp = Preparser::new(DEFAULT_MAX_HEADER_SIZE);
        let garbage = b"HELLO WORLD\r\n\r\n";
        complete(&mut pp, garbage);
        assert_eq!(
            pp.build_message(&Bytes::from_static(garbage)).unwrap_err(),
            PreparseError::MalformedStartLine
        );
    }

    #[test]
    fn test_cr_at_end_of_buffer_waits() {
        let mut pp = Preparser::new(DEFAULT_MAX_HEADER_SIZE);
        let wire = b"OPTIONS sip:a@b.com SIP/2.0\r\nCall-ID: 1\r\n\r\n";
        assert_eq!(pp.process(&wire[..wire.len() - 1]), PreparseStatus::Fragmented);
        assert_eq!(complete(&mut pp, wire), wire.len());
    }
}
