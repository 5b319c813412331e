//! Framing for datagram transports: one datagram, one message.

use std::time::Instant;

use bytes::Bytes;
use strata_sip_core::{Preparser, PreparseStatus, SipMessage, Tuple};

use crate::error::{Error, Result};

/// Frames a single datagram.
///
/// Returns `Ok(None)` for a keep-alive (line breaks only). Without a
/// Content-Length the body is the rest of the datagram; with one, trailing
/// bytes beyond it are ignored.
pub fn frame_datagram(datagram: Bytes, source: Tuple, max_header_size: usize) -> Result<Option<SipMessage>> {
    let mut preparser = Preparser::new(max_header_size);
    let header_len = match preparser.process(&datagram) {
        PreparseStatus::HeadersComplete { header_len } => header_len,
        PreparseStatus::Error(e) => return Err(e.into()),
        PreparseStatus::MoreDataNeeded if preparser.is_idle() => return Ok(None),
        PreparseStatus::MoreDataNeeded | PreparseStatus::Fragmented => {
            return Err(Error::IncompleteHeaders)
        }
    };

    let mut message = preparser.build_message(&datagram.slice(..header_len))?;
    let rest = datagram.slice(header_len..);
    let body = match message.content_length()? {
        Some(len) if len as usize > rest.len() => {
            return Err(Error::Truncated {
                expected: len as usize,
                available: rest.len(),
            })
        }
        Some(len) => rest.slice(..len as usize),
        None => rest,
    };
    message.attach_body(body);
    message.set_source(source);
    message.set_received_at(Instant::now());
    Ok(Some(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_sip_core::{PreparseError, DEFAULT_MAX_HEADER_SIZE};

    fn source() -> Tuple {
        Tuple::udp("198.51.100.1:5060".parse().unwrap())
    }

    fn frame(wire: &'static [u8]) -> Result<Option<SipMessage>> {
        frame_datagram(Bytes::from_static(wire), source(), DEFAULT_MAX_HEADER_SIZE)
    }

    #[test]
    fn test_body_without_content_length() {
        let msg = frame(b"MESSAGE sip:a@b.com SIP/2.0\r\nCall-ID: 1\r\n\r\nhello")
            .unwrap()
            .unwrap();
        assert_eq!(msg.body().as_ref(), b"hello");
        assert_eq!(msg.source(), Some(source()));
        assert!(msg.received_at().is_some());
    }

    #[test]
    fn test_content_length_truncates() {
        let msg = frame(b"MESSAGE sip:a@b.com SIP/2.0\r\nl: 3\r\n\r\nhello")
            .unwrap()
            .unwrap();
        assert_eq!(msg.body().as_ref(), b"hel");
    }

    #[test]
    fn test_rejects_bad_datagrams() {
        assert!(matches!(
            frame(b"MESSAGE sip:a@b.com SIP/2.0\r\nContent-Length: 10\r\n\r\nhello"),
            Err(Error::Truncated { expected: 10, available: 5 })
        ));
        assert!(matches!(
            frame(b"MESSAGE sip:a@b.com SIP/2.0\r\nCall-ID: 1\r\n"),
            Err(Error::IncompleteHeaders)
        ));
        assert!(matches!(
            frame(b"not sip at all\r\n\r\n"),
            Err(Error::Framing(PreparseError::MalformedStartLine))
        ));
        assert!(frame(b"\r\n\r\n").unwrap().is_none());
    }
}
