//! Stream framing properties of the preparser and serde forms of the
//! routing types

use bytes::Bytes;
use proptest::prelude::*;
use strata_sip_core::{
    CSeq, HeaderName, Method, PreparseStatus, Preparser, TransportType, Tuple,
    DEFAULT_MAX_HEADER_SIZE,
};

const INVITE: &[u8] = b"INVITE sip:bob@biloxi.com SIP/2.0\r\n\
Via: SIP/2.0/TCP pc33.atlanta.com;branch=z9hG4bK776asdhds\r\n\
Max-Forwards: 70\r\n\
To: Bob <sip:bob@biloxi.com>\r\n\
From: \"Alice, A.\" <sip:alice@atlanta.com>;tag=1928301774\r\n\
Call-ID: a84b4c76e66710@pc33.atlanta.com\r\n\
CSeq: 314159 INVITE\r\n\
Contact: <sip:alice@pc33.atlanta.com>, \"Desk\r\n  , Phone\" <sip:desk@atlanta.com>\r\n\
Subject: split\r\n\
 across lines\r\n\
Content-Length: 0\r\n\
\r\n";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn one_shot() -> Preparser {
    let mut pp = Preparser::new(DEFAULT_MAX_HEADER_SIZE);
    assert_eq!(
        pp.process(INVITE),
        PreparseStatus::HeadersComplete { header_len: INVITE.len() }
    );
    pp
}

#[test]
fn test_folded_message_builds() {
    init_tracing();
    let pp = one_shot();
    let msg = pp.build_message(&Bytes::from_static(INVITE)).unwrap();
    assert_eq!(msg.method(), Some(&Method::Invite));
    assert_eq!(msg.headers().get(&HeaderName::Contact).unwrap().len(), 2);
    assert_eq!(msg.headers().get(&HeaderName::From).unwrap().len(), 1);
    assert_eq!(msg.call_id().unwrap(), "a84b4c76e66710@pc33.atlanta.com");
}

proptest! {
    /// Splitting the stream at any byte yields the same frame
    #[test]
    fn prop_any_split_point(split in 0..INVITE.len()) {
        let mut pp = Preparser::new(DEFAULT_MAX_HEADER_SIZE);
        let status = pp.process(&INVITE[..split]);
        prop_assert!(
            matches!(status, PreparseStatus::MoreDataNeeded | PreparseStatus::Fragmented),
            "prefix of {} bytes gave {:?}", split, status
        );
        prop_assert_eq!(
            pp.process(INVITE),
            PreparseStatus::HeadersComplete { header_len: INVITE.len() }
        );
        let expected = one_shot();
        prop_assert_eq!(pp.headers(), expected.headers());
    }

    /// Feeding arbitrary chunk sizes never finishes early or fails
    #[test]
    fn prop_arbitrary_chunks(chunks in proptest::collection::vec(1usize..40, 1..64)) {
        let mut pp = Preparser::new(DEFAULT_MAX_HEADER_SIZE);
        let mut end = 0;
        for chunk in chunks {
            end = (end + chunk).min(INVITE.len());
            let status = pp.process(&INVITE[..end]);
            if end < INVITE.len() {
                let incomplete = !matches!(
                    status,
                    PreparseStatus::HeadersComplete { .. } | PreparseStatus::Error(_)
                );
                prop_assert!(incomplete);
            }
        }
        prop_assert_eq!(
            pp.process(INVITE),
            PreparseStatus::HeadersComplete { header_len: INVITE.len() }
        );
        let expected = one_shot();
        prop_assert_eq!(pp.headers(), expected.headers());
    }

    /// Leading keep-alive line breaks are skipped, whatever their number
    #[test]
    fn prop_keepalives_skipped(crlfs in 0usize..8) {
        let mut wire = b"\r\n".repeat(crlfs);
        wire.extend_from_slice(INVITE);
        let mut pp = Preparser::new(DEFAULT_MAX_HEADER_SIZE);
        prop_assert_eq!(
            pp.process(&wire),
            PreparseStatus::HeadersComplete { header_len: wire.len() }
        );
        prop_assert_eq!(pp.message_start(), crlfs * 2);
    }
}

#[test]
fn test_routing_types_serde() {
    let tuple = Tuple::tcp("192.0.2.7:5061".parse().unwrap());
    let json = serde_json::to_string(&tuple).unwrap();
    let back: Tuple = serde_json::from_str(&json).unwrap();
    assert_eq!(back, tuple);
    assert_eq!(back.transport, TransportType::Tcp);

    let cseq = CSeq::new(42, Method::Extension("X-PING".to_string()));
    let back: CSeq = serde_json::from_str(&serde_json::to_string(&cseq).unwrap()).unwrap();
    assert_eq!(back, cseq);
}
