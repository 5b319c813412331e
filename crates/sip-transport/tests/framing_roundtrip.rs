//! Messages fed to a Connection in arbitrary chunks come back byte-identical.

use proptest::prelude::*;
use strata_sip_core::{SipMessage, Tuple};
use strata_sip_transport::{Connection, ConnectionConfig, ConnectionStatus};

fn request(method: &str, user: &str, call_id: &str, seq: u32, body: &str) -> Vec<u8> {
    format!(
        "{method} sip:{user}@example.com SIP/2.0\r\n\
         Via: SIP/2.0/TCP client.example.com:5060;branch=z9hG4bK{call_id}\r\n\
         Max-Forwards: 70\r\n\
         From: \"Caller, A\" <sip:caller@example.com>;tag={seq}\r\n\
         To: <sip:{user}@example.com>\r\n\
         Call-ID: {call_id}\r\n\
         CSeq: {seq} {method}\r\n\
         Content-Length: {len}\r\n\
         \r\n\
         {body}",
        len = body.len(),
    )
    .into_bytes()
}

fn response(code: u16, call_id: &str, seq: u32, body: &str) -> Vec<u8> {
    format!(
        "SIP/2.0 {code} Whatever\r\n\
         Via: SIP/2.0/TCP client.example.com:5060;branch=z9hG4bK{call_id}\r\n\
         From: <sip:caller@example.com>;tag={seq}\r\n\
         To: <sip:callee@example.com>;tag=x{seq}\r\n\
         Call-ID: {call_id}\r\n\
         CSeq: {seq} INVITE\r\n\
         Content-Length: {len}\r\n\
         \r\n\
         {body}",
        len = body.len(),
    )
    .into_bytes()
}

fn wire_message() -> impl Strategy<Value = Vec<u8>> {
    let method = prop::sample::select(vec!["INVITE", "REGISTER", "OPTIONS", "MESSAGE", "BYE"]);
    let token = "[a-z0-9]{1,12}";
    let body = "[ -~]{0,200}";
    prop_oneof![
        (method, token, token, 1u32..100_000, body).prop_map(|(m, user, call_id, seq, body)| {
            request(m, &user, &call_id, seq, &body)
        }),
        (100u16..700, token, 1u32..100_000, body)
            .prop_map(|(code, call_id, seq, body)| response(code, &call_id, seq, &body)),
    ]
}

fn feed_in_chunks(wire: &[u8], chunks: &[usize]) -> (Vec<SipMessage>, ConnectionStatus) {
    let config = ConnectionConfig::default().with_chunk_size(64);
    let mut conn = Connection::new(Tuple::tcp("192.0.2.10:5060".parse().unwrap()), config);
    let mut out = Vec::new();
    let mut status = ConnectionStatus::Idle;
    let mut rest = wire;
    let mut sizes = chunks.iter().cycle();
    while !rest.is_empty() {
        let want = *sizes.next().unwrap();
        let buf = conn.write_buffer();
        let n = want.min(buf.len()).min(rest.len());
        buf[..n].copy_from_slice(&rest[..n]);
        status = conn.process(n, &mut out).expect("valid framing");
        rest = &rest[n..];
    }
    (out, status)
}

proptest! {
    #[test]
    fn roundtrip_in_arbitrary_chunks(
        messages in prop::collection::vec(wire_message(), 1..4),
        chunks in prop::collection::vec(1usize..512, 1..16),
    ) {
        let wire: Vec<u8> = messages.concat();
        let (out, status) = feed_in_chunks(&wire, &chunks);
        prop_assert_eq!(status, ConnectionStatus::Idle);
        prop_assert_eq!(out.len(), messages.len());
        for (message, original) in out.iter().zip(&messages) {
            let encoded = message.encode();
            prop_assert_eq!(encoded.as_ref(), original.as_slice());
        }
    }
}

#[test]
fn one_byte_at_a_time() {
    let wire = request("INVITE", "bob", "a84b4c76e66710", 314159, "v=0\r\n");
    let (out, status) = feed_in_chunks(&wire, &[1]);
    assert_eq!(status, ConnectionStatus::Idle);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].encode().as_ref(), wire.as_slice());
    assert_eq!(out[0].from_tag(), Some("314159"));
}
