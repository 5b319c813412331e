//! Message construction helpers shared by the transaction layer and TUs:
//! responses, the ACK for a failure response, CANCEL, and random
//! identifiers.

use rand::Rng;

use crate::error::{Error, Result};
use crate::message::SipMessage;
use crate::types::{CSeq, HeaderFieldValue, HeaderName, Method, StatusCode, Tuple, BRANCH_MAGIC_COOKIE};

const TAG_BYTES: usize = 4;

fn random_hex(bytes: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..bytes).map(|_| format!("{:02x}", rng.gen::<u8>())).collect()
}

/// A fresh RFC 3261 branch parameter, magic cookie included
pub fn generate_branch() -> String {
    format!("{}{}", BRANCH_MAGIC_COOKIE, random_hex(8))
}

/// Random From/To tag
pub fn generate_tag() -> String {
    random_hex(TAG_BYTES)
}

pub fn generate_call_id() -> String {
    random_hex(16)
}

fn copy_headers(from: &SipMessage, to: &mut SipMessage, name: &HeaderName) {
    if let Some(values) = from.headers().get(name) {
        for value in values {
            to.append_header(name.clone(), value.clone());
        }
    }
}

fn require_request<'a>(msg: &'a SipMessage, method: Option<Method>) -> Result<&'a SipMessage> {
    match (msg.method(), method) {
        (None, _) => Err(Error::WrongMessageKind("request")),
        (Some(m), Some(expected)) if *m != expected => Err(Error::WrongMessageKind("INVITE request")),
        _ => Ok(msg),
    }
}

/// Builds a response to `request`. Via, From, To, Call-ID, CSeq and
/// Record-Route are copied; a To tag is generated for 101-299 responses
/// when the request had none.
pub fn make_response(request: &SipMessage, code: StatusCode, reason: Option<&str>) -> Result<SipMessage> {
    let request = require_request(request, None)?;
    let mut response = SipMessage::new_response(code, reason);
    for name in [
        HeaderName::Via,
        HeaderName::From,
        HeaderName::To,
        HeaderName::CallId,
        HeaderName::CSeq,
        HeaderName::RecordRoute,
    ] {
        copy_headers(request, &mut response, &name);
    }

    let code = code.as_u16();
    if code > 100 && code < 300 && request.to_tag().is_none() {
        if let Ok(to) = request.to() {
            let to = to.clone().with_tag(generate_tag());
            response.set_header(HeaderName::To, HeaderFieldValue::new(to));
        }
    }
    response.update_content_length();
    response.set_external(!request.is_external());
    Ok(response)
}

/// The ACK a client INVITE transaction sends for a 3xx-6xx response. It
/// reuses the INVITE's top Via so it matches the same server transaction.
pub fn make_failure_ack(request: &SipMessage, response: &SipMessage) -> Result<SipMessage> {
    let request = require_request(request, Some(Method::Invite))?;
    let uri = request
        .request_uri()
        .cloned()
        .ok_or(Error::WrongMessageKind("request"))?;
    let mut ack = SipMessage::new_request(Method::Ack, uri);
    ack.push_via(request.top_via()?.clone());
    copy_headers(request, &mut ack, &HeaderName::From);
    copy_headers(response, &mut ack, &HeaderName::To);
    copy_headers(request, &mut ack, &HeaderName::CallId);
    ack.append_header(
        HeaderName::CSeq,
        HeaderFieldValue::new(CSeq::new(request.cseq()?.seq, Method::Ack)),
    );
    copy_headers(request, &mut ack, &HeaderName::Route);
    ack.update_content_length();
    Ok(ack)
}

/// CANCEL for a pending INVITE. Same Request-URI, top Via, From, To,
/// Call-ID, sequence number and route set as the INVITE.
pub fn make_cancel(request: &SipMessage) -> Result<SipMessage> {
    let request = require_request(request, Some(Method::Invite))?;
    let uri = request
        .request_uri()
        .cloned()
        .ok_or(Error::WrongMessageKind("request"))?;
    let mut cancel = SipMessage::new_request(Method::Cancel, uri);
    cancel.push_via(request.top_via()?.clone());
    for name in [HeaderName::From, HeaderName::To, HeaderName::CallId] {
        copy_headers(request, &mut cancel, &name);
    }
    cancel.append_header(
        HeaderName::CSeq,
        HeaderFieldValue::new(CSeq::new(request.cseq()?.seq, Method::Cancel)),
    );
    for name in [
        HeaderName::Route,
        HeaderName::Other("Authorization".into()),
        HeaderName::Other("Proxy-Authorization".into()),
    ] {
        copy_headers(request, &mut cancel, &name);
    }
    cancel.update_content_length();
    Ok(cancel)
}

/// Records where a request actually came from in its top Via (RFC 3261
/// Section 18.2.1, RFC 3581): `received` when the sent-by host differs from
/// the source address, `rport` when the client asked for it.
pub fn stamp_received(request: &mut SipMessage, source: &Tuple) -> Result<()> {
    if !request.is_request() {
        return Ok(());
    }
    let mut via = request.top_via()?.clone();
    let source_ip = source.addr.ip().to_string();
    let mut changed = false;
    if via.host.trim_matches(|c| c == '[' || c == ']') != source_ip {
        via.params.set("received", Some(source_ip));
        changed = true;
    }
    if via.rport() == Some(None) {
        via.params.set("rport", Some(source.addr.port().to_string()));
        if !changed {
            via.params.set("received", Some(source.addr.ip().to_string()));
        }
        changed = true;
    }
    if changed {
        request.set_top_via(via)?;
    }
    Ok(())
}
