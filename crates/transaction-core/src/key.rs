/// # Transaction Identification
///
/// This module computes the identifier that maps a SIP message to its
/// transaction, following RFC 3261 Sections 17.1.3 and 17.2.3.
///
/// ## RFC 3261 Context
///
/// When the top Via carries a branch beginning with the magic cookie
/// `z9hG4bK`, the branch alone identifies the transaction. CANCEL shares
/// the branch of the INVITE it cancels but forms its own transaction, so
/// the request method is part of the key. ACK for a non-2xx response
/// belongs to the INVITE transaction, so ACK is keyed as INVITE.
///
/// ## Legacy Matching
///
/// Requests from RFC 2543 agents carry no cookie. For them the identifier
/// is built from the top Via sent-by, Call-ID, From tag and CSeq number.
/// The To tag and Request-URI are deliberately left out: an ACK for a
/// failure response carries the To tag the INVITE lacked, and a proxied
/// request may have its Request-URI rewritten, yet both must still match.
/// The CSeq method is carried separately as the key's `method`, with the
/// same ACK/CANCEL treatment as above.
use std::fmt;
use std::hash::Hash;

use strata_sip_core::{Method, SipMessage};

use crate::error::{Error, Result};

/// Uniquely identifies a SIP transaction within one controller.
///
/// The key is the triple of transaction identifier (branch or legacy
/// composite), request method (ACK folded into INVITE) and side. A client
/// and a server transaction for the same branch, as seen on a proxy that
/// loops a request back to itself, never collide.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TransactionKey {
    /// Branch parameter, or the legacy composite identifier
    pub id: String,
    /// Method of the request that created the transaction
    pub method: Method,
    /// True for server transactions
    pub is_server: bool,
}

impl TransactionKey {
    pub fn new(id: impl Into<String>, method: Method, is_server: bool) -> Self {
        Self {
            id: id.into(),
            method: transaction_method(method),
            is_server,
        }
    }

    /// Key of the transaction a request belongs to.
    ///
    /// `is_server` is true for requests received from the wire and false
    /// for requests the TU sends.
    pub fn for_request(request: &SipMessage, is_server: bool) -> Result<Self> {
        let method = request
            .method()
            .cloned()
            .ok_or(Error::Core(strata_sip_core::Error::WrongMessageKind("request")))?;
        Ok(Self::new(transaction_id(request)?, method, is_server))
    }

    /// Key of the transaction a response belongs to, taken from its top Via
    /// and CSeq method.
    ///
    /// Responses from the wire match client transactions (`is_server ==
    /// false`); responses from the TU match server transactions.
    pub fn for_response(response: &SipMessage, is_server: bool) -> Result<Self> {
        let method = response.cseq()?.method.clone();
        Ok(Self::new(transaction_id(response)?, method, is_server))
    }

    /// Key of the INVITE transaction this key's CANCEL targets
    pub fn invite_key(&self) -> Self {
        Self {
            id: self.id.clone(),
            method: Method::Invite,
            is_server: self.is_server,
        }
    }

    /// True when the identifier is an RFC 3261 branch
    pub fn is_rfc3261(&self) -> bool {
        self.id.starts_with(strata_sip_core::BRANCH_MAGIC_COOKIE)
    }
}

fn transaction_method(method: Method) -> Method {
    match method {
        Method::Ack => Method::Invite,
        other => other,
    }
}

/// Branch of the top Via when it carries the magic cookie, the legacy
/// composite identifier otherwise
fn transaction_id(msg: &SipMessage) -> Result<String> {
    let via = msg.top_via().map_err(|e| match e {
        strata_sip_core::Error::MissingHeader(_) => Error::NoTransactionId,
        other => Error::Core(other),
    })?;
    if via.is_rfc3261() {
        if let Some(branch) = via.branch() {
            return Ok(branch.to_string());
        }
    }
    Ok(format!(
        "{}|{}|{}|{}",
        via.sent_by(),
        msg.call_id()?,
        msg.from_tag().unwrap_or_default(),
        msg.cseq()?.seq,
    ))
}

impl fmt::Debug for TransactionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

/// Format: "id:METHOD:side", e.g. "z9hG4bK776asdhds:INVITE:server"
impl fmt::Display for TransactionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = if self.is_server { "server" } else { "client" };
        write!(f, "{}:{}:{}", self.id, self.method, side)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use strata_sip_core::{CSeq, HeaderFieldValue, HeaderName, StatusCode, Uri, Via};

    fn request(method: Method, branch: Option<&str>, to_tag: Option<&str>) -> SipMessage {
        let mut req = SipMessage::new_request(method.clone(), Uri::sip("example.com").with_user("bob"));
        let mut via = Via::new("UDP", "client.example.com", Some(5060));
        if let Some(branch) = branch {
            via = via.with_branch(branch);
        }
        req.push_via(via);
        req.append_header(HeaderName::From, HeaderFieldValue::text_value("<sip:alice@example.com>;tag=ftag"));
        let to = match to_tag {
            Some(tag) => format!("<sip:bob@example.com>;tag={}", tag),
            None => "<sip:bob@example.com>".to_string(),
        };
        req.append_header(HeaderName::To, HeaderFieldValue::text_value(to));
        req.append_header(HeaderName::CallId, HeaderFieldValue::text_value("callid-test-key"));
        req.append_header(HeaderName::CSeq, HeaderFieldValue::new(CSeq::new(1, method)));
        req
    }

    #[test]
    fn branch_identifies_transaction() {
        let req = request(Method::Invite, Some("z9hG4bK776asdhds"), None);
        let key = TransactionKey::for_request(&req, true).unwrap();
        assert_eq!(key.id, "z9hG4bK776asdhds");
        assert_eq!(key.method, Method::Invite);
        assert!(key.is_server);
        assert!(key.is_rfc3261());
        assert_eq!(key.to_string(), "z9hG4bK776asdhds:INVITE:server");
    }

    #[test]
    fn ack_is_keyed_as_invite() {
        let invite = request(Method::Invite, Some("z9hG4bKabc"), None);
        let ack = request(Method::Ack, Some("z9hG4bKabc"), Some("totag"));
        assert_eq!(
            TransactionKey::for_request(&invite, true).unwrap(),
            TransactionKey::for_request(&ack, true).unwrap()
        );
    }

    #[test]
    fn cancel_is_a_separate_transaction() {
        let invite = request(Method::Invite, Some("z9hG4bKabc"), None);
        let cancel = request(Method::Cancel, Some("z9hG4bKabc"), None);
        let invite_key = TransactionKey::for_request(&invite, true).unwrap();
        let cancel_key = TransactionKey::for_request(&cancel, true).unwrap();
        assert_ne!(invite_key, cancel_key);
        assert_eq!(cancel_key.invite_key(), invite_key);
    }

    #[test]
    fn legacy_key_ignores_to_tag() {
        let invite = request(Method::Invite, None, None);
        let ack = request(Method::Ack, Some("1234"), Some("totag"));
        let invite_key = TransactionKey::for_request(&invite, true).unwrap();
        assert!(!invite_key.is_rfc3261());
        assert_eq!(invite_key.id, "client.example.com:5060|callid-test-key|ftag|1");
        assert_eq!(invite_key, TransactionKey::for_request(&ack, true).unwrap());
    }

    #[test]
    fn response_matches_client_side() {
        let req = request(Method::Register, Some("z9hG4bKreg"), None);
        let response = strata_sip_core::helpers::make_response(&req, StatusCode::OK, None).unwrap();
        let client = TransactionKey::for_request(&req, false).unwrap();
        assert_eq!(TransactionKey::for_response(&response, false).unwrap(), client);
        assert_eq!(
            TransactionKey::for_response(&response, true).unwrap(),
            TransactionKey { is_server: true, ..client }
        );
    }

    #[test]
    fn missing_via_has_no_id() {
        let mut req = SipMessage::new_request(Method::Options, Uri::sip("example.com"));
        req.append_header(HeaderName::CSeq, HeaderFieldValue::new(CSeq::new(1, Method::Options)));
        assert_eq!(
            TransactionKey::for_request(&req, true).unwrap_err(),
            Error::NoTransactionId
        );
    }

    #[test]
    fn keys_hash_by_all_fields() {
        let mut set = HashSet::new();
        set.insert(TransactionKey::new("z9hG4bK1", Method::Invite, true));
        set.insert(TransactionKey::new("z9hG4bK1", Method::Invite, false));
        set.insert(TransactionKey::new("z9hG4bK1", Method::Cancel, true));
        set.insert(TransactionKey::new("z9hG4bK1", Method::Ack, true));
        assert_eq!(set.len(), 3);
    }
}
