//! # SIP Methods
//!
//! Request methods from RFC 3261 and the common extensions. Unknown tokens
//! are kept verbatim in [`Method::Extension`] so that a stack can proxy or
//! reject methods it does not implement.
//!
//! ```rust
//! use strata_sip_core::Method;
//! use std::str::FromStr;
//!
//! let m = Method::from_str("INVITE").unwrap();
//! assert_eq!(m, Method::Invite);
//! assert_eq!(Method::from_str("PING").unwrap().as_str(), "PING");
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::parser::token::is_token_char;

/// SIP request method
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Invite,
    Ack,
    Bye,
    Cancel,
    Register,
    Options,
    Info,
    Prack,
    Subscribe,
    Notify,
    Update,
    Refer,
    Message,
    Publish,
    /// Any other method token, stored as received
    Extension(String),
}

impl Method {
    /// Returns the wire representation of the method
    pub fn as_str(&self) -> &str {
        match self {
            Method::Invite => "INVITE",
            Method::Ack => "ACK",
            Method::Bye => "BYE",
            Method::Cancel => "CANCEL",
            Method::Register => "REGISTER",
            Method::Options => "OPTIONS",
            Method::Info => "INFO",
            Method::Prack => "PRACK",
            Method::Subscribe => "SUBSCRIBE",
            Method::Notify => "NOTIFY",
            Method::Update => "UPDATE",
            Method::Refer => "REFER",
            Method::Message => "MESSAGE",
            Method::Publish => "PUBLISH",
            Method::Extension(name) => name,
        }
    }

    /// True for INVITE, the only method with a three-way handshake
    pub fn is_invite(&self) -> bool {
        matches!(self, Method::Invite)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    /// Method names are case-sensitive (RFC 3261 Section 7.1)
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "INVITE" => Ok(Method::Invite),
            "ACK" => Ok(Method::Ack),
            "BYE" => Ok(Method::Bye),
            "CANCEL" => Ok(Method::Cancel),
            "REGISTER" => Ok(Method::Register),
            "OPTIONS" => Ok(Method::Options),
            "INFO" => Ok(Method::Info),
            "PRACK" => Ok(Method::Prack),
            "SUBSCRIBE" => Ok(Method::Subscribe),
            "NOTIFY" => Ok(Method::Notify),
            "UPDATE" => Ok(Method::Update),
            "REFER" => Ok(Method::Refer),
            "MESSAGE" => Ok(Method::Message),
            "PUBLISH" => Ok(Method::Publish),
            other if !other.is_empty() && other.bytes().all(is_token_char) => {
                Ok(Method::Extension(other.to_string()))
            }
            other => Err(Error::InvalidMethod(other.to_string())),
        }
    }
}
