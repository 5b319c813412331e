//! Typed parsers for the header values the transaction layer inspects.

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::digit1,
    combinator::{map, map_res, opt, recognize},
    multi::many0,
    sequence::{pair, preceded, terminated, tuple},
};

use super::token::{host_port, quoted_string, semi_params, token};
use super::uri::{bare_uri, uri};
use super::whitespace::{lws, separator, sws};
use super::ParseResult;
use crate::types::cseq::CSeq;
use crate::types::method::Method;
use crate::types::name_addr::NameAddr;
use crate::types::via::Via;

/// via-parm = sent-protocol LWS sent-by *( SEMI via-params )
pub fn via(input: &[u8]) -> ParseResult<Via> {
    map(
        tuple((
            token,
            separator("/"),
            token,
            separator("/"),
            token,
            lws,
            host_port,
            semi_params,
        )),
        |(name, _, version, _, transport, _, (host, port), params)| Via {
            protocol: format!("{}/{}", name, version),
            transport: transport.to_string(),
            host: host.to_string(),
            port,
            params,
        },
    )(input)
}

/// CSeq = 1*DIGIT LWS Method
pub fn cseq(input: &[u8]) -> ParseResult<CSeq> {
    map(
        tuple((
            map_res(map_res(digit1, std::str::from_utf8), |s: &str| s.parse::<u32>()),
            lws,
            map_res(token, |t: &str| t.parse::<Method>()),
        )),
        |(seq, _, method)| CSeq { seq, method },
    )(input)
}

fn display_name(input: &[u8]) -> ParseResult<&str> {
    alt((
        quoted_string,
        map_res(
            recognize(pair(token, many0(preceded(lws, token)))),
            std::str::from_utf8,
        ),
    ))(input)
}

fn bracketed(input: &[u8]) -> ParseResult<NameAddr> {
    map(
        tuple((
            opt(terminated(display_name, sws)),
            tag(b"<"),
            uri,
            tag(b">"),
            semi_params,
        )),
        |(name, _, uri, _, params)| NameAddr {
            display_name: name.map(str::to_string),
            uri,
            params,
            angle_brackets: true,
        },
    )(input)
}

fn addr_spec(input: &[u8]) -> ParseResult<NameAddr> {
    map(pair(bare_uri, semi_params), |(uri, params)| NameAddr {
        display_name: None,
        uri,
        params,
        angle_brackets: false,
    })(input)
}

/// ( name-addr / addr-spec ) *( SEMI generic-param )
pub fn name_addr(input: &[u8]) -> ParseResult<NameAddr> {
    alt((bracketed, addr_spec))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_via_multiple_params() {
        let (rem, v) = via(b"SIP/2.0/UDP [2001:db8::9]:5062;branch=z9hG4bK1;rport=5062").unwrap();
        assert!(rem.is_empty());
        assert_eq!(v.host, "[2001:db8::9]");
        assert_eq!(v.rport(), Some(Some(5062)));
    }

    #[test]
    fn test_cseq_needs_method() {
        assert!(cseq(b"1 ").is_err());
        let (_, c) = cseq(b"7 REGISTER").unwrap();
        assert_eq!(c.method, Method::Register);
    }

    #[test]
    fn test_name_addr_forms() {
        let (rem, na) = name_addr(b"Bob Smith <sip:bob@biloxi.com>;tag=x").unwrap();
        assert!(rem.is_empty());
        assert_eq!(na.display_name.as_deref(), Some("Bob Smith"));
        let (rem, na) = name_addr(b"<sip:carol@chicago.com;lr>").unwrap();
        assert!(rem.is_empty());
        assert!(na.uri.params.contains("lr"));
    }
}
