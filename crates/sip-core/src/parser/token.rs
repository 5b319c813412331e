use nom::{
    branch::alt,
    bytes::complete::{escaped, is_not, tag, take_while1},
    character::complete::digit1,
    combinator::{map, map_res, opt, recognize},
    multi::many0,
    sequence::{delimited, pair, preceded, tuple},
};

use super::whitespace::{owsp, separator, sws};
use super::ParseResult;
use crate::types::param::{Param, Params};

/// token = 1*(alphanum / "-" / "." / "!" / "%" / "*" / "_" / "+" / "`" / "'" / "~")
pub fn is_token_char(c: u8) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(c, b'-' | b'.' | b'!' | b'%' | b'*' | b'_' | b'+' | b'`' | b'\'' | b'~')
}

fn is_host_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, b'-' | b'.' | b'_')
}

/// Characters allowed in a parameter value that is not a quoted string.
/// Slightly wider than `token` so that IPv6 references and `host:port`
/// style values used by some agents survive.
fn is_param_value_char(c: u8) -> bool {
    is_token_char(c) || matches!(c, b'[' | b']' | b':' | b'/' | b'@' | b'&' | b'$')
}

pub fn token(input: &[u8]) -> ParseResult<&str> {
    map_res(take_while1(is_token_char), std::str::from_utf8)(input)
}

/// quoted-string = DQUOTE *(qdtext / quoted-pair) DQUOTE, returned with its quotes
pub fn quoted_string(input: &[u8]) -> ParseResult<&str> {
    map_res(
        recognize(delimited(
            tag(b"\""),
            opt(escaped(is_not("\\\""), '\\', one_of_any)),
            tag(b"\""),
        )),
        std::str::from_utf8,
    )(input)
}

fn one_of_any(input: &[u8]) -> ParseResult<&[u8]> {
    match input.first() {
        Some(_) => Ok((&input[1..], &input[..1])),
        None => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Escaped,
        ))),
    }
}

/// host = hostname / IPv4address / IPv6reference
pub fn host(input: &[u8]) -> ParseResult<&str> {
    map_res(
        alt((
            recognize(delimited(
                tag(b"["),
                take_while1(|c: u8| c.is_ascii_hexdigit() || c == b':' || c == b'.'),
                tag(b"]"),
            )),
            take_while1(is_host_char),
        )),
        std::str::from_utf8,
    )(input)
}

pub fn port(input: &[u8]) -> ParseResult<u16> {
    map_res(map_res(digit1, std::str::from_utf8), |s: &str| s.parse::<u16>())(input)
}

/// `host [ ":" port ]`
pub fn host_port(input: &[u8]) -> ParseResult<(&str, Option<u16>)> {
    pair(host, opt(preceded(tag(b":"), port)))(input)
}

/// generic-param = token [ EQUAL gen-value ]
pub fn generic_param(input: &[u8]) -> ParseResult<Param> {
    map(
        pair(
            token,
            opt(preceded(
                separator("="),
                alt((
                    quoted_string,
                    map_res(take_while1(is_param_value_char), std::str::from_utf8),
                )),
            )),
        ),
        |(name, value)| Param {
            name: name.to_string(),
            value: value.map(str::to_string),
        },
    )(input)
}

/// `*( SEMI generic-param )`
pub fn semi_params(input: &[u8]) -> ParseResult<Params> {
    map(many0(preceded(separator(";"), generic_param)), Params::from)(input)
}

/// Trailing whitespace the preparser leaves behind is tolerated
pub fn trailing(input: &[u8]) -> ParseResult<&[u8]> {
    recognize(tuple((sws, owsp)))(input)
}
