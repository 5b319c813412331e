use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while, take_while_m_n},
    combinator::{map, map_res, opt},
    sequence::{preceded, tuple},
};

use super::token::token;
use super::uri::uri;
use super::whitespace::wsp;
use super::ParseResult;
use crate::message::{RequestLine, StartLine, StatusLine};
use crate::types::method::Method;
use crate::types::status::StatusCode;

fn version(input: &[u8]) -> ParseResult<&[u8]> {
    tag_no_case(b"SIP/2.0")(input)
}

/// Request-Line = Method SP Request-URI SP SIP-Version
pub fn request_line(input: &[u8]) -> ParseResult<RequestLine> {
    map(
        tuple((
            map_res(token, |t: &str| t.parse::<Method>()),
            wsp,
            uri,
            wsp,
            version,
        )),
        |(method, _, uri, _, _)| RequestLine { method, uri },
    )(input)
}

/// Status-Line = SIP-Version SP Status-Code SP Reason-Phrase
pub fn status_line(input: &[u8]) -> ParseResult<StatusLine> {
    map(
        tuple((
            version,
            wsp,
            map_res(
                map_res(take_while_m_n(3, 3, |c: u8| c.is_ascii_digit()), std::str::from_utf8),
                |s: &str| s.parse::<StatusCode>(),
            ),
            opt(preceded(
                wsp,
                map_res(take_while(|c: u8| c != b'\r' && c != b'\n'), std::str::from_utf8),
            )),
        )),
        |(_, _, code, reason)| StatusLine {
            code,
            reason: reason.unwrap_or_default().to_string(),
        },
    )(input)
}

pub fn start_line(input: &[u8]) -> ParseResult<StartLine> {
    alt((
        map(status_line, StartLine::Response),
        map(request_line, StartLine::Request),
    ))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_line() {
        let (rem, line) = start_line(b"INVITE sip:bob@biloxi.com SIP/2.0").unwrap();
        assert!(rem.is_empty());
        match line {
            StartLine::Request(r) => {
                assert_eq!(r.method, Method::Invite);
                assert_eq!(r.uri.host, "biloxi.com");
            }
            _ => panic!("expected request"),
        }
    }

    #[test]
    fn test_status_line() {
        let (_, line) = start_line(b"SIP/2.0 180 Ringing").unwrap();
        match line {
            StartLine::Response(s) => {
                assert_eq!(s.code, StatusCode::RINGING);
                assert_eq!(s.reason, "Ringing");
            }
            _ => panic!("expected response"),
        }
        // empty reason phrase is legal
        let (_, line) = start_line(b"SIP/2.0 200 ").unwrap();
        assert!(matches!(line, StartLine::Response(ref s) if s.reason.is_empty()));
    }

    #[test]
    fn test_malformed() {
        assert!(start_line(b"INVITE sip:bob@biloxi.com HTTP/1.1").is_err());
        assert!(crate::parser::parse_complete(start_line, b"SIP/2.0 2000 OK").is_err());
        assert!(start_line(b"garbage").is_err());
    }
}
