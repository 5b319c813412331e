use nom::{
    bytes::complete::{tag, take_while1},
    combinator::{map_res, opt},
    sequence::{preceded, terminated},
};

use super::token::{host_port, semi_params};
use super::ParseResult;
use crate::types::param::Params;
use crate::types::uri::Uri;

fn is_scheme_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, b'+' | b'-' | b'.')
}

fn is_userinfo_char(c: u8) -> bool {
    !matches!(c, b'@' | b'>' | b'<' | b' ' | b'\t' | b'\r' | b'\n' | b'"')
}

fn is_opaque_char(c: u8) -> bool {
    !matches!(c, b';' | b'?' | b'>' | b'<' | b' ' | b'\t' | b'\r' | b'\n' | b',')
}

fn is_headers_char(c: u8) -> bool {
    !matches!(c, b'>' | b' ' | b'\t' | b'\r' | b'\n')
}

fn scheme(input: &[u8]) -> ParseResult<&str> {
    map_res(terminated(take_while1(is_scheme_char), tag(b":")), std::str::from_utf8)(input)
}

/// Parses a URI as it appears inside `<...>` or in a request line.
/// SIP and SIPS URIs are broken into their parts; any other scheme keeps
/// the scheme-specific part in `host` and its `;params`.
pub fn uri(input: &[u8]) -> ParseResult<Uri> {
    uri_impl(input, true)
}

/// Parses an addr-spec that is not enclosed in angle brackets. Such a URI
/// cannot carry parameters, so everything after `;` belongs to the header.
pub fn bare_uri(input: &[u8]) -> ParseResult<Uri> {
    uri_impl(input, false)
}

fn uri_impl(input: &[u8], with_params: bool) -> ParseResult<Uri> {
    let (rest, scheme) = scheme(input)?;
    let scheme = scheme.to_ascii_lowercase();

    if scheme == "sip" || scheme == "sips" {
        let (rest, user) = opt(map_res(
            terminated(take_while1(is_userinfo_char), tag(b"@")),
            std::str::from_utf8,
        ))(rest)?;
        let (rest, (host, port)) = host_port(rest)?;
        let (rest, params) = if with_params {
            semi_params(rest)?
        } else {
            (rest, Params::new())
        };
        let (rest, headers) = if with_params {
            opt(map_res(
                preceded(tag(b"?"), take_while1(is_headers_char)),
                std::str::from_utf8,
            ))(rest)?
        } else {
            (rest, None)
        };
        return Ok((
            rest,
            Uri {
                scheme,
                user: user.map(str::to_string),
                host: host.to_string(),
                port,
                params,
                headers: headers.map(str::to_string),
            },
        ));
    }

    let (rest, opaque) = map_res(take_while1(is_opaque_char), std::str::from_utf8)(rest)?;
    let (rest, params) = if with_params {
        semi_params(rest)?
    } else {
        (rest, Params::new())
    };
    Ok((
        rest,
        Uri {
            scheme,
            user: None,
            host: opaque.to_string(),
            port: None,
            params,
            headers: None,
        },
    ))
}
