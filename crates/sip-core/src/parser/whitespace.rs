use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    combinator::{opt, recognize},
    sequence::tuple,
};

use super::ParseResult;

pub(crate) fn is_wsp(c: u8) -> bool {
    c == b' ' || c == b'\t'
}

/// Parses one or more SP / HTAB
pub fn wsp(input: &[u8]) -> ParseResult<&[u8]> {
    take_while1(is_wsp)(input)
}

/// Parses optional whitespace (0 or more SP or HTAB)
pub fn owsp(input: &[u8]) -> ParseResult<&[u8]> {
    take_while(is_wsp)(input)
}

/// Parses CRLF (accepts \r\n or just \n)
pub fn crlf(input: &[u8]) -> ParseResult<&[u8]> {
    alt((tag(b"\r\n"), tag(b"\n")))(input)
}

/// LWS = [*WSP CRLF] 1*WSP
pub fn lws(input: &[u8]) -> ParseResult<&[u8]> {
    alt((recognize(tuple((owsp, crlf, wsp))), wsp))(input)
}

/// SWS = [LWS]
pub fn sws(input: &[u8]) -> ParseResult<&[u8]> {
    recognize(opt(lws))(input)
}

/// `SWS sep SWS` around a separator character, e.g. `SLASH` or `SEMI`
pub fn separator<'a>(sep: &'static str) -> impl FnMut(&'a [u8]) -> ParseResult<'a, &'a [u8]> {
    recognize(tuple((sws, tag(sep), sws)))
}

/// Replaces each folded line break (CRLF or LF followed by whitespace) with
/// a single space, so that typed parsers never see line terminators.
pub fn unfold_lws(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        let c = input[i];
        let brk = match c {
            b'\r' if input.get(i + 1) == Some(&b'\n') => 2,
            b'\n' => 1,
            _ => 0,
        };
        if brk > 0 && input.get(i + brk).map_or(false, |&n| is_wsp(n)) {
            while out.last().map_or(false, |&l| is_wsp(l)) {
                out.pop();
            }
            out.push(b' ');
            i += brk;
            while i < input.len() && is_wsp(input[i]) {
                i += 1;
            }
            continue;
        }
        out.push(c);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wsp() {
        let (rem, val) = wsp(b" \trest").unwrap();
        assert_eq!(rem, b"rest");
        assert_eq!(val, b" \t");
        assert!(wsp(b"").is_err());
        assert!(wsp(b"a").is_err());
    }

    #[test]
    fn test_crlf() {
        let (rem, _) = crlf(b"\r\nrest").unwrap();
        assert_eq!(rem, b"rest");
        let (rem, _) = crlf(b"\nrest").unwrap();
        assert_eq!(rem, b"rest");
        assert!(crlf(b"\r").is_err());
    }

    #[test]
    fn test_lws_folding() {
        let (rem, val) = lws(b" \r\n\trest").unwrap();
        assert_eq!(rem, b"rest");
        assert_eq!(val, b" \r\n\t");
        // CRLF not followed by whitespace is not LWS
        let (rem, _) = sws(b"\r\nNext").unwrap();
        assert_eq!(rem, b"\r\nNext");
    }

    #[test]
    fn test_separator() {
        let (rem, _) = separator("/")(b" / UDP").unwrap();
        assert_eq!(rem, b"UDP");
    }

    #[test]
    fn test_unfold() {
        assert_eq!(unfold_lws(b"a,\r\n  b"), b"a, b".to_vec());
        assert_eq!(unfold_lws(b"a \n\tb"), b"a b".to_vec());
        assert_eq!(unfold_lws(b"plain"), b"plain".to_vec());
    }
}
