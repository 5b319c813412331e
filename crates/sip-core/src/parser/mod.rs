//! nom parsers for the SIP grammar pieces of RFC 3261 Section 25 that the
//! stack needs: start lines, URIs, Via, CSeq and name-addr values.
//!
//! Framing (finding header and body boundaries) is not done here; see
//! [`crate::preparse`]. These parsers run lazily over single header values
//! that the preparser has already isolated and unfolded.

pub mod headers;
pub mod start_line;
pub mod token;
pub mod uri;
pub mod whitespace;

use nom::IResult;

// Type alias for parser result
pub type ParseResult<'a, O> = IResult<&'a [u8], O>;

/// Runs `parser` over the whole of `input`, tolerating surrounding
/// whitespace, and turns nom errors into a readable reason.
pub fn parse_complete<'a, O, F>(mut parser: F, input: &'a [u8]) -> std::result::Result<O, String>
where
    F: FnMut(&'a [u8]) -> ParseResult<'a, O>,
{
    let start = input
        .iter()
        .position(|c| !whitespace::is_wsp(*c))
        .unwrap_or(input.len());
    match parser(&input[start..]) {
        Ok((rest, out)) => {
            let rest = match token::trailing(rest) {
                Ok((rest, _)) => rest,
                Err(_) => rest,
            };
            if rest.is_empty() {
                Ok(out)
            } else {
                Err(format!(
                    "unexpected trailing input {:?}",
                    String::from_utf8_lossy(rest)
                ))
            }
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(format!(
            "{:?} at {:?}",
            e.code,
            String::from_utf8_lossy(e.input)
        )),
        Err(nom::Err::Incomplete(_)) => Err("incomplete input".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_complete_trims() {
        let cseq = parse_complete(headers::cseq, b"  12 BYE  ").unwrap();
        assert_eq!(cseq.seq, 12);
        let err = parse_complete(headers::cseq, b"12 BYE extra").unwrap_err();
        assert!(err.contains("trailing"));
    }
}
