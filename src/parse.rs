//! Parsing of the header blocks returned by `BODY[HEADER.FIELDS (...)]` and found at the top of
//! every `BODY[]`.
//!
//! The IMAP layer hands back the requested header lines verbatim: folded, possibly repeated, and
//! with non-ASCII text in RFC 2047 encoded words. This module turns such a block into a list of
//! unfolded, decoded `(name, value)` pairs.

use base64::{
    alphabet,
    engine::{general_purpose, DecodePaddingMode, GeneralPurpose},
    Engine as _,
};
use chrono::DateTime;
use lazy_static::lazy_static;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_while, take_while1},
    character::complete::line_ending,
    combinator::eof,
    multi::many0,
    sequence::{preceded, terminated},
    IResult,
};
use regex::{Captures, Regex};

use crate::error::ParseError;

/// Display pattern for normalized dates.
pub const DATE_FORMAT: &str = "%d/%m/%y %H:%M";

lazy_static! {
    static ref ENCODED_WORD: Regex =
        Regex::new(r"=\?([^?\s]+)\?([BbQq])\?([^?\s]*)\?=").unwrap();
    static ref TRAILING_COMMENT: Regex = Regex::new(r"\s*\([^()]*\)\s*$").unwrap();
}

// Encoded words in the wild often drop their `=` padding.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    general_purpose::PAD.with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Header fields in the order they appeared. Repeated names keep every value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderFields {
    fields: Vec<(String, String)>,
}

impl HeaderFields {
    /// The first value of the field `name`, compared case-insensitively.
    pub fn first<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        self.all(name).next()
    }

    /// Every value of the field `name`, in order.
    pub fn all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

fn is_ftext(c: u8) -> bool {
    (33..=126).contains(&c) && c != b':'
}

fn is_wsp(c: u8) -> bool {
    c == b' ' || c == b'\t'
}

fn is_eol(c: u8) -> bool {
    c == b'\r' || c == b'\n'
}

fn line_end(i: &[u8]) -> IResult<&[u8], &[u8]> {
    alt((line_ending, eof))(i)
}

fn rest_of_line(i: &[u8]) -> IResult<&[u8], &[u8]> {
    terminated(take_till(is_eol), line_end)(i)
}

fn continuation(i: &[u8]) -> IResult<&[u8], &[u8]> {
    preceded(take_while1(is_wsp), rest_of_line)(i)
}

fn field(i: &[u8]) -> IResult<&[u8], (&[u8], Vec<&[u8]>)> {
    let (i, name) = take_while1(is_ftext)(i)?;
    let (i, _) = take_while(is_wsp)(i)?;
    let (i, _) = tag(":")(i)?;
    let (i, first) = rest_of_line(i)?;
    let (i, mut lines) = many0(continuation)(i)?;
    lines.insert(0, first);
    Ok((i, (name, lines)))
}

/// Parses a raw header block.
///
/// Parsing is best-effort: fields up to the first malformed line are returned together with a
/// [`ParseError::Header`] describing where parsing stopped.
pub fn parse_header_block(block: &[u8]) -> (HeaderFields, Option<ParseError>) {
    let (rest, parsed) = match many0(field)(block) {
        Ok(ok) => ok,
        Err(_) => (block, Vec::new()),
    };

    let fields = parsed
        .into_iter()
        .map(|(name, lines)| {
            let value = lines
                .iter()
                .map(|l| String::from_utf8_lossy(l))
                .collect::<Vec<_>>()
                .join(" ");
            (
                String::from_utf8_lossy(name).into_owned(),
                decode_words(value.trim()),
            )
        })
        .collect();

    let leftover = String::from_utf8_lossy(rest);
    let problem = if leftover.trim().is_empty() {
        None
    } else {
        Some(ParseError::Header(leftover.chars().take(40).collect()))
    };

    (HeaderFields { fields }, problem)
}

/// The header section of a raw message: everything up to and including the line ending before
/// the first empty line. A message without a body is all header.
pub fn header_section(raw: &[u8]) -> &[u8] {
    let crlf = raw.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 2);
    let lf = raw.windows(2).position(|w| w == b"\n\n").map(|i| i + 1);
    let end = match (crlf, lf) {
        (Some(a), Some(b)) => a.min(b),
        (a, b) => a.or(b).unwrap_or(raw.len()),
    };
    &raw[..end]
}

/// Decodes RFC 2047 encoded words, dropping the whitespace between adjacent ones.
///
/// Words in an unknown charset or with broken payloads are left as they are.
pub fn decode_words(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut last = 0;
    let mut after_word = false;
    for caps in ENCODED_WORD.captures_iter(value) {
        let Some(whole) = caps.get(0) else { continue };
        let gap = &value[last..whole.start()];
        if !(after_word && gap.trim().is_empty()) {
            out.push_str(gap);
        }
        match decode_word(&caps) {
            Some(decoded) => {
                out.push_str(&decoded);
                after_word = true;
            }
            None => {
                out.push_str(whole.as_str());
                after_word = false;
            }
        }
        last = whole.end();
    }
    out.push_str(&value[last..]);
    out
}

fn decode_word(caps: &Captures<'_>) -> Option<String> {
    // RFC 2231 allows a language suffix: `utf-8*en`.
    let charset = caps[1].split('*').next()?;
    let encoding = encoding_rs::Encoding::for_label(charset.as_bytes())?;
    let bytes = match &caps[2] {
        "B" | "b" => LENIENT_BASE64.decode(&caps[3]).ok()?,
        _ => decode_q(&caps[3])?,
    };
    let (text, _, malformed) = encoding.decode(&bytes);
    if malformed {
        return None;
    }
    Some(text.into_owned())
}

fn decode_q(text: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len());
    let mut bytes = text.bytes();
    while let Some(b) = bytes.next() {
        match b {
            b'_' => out.push(b' '),
            b'=' => {
                let hi = (bytes.next()? as char).to_digit(16)?;
                let lo = (bytes.next()? as char).to_digit(16)?;
                out.push((hi * 16 + lo) as u8);
            }
            b => out.push(b),
        }
    }
    Some(out)
}

/// Reformats an RFC 2822 date into [`DATE_FORMAT`], keeping the date's own UTC offset.
pub fn normalize_date(raw: &str) -> Result<String, ParseError> {
    let trimmed = TRAILING_COMMENT.replace(raw.trim(), "");
    DateTime::parse_from_rfc2822(trimmed.trim())
        .map(|date| date.format(DATE_FORMAT).to_string())
        .map_err(|_| ParseError::Date(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_block() {
        let block = b"From: Ann <ann@example.com>\r\n\
                      To: bob@example.com\r\n\
                      Subject: Lunch\r\n\
                      Date: Tue, 1 Jul 2003 10:52:37 +0200\r\n\
                      \r\n";
        let (fields, problem) = parse_header_block(block);
        assert!(problem.is_none());
        for name in ["from", "to", "subject", "date"] {
            assert_eq!(fields.all(name).count(), 1);
        }
        assert_eq!(fields.first("from"), Some("Ann <ann@example.com>"));
        assert_eq!(fields.first("SUBJECT"), Some("Lunch"));
        assert_eq!(fields.first("cc"), None);
    }

    #[test]
    fn folded_lines_are_unfolded() {
        let block = b"Subject: a very\r\n  long subject\r\n\tindeed\r\n";
        let (fields, problem) = parse_header_block(block);
        assert!(problem.is_none());
        assert_eq!(fields.first("subject"), Some("a very long subject indeed"));
    }

    #[test]
    fn repeated_fields_keep_all_values() {
        let block = b"Date: Tue, 1 Jul 2003 10:52:37 +0200\nDate: Wed, 2 Jul 2003 10:52:37 +0200\n";
        let (fields, _) = parse_header_block(block);
        assert_eq!(
            fields.all("date").collect::<Vec<_>>(),
            vec![
                "Tue, 1 Jul 2003 10:52:37 +0200",
                "Wed, 2 Jul 2003 10:52:37 +0200"
            ]
        );
        assert_eq!(fields.first("date"), Some("Tue, 1 Jul 2003 10:52:37 +0200"));
    }

    #[test]
    fn last_line_without_terminator() {
        let (fields, problem) = parse_header_block(b"To: x@example.com");
        assert!(problem.is_none());
        assert_eq!(fields.first("to"), Some("x@example.com"));
    }

    #[test]
    fn malformed_block_is_best_effort() {
        let block = b"Subject: ok\r\nthis line has no colon\r\nTo: late@example.com\r\n";
        let (fields, problem) = parse_header_block(block);
        assert_eq!(fields.first("subject"), Some("ok"));
        assert_eq!(fields.first("to"), None);
        match problem {
            Some(ParseError::Header(near)) => assert!(near.starts_with("this line")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn header_section_stops_at_blank_line() {
        let raw = b"Subject: hi\r\nTo: x@example.com\r\n\r\nBody: not a header\r\n";
        assert_eq!(header_section(raw), b"Subject: hi\r\nTo: x@example.com\r\n");
        assert_eq!(header_section(b"Subject: hi\n\nbody"), b"Subject: hi\n");
        assert_eq!(header_section(b"Subject: hi\r\n"), b"Subject: hi\r\n");
    }

    #[test]
    fn encoded_words() {
        assert_eq!(decode_words("=?UTF-8?B?SGVsbG8gV8O2cmxk?="), "Hello Wörld");
        assert_eq!(decode_words("=?iso-8859-1?Q?Caf=E9_cr=E8me?="), "Café crème");
        assert_eq!(
            decode_words("=?UTF-8?Q?a?= =?UTF-8?Q?b?= plain"),
            "ab plain"
        );
        // unpadded base64
        assert_eq!(decode_words("=?utf-8?b?SGk?="), "Hi");
        assert_eq!(decode_words("=?x-unknown?Q?abc?="), "=?x-unknown?Q?abc?=");
        assert_eq!(decode_words("no words here"), "no words here");
    }

    #[test]
    fn dates() {
        assert_eq!(
            normalize_date("Tue, 1 Jul 2003 10:52:37 +0200").unwrap(),
            "01/07/03 10:52"
        );
        assert_eq!(
            normalize_date("Fri, 21 Nov 1997 09:55:06 -0600 (MDT)").unwrap(),
            "21/11/97 09:55"
        );
        assert_eq!(
            normalize_date("yesterday"),
            Err(ParseError::Date("yesterday".into()))
        );
    }
}
