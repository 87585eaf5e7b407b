//! Reading whole messages.

use std::ops::RangeInclusive;

use log::debug;
use rayon::prelude::*;

use crate::conn::MailSession;
use crate::error::{Error, ParseError, Result};
use crate::mime::MimeDecoder;
use crate::parse::{header_section, parse_header_block};
use crate::session::OpenFolder;
use crate::types::{DecodedMessage, FetchedPart, MailAddress, MessageId, Section, Seq, SequenceSet};

/// Decode one fetched message and attach its joined addresses and identifier.
///
/// The identifier is derived from the message's own header block the same way
/// [`header_record`](crate::headers::header_record) derives it, so both agree for one message.
pub fn decode_message<D: MimeDecoder + ?Sized>(
    decoder: &D,
    part: &FetchedPart,
) -> std::result::Result<DecodedMessage, ParseError> {
    let parts = decoder
        .decode(&part.data)
        .ok_or(ParseError::Mime(part.seq))?;

    let (fields, _) = parse_header_block(header_section(&part.data));
    let id = MessageId::derive(
        fields.first("subject").unwrap_or_default(),
        fields.first("from").unwrap_or_default(),
        fields.first("to").unwrap_or_default(),
        fields.first("date").unwrap_or_default(),
    );

    Ok(DecodedMessage {
        seq: part.seq,
        id,
        from: MailAddress::join(&parts.from),
        to: MailAddress::join(&parts.to),
        cc: MailAddress::join(&parts.cc),
        subject: parts.subject,
        date: parts.date,
        html: parts.html,
        text: parts.text,
        attachments: parts.attachments,
    })
}

/// Read message `seq` of the open folder.
pub fn read_one<S: MailSession, D: MimeDecoder + ?Sized>(
    folder: &mut OpenFolder<'_, S>,
    decoder: &D,
    seq: Seq,
) -> Result<DecodedMessage> {
    if seq == 0 {
        return Err(Error::validation("sequence numbers start at 1"));
    }
    if seq > folder.exists() {
        return Err(Error::fetch(format!(
            "message {} does not exist in {} ({} messages)",
            seq,
            folder.name(),
            folder.exists()
        )));
    }

    let parts = folder.fetch(&SequenceSet::Range(seq, seq), Section::Full)?;
    let part = parts
        .into_iter()
        .find(|p| p.seq == seq)
        .ok_or_else(|| Error::fetch(format!("server returned no data for message {}", seq)))?;
    Ok(decode_message(decoder, &part)?)
}

/// Read every message in `range` from the open folder, in ascending sequence order.
///
/// The range is clipped to the messages that exist. All messages are fetched before any is
/// decoded; decoding then runs in parallel, and a single undecodable message fails the batch.
pub fn read_range<S: MailSession, D: MimeDecoder + ?Sized>(
    folder: &mut OpenFolder<'_, S>,
    decoder: &D,
    range: RangeInclusive<Seq>,
) -> Result<Vec<DecodedMessage>> {
    let (from, to) = range.into_inner();
    if from == 0 {
        return Err(Error::validation("sequence numbers start at 1"));
    }
    if from > to {
        return Err(Error::validation(format!("empty range {}..={}", from, to)));
    }
    let to = to.min(folder.exists());
    if from > to {
        return Ok(Vec::new());
    }

    let set = SequenceSet::Range(from, to);
    let mut parts = folder.fetch(&set, Section::Full)?;
    parts.retain(|p| set.contains(p.seq));
    parts.sort_unstable_by_key(|p| p.seq);
    parts.dedup_by_key(|p| p.seq);

    if parts.len() != set.len() {
        let missing: Vec<Seq> = (from..=to)
            .filter(|seq| parts.binary_search_by_key(seq, |p| p.seq).is_err())
            .collect();
        return Err(Error::fetch(format!(
            "server returned no data for messages {:?}",
            missing
        )));
    }

    debug!("{}: decoding {} messages", folder.name(), parts.len());
    let decoded = parts
        .par_iter()
        .map(|part| decode_message(decoder, part))
        .collect::<std::result::Result<Vec<_>, ParseError>>()?;
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mime::MailParserDecoder;

    const RAW: &[u8] = b"From: Ann <ann@example.com>\r\n\
To: bob@example.com\r\n\
Cc: Carol <carol@example.com>, dave@example.com\r\n\
Subject: Lunch\r\n\
Date: Tue, 1 Jul 2003 10:52:37 +0200\r\n\
Content-Type: text/plain\r\n\
\r\n\
Noon?\r\n";

    #[test]
    fn decoded_addresses_are_joined() {
        let part = FetchedPart {
            seq: 3,
            data: RAW.to_vec(),
        };
        let message = decode_message(&MailParserDecoder, &part).unwrap();
        assert_eq!(message.seq, 3);
        assert_eq!(message.from, "Ann <ann@example.com>");
        assert_eq!(message.to, "bob@example.com");
        assert_eq!(message.cc, "Carol <carol@example.com>, dave@example.com");
        assert_eq!(message.subject.as_deref(), Some("Lunch"));
        assert_eq!(message.text.as_deref().map(str::trim), Some("Noon?"));
    }

    #[test]
    fn identifier_matches_header_summary() {
        let part = FetchedPart {
            seq: 1,
            data: RAW.to_vec(),
        };
        let message = decode_message(&MailParserDecoder, &part).unwrap();
        let header = crate::headers::header_record(1, header_section(RAW));
        assert_eq!(message.id, header.id);
    }

    #[test]
    fn undecodable_message() {
        let part = FetchedPart {
            seq: 9,
            data: Vec::new(),
        };
        assert_eq!(
            decode_message(&MailParserDecoder, &part),
            Err(ParseError::Mime(9))
        );
    }
}
