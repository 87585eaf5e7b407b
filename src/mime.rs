//! The MIME decoding capability used by the message reader.

use mail_parser::{Address, MessageParser, MimeHeaders};

use crate::types::{Attachment, MailAddress, MimeParts};

/// Turns a raw RFC 822 message into its parts.
///
/// Decoding runs on a thread pool, hence `Sync`.
pub trait MimeDecoder: Sync {
    /// Decode `raw`, or `None` if it cannot be made sense of.
    fn decode(&self, raw: &[u8]) -> Option<MimeParts>;
}

/// [`MimeDecoder`] backed by [`mail_parser`].
#[derive(Clone, Copy, Debug, Default)]
pub struct MailParserDecoder;

fn addresses(address: Option<&Address<'_>>) -> Vec<MailAddress> {
    address
        .map(|list| {
            list.iter()
                .map(|addr| MailAddress {
                    name: addr.name().map(str::to_string),
                    address: addr.address().map(str::to_string),
                })
                .collect()
        })
        .unwrap_or_default()
}

impl MimeDecoder for MailParserDecoder {
    fn decode(&self, raw: &[u8]) -> Option<MimeParts> {
        if raw.is_empty() {
            return None;
        }
        let message = MessageParser::default().parse(raw)?;

        let attachments = message
            .attachments()
            .map(|part| Attachment {
                filename: part.attachment_name().map(str::to_string),
                content_type: part
                    .content_type()
                    .map(|ct| format!("{}/{}", ct.ctype(), ct.subtype().unwrap_or("octet-stream")))
                    .unwrap_or_else(|| "application/octet-stream".to_string()),
                content: part.contents().to_vec(),
            })
            .collect();

        Some(MimeParts {
            from: addresses(message.from()),
            to: addresses(message.to()),
            cc: addresses(message.cc()),
            subject: message.subject().map(str::to_string),
            date: message.date().map(|d| d.to_rfc3339()),
            html: message.body_html(0).map(|b| b.into_owned()),
            text: message.body_text(0).map(|b| b.into_owned()),
            attachments,
        })
    }
}
