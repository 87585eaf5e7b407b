use std::fmt;

use serde::{Deserialize, Serialize};

use super::{MessageId, Seq};
use crate::utils::iter_join;

/// A single mailbox from an address header.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailAddress {
    /// The display name, if any.
    pub name: Option<String>,
    /// The `local@domain` part. Group syntax can leave this empty.
    pub address: Option<String>,
}

impl MailAddress {
    /// Address without a display name.
    pub fn bare<S: Into<String>>(address: S) -> Self {
        MailAddress {
            name: None,
            address: Some(address.into()),
        }
    }

    /// Joins a list of addresses into the `a, Name <b>` form used by [`DecodedMessage`].
    pub fn join(list: &[MailAddress]) -> String {
        iter_join(list.iter().filter(|a| !a.is_empty()), ", ")
    }

    fn is_empty(&self) -> bool {
        self.name.as_deref().map_or(true, str::is_empty)
            && self.address.as_deref().map_or(true, str::is_empty)
    }
}

impl fmt::Display for MailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.name.as_deref(), self.address.as_deref()) {
            (Some(name), Some(addr)) if !name.is_empty() => write!(f, "{} <{}>", name, addr),
            (_, Some(addr)) => f.write_str(addr),
            (Some(name), None) => f.write_str(name),
            (None, None) => Ok(()),
        }
    }
}

/// A file attached to a message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: Option<String>,
    /// `type/subtype`.
    pub content_type: String,
    /// Transfer-decoded bytes.
    pub content: Vec<u8>,
}

/// What a MIME decoder extracts from a raw message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MimeParts {
    pub from: Vec<MailAddress>,
    pub to: Vec<MailAddress>,
    pub cc: Vec<MailAddress>,
    pub subject: Option<String>,
    /// The `Date` header in RFC 3339 form, if present and valid.
    pub date: Option<String>,
    pub html: Option<String>,
    pub text: Option<String>,
    pub attachments: Vec<Attachment>,
}

/// A fully decoded message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedMessage {
    /// The message's sequence number in the session that fetched it.
    pub seq: Seq,
    /// Stable identifier, see [`MessageId`].
    pub id: MessageId,
    /// Comma-joined sender addresses.
    pub from: String,
    /// Comma-joined recipient addresses.
    pub to: String,
    /// Comma-joined carbon-copy addresses.
    pub cc: String,
    pub subject: Option<String>,
    pub date: Option<String>,
    pub html: Option<String>,
    pub text: Option<String>,
    pub attachments: Vec<Attachment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_display() {
        let named = MailAddress {
            name: Some("Ann Example".into()),
            address: Some("ann@example.com".into()),
        };
        assert_eq!(named.to_string(), "Ann Example <ann@example.com>");
        assert_eq!(MailAddress::bare("bob@example.com").to_string(), "bob@example.com");
    }

    #[test]
    fn join_skips_empty_entries() {
        let list = vec![
            MailAddress::bare("a@example.com"),
            MailAddress::default(),
            MailAddress {
                name: Some("B".into()),
                address: Some("b@example.com".into()),
            },
        ];
        assert_eq!(MailAddress::join(&list), "a@example.com, B <b@example.com>");
    }
}
