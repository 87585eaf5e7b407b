use serde::{Deserialize, Serialize};

use super::{MessageId, Seq};

/// The summary of one message, built from its `From`, `To`, `Subject` and `Date` fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// The message's sequence number in the session that fetched it.
    pub seq: Seq,
    /// Stable identifier, see [`MessageId`].
    pub id: MessageId,
    pub from: String,
    pub to: String,
    pub subject: String,
    /// The `Date` field as `DD/MM/YY HH:MM`, or the raw value if it could not be parsed.
    pub date: String,
    /// Set when part of the header block could not be parsed. The other fields hold whatever
    /// could be recovered.
    pub problem: Option<String>,
}

impl Header {
    /// Whether every field was parsed cleanly.
    pub fn is_clean(&self) -> bool {
        self.problem.is_none()
    }
}
