use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A content-derived reference to a message.
///
/// Sequence numbers shift whenever a folder changes, so they cannot be kept between sessions.
/// A `MessageId` is instead a SHA-256 digest over the message's subject, sender, recipients and
/// date header, encoded as unpadded URL-safe base64. The same logical message always yields the
/// same identifier, whichever session fetched it.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Derive the identifier from the raw (decoded but not otherwise normalized) header values.
    pub fn derive(subject: &str, from: &str, to: &str, date: &str) -> Self {
        let mut hasher = Sha256::new();
        for field in [subject, from, to, date] {
            // Length-prefix each field so ("ab", "c") and ("a", "bc") differ.
            hasher.update((field.len() as u64).to_be_bytes());
            hasher.update(field.as_bytes());
        }
        MessageId(URL_SAFE_NO_PAD.encode(hasher.finalize()))
    }

    /// The encoded identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let a = MessageId::derive("Hi", "ann@example.com", "bob@example.com", "Mon, 1 Jan 2024");
        let b = MessageId::derive("Hi", "ann@example.com", "bob@example.com", "Mon, 1 Jan 2024");
        assert_eq!(a, b);
        // 32 byte digest, no padding
        assert_eq!(a.as_str().len(), 43);
    }

    #[test]
    fn subject_changes_identifier() {
        let a = MessageId::derive("Hi", "ann@example.com", "bob@example.com", "Mon, 1 Jan 2024");
        let b = MessageId::derive("Hi!", "ann@example.com", "bob@example.com", "Mon, 1 Jan 2024");
        assert_ne!(a, b);
    }

    #[test]
    fn field_boundaries_matter() {
        assert_ne!(
            MessageId::derive("ab", "c", "", ""),
            MessageId::derive("a", "bc", "", "")
        );
    }
}
