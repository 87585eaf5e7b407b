//! This module contains the values handed to and returned from the mailbox operations.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::utils::iter_join;

/// From section [2.3.1.2 of RFC 3501](https://tools.ietf.org/html/rfc3501#section-2.3.1.2).
///
/// A relative position from 1 to the number of messages in the mailbox.
///
/// Message sequence numbers can be reassigned during the session, and are reassigned freely
/// between sessions. Since every operation in this crate opens its own session, a sequence
/// number returned by one call only identifies "the same" message in a later call if nothing was
/// expunged or delivered in between. Use [`MessageId`] when a stable reference is needed.
pub type Seq = u32;

mod fingerprint;
pub use self::fingerprint::MessageId;

mod folder;
pub use self::folder::{FolderMode, FolderNode, FolderView, ListedFolder, TreeData, TreeNode};

mod header;
pub use self::header::Header;

mod message;
pub use self::message::{Attachment, DecodedMessage, MailAddress, MimeParts};

mod outgoing;
pub use self::outgoing::{Delivery, Email, SendReport};

/// How a folder is opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessMode {
    /// `EXAMINE`: flags are left untouched.
    ReadOnly,
    /// `SELECT`.
    ReadWrite,
}

/// What the server reported when a folder was opened.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderStatus {
    /// Number of messages in the folder.
    pub exists: u32,
    /// Number of messages with the `\Recent` flag set.
    pub recent: u32,
    /// The folder's `UIDVALIDITY`, if the server sent one.
    pub uid_validity: Option<u32>,
}

impl FolderStatus {
    /// An empty folder has no sequence numbers to fetch.
    pub fn is_empty(&self) -> bool {
        self.exists == 0
    }
}

/// A message sequence set as used by `FETCH`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SequenceSet {
    /// A contiguous, inclusive range `from:to`.
    Range(Seq, Seq),
    /// An explicit list of sequence numbers.
    List(Vec<Seq>),
}

impl SequenceSet {
    /// Whether the set names `seq`.
    pub fn contains(&self, seq: Seq) -> bool {
        match self {
            SequenceSet::Range(from, to) => (*from..=*to).contains(&seq),
            SequenceSet::List(list) => list.contains(&seq),
        }
    }

    /// Number of sequence numbers in the set.
    pub fn len(&self) -> usize {
        match self {
            SequenceSet::Range(from, to) if from <= to => (to - from) as usize + 1,
            SequenceSet::Range(..) => 0,
            SequenceSet::List(list) => list.len(),
        }
    }

    /// Whether the set names nothing at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for SequenceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceSet::Range(from, to) if from == to => write!(f, "{}", from),
            SequenceSet::Range(from, to) => write!(f, "{}:{}", from, to),
            SequenceSet::List(list) => f.write_str(&iter_join(list, ",")),
        }
    }
}

/// The part of each message a `FETCH` asks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Section {
    /// Only the `From`, `To`, `Subject` and `Date` header fields.
    SummaryHeaders,
    /// The whole RFC 822 message.
    Full,
}

impl Section {
    /// The `FETCH` data item for this section. `PEEK` keeps `\Seen` untouched.
    pub fn query(self) -> &'static str {
        match self {
            Section::SummaryHeaders => "BODY.PEEK[HEADER.FIELDS (FROM TO SUBJECT DATE)]",
            Section::Full => "BODY.PEEK[]",
        }
    }
}

/// The raw bytes a `FETCH` returned for one message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchedPart {
    /// The message's sequence number in the open folder.
    pub seq: Seq,
    /// The requested section, complete.
    pub data: Vec<u8>,
}
