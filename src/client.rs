//! The read-side entry point: one [`MailClient`] per IMAP account.

use std::ops::RangeInclusive;

use log::debug;

use crate::conn::{Connect, ImapConnector, MailSession};
use crate::error::Result;
use crate::folders;
use crate::headers;
use crate::message;
use crate::mime::{MailParserDecoder, MimeDecoder};
use crate::params::ConnectionParams;
use crate::session::{with_account, with_folder};
use crate::types::{AccessMode, DecodedMessage, FolderMode, FolderView, Header, Seq};

/// Connect-do-disconnect access to one IMAP account.
///
/// A `MailClient` holds no connection. Every method opens a fresh session, performs one
/// interaction, and tears the session down again before returning, so sequence numbers from one
/// call are only meaningful in a later call if the folder did not change in between. Folders are
/// always opened read-only.
///
/// ```no_run
/// use postbox::{ConnectionParams, ImapConnector, MailClient, MailParserDecoder};
///
/// # fn main() -> postbox::Result<()> {
/// let params = ConnectionParams::builder("imap.example.com", 993)
///     .credentials("ann@example.com", "secret")
///     .build()?;
/// let client = MailClient::new(ImapConnector::new(), MailParserDecoder, params);
/// for header in client.fetch_recent_headers("INBOX", 10)? {
///     println!("{} {} {}", header.date, header.from, header.subject);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct MailClient<C = ImapConnector, D = MailParserDecoder> {
    connector: C,
    decoder: D,
    params: ConnectionParams,
}

impl<C: Connect, D: MimeDecoder> MailClient<C, D> {
    /// A client that connects through `connector` and decodes messages with `decoder`.
    pub fn new(connector: C, decoder: D, params: ConnectionParams) -> Self {
        MailClient {
            connector,
            decoder,
            params,
        }
    }

    /// The account every call connects to.
    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    /// Connect, authenticate, and log out.
    pub fn test_connection(&self) -> Result<()> {
        with_account(&self.connector, &self.params, |_| Ok(()))
    }

    /// List every folder of the account, shaped by `mode`.
    pub fn list_folders(&self, mode: FolderMode) -> Result<FolderView> {
        let listed = with_account(&self.connector, &self.params, |session| {
            session.list_folders()
        })?;
        debug!("{}: {} folders", self.params.connection_key(), listed.len());
        Ok(folders::render(
            &listed,
            mode,
            &self.params.connection_key(),
        ))
    }

    /// The headers of the `count` most recent messages in `folder`, newest first.
    pub fn fetch_recent_headers(&self, folder: &str, count: u32) -> Result<Vec<Header>> {
        with_folder(
            &self.connector,
            &self.params,
            folder,
            AccessMode::ReadOnly,
            |open| headers::fetch_recent(open, count),
        )
    }

    /// The headers of every message in `folder` sent to or from `query`, newest first.
    pub fn search_headers(&self, folder: &str, query: &str) -> Result<Vec<Header>> {
        with_folder(
            &self.connector,
            &self.params,
            folder,
            AccessMode::ReadOnly,
            |open| headers::search(open, query),
        )
    }

    /// Read and decode message `seq` of `folder`.
    pub fn read_message(&self, folder: &str, seq: Seq) -> Result<DecodedMessage> {
        with_folder(
            &self.connector,
            &self.params,
            folder,
            AccessMode::ReadOnly,
            |open| message::read_one(open, &self.decoder, seq),
        )
    }

    /// Read and decode the messages in `range`, in ascending sequence order.
    pub fn read_messages(
        &self,
        folder: &str,
        range: RangeInclusive<Seq>,
    ) -> Result<Vec<DecodedMessage>> {
        with_folder(
            &self.connector,
            &self.params,
            folder,
            AccessMode::ReadOnly,
            |open| message::read_range(open, &self.decoder, range),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::testing::{Call, Fault, RejectingDecoder, ScriptedConnector, ScriptedFolder};
    use crate::types::{Section, SequenceSet};

    fn raw(n: u32) -> Vec<u8> {
        format!(
            "From: sender{n}@example.com\r\n\
             To: ann@example.com\r\n\
             Subject: message {n}\r\n\
             Date: {n} Jul 2003 10:52:37 +0200\r\n\
             \r\n\
             body {n}\r\n"
        )
        .into_bytes()
    }

    fn inbox(messages: u32) -> ScriptedFolder {
        (1..=messages).fold(ScriptedFolder::new("INBOX"), |f, n| f.message(raw(n)))
    }

    fn params() -> ConnectionParams {
        ConnectionParams::builder("imap.example.com", 993)
            .credentials("ann", "secret")
            .build()
            .unwrap()
    }

    fn client(server: &ScriptedConnector) -> MailClient<ScriptedConnector, MailParserDecoder> {
        MailClient::new(server.clone(), MailParserDecoder, params())
    }

    #[test]
    fn recent_headers_window() {
        let server = ScriptedConnector::new().folder(inbox(5));
        let headers = client(&server).fetch_recent_headers("INBOX", 2).unwrap();
        assert_eq!(headers.iter().map(|h| h.seq).collect::<Vec<_>>(), vec![5, 4]);
        assert_eq!(headers[0].subject, "message 5");
        assert_eq!(headers[0].date, "05/07/03 10:52");
        assert!(server.calls().contains(&Call::Fetch(
            SequenceSet::Range(4, 5),
            Section::SummaryHeaders
        )));
    }

    #[test]
    fn empty_folder_fetches_nothing() {
        let server = ScriptedConnector::new().folder(inbox(0));
        assert!(client(&server).fetch_recent_headers("INBOX", 10).unwrap().is_empty());
        assert!(client(&server).search_headers("INBOX", "ann").unwrap().is_empty());
        assert_eq!(
            server.count(|c| matches!(c, Call::Fetch(..) | Call::Search(_))),
            0
        );
        assert_eq!(server.count(|c| *c == Call::Logout), 2);
    }

    #[test]
    fn search_fetches_matches_only() {
        let server = ScriptedConnector::new().folder(
            inbox(3).message(b"From: zed@example.org\r\nTo: yan@example.org\r\n\r\nhi\r\n".to_vec()),
        );
        let headers = client(&server).search_headers("INBOX", "sender2").unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0].seq, 2);

        let headers = client(&server).search_headers("INBOX", "ANN@example.com").unwrap();
        assert_eq!(headers.iter().map(|h| h.seq).collect::<Vec<_>>(), vec![3, 2, 1]);

        assert!(client(&server).search_headers("INBOX", "nobody").unwrap().is_empty());
    }

    #[test]
    fn read_range_in_order() {
        let server = ScriptedConnector::new().folder(inbox(6)).deliver_reversed();
        let messages = client(&server).read_messages("INBOX", 2..=5).unwrap();
        assert_eq!(
            messages.iter().map(|m| m.seq).collect::<Vec<_>>(),
            vec![2, 3, 4, 5]
        );
        assert_eq!(messages[0].from, "sender2@example.com");
    }

    #[test]
    fn read_range_is_clipped() {
        let server = ScriptedConnector::new().folder(inbox(3));
        let messages = client(&server).read_messages("INBOX", 2..=10).unwrap();
        assert_eq!(messages.len(), 2);
        assert!(client(&server).read_messages("INBOX", 7..=9).unwrap().is_empty());
    }

    #[test]
    fn read_validation() {
        let server = ScriptedConnector::new().folder(inbox(3));
        let c = client(&server);
        assert!(matches!(c.read_message("INBOX", 0), Err(Error::Validation(_))));
        #[allow(clippy::reversed_empty_ranges)]
        let inverted = c.read_messages("INBOX", 3..=2);
        assert!(matches!(inverted, Err(Error::Validation(_))));
        assert!(matches!(c.read_message("INBOX", 4), Err(Error::Fetch(_))));
        // every attempt still logged out
        assert_eq!(server.count(|c| *c == Call::Logout), 3);
    }

    #[test]
    fn one_bad_message_fails_the_batch() {
        let server = ScriptedConnector::new().folder(
            inbox(2).message(b"Subject: poison\r\n\r\nx\r\n".to_vec()),
        );
        let c = MailClient::new(server.clone(), RejectingDecoder::new("poison"), params());
        let err = c.read_messages("INBOX", 1..=3).unwrap_err();
        assert!(matches!(err, Error::Parse(crate::ParseError::Mime(3))));
        assert_eq!(server.count(|c| *c == Call::CloseFolder), 1);
    }

    #[test]
    fn list_folders_tree() {
        let server = ScriptedConnector::new()
            .folder(ScriptedFolder::new("INBOX"))
            .folder(ScriptedFolder::new("Work/Clients"));
        let view = client(&server).list_folders(FolderMode::Flat).unwrap();
        assert_eq!(
            view,
            FolderView::Flat(vec!["INBOX".into(), "Work".into(), "Work.Clients".into()])
        );
        let FolderView::Tree(nodes) = client(&server).list_folders(FolderMode::Tree).unwrap() else {
            panic!("expected a tree");
        };
        assert_eq!(nodes[1].children[0].id, "ann@imap.example.com_folder_Work.Clients");
    }

    #[test]
    fn transport_loss_during_fetch() {
        let server = ScriptedConnector::new()
            .folder(inbox(3))
            .fail_on(Fault::FetchConnectionLost);
        let err = client(&server).fetch_recent_headers("INBOX", 3).unwrap_err();
        assert!(err.is_connection());
        assert_eq!(server.count(|c| *c == Call::CloseFolder), 1);
        assert_eq!(server.count(|c| *c == Call::Logout), 1);
    }

    #[test]
    fn test_connection_only_logs_in_and_out() {
        let server = ScriptedConnector::new();
        client(&server).test_connection().unwrap();
        assert_eq!(
            server.calls(),
            vec![Call::Connect, Call::Authenticate, Call::Logout]
        );
    }
}
