//! In-memory stand-ins for the mail servers, for testing code built on this crate.
//!
//! [`ScriptedConnector`] plays an IMAP account holding [`ScriptedFolder`]s and
//! [`ScriptedSmtp`] an SMTP relay. Both keep a journal of every call made against them and can be
//! told to fail at a given step with [`Fault`] / [`SmtpFault`].
//!
//! Clones share the same server state and journal, so a test can keep one handle for
//! inspection while the code under test consumes another.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::conn::{Authenticate, Connect, MailSession};
use crate::error::{Error, Result};
use crate::mime::{MailParserDecoder, MimeDecoder};
use crate::params::{ConnectionParams, SmtpParams};
use crate::parse::{header_section, parse_header_block};
use crate::smtp::{SmtpConnect, SmtpTransport};
use crate::types::{
    AccessMode, Delivery, Email, FetchedPart, FolderStatus, ListedFolder, MimeParts, Section,
    Seq, SequenceSet,
};

/// A call received by a [`ScriptedConnector`] or one of its sessions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Connect,
    Authenticate,
    List,
    Open(String, AccessMode),
    Fetch(SequenceSet, Section),
    Search(String),
    CloseFolder,
    Logout,
}

/// A step at which a [`ScriptedConnector`] fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    /// The transport cannot be established.
    Connect,
    /// The credentials are refused.
    Authenticate,
    /// `LIST` is rejected.
    List,
    /// `FETCH` is rejected with `BAD`.
    Fetch,
    /// The connection drops while `FETCH` results are arriving.
    FetchConnectionLost,
    /// `SEARCH` is rejected.
    Search,
    /// `CLOSE` fails.
    CloseFolder,
    /// `LOGOUT` fails.
    Logout,
}

/// A folder on a [`ScriptedConnector`]. Message `n` (1-based) has sequence number `n`.
#[derive(Clone, Debug)]
pub struct ScriptedFolder {
    name: String,
    delimiter: Option<String>,
    attributes: Vec<String>,
    messages: Vec<Vec<u8>>,
}

impl ScriptedFolder {
    pub fn new<S: Into<String>>(name: S) -> Self {
        ScriptedFolder {
            name: name.into(),
            delimiter: Some("/".to_string()),
            attributes: Vec::new(),
            messages: Vec::new(),
        }
    }

    pub fn delimiter(mut self, delimiter: Option<&str>) -> Self {
        self.delimiter = delimiter.map(str::to_string);
        self
    }

    pub fn attribute<S: Into<String>>(mut self, attribute: S) -> Self {
        self.attributes.push(attribute.into());
        self
    }

    /// Append a raw RFC 822 message.
    pub fn message<M: Into<Vec<u8>>>(mut self, raw: M) -> Self {
        self.messages.push(raw.into());
        self
    }
}

#[derive(Debug, Default)]
struct Account {
    folders: Vec<ScriptedFolder>,
    faults: Vec<Fault>,
    reverse_delivery: bool,
    calls: Vec<Call>,
}

impl Account {
    fn record(&mut self, call: Call) {
        self.calls.push(call);
    }

    fn fails(&self, fault: Fault) -> bool {
        self.faults.contains(&fault)
    }
}

/// A scripted IMAP account implementing [`Connect`].
#[derive(Clone, Debug, Default)]
pub struct ScriptedConnector {
    account: Arc<Mutex<Account>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        ScriptedConnector::default()
    }

    /// Add a folder. Folders are listed in the order they were added.
    pub fn folder(self, folder: ScriptedFolder) -> Self {
        self.lock().folders.push(folder);
        self
    }

    /// Fail at the given step, every time it is reached.
    pub fn fail_on(self, fault: Fault) -> Self {
        self.lock().faults.push(fault);
        self
    }

    /// Return `FETCH` results in descending sequence order, like some servers do.
    pub fn deliver_reversed(self) -> Self {
        self.lock().reverse_delivery = true;
        self
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Number of received calls matching `pred`.
    pub fn count<P: Fn(&Call) -> bool>(&self, pred: P) -> usize {
        self.lock().calls.iter().filter(|c| pred(c)).count()
    }

    fn lock(&self) -> MutexGuard<'_, Account> {
        // a panicking test must not hide the journal from the assertions after it
        self.account.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Connect for ScriptedConnector {
    type Client = ScriptedClient;

    fn connect(&self, _params: &ConnectionParams) -> Result<ScriptedClient> {
        let mut account = self.lock();
        account.record(Call::Connect);
        if account.fails(Fault::Connect) {
            return Err(Error::connection("connection refused"));
        }
        Ok(ScriptedClient {
            server: self.clone(),
        })
    }
}

/// A connected [`ScriptedConnector`] client.
#[derive(Debug)]
pub struct ScriptedClient {
    server: ScriptedConnector,
}

impl Authenticate for ScriptedClient {
    type Session = ScriptedSession;

    fn authenticate(self, _params: &ConnectionParams) -> Result<ScriptedSession> {
        let mut account = self.server.lock();
        account.record(Call::Authenticate);
        if account.fails(Fault::Authenticate) {
            return Err(Error::connection("NO [AUTHENTICATIONFAILED] Invalid credentials"));
        }
        drop(account);
        Ok(ScriptedSession {
            server: self.server,
            open: None,
        })
    }
}

/// An authenticated [`ScriptedConnector`] session.
#[derive(Debug)]
pub struct ScriptedSession {
    server: ScriptedConnector,
    open: Option<usize>,
}

impl ScriptedSession {
    fn open_messages<'a>(&self, account: &'a Account) -> Result<&'a [Vec<u8>]> {
        self.open
            .and_then(|i| account.folders.get(i))
            .map(|f| f.messages.as_slice())
            .ok_or_else(|| Error::fetch("BAD No mailbox selected"))
    }
}

fn sequence_numbers(set: &SequenceSet) -> Vec<Seq> {
    match set {
        SequenceSet::Range(from, to) => (*from..=*to).collect(),
        SequenceSet::List(list) => list.clone(),
    }
}

// Reads the quoted string at the start of `input`, returning it and the rest.
fn take_quoted(input: &str) -> Option<(String, &str)> {
    let mut chars = input.strip_prefix('"')?.char_indices();
    let mut value = String::new();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => value.push(chars.next()?.1),
            '"' => return Some((value, &input[i + 2..])),
            c => value.push(c),
        }
    }
    None
}

// Only the `OR TO "q" FROM "q"` form is understood.
fn search_query(criteria: &str) -> Option<String> {
    let (to, rest) = take_quoted(criteria.strip_prefix("OR TO ")?)?;
    let (from, _) = take_quoted(rest.strip_prefix(" FROM ")?)?;
    (to == from).then_some(to)
}

impl MailSession for ScriptedSession {
    fn list_folders(&mut self) -> Result<Vec<ListedFolder>> {
        let mut account = self.server.lock();
        account.record(Call::List);
        if account.fails(Fault::List) {
            return Err(Error::fetch("BAD LIST failed"));
        }
        Ok(account
            .folders
            .iter()
            .map(|f| ListedFolder {
                name: f.name.clone(),
                delimiter: f.delimiter.clone(),
                attributes: f.attributes.clone(),
            })
            .collect())
    }

    fn open_folder(&mut self, name: &str, mode: AccessMode) -> Result<FolderStatus> {
        let mut account = self.server.lock();
        account.record(Call::Open(name.to_string(), mode));
        match account.folders.iter().position(|f| f.name == name) {
            Some(i) => {
                self.open = Some(i);
                Ok(FolderStatus {
                    exists: account.folders[i].messages.len() as u32,
                    recent: 0,
                    uid_validity: Some(1),
                })
            }
            None => Err(Error::folder(name, "NO Mailbox doesn't exist")),
        }
    }

    fn fetch(&mut self, set: &SequenceSet, section: Section) -> Result<Vec<FetchedPart>> {
        let mut account = self.server.lock();
        account.record(Call::Fetch(set.clone(), section));
        if account.fails(Fault::Fetch) {
            return Err(Error::fetch("BAD Invalid sequence set"));
        }
        if account.fails(Fault::FetchConnectionLost) {
            return Err(Error::connection("connection reset by peer"));
        }

        let messages = self.open_messages(&account)?;
        let mut parts: Vec<FetchedPart> = sequence_numbers(set)
            .into_iter()
            .filter_map(|seq| {
                let raw = messages.get(seq.checked_sub(1)? as usize)?;
                let data = match section {
                    Section::SummaryHeaders => header_section(raw).to_vec(),
                    Section::Full => raw.clone(),
                };
                Some(FetchedPart { seq, data })
            })
            .collect();
        parts.sort_by_key(|p| p.seq);
        if account.reverse_delivery {
            parts.reverse();
        }
        Ok(parts)
    }

    fn search(&mut self, criteria: &str) -> Result<Vec<Seq>> {
        let mut account = self.server.lock();
        account.record(Call::Search(criteria.to_string()));
        if account.fails(Fault::Search) {
            return Err(Error::fetch("BAD Invalid search criteria"));
        }
        let query = search_query(criteria)
            .ok_or_else(|| Error::fetch(format!("BAD unsupported criteria {}", criteria)))?
            .to_lowercase();

        let messages = self.open_messages(&account)?;
        Ok(messages
            .iter()
            .zip(1..)
            .filter(|(raw, _)| {
                let (fields, _) = parse_header_block(header_section(raw));
                let hit = fields
                    .all("to")
                    .chain(fields.all("from"))
                    .any(|v| v.to_lowercase().contains(&query));
                hit
            })
            .map(|(_, seq)| seq)
            .collect())
    }

    fn close_folder(&mut self) -> Result<()> {
        let mut account = self.server.lock();
        account.record(Call::CloseFolder);
        self.open = None;
        if account.fails(Fault::CloseFolder) {
            return Err(Error::connection("connection reset by peer"));
        }
        Ok(())
    }

    fn logout(&mut self) -> Result<()> {
        let mut account = self.server.lock();
        account.record(Call::Logout);
        if account.fails(Fault::Logout) {
            return Err(Error::connection("connection reset by peer"));
        }
        Ok(())
    }
}

/// A [`MimeDecoder`] that refuses any message containing a marker, and otherwise defers to
/// [`MailParserDecoder`].
#[derive(Clone, Debug)]
pub struct RejectingDecoder {
    marker: Vec<u8>,
}

impl RejectingDecoder {
    pub fn new<M: Into<Vec<u8>>>(marker: M) -> Self {
        RejectingDecoder {
            marker: marker.into(),
        }
    }
}

impl MimeDecoder for RejectingDecoder {
    fn decode(&self, raw: &[u8]) -> Option<MimeParts> {
        if raw.windows(self.marker.len()).any(|w| w == self.marker.as_slice()) {
            return None;
        }
        MailParserDecoder.decode(raw)
    }
}

/// A call received by a [`ScriptedSmtp`] relay.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SmtpCall {
    Open,
    Verify,
    Transmit(Email),
    Close,
}

/// A step at which a [`ScriptedSmtp`] relay fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SmtpFault {
    /// The relay cannot be reached or refuses the credentials.
    Open,
    /// The connection test fails.
    Verify,
    /// The message is refused.
    Transmit,
    /// Shutting down fails.
    Close,
}

#[derive(Debug, Default)]
struct Relay {
    faults: Vec<SmtpFault>,
    calls: Vec<SmtpCall>,
}

/// A scripted SMTP relay implementing [`SmtpConnect`]. Accepted messages are answered with
/// `250 2.0.0 Ok: queued`.
#[derive(Clone, Debug, Default)]
pub struct ScriptedSmtp {
    relay: Arc<Mutex<Relay>>,
}

impl ScriptedSmtp {
    pub fn new() -> Self {
        ScriptedSmtp::default()
    }

    pub fn fail_on(self, fault: SmtpFault) -> Self {
        self.lock().faults.push(fault);
        self
    }

    pub fn calls(&self) -> Vec<SmtpCall> {
        self.lock().calls.clone()
    }

    /// The messages transmitted so far.
    pub fn sent(&self) -> Vec<Email> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                SmtpCall::Transmit(email) => Some(email.clone()),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Relay> {
        self.relay.lock().unwrap_or_else(|e| e.into_inner())
    }

    // Records `call`, then fails if `fault` is scripted.
    fn step(&self, call: SmtpCall, fault: SmtpFault, error: &str) -> Result<()> {
        let mut relay = self.lock();
        relay.calls.push(call);
        if relay.faults.contains(&fault) {
            return Err(Error::send(error.to_string()));
        }
        Ok(())
    }
}

impl SmtpConnect for ScriptedSmtp {
    type Transport = ScriptedSmtp;

    fn open(&self, _params: &SmtpParams) -> Result<ScriptedSmtp> {
        self.step(SmtpCall::Open, SmtpFault::Open, "535 5.7.8 Authentication failed")?;
        Ok(self.clone())
    }
}

impl SmtpTransport for ScriptedSmtp {
    fn verify(&mut self) -> Result<()> {
        self.step(SmtpCall::Verify, SmtpFault::Verify, "421 Service not available")
    }

    fn transmit(&mut self, email: &Email) -> Result<Delivery> {
        self.step(
            SmtpCall::Transmit(email.clone()),
            SmtpFault::Transmit,
            "554 5.7.1 Message rejected",
        )?;
        Ok(Delivery {
            code: "250".to_string(),
            message: vec!["2.0.0 Ok: queued".to_string()],
        })
    }

    fn close(self) -> Result<()> {
        self.step(SmtpCall::Close, SmtpFault::Close, "connection reset by peer")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_search_round_trip() {
        assert_eq!(
            search_query(r#"OR TO "ann \"the\" \\ one" FROM "ann \"the\" \\ one""#),
            Some(r#"ann "the" \ one"#.to_string())
        );
        assert_eq!(search_query("ALL"), None);
        assert_eq!(search_query(r#"OR TO "a" FROM "b""#), None);
    }
}
