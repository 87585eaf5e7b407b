//! The mail-protocol capability this crate is built on.
//!
//! Nothing in this crate speaks IMAP itself. Sessions are obtained through the [`Connect`] and
//! [`Authenticate`] traits and driven through [`MailSession`]; [`ImapConnector`] implements them
//! on top of the [`imap`] crate. Tests substitute the scripted connector from
//! [`testing`](crate::testing).

use std::fmt::{Debug, Formatter};
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

use imap_proto::NameAttribute;
use log::debug;

use crate::error::{Error, Result};
use crate::params::ConnectionParams;
use crate::types::{AccessMode, FetchedPart, FolderStatus, ListedFolder, Section, Seq, SequenceSet};

/// Opens a transport to a mail server.
pub trait Connect {
    /// A connected but not yet authenticated client.
    type Client: Authenticate;

    /// Establish the transport and read the server greeting.
    ///
    /// Any failure is reported as [`Error::Connection`].
    fn connect(&self, params: &ConnectionParams) -> Result<Self::Client>;
}

/// Logs a connected client in.
pub trait Authenticate {
    /// The authenticated session.
    type Session: MailSession;

    /// Authenticate with the credentials in `params`. On failure the client is dropped, which
    /// destroys the transport.
    fn authenticate(self, params: &ConnectionParams) -> Result<Self::Session>;
}

/// The session type a [`Connect`] implementation ends up with.
pub type SessionOf<C> = <<C as Connect>::Client as Authenticate>::Session;

/// An authenticated session.
///
/// Command rejections are reported as [`Error::Fetch`] (or [`Error::Folder`] for
/// [`open_folder`](MailSession::open_folder)); a transport that went away mid-command is
/// reported as [`Error::Connection`].
pub trait MailSession {
    /// Every folder in the account, in server order.
    fn list_folders(&mut self) -> Result<Vec<ListedFolder>>;

    /// Open `name` in the given mode.
    fn open_folder(&mut self, name: &str, mode: AccessMode) -> Result<FolderStatus>;

    /// Fetch `section` of every message in `set`. Delivery order is up to the server.
    fn fetch(&mut self, set: &SequenceSet, section: Section) -> Result<Vec<FetchedPart>>;

    /// Run a `SEARCH` with pre-formatted criteria and return the matching sequence numbers.
    fn search(&mut self, criteria: &str) -> Result<Vec<Seq>>;

    /// Close the open folder.
    fn close_folder(&mut self) -> Result<()>;

    /// End the session.
    fn logout(&mut self) -> Result<()>;
}

/// Byte stream under an IMAP session: plain TCP or TLS.
pub trait ReadWrite: Read + Write + Send {}

impl<T> ReadWrite for T where T: Read + Write + Send {}

impl Debug for dyn ReadWrite {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Imap stream")
    }
}

/// A boxed stream type
pub type Stream = Box<dyn ReadWrite>;

/// [`Connect`] over the [`imap`] crate, using implicit TLS or plaintext TCP.
#[derive(Clone, Debug, Default)]
pub struct ImapConnector {
    accept_invalid_certs: bool,
}

impl ImapConnector {
    /// A connector that verifies server certificates.
    pub fn new() -> Self {
        ImapConnector::default()
    }

    /// Accept invalid certificates and host names. Only for test servers.
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    #[cfg(feature = "native-tls")]
    fn handshake(&self, domain: &str, tcp: TcpStream) -> Result<Stream> {
        let connector = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .danger_accept_invalid_hostnames(self.accept_invalid_certs)
            .build()
            .map_err(Error::connection)?;
        let tls = connector
            .connect(domain, tcp)
            .map_err(|e| Error::connection(e.to_string()))?;
        Ok(Box::new(tls))
    }

    #[cfg(all(feature = "rustls-tls", not(feature = "native-tls")))]
    fn handshake(&self, domain: &str, tcp: TcpStream) -> Result<Stream> {
        use rustls_connector::RustlsConnector;

        if self.accept_invalid_certs {
            log::warn!("rustls transport always verifies certificates");
        }
        let connector =
            RustlsConnector::new_with_native_certs().map_err(|e| Error::connection(e.to_string()))?;
        let tls = connector
            .connect(domain, tcp)
            .map_err(|e| Error::connection(e.to_string()))?;
        Ok(Box::new(tls))
    }

    #[cfg(not(any(feature = "native-tls", feature = "rustls-tls")))]
    fn handshake(&self, _domain: &str, _tcp: TcpStream) -> Result<Stream> {
        Err(Error::connection("no TLS backend compiled in"))
    }
}

// Resolve the host and try every address in order, each with its own timeout.
fn open_tcp(params: &ConnectionParams) -> Result<TcpStream> {
    let addrs = (params.host.as_str(), params.port)
        .to_socket_addrs()
        .map_err(Error::connection)?;

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, params.connect_timeout) {
            Ok(tcp) => return Ok(tcp),
            Err(e) => {
                debug!("couldn't connect to {}: {}", addr, e);
                last_error = Some(e);
            }
        }
    }

    Err(match last_error {
        Some(e) => Error::connection(e),
        None => Error::connection(format!("{} did not resolve to any address", params.host)),
    })
}

impl Connect for ImapConnector {
    type Client = PendingLogin;

    fn connect(&self, params: &ConnectionParams) -> Result<PendingLogin> {
        let tcp = open_tcp(params)?;
        // the socket handle outlives the TLS wrapper so timeouts can be tightened after login
        let socket = tcp.try_clone().map_err(Error::connection)?;
        socket
            .set_read_timeout(Some(params.auth_timeout))
            .and_then(|_| socket.set_write_timeout(Some(params.auth_timeout)))
            .map_err(Error::connection)?;

        let stream = if params.use_tls {
            self.handshake(&params.host, tcp)?
        } else {
            Box::new(tcp) as Stream
        };

        let mut client = imap::Client::new(stream);
        client.debug = params.debug;
        // don't forget to wait for the IMAP protocol server greeting ;)
        client.read_greeting().map_err(Error::connection)?;

        Ok(PendingLogin { client, socket })
    }
}

/// A connected, greeted, not yet authenticated [`imap::Client`].
pub struct PendingLogin {
    client: imap::Client<Stream>,
    socket: TcpStream,
}

impl Debug for PendingLogin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingLogin")
            .field("peer", &self.socket.peer_addr().ok())
            .finish()
    }
}

impl Authenticate for PendingLogin {
    type Session = ImapSession<Stream>;

    fn authenticate(self, params: &ConnectionParams) -> Result<Self::Session> {
        let session = self
            .client
            .login(&params.user, &params.password)
            .map_err(|(e, _client)| Error::connection(e))?;

        self.socket
            .set_read_timeout(Some(params.command_timeout))
            .and_then(|_| self.socket.set_write_timeout(Some(params.command_timeout)))
            .map_err(Error::connection)?;

        let mut session = ImapSession::new(session);
        session.set_debug(params.debug);
        Ok(session)
    }
}

/// [`MailSession`] over an authenticated [`imap::Session`].
#[derive(Debug)]
pub struct ImapSession<T: Read + Write> {
    session: imap::Session<T>,
}

impl<T: Read + Write> ImapSession<T> {
    /// Wrap an already authenticated session.
    pub fn new(session: imap::Session<T>) -> Self {
        ImapSession { session }
    }

    /// Trace the protocol exchange to stderr.
    pub fn set_debug(&mut self, debug: bool) {
        self.session.debug = debug;
    }
}

// A vanished transport is a connection problem whichever command noticed it.
fn command_error(err: imap::Error) -> Error {
    match err {
        imap::Error::Io(_) | imap::Error::ConnectionLost | imap::Error::Bye(_) => {
            Error::connection(err)
        }
        other => Error::fetch(other),
    }
}

fn attribute_name(attr: &NameAttribute<'_>) -> String {
    match attr {
        NameAttribute::NoInferiors => "\\Noinferiors".to_string(),
        NameAttribute::NoSelect => "\\Noselect".to_string(),
        NameAttribute::Marked => "\\Marked".to_string(),
        NameAttribute::Unmarked => "\\Unmarked".to_string(),
        NameAttribute::Extension(name) => name.to_string(),
        other => format!("\\{:?}", other),
    }
}

impl<T: Read + Write> MailSession for ImapSession<T> {
    fn list_folders(&mut self) -> Result<Vec<ListedFolder>> {
        let names = self
            .session
            .list(Some(""), Some("*"))
            .map_err(command_error)?;
        Ok(names
            .iter()
            .map(|name| ListedFolder {
                name: name.name().to_string(),
                delimiter: name.delimiter().map(str::to_string),
                attributes: name.attributes().iter().map(attribute_name).collect(),
            })
            .collect())
    }

    fn open_folder(&mut self, name: &str, mode: AccessMode) -> Result<FolderStatus> {
        let opened = match mode {
            AccessMode::ReadOnly => self.session.examine(name),
            AccessMode::ReadWrite => self.session.select(name),
        };
        let mailbox = opened.map_err(|e| match command_error(e) {
            Error::Fetch(cause) => Error::folder(name, cause),
            other => other,
        })?;
        Ok(FolderStatus {
            exists: mailbox.exists,
            recent: mailbox.recent,
            uid_validity: mailbox.uid_validity,
        })
    }

    fn fetch(&mut self, set: &SequenceSet, section: Section) -> Result<Vec<FetchedPart>> {
        let fetches = self
            .session
            .fetch(set.to_string(), section.query())
            .map_err(command_error)?;

        let mut parts = Vec::with_capacity(fetches.len());
        for fetch in fetches.iter() {
            let data = match section {
                Section::SummaryHeaders => fetch.header().or_else(|| fetch.body()),
                Section::Full => fetch.body(),
            };
            match data {
                Some(data) => parts.push(FetchedPart {
                    seq: fetch.message,
                    data: data.to_vec(),
                }),
                // unsolicited FETCH responses, e.g. flag updates from another client
                None => debug!("ignoring FETCH response for {} without body", fetch.message),
            }
        }
        Ok(parts)
    }

    fn search(&mut self, criteria: &str) -> Result<Vec<Seq>> {
        let found = self.session.search(criteria).map_err(command_error)?;
        let mut found: Vec<Seq> = found.into_iter().collect();
        found.sort_unstable();
        Ok(found)
    }

    fn close_folder(&mut self) -> Result<()> {
        self.session.close().map_err(command_error)
    }

    fn logout(&mut self) -> Result<()> {
        self.session.logout().map_err(command_error)
    }
}
