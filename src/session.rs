//! Scoped mailbox sessions.
//!
//! Every public operation in this crate runs inside exactly one session: connect, authenticate,
//! optionally open a folder, run the operation, then close the folder and log out. The helpers in
//! this module own that lifecycle so that no path, including early returns and panics inside the
//! operation, leaves a session open or tears one down twice.
//!
//! ```text
//! Connecting -> Authenticating -> [OpeningFolder] -> Operating -> Closing -> Closed
//!      \               \                 \                \
//!       `---------------`-----------------`----------------`------------> Failed
//! ```

use log::{debug, trace, warn};

use crate::conn::{Authenticate, Connect, MailSession, SessionOf};
use crate::error::Result;
use crate::params::ConnectionParams;
use crate::types::{AccessMode, FetchedPart, FolderStatus, Section, Seq, SequenceSet};

/// Where a session is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Establishing the transport.
    Connecting,
    /// Logging in.
    Authenticating,
    /// Opening the target folder.
    OpeningFolder,
    /// The caller's operation is running.
    Operating,
    /// Closing the folder and logging out.
    Closing,
    /// Torn down after a successful operation.
    Closed,
    /// Torn down after a failure, or never established.
    Failed,
}

// Owns an authenticated session until it has been torn down exactly once.
struct Lifecycle<S: MailSession> {
    key: String,
    state: SessionState,
    session: S,
    folder_open: bool,
    torn_down: bool,
}

impl<S: MailSession> Lifecycle<S> {
    fn advance(&mut self, next: SessionState) {
        trace!("{}: {:?} -> {:?}", self.key, self.state, next);
        self.state = next;
    }

    fn open_folder(&mut self, name: &str, mode: AccessMode) -> Result<FolderStatus> {
        self.advance(SessionState::OpeningFolder);
        let status = self.session.open_folder(name, mode)?;
        self.folder_open = true;
        debug!("{}: opened {:?} with {} messages", self.key, name, status.exists);
        Ok(status)
    }

    // Close the folder if one is open, then log out. Both steps are attempted even if the first
    // fails; the first error is the one reported.
    fn teardown(&mut self) -> Result<()> {
        if self.torn_down {
            return Ok(());
        }
        self.torn_down = true;
        self.advance(SessionState::Closing);

        let mut first_error = None;
        if self.folder_open {
            self.folder_open = false;
            if let Err(e) = self.session.close_folder() {
                first_error = Some(e);
            }
        }
        if let Err(e) = self.session.logout() {
            first_error.get_or_insert(e);
        }
        first_error.map_or(Ok(()), Err)
    }

    // Tear down and settle on the outcome the caller sees: an operation error always wins over a
    // teardown error, and a teardown error alone does not undo a successful operation.
    fn finish<T>(mut self, outcome: Result<T>) -> Result<T> {
        let closed = self.teardown();
        match (outcome, closed) {
            (Err(e), closed) => {
                if let Err(teardown) = closed {
                    debug!("{}: teardown after failure also failed: {}", self.key, teardown);
                }
                self.advance(SessionState::Failed);
                Err(e)
            }
            (Ok(value), Err(e)) => {
                warn!("{}: session did not close cleanly: {}", self.key, e);
                self.advance(SessionState::Closed);
                Ok(value)
            }
            (Ok(value), Ok(())) => {
                self.advance(SessionState::Closed);
                Ok(value)
            }
        }
    }
}

impl<S: MailSession> Drop for Lifecycle<S> {
    fn drop(&mut self) {
        // only reached without `finish` when the operation panicked
        if !self.torn_down {
            if let Err(e) = self.teardown() {
                warn!("{}: teardown during unwind failed: {}", self.key, e);
            }
            self.advance(SessionState::Failed);
        }
    }
}

fn establish<C: Connect>(
    connector: &C,
    params: &ConnectionParams,
) -> Result<Lifecycle<SessionOf<C>>> {
    params.validate()?;
    let key = params.connection_key();

    trace!("{}: {:?}", key, SessionState::Connecting);
    let client = connector.connect(params).map_err(|e| {
        debug!("{}: {:?}: {}", key, SessionState::Failed, e);
        e
    })?;

    trace!("{}: {:?} -> {:?}", key, SessionState::Connecting, SessionState::Authenticating);
    let session = client.authenticate(params).map_err(|e| {
        debug!("{}: {:?}: {}", key, SessionState::Failed, e);
        e
    })?;

    Ok(Lifecycle {
        key,
        state: SessionState::Authenticating,
        session,
        folder_open: false,
        torn_down: false,
    })
}

/// Run `operation` against an authenticated session with no folder open.
///
/// The session is logged out before this returns, whatever the outcome.
pub fn with_account<C, T, F>(connector: &C, params: &ConnectionParams, operation: F) -> Result<T>
where
    C: Connect,
    F: FnOnce(&mut SessionOf<C>) -> Result<T>,
{
    let mut lifecycle = establish(connector, params)?;
    lifecycle.advance(SessionState::Operating);
    let outcome = operation(&mut lifecycle.session);
    lifecycle.finish(outcome)
}

/// Run `operation` against `folder`, opened in `mode`.
///
/// The folder is closed and the session logged out before this returns, whatever the outcome.
/// If the folder cannot be opened, the operation is never run and the error is
/// [`Error::Folder`](crate::Error::Folder) (or [`Error::Connection`](crate::Error::Connection) if
/// the transport went away).
pub fn with_folder<C, T, F>(
    connector: &C,
    params: &ConnectionParams,
    folder: &str,
    mode: AccessMode,
    operation: F,
) -> Result<T>
where
    C: Connect,
    F: FnOnce(&mut OpenFolder<'_, SessionOf<C>>) -> Result<T>,
{
    let mut lifecycle = establish(connector, params)?;
    let status = match lifecycle.open_folder(folder, mode) {
        Ok(status) => status,
        Err(e) => return lifecycle.finish(Err(e)),
    };

    lifecycle.advance(SessionState::Operating);
    let outcome = operation(&mut OpenFolder {
        session: &mut lifecycle.session,
        name: folder,
        status,
    });
    lifecycle.finish(outcome)
}

/// A folder opened by [`with_folder`], valid for the duration of the operation.
#[derive(Debug)]
pub struct OpenFolder<'a, S> {
    session: &'a mut S,
    name: &'a str,
    status: FolderStatus,
}

impl<'a, S: MailSession> OpenFolder<'a, S> {
    /// The folder's name.
    pub fn name(&self) -> &str {
        self.name
    }

    /// What the server reported when the folder was opened.
    pub fn status(&self) -> &FolderStatus {
        &self.status
    }

    /// Number of messages in the folder.
    pub fn exists(&self) -> u32 {
        self.status.exists
    }

    /// Fetch `section` of every message in `set`.
    pub fn fetch(&mut self, set: &SequenceSet, section: Section) -> Result<Vec<FetchedPart>> {
        self.session.fetch(set, section)
    }

    /// Run a `SEARCH` with pre-formatted criteria.
    pub fn search(&mut self, criteria: &str) -> Result<Vec<Seq>> {
        self.session.search(criteria)
    }
}
