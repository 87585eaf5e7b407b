//! Errors surfaced by every mailbox and sending operation.

use std::error::Error as StdError;
use std::result;

use thiserror::Error;

use crate::types::Seq;

/// The underlying cause carried by most [`Error`] variants.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// A convenience wrapper around `Result` for `postbox::Error`.
pub type Result<T> = result::Result<T, Error>;

/// A set of errors that can occur while talking to a mail server.
///
/// Whatever the variant, the session that produced it has already been torn down by the time the
/// caller sees it.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The transport could not be established, authentication was refused, or the connection was
    /// lost while a command was in flight.
    #[error("connection failed: {0}")]
    Connection(#[source] BoxError),
    /// The requested folder does not exist or could not be opened in the requested mode.
    #[error("could not open folder {name:?}: {source}")]
    Folder {
        /// The folder that was asked for.
        name: String,
        /// Why the server refused it.
        #[source]
        source: BoxError,
    },
    /// The server rejected a LIST, SEARCH or FETCH command.
    #[error("fetch failed: {0}")]
    Fetch(#[source] BoxError),
    /// Fetched data could not be decoded.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The SMTP server or transport refused the message.
    #[error("sending failed: {0}")]
    Send(#[source] BoxError),
    /// A required input was missing or malformed. Nothing was sent over the network.
    #[error("invalid input: {0}")]
    Validation(String),
}

impl Error {
    pub(crate) fn connection<E: Into<BoxError>>(err: E) -> Self {
        Error::Connection(err.into())
    }

    pub(crate) fn folder<E: Into<BoxError>>(name: &str, err: E) -> Self {
        Error::Folder {
            name: name.to_string(),
            source: err.into(),
        }
    }

    pub(crate) fn fetch<E: Into<BoxError>>(err: E) -> Self {
        Error::Fetch(err.into())
    }

    pub(crate) fn send<E: Into<BoxError>>(err: E) -> Self {
        Error::Send(err.into())
    }

    pub(crate) fn validation<S: Into<String>>(msg: S) -> Self {
        Error::Validation(msg.into())
    }

    /// Whether this error means the transport itself is gone, as opposed to a command being
    /// refused.
    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Connection(_))
    }
}

/// Decoding failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    /// The MIME decoder could not make sense of the message with this sequence number.
    #[error("message {0} could not be decoded as MIME")]
    Mime(Seq),
    /// A header block did not follow `name: value` framing.
    #[error("malformed header block near {0:?}")]
    Header(String),
    /// A `Date` header that is not a valid RFC 2822 date.
    #[error("unrecognised date {0:?}")]
    Date(String),
    /// The HTML body could not be rendered to text.
    #[error("HTML body could not be converted to text: {0}")]
    Html(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_error_names_the_folder() {
        let err = Error::folder("Archive", "Mailbox doesn't exist");
        assert_eq!(
            err.to_string(),
            "could not open folder \"Archive\": Mailbox doesn't exist"
        );
        assert!(StdError::source(&err).is_some());
    }

    #[test]
    fn parse_error_is_transparent() {
        let err: Error = ParseError::Mime(7).into();
        assert_eq!(err.to_string(), "message 7 could not be decoded as MIME");
        assert!(!err.is_connection());
    }
}
