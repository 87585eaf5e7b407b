//! Connect-do-disconnect helpers for browsing IMAP mailboxes and sending mail over SMTP.
//!
//! Every operation in this crate opens its own session, performs exactly one interaction with
//! the server, and tears the session down again before returning, on success and failure
//! alike. Nothing is pooled or cached between calls.
//!
//! The wire protocols and MIME decoding are left to other crates: [`imap`] behind
//! [`ImapConnector`], [`mail_parser`] behind [`MailParserDecoder`], and [`lettre`] behind
//! [`LettreConnector`]. Each sits behind a trait ([`Connect`], [`MimeDecoder`], [`SmtpConnect`])
//! so they can be swapped out, which is how the [`testing`] module's scripted servers work.
//!
//! # Usage
//!
//! Reading the ten most recent headers of a mailbox and the newest message in full:
//!
//! ```no_run
//! use postbox::{ConnectionParams, ImapConnector, MailClient, MailParserDecoder};
//!
//! fn main() -> postbox::Result<()> {
//!     let params = ConnectionParams::builder("imap.example.com", 993)
//!         .credentials("ann@example.com", "password")
//!         .build()?;
//!     let client = MailClient::new(ImapConnector::new(), MailParserDecoder, params);
//!
//!     let headers = client.fetch_recent_headers("INBOX", 10)?;
//!     for header in &headers {
//!         println!("{:>5} {} {:<30} {}", header.seq, header.date, header.from, header.subject);
//!     }
//!
//!     if let Some(newest) = headers.first() {
//!         let message = client.read_message("INBOX", newest.seq)?;
//!         println!("{}", message.text.unwrap_or_default());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Sending a templated message:
//!
//! ```no_run
//! use postbox::{Email, LettreConnector, Sender, SmtpParams, TemplateVars};
//!
//! fn main() -> postbox::Result<()> {
//!     let params = SmtpParams::new("smtp.example.com", 465)
//!         .with_credentials("ann@example.com", "password");
//!     let sender = Sender::new(LettreConnector::new(), params);
//!
//!     let email = Email::new("Ann <ann@example.com>", "bob@example.com")
//!         .subject("Lunch on %day%?")
//!         .html("<p>Hi %name%, lunch on %day%?</p>");
//!     let mut vars = TemplateVars::new();
//!     vars.insert("name".into(), "Bob".into());
//!     vars.insert("day".into(), "Friday".into());
//!
//!     let report = sender.send(&email, Some(&vars))?;
//!     println!("{} {:?}", report.code, report.message);
//!     Ok(())
//! }
//! ```
//!
//! # Logging
//!
//! The crate logs through the [`log`] facade: session boundaries at `debug`, lifecycle state
//! transitions at `trace`, and teardown failures that do not change an operation's outcome at
//! `warn`. Setting [`ConnectionParams::debug`] additionally makes the [`imap`] crate trace the
//! raw protocol exchange to stderr.

#![warn(rust_2018_idioms)]

mod parse;
mod utils;

pub mod client;
pub mod compose;
pub mod conn;
pub mod error;
pub mod folders;
pub mod headers;
pub mod message;
pub mod mime;
pub mod params;
pub mod sender;
pub mod session;
pub mod smtp;
pub mod types;

#[cfg(any(test, feature = "test_helpers"))]
pub mod testing;

pub use crate::client::MailClient;
pub use crate::compose::TemplateVars;
pub use crate::conn::{Authenticate, Connect, ImapConnector, MailSession};
pub use crate::error::{Error, ParseError, Result};
pub use crate::mime::{MailParserDecoder, MimeDecoder};
pub use crate::params::{ConnectionParams, SmtpParams, SmtpSecurity};
pub use crate::sender::Sender;
pub use crate::smtp::{LettreConnector, SmtpConnect, SmtpTransport};
pub use crate::types::*;

#[cfg(test)]
mod mock_stream;
