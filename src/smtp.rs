//! The SMTP capability used by [`Sender`](crate::Sender), and its [`lettre`] implementation.

use std::fmt::{self, Debug, Formatter};

use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{Message, SmtpTransport as LettreSmtp, Transport};

use crate::error::{Error, Result};
use crate::params::{SmtpParams, SmtpSecurity};
use crate::types::{Delivery, Email};

/// Opens an SMTP transport.
pub trait SmtpConnect {
    /// An open transport.
    type Transport: SmtpTransport;

    /// Prepare a transport for `params`. Failures are [`Error::Send`].
    fn open(&self, params: &SmtpParams) -> Result<Self::Transport>;
}

/// An open SMTP transport. Every method reports failures as [`Error::Send`].
pub trait SmtpTransport {
    /// Check that the server accepts a connection (and the credentials, if any).
    fn verify(&mut self) -> Result<()>;

    /// Transmit a fully prepared message.
    fn transmit(&mut self, email: &Email) -> Result<Delivery>;

    /// Shut the transport down.
    fn close(self) -> Result<()>;
}

/// [`SmtpConnect`] over [`lettre::SmtpTransport`].
#[derive(Clone, Debug, Default)]
pub struct LettreConnector {
    accept_invalid_certs: bool,
}

impl LettreConnector {
    /// A connector that verifies the relay's certificate.
    pub fn new() -> Self {
        LettreConnector::default()
    }

    /// Accept invalid certificates and host names. Only for test servers.
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    fn tls_parameters(&self, host: &str) -> Result<TlsParameters> {
        TlsParameters::builder(host.to_string())
            .dangerous_accept_invalid_certs(self.accept_invalid_certs)
            .dangerous_accept_invalid_hostnames(self.accept_invalid_certs)
            .build()
            .map_err(Error::send)
    }
}

impl SmtpConnect for LettreConnector {
    type Transport = LettreTransport;

    fn open(&self, params: &SmtpParams) -> Result<LettreTransport> {
        let builder = LettreSmtp::builder_dangerous(params.host.as_str())
            .port(params.port)
            .timeout(Some(params.timeout));
        let builder = match params.security {
            SmtpSecurity::Tls => builder.tls(Tls::Wrapper(self.tls_parameters(&params.host)?)),
            SmtpSecurity::StartTls => {
                builder.tls(Tls::Required(self.tls_parameters(&params.host)?))
            }
            SmtpSecurity::Plain => builder.tls(Tls::None),
        };
        let builder = if params.has_credentials() {
            builder.credentials(Credentials::new(
                params.user.clone(),
                params.password.clone(),
            ))
        } else {
            builder
        };
        Ok(LettreTransport {
            transport: builder.build(),
        })
    }
}

/// A [`lettre::SmtpTransport`] without pooling: every transmission uses its own SMTP connection.
pub struct LettreTransport {
    transport: LettreSmtp,
}

impl Debug for LettreTransport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("LettreTransport").finish_non_exhaustive()
    }
}

pub(crate) fn mailbox(address: &str) -> Result<Mailbox> {
    address
        .trim()
        .parse()
        .map_err(|e| Error::validation(format!("invalid address {:?}: {}", address, e)))
}

fn build_message(email: &Email) -> Result<Message> {
    let mut builder = Message::builder()
        .from(mailbox(&email.from)?)
        .subject(email.subject.as_str());
    for to in &email.to {
        builder = builder.to(mailbox(to)?);
    }
    for cc in &email.cc {
        builder = builder.cc(mailbox(cc)?);
    }
    for bcc in &email.bcc {
        builder = builder.bcc(mailbox(bcc)?);
    }
    let text = email.text.clone().unwrap_or_default();
    builder
        .multipart(MultiPart::alternative_plain_html(text, email.html.clone()))
        .map_err(Error::send)
}

impl SmtpTransport for LettreTransport {
    fn verify(&mut self) -> Result<()> {
        if self.transport.test_connection().map_err(Error::send)? {
            Ok(())
        } else {
            Err(Error::send("server did not accept the connection"))
        }
    }

    fn transmit(&mut self, email: &Email) -> Result<Delivery> {
        let message = build_message(email)?;
        let response = self.transport.send(&message).map_err(Error::send)?;
        Ok(Delivery {
            code: response.code().to_string(),
            message: response.message().map(|line| line.to_string()).collect(),
        })
    }

    fn close(self) -> Result<()> {
        // the unpooled transport has already said QUIT after the last transaction
        drop(self.transport);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mailbox_forms() {
        assert_eq!(
            mailbox("Ann <ann@example.com>").unwrap().email.to_string(),
            "ann@example.com"
        );
        assert!(mailbox("  bob@example.com ").is_ok());
        assert!(matches!(mailbox("not an address"), Err(Error::Validation(_))));
    }

    #[test]
    fn message_has_both_alternatives() {
        let mut email = Email::new("ann@example.com", "bob@example.com")
            .subject("Hello")
            .html("<p>Hi Bob</p>")
            .bcc("carol@example.com");
        email.text = Some("Hi Bob".into());
        let formatted = String::from_utf8(build_message(&email).unwrap().formatted()).unwrap();
        assert!(formatted.contains("Subject: Hello"));
        assert!(formatted.contains("multipart/alternative"));
        assert!(formatted.contains("text/plain"));
        assert!(formatted.contains("text/html"));
        assert!(!formatted.contains("carol@example.com"));
    }

    #[test]
    fn plain_transport_builds_without_network() {
        let params = SmtpParams::new("localhost", 2525).with_security(SmtpSecurity::Plain);
        assert!(LettreConnector::new().open(&params).is_ok());
    }
}
