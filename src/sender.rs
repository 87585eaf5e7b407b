//! Sending mail over SMTP.

use log::{debug, warn};

use crate::compose::{html_to_text, render_template, TemplateVars};
use crate::error::{Error, Result};
use crate::params::SmtpParams;
use crate::smtp::{mailbox, SmtpConnect, SmtpTransport};
use crate::types::{Email, SendReport};

/// Sends messages through one SMTP relay.
///
/// Every call opens its own transport and closes it again before returning.
#[derive(Clone, Debug)]
pub struct Sender<C> {
    connector: C,
    params: SmtpParams,
}

/// Check everything that can be checked without a network round trip.
pub fn validate(params: &SmtpParams, email: &Email) -> Result<()> {
    params.validate()?;
    if email.from.trim().is_empty() {
        return Err(Error::validation("a sender address is required"));
    }
    mailbox(&email.from)?;
    if email.recipients().all(|r| r.trim().is_empty()) {
        return Err(Error::validation("at least one recipient is required"));
    }
    for recipient in email.recipients() {
        mailbox(recipient)?;
    }
    Ok(())
}

/// Apply `vars` to the subject and HTML body and derive the plain-text body.
pub fn prepare(email: &Email, vars: Option<&TemplateVars>) -> Result<Email> {
    let (subject, html) = match vars {
        Some(vars) => (
            render_template(&email.subject, vars),
            render_template(&email.html, vars),
        ),
        None => (email.subject.clone(), email.html.clone()),
    };
    let text = html_to_text(&html)?;
    Ok(Email {
        subject,
        html,
        text: Some(text),
        ..email.clone()
    })
}

impl<C: SmtpConnect> Sender<C> {
    /// A sender that opens a transport through `connector` for every call.
    pub fn new(connector: C, params: SmtpParams) -> Self {
        Sender { connector, params }
    }

    /// The relay settings every call uses.
    pub fn params(&self) -> &SmtpParams {
        &self.params
    }

    /// Open a transport, check that the relay accepts it, and close it.
    pub fn verify(&self) -> Result<()> {
        self.params.validate()?;
        let mut transport = self.connector.open(&self.params)?;
        let outcome = transport.verify();
        finish(transport, outcome, &self.params.host)
    }

    /// Send `email`, substituting `vars` into its subject and HTML body first.
    ///
    /// Nothing is opened unless the message passes [`validate`]. Any text body on `email` is
    /// replaced by one derived from the (substituted) HTML.
    pub fn send(&self, email: &Email, vars: Option<&TemplateVars>) -> Result<SendReport> {
        validate(&self.params, email)?;
        let prepared = prepare(email, vars)?;

        let mut transport = self.connector.open(&self.params)?;
        debug!("sending {:?} via {}", prepared.subject, self.params.host);
        let outcome = transport.transmit(&prepared);
        let delivery = finish(transport, outcome, &self.params.host)?;

        Ok(SendReport {
            code: delivery.code,
            message: delivery.message,
            subject: prepared.subject,
            html: prepared.html,
            text: prepared.text.unwrap_or_default(),
        })
    }
}

// Close the transport whatever the outcome; a close failure only matters if nothing else did.
fn finish<T: SmtpTransport, R>(transport: T, outcome: Result<R>, host: &str) -> Result<R> {
    let closed = transport.close();
    match (outcome, closed) {
        (Err(e), _) => Err(e),
        (Ok(value), Err(e)) => {
            warn!("{}: SMTP transport did not close cleanly: {}", host, e);
            Ok(value)
        }
        (Ok(value), Ok(())) => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedSmtp, SmtpCall, SmtpFault};

    fn sender(relay: &ScriptedSmtp) -> Sender<ScriptedSmtp> {
        Sender::new(relay.clone(), SmtpParams::new("smtp.example.com", 465))
    }

    fn email() -> Email {
        Email::new("Ann <ann@example.com>", "bob@example.com")
            .subject("Hello %name%")
            .html("<b>Hi</b> %name%")
    }

    #[test]
    fn sends_templated_message() {
        let relay = ScriptedSmtp::new();
        let vars: TemplateVars = [("name".to_string(), "Bob".to_string())].into_iter().collect();
        let report = sender(&relay).send(&email(), Some(&vars)).unwrap();
        assert_eq!(report.code, "250");
        assert_eq!(report.subject, "Hello Bob");
        assert_eq!(report.html, "<b>Hi</b> Bob");
        assert_eq!(report.text, "Hi Bob");
        assert_eq!(relay.sent()[0].text.as_deref(), Some("Hi Bob"));
        assert_eq!(relay.calls().last(), Some(&SmtpCall::Close));
    }

    #[test]
    fn supplied_text_is_replaced() {
        let relay = ScriptedSmtp::new();
        let mut email = Email::new("ann@example.com", "bob@example.com").html("<b>Hi</b>");
        email.text = Some("something else".into());
        let report = sender(&relay).send(&email, None).unwrap();
        assert_eq!(report.text, "Hi");
    }

    #[test]
    fn invalid_message_never_opens_transport() {
        let relay = ScriptedSmtp::new();
        let mut no_recipients = email();
        no_recipients.to.clear();
        assert!(matches!(
            sender(&relay).send(&no_recipients, None),
            Err(Error::Validation(_))
        ));

        let bad_from = Email::new("", "bob@example.com");
        assert!(matches!(
            sender(&relay).send(&bad_from, None),
            Err(Error::Validation(_))
        ));

        let bad_cc = email().cc("not an address");
        assert!(matches!(
            sender(&relay).send(&bad_cc, None),
            Err(Error::Validation(_))
        ));

        assert!(relay.calls().is_empty());
    }

    #[test]
    fn rejection_still_closes() {
        let relay = ScriptedSmtp::new().fail_on(SmtpFault::Transmit);
        let err = sender(&relay).send(&email(), None).unwrap_err();
        assert!(matches!(err, Error::Send(_)));
        assert_eq!(relay.calls().last(), Some(&SmtpCall::Close));
    }

    #[test]
    fn close_failure_after_success_is_ignored() {
        let relay = ScriptedSmtp::new().fail_on(SmtpFault::Close);
        assert!(sender(&relay).send(&email(), None).is_ok());
    }

    #[test]
    fn verify_round_trip() {
        let relay = ScriptedSmtp::new();
        sender(&relay).verify().unwrap();
        assert_eq!(
            relay.calls(),
            vec![SmtpCall::Open, SmtpCall::Verify, SmtpCall::Close]
        );

        let failing = ScriptedSmtp::new().fail_on(SmtpFault::Verify);
        assert!(sender(&failing).verify().is_err());
        assert_eq!(failing.calls().last(), Some(&SmtpCall::Close));
    }
}
