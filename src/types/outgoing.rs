use serde::{Deserialize, Serialize};

/// An outbound message.
///
/// Addresses are RFC 5322 mailboxes: `ann@example.com` or `Ann <ann@example.com>`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Email {
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub html: String,
    /// Ignored on input: the plain-text part is always derived from `html` before sending.
    pub text: Option<String>,
}

impl Email {
    /// A message from `from` to a single recipient.
    pub fn new<F: Into<String>, T: Into<String>>(from: F, to: T) -> Self {
        Email {
            from: from.into(),
            to: vec![to.into()],
            ..Email::default()
        }
    }

    /// Set the subject. `%key%` placeholders are filled in when sending.
    pub fn subject<S: Into<String>>(mut self, subject: S) -> Self {
        self.subject = subject.into();
        self
    }

    /// Set the HTML body. The plain-text part is derived from it.
    pub fn html<S: Into<String>>(mut self, html: S) -> Self {
        self.html = html.into();
        self
    }

    /// Add a carbon-copy recipient.
    pub fn cc<S: Into<String>>(mut self, address: S) -> Self {
        self.cc.push(address.into());
        self
    }

    /// Add a blind carbon-copy recipient.
    pub fn bcc<S: Into<String>>(mut self, address: S) -> Self {
        self.bcc.push(address.into());
        self
    }

    /// Every recipient address, in `to`, `cc`, `bcc` order.
    pub fn recipients(&self) -> impl Iterator<Item = &str> {
        self.to
            .iter()
            .chain(&self.cc)
            .chain(&self.bcc)
            .map(String::as_str)
    }
}

/// What the SMTP server answered to the final command of a transmission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    /// The three-digit reply code, e.g. `250`.
    pub code: String,
    /// The reply text, one entry per line.
    pub message: Vec<String>,
}

/// The outcome of a successful send.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReport {
    pub code: String,
    pub message: Vec<String>,
    /// The subject as sent, after templating.
    pub subject: String,
    /// The HTML body as sent, after templating.
    pub html: String,
    /// The plain-text body derived from `html`.
    pub text: String,
}
