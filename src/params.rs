//! Connection parameters for IMAP sessions and SMTP transports.
//!
//! Parameters are plain values handed to every operation; nothing here is persisted or shared
//! between sessions.

use std::env;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Everything needed to open one IMAP session.
///
/// All three timeouts are always applied: `connect_timeout` to each TCP connection attempt,
/// `auth_timeout` to every read and write up to and including login, and `command_timeout` to
/// every read and write after that. A stalled server therefore surfaces as an error instead of
/// hanging the caller.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    pub user: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    pub host: String,
    pub port: u16,
    /// Implicit TLS (`imaps`). Plaintext otherwise.
    #[serde(rename = "tls", default = "default_tls")]
    pub use_tls: bool,
    #[serde(with = "millis", default = "default_connect_timeout")]
    pub connect_timeout: Duration,
    #[serde(with = "millis", default = "default_auth_timeout")]
    pub auth_timeout: Duration,
    #[serde(with = "millis", default = "default_command_timeout")]
    pub command_timeout: Duration,
    /// Forwarded to the IMAP client, which then traces the protocol exchange to stderr.
    #[serde(default)]
    pub debug: bool,
}

fn default_tls() -> bool {
    true
}

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

fn default_auth_timeout() -> Duration {
    DEFAULT_AUTH_TIMEOUT
}

fn default_command_timeout() -> Duration {
    DEFAULT_COMMAND_TIMEOUT
}

impl ConnectionParams {
    /// Start building parameters for `host:port`.
    ///
    /// ```
    /// # use postbox::ConnectionParams;
    /// # use std::time::Duration;
    /// # fn main() -> Result<(), postbox::Error> {
    /// let params = ConnectionParams::builder("imap.example.com", 993)
    ///     .credentials("ann@example.com", "hunter2")
    ///     .command_timeout(Duration::from_secs(20))
    ///     .build()?;
    /// assert_eq!(params.connection_key(), "ann@example.com@imap.example.com");
    /// # Ok(())
    /// # }
    /// ```
    pub fn builder<H: Into<String>>(host: H, port: u16) -> ConnectionParamsBuilder {
        ConnectionParamsBuilder {
            params: ConnectionParams {
                user: String::new(),
                password: String::new(),
                host: host.into(),
                port,
                use_tls: true,
                connect_timeout: DEFAULT_CONNECT_TIMEOUT,
                auth_timeout: DEFAULT_AUTH_TIMEOUT,
                command_timeout: DEFAULT_COMMAND_TIMEOUT,
                debug: false,
            },
        }
    }

    /// Read parameters from `<PREFIX>_HOST`, `<PREFIX>_PORT`, `<PREFIX>_USER`,
    /// `<PREFIX>_PASSWORD`, and optionally `<PREFIX>_TLS` (`true`/`false`, default `true`) and
    /// `<PREFIX>_TIMEOUT_MS`, which sets all three timeouts.
    pub fn from_env(prefix: &str) -> Result<Self> {
        let var = |name: &str| {
            let key = format!("{}_{}", prefix, name);
            env::var(&key).map_err(|_| Error::validation(format!("{} is not set", key)))
        };

        let port = var("PORT")?
            .parse()
            .map_err(|_| Error::validation(format!("{}_PORT is not a port number", prefix)))?;
        let mut builder = ConnectionParams::builder(var("HOST")?, port);
        builder.credentials(var("USER")?, var("PASSWORD")?);
        if let Ok(tls) = var("TLS") {
            builder.tls(!matches!(tls.as_str(), "false" | "0" | "no"));
        }
        if let Ok(ms) = var("TIMEOUT_MS") {
            let ms: u64 = ms.parse().map_err(|_| {
                Error::validation(format!("{}_TIMEOUT_MS is not a number", prefix))
            })?;
            let timeout = Duration::from_millis(ms);
            builder
                .connect_timeout(timeout)
                .auth_timeout(timeout)
                .command_timeout(timeout);
        }
        builder.build()
    }

    /// The key used in tree-view identifiers: `user@host`.
    pub fn connection_key(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    /// Checks the parameters before any network traffic happens.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::validation("host must not be empty"));
        }
        if self.port == 0 {
            return Err(Error::validation("port must not be zero"));
        }
        for (name, timeout) in [
            ("connect", self.connect_timeout),
            ("auth", self.auth_timeout),
            ("command", self.command_timeout),
        ] {
            if timeout.is_zero() {
                return Err(Error::validation(format!("{} timeout must not be zero", name)));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("use_tls", &self.use_tls)
            .field("connect_timeout", &self.connect_timeout)
            .field("auth_timeout", &self.auth_timeout)
            .field("command_timeout", &self.command_timeout)
            .field("debug", &self.debug)
            .finish()
    }
}

/// A convenience builder for [`ConnectionParams`].
#[derive(Clone, Debug)]
pub struct ConnectionParamsBuilder {
    params: ConnectionParams,
}

impl ConnectionParamsBuilder {
    /// Log in as `user` with `password`.
    pub fn credentials<U: Into<String>, P: Into<String>>(
        &mut self,
        user: U,
        password: P,
    ) -> &mut Self {
        self.params.user = user.into();
        self.params.password = password.into();
        self
    }

    /// Use implicit TLS (the default) or plaintext.
    pub fn tls(&mut self, use_tls: bool) -> &mut Self {
        self.params.use_tls = use_tls;
        self
    }

    pub fn connect_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.params.connect_timeout = timeout;
        self
    }

    pub fn auth_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.params.auth_timeout = timeout;
        self
    }

    pub fn command_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.params.command_timeout = timeout;
        self
    }

    /// Trace the IMAP exchange to stderr.
    pub fn debug(&mut self, debug: bool) -> &mut Self {
        self.params.debug = debug;
        self
    }

    /// Validate and return the parameters.
    pub fn build(&self) -> Result<ConnectionParams> {
        self.params.validate()?;
        Ok(self.params.clone())
    }
}

/// How the SMTP transport secures its connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// Implicit TLS, usually port 465.
    #[default]
    Tls,
    /// Plaintext connection upgraded with `STARTTLS`, usually port 587.
    StartTls,
    /// No encryption at all. Only useful against local test servers.
    Plain,
}

/// Everything needed to open one SMTP session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpParams {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub user: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    #[serde(default)]
    pub security: SmtpSecurity,
    /// Applied to every network operation of the transport.
    #[serde(with = "millis", default = "default_command_timeout")]
    pub timeout: Duration,
}

impl SmtpParams {
    /// Parameters for `host:port` with implicit TLS and no credentials.
    pub fn new<H: Into<String>>(host: H, port: u16) -> Self {
        SmtpParams {
            host: host.into(),
            port,
            user: String::new(),
            password: String::new(),
            security: SmtpSecurity::Tls,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Authenticate as `user` with `password`.
    pub fn with_credentials<U: Into<String>, P: Into<String>>(mut self, user: U, password: P) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    pub fn with_security(mut self, security: SmtpSecurity) -> Self {
        self.security = security;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether credentials were supplied.
    pub fn has_credentials(&self) -> bool {
        !self.user.is_empty()
    }

    /// Checks the parameters before any network traffic happens.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::validation("SMTP host must not be empty"));
        }
        if self.port == 0 {
            return Err(Error::validation("SMTP port must not be zero"));
        }
        if self.timeout.is_zero() {
            return Err(Error::validation("SMTP timeout must not be zero"));
        }
        Ok(())
    }
}

impl fmt::Debug for SmtpParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("security", &self.security)
            .field("timeout", &self.timeout)
            .finish()
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let params = ConnectionParams::builder("imap.example.com", 993)
            .credentials("ann", "secret")
            .build()
            .unwrap();
        assert!(params.use_tls);
        assert_eq!(params.connect_timeout, Duration::from_secs(10));
        assert_eq!(params.auth_timeout, Duration::from_secs(5));
        assert_eq!(params.connection_key(), "ann@imap.example.com");
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        let err = ConnectionParams::builder("imap.example.com", 993)
            .command_timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn builder_rejects_empty_host() {
        assert!(ConnectionParams::builder(" ", 993).build().is_err());
        assert!(ConnectionParams::builder("imap.example.com", 0).build().is_err());
    }

    #[test]
    fn debug_hides_password() {
        let params = ConnectionParams::builder("imap.example.com", 993)
            .credentials("ann", "hunter2")
            .build()
            .unwrap();
        assert!(!format!("{:?}", params).contains("hunter2"));
        let smtp = SmtpParams::new("smtp.example.com", 465).with_credentials("ann", "hunter2");
        assert!(!format!("{:?}", smtp).contains("hunter2"));
    }

    #[test]
    fn deserialize_with_defaults() {
        let params: ConnectionParams = serde_json::from_str(
            r#"{"user":"ann","password":"pw","host":"imap.example.com","port":143,
                "tls":false,"command_timeout":2500}"#,
        )
        .unwrap();
        assert!(!params.use_tls);
        assert_eq!(params.command_timeout, Duration::from_millis(2500));
        assert_eq!(params.connect_timeout, Duration::from_secs(10));
        let json = serde_json::to_string(&params).unwrap();
        assert!(!json.contains("\"password\""));
    }

    #[test]
    fn smtp_security_from_str() {
        let params: SmtpParams =
            serde_json::from_str(r#"{"host":"smtp.example.com","port":587,"security":"starttls"}"#)
                .unwrap();
        assert_eq!(params.security, SmtpSecurity::StartTls);
        assert!(!params.has_credentials());
        assert!(params.validate().is_ok());
    }

    #[test]
    fn from_env_reads_prefixed_vars() {
        env::set_var("POSTBOX_PARAMS_TEST_HOST", "imap.example.com");
        env::set_var("POSTBOX_PARAMS_TEST_PORT", "143");
        env::set_var("POSTBOX_PARAMS_TEST_USER", "ann");
        env::set_var("POSTBOX_PARAMS_TEST_PASSWORD", "pw");
        env::set_var("POSTBOX_PARAMS_TEST_TLS", "false");
        env::set_var("POSTBOX_PARAMS_TEST_TIMEOUT_MS", "1500");
        let params = ConnectionParams::from_env("POSTBOX_PARAMS_TEST").unwrap();
        assert_eq!(params.port, 143);
        assert!(!params.use_tls);
        assert_eq!(params.auth_timeout, Duration::from_millis(1500));

        assert!(ConnectionParams::from_env("POSTBOX_PARAMS_MISSING").is_err());
    }
}
