//! Delivery of composed messages to a mail server

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result, SmtpFailure};
use crate::mail::Message;
use crate::smtp::events::{EventSink, LogSink, SendEvent};
use crate::smtp::response::SmtpReply;
use crate::smtp::session::SmtpSession;
use crate::smtp::stream::{self, MailStream};

/// Settings for a [`Sender`]
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Envelope sender, also the AUTH identity
    pub username: String,
    /// Empty means the anonymous (plain TCP, no AUTH) path
    pub password: String,
    /// `host:port` of the server
    pub host: String,
    /// Skip certificate verification on the TLS path
    pub accept_invalid_certs: bool,
    /// Name announced in EHLO/HELO
    pub hello_name: String,
    /// Applied to connect, reads and writes. `None` waits forever.
    pub timeout: Option<Duration>,
    /// Abort the send on the first rejected recipient
    pub require_all_recipients: bool,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            host: "localhost:25".to_owned(),
            accept_invalid_certs: false,
            hello_name: "localhost".to_owned(),
            timeout: None,
            require_all_recipients: false,
        }
    }
}

impl SenderConfig {
    pub fn new(username: &str, password: &str, host: &str) -> Self {
        Self {
            username: username.to_owned(),
            password: password.to_owned(),
            host: host.to_owned(),
            ..Self::default()
        }
    }

    pub fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    pub fn with_hello_name(mut self, name: &str) -> Self {
        self.hello_name = name.to_owned();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_require_all_recipients(mut self, require: bool) -> Self {
        self.require_all_recipients = require;
        self
    }
}

/// A recipient the server refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRecipient {
    pub address: String,
    /// The refusal, when the server sent one
    pub reply: Option<SmtpReply>,
    pub error: String,
}

/// Outcome of a successful send
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendReport {
    pub accepted: Vec<String>,
    pub rejected: Vec<RejectedRecipient>,
    /// Final reply to the message data
    pub reply: Option<SmtpReply>,
}

impl SendReport {
    /// True when every recipient was accepted
    pub fn is_complete(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Sends [`Message`]s over SMTP.
///
/// Every call to [`Sender::send`] opens its own connection and closes it
/// before returning; a `Sender` can be shared between threads.
#[derive(Clone)]
pub struct Sender {
    config: SenderConfig,
    events: Arc<dyn EventSink>,
}

impl Sender {
    pub fn new(username: &str, password: &str, host: &str) -> Self {
        Self::from_config(SenderConfig::new(username, password, host))
    }

    pub fn from_config(config: SenderConfig) -> Self {
        Self {
            config,
            events: Arc::new(LogSink),
        }
    }

    /// Replace the default `log` based event sink
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    pub fn config(&self) -> &SenderConfig {
        &self.config
    }

    /// Whether sends go through TLS with AUTH PLAIN
    pub fn is_authenticated(&self) -> bool {
        !self.config.password.is_empty()
    }

    /// Send through the path matching the configuration
    pub fn send(&self, message: &Message) -> Result<SendReport> {
        if self.is_authenticated() {
            self.send_authenticated(message)
        } else {
            self.send_anonymous(message)
        }
    }

    /// Plain TCP, no AUTH
    pub fn send_anonymous(&self, message: &Message) -> Result<SendReport> {
        self.emit(SendEvent::Connecting {
            host: self.config.host.clone(),
            username: self.config.username.clone(),
            tls: false,
        });

        let stream = MailStream::connect_plain(&self.config.host, self.config.timeout)
            .map_err(|e| self.connection_error(e.into()))?;
        let mut conn = Connection::new(stream, self.events.as_ref());
        conn.open(&self.config)?;
        conn.deliver(&self.config, message)
    }

    /// TLS from the first byte, then AUTH PLAIN
    pub fn send_authenticated(&self, message: &Message) -> Result<SendReport> {
        self.emit(SendEvent::Connecting {
            host: self.config.host.clone(),
            username: self.config.username.clone(),
            tls: true,
        });

        let server_name = stream::server_name(&self.config.host);
        let stream = MailStream::connect_tls(
            &self.config.host,
            server_name,
            self.config.accept_invalid_certs,
            self.config.timeout,
        )
        .map_err(|e| self.connection_error(e.into()))?;

        let mut conn = Connection::new(stream, self.events.as_ref());
        conn.open(&self.config)?;
        conn.session
            .auth_plain(&self.config.username, &self.config.password)
            .map_err(Error::Auth)?;
        self.emit(SendEvent::Authenticated {
            username: self.config.username.clone(),
        });
        conn.deliver(&self.config, message)
    }

    fn emit(&self, event: SendEvent) {
        self.events.on_event(&event);
    }

    fn connection_error(&self, source: SmtpFailure) -> Error {
        Error::Connection {
            host: self.config.host.clone(),
            source,
        }
    }
}

/// An open session that is shut down when dropped, whichever step failed
struct Connection<'a> {
    session: SmtpSession<MailStream>,
    events: &'a dyn EventSink,
}

impl<'a> Connection<'a> {
    fn new(stream: MailStream, events: &'a dyn EventSink) -> Self {
        Self {
            session: SmtpSession::new(stream),
            events,
        }
    }

    fn open(&mut self, config: &SenderConfig) -> Result<()> {
        let greeting = self
            .session
            .open(&config.hello_name)
            .map_err(|source| Error::Connection {
                host: config.host.clone(),
                source,
            })?;
        self.events.on_event(&SendEvent::Connected {
            greeting: greeting.to_string(),
        });
        Ok(())
    }

    /// MAIL FROM, every RCPT TO, DATA, QUIT
    fn deliver(&mut self, config: &SenderConfig, message: &Message) -> Result<SendReport> {
        self.session
            .mail(&config.username)
            .map_err(Error::Envelope)?;

        let mut report = SendReport::default();
        for address in message.envelope_recipients() {
            let email = address.email().to_owned();
            match self.session.rcpt(&email) {
                Ok(_) => {
                    self.events.on_event(&SendEvent::RecipientAccepted {
                        address: email.clone(),
                    });
                    report.accepted.push(email);
                }
                // The conversation is out of step, nothing more can be sent on it
                Err(failure @ (SmtpFailure::Io(_) | SmtpFailure::MalformedReply(_))) => {
                    return Err(Error::Transmission(failure));
                }
                Err(failure) if config.require_all_recipients => {
                    return Err(Error::Recipient {
                        address: email,
                        source: failure,
                    });
                }
                // A refusal, or an address that never left the client
                Err(failure) => {
                    let reply = match &failure {
                        SmtpFailure::Reply(reply) => Some(reply.clone()),
                        _ => None,
                    };
                    let rejected = RejectedRecipient {
                        address: email,
                        reply,
                        error: failure.to_string(),
                    };
                    self.events.on_event(&SendEvent::RecipientRejected {
                        address: rejected.address.clone(),
                        reply: rejected.reply.clone(),
                        error: rejected.error.clone(),
                    });
                    report.rejected.push(rejected);
                }
            }
        }
        self.session.recipients_done();

        let bytes = message.to_bytes();
        let reply = self.session.data(&bytes).map_err(Error::Transmission)?;
        self.events.on_event(&SendEvent::MessageAccepted {
            bytes: bytes.len(),
            reply: reply.clone(),
        });
        report.reply = Some(reply);

        // The message is already queued, a failed QUIT changes nothing about that
        if let Err(e) = self.session.quit() {
            self.events.on_event(&SendEvent::QuitFailed {
                error: e.to_string(),
            });
        }

        Ok(report)
    }
}

impl Drop for Connection<'_> {
    fn drop(&mut self) {
        self.session.get_mut().shutdown();
        self.events.on_event(&SendEvent::Closed);
    }
}
