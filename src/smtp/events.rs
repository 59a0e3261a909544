//! Events reported while a message is being sent

use std::sync::Mutex;

use crate::smtp::response::SmtpReply;

/// Something that happened during a send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendEvent {
    Connecting {
        host: String,
        username: String,
        tls: bool,
    },
    Connected {
        greeting: String,
    },
    Authenticated {
        username: String,
    },
    RecipientAccepted {
        address: String,
    },
    RecipientRejected {
        address: String,
        reply: Option<SmtpReply>,
        error: String,
    },
    MessageAccepted {
        bytes: usize,
        reply: SmtpReply,
    },
    QuitFailed {
        error: String,
    },
    Closed,
}

/// Receiver for [`SendEvent`]s.
///
/// A sender hands every event to its sink; nothing is logged otherwise.
pub trait EventSink: Send + Sync {
    fn on_event(&self, event: &SendEvent);
}

/// Forwards events to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn on_event(&self, event: &SendEvent) {
        match event {
            SendEvent::Connecting {
                host,
                username,
                tls,
            } => {
                if *tls {
                    log::info!("SMTP AUTH connection to {host}");
                } else {
                    log::info!("SMTP connection to {host} with username {username}");
                }
            }
            SendEvent::Connected { greeting } => log::debug!("connected: {greeting}"),
            SendEvent::Authenticated { username } => log::debug!("authenticated as {username}"),
            SendEvent::RecipientAccepted { address } => log::debug!("recipient accepted: {address}"),
            SendEvent::RecipientRejected { address, error, .. } => {
                log::warn!("recipient {address} rejected: {error}")
            }
            SendEvent::MessageAccepted { bytes, reply } => {
                log::info!("message of {bytes} bytes accepted: {reply}")
            }
            SendEvent::QuitFailed { error } => log::warn!("QUIT failed: {error}"),
            SendEvent::Closed => log::debug!("connection closed"),
        }
    }
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn on_event(&self, _event: &SendEvent) {}
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<SendEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far
    pub fn events(&self) -> Vec<SendEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl EventSink for MemorySink {
    fn on_event(&self, event: &SendEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}

impl<F> EventSink for F
where
    F: Fn(&SendEvent) + Send + Sync,
{
    fn on_event(&self, event: &SendEvent) {
        self(event)
    }
}
