//! Error types for composing and sending mail

use std::path::PathBuf;

use thiserror::Error;

use crate::smtp::response::SmtpReply;

/// Low-level cause of a failed SMTP exchange
#[derive(Error, Debug)]
pub enum SmtpFailure {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("server replied {0}")]
    Reply(SmtpReply),

    #[error("malformed reply line: {0:?}")]
    MalformedReply(String),

    #[error("server does not support {0}")]
    Unsupported(&'static str),

    /// Nothing was sent; the argument would have split the command line
    #[error("line break in command argument: {0:?}")]
    LineBreak(String),
}

impl SmtpFailure {
    /// The reply code sent by the server, if the failure came from a reply
    pub fn reply_code(&self) -> Option<u16> {
        match self {
            SmtpFailure::Reply(reply) => Some(reply.code),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("connection to {host} failed: {source}")]
    Connection {
        host: String,
        #[source]
        source: SmtpFailure,
    },

    #[error("authentication rejected: {0}")]
    Auth(#[source] SmtpFailure),

    #[error("MAIL FROM rejected: {0}")]
    Envelope(#[source] SmtpFailure),

    #[error("RCPT TO <{address}> rejected: {source}")]
    Recipient {
        address: String,
        #[source]
        source: SmtpFailure,
    },

    #[error("message transmission failed: {0}")]
    Transmission(#[source] SmtpFailure),

    #[error("cannot read attachment {}: {source}", path.display())]
    AttachmentRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Broad category of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    Auth,
    Envelope,
    Recipient,
    Transmission,
    AttachmentRead,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Connection { .. } => ErrorKind::Connection,
            Error::Auth(_) => ErrorKind::Auth,
            Error::Envelope(_) => ErrorKind::Envelope,
            Error::Recipient { .. } => ErrorKind::Recipient,
            Error::Transmission(_) => ErrorKind::Transmission,
            Error::AttachmentRead { .. } => ErrorKind::AttachmentRead,
        }
    }

    /// Reply code of the server response that caused this error, if any
    pub fn reply_code(&self) -> Option<u16> {
        match self {
            Error::Connection { source, .. }
            | Error::Recipient { source, .. }
            | Error::Auth(source)
            | Error::Envelope(source)
            | Error::Transmission(source) => source.reply_code(),
            Error::AttachmentRead { .. } => None,
        }
    }

    /// Whether the server reported a transient (4xx) condition
    pub fn is_transient(&self) -> bool {
        self.reply_code().is_some_and(|code| (400..500).contains(&code))
    }
}
