//! # mimepost
//!
//! mimepost composes MIME email messages and sends them over SMTP.
//!
//! It is a small blocking client: no async runtime, no connection pool.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mimepost::{Message, Sender};
//!
//! let mut message = Message::new("Monthly report").with_text("See the attached file.");
//! message.set_from("alice@example.com");
//! message.set_to(["bob@example.com"]);
//! message.set_cc(["carol@example.com"]);
//! message.attach_file("report.csv")?;
//!
//! // An empty password sends over plain TCP without AUTH
//! let sender = Sender::new("alice@example.com", "secret", "smtp.example.com:465");
//! let report = sender.send(&message)?;
//!
//! for rejected in &report.rejected {
//!     println!("not delivered to {}: {}", rejected.address, rejected.error);
//! }
//! # Ok::<(), mimepost::Error>(())
//! ```
//!
//! ## Message layout
//!
//! - One body only: a single `text/plain` or `text/html` part
//! - Both bodies: `multipart/alternative` with HTML first and plain text last
//! - Attachments: everything wrapped in `multipart/mixed`, each attachment
//!   base64 encoded in lines of 76 characters
//!
//! The subject and attachment file names are always written as RFC 2047
//! encoded-words. Bcc recipients get the message but never appear in it.
//!
//! ## Transport
//!
//! - With a password: TLS from the first byte (port 465 style), then `AUTH PLAIN`
//! - Without: plain TCP, no authentication
//!
//! Both paths greet with `EHLO` (falling back to `HELO`), use the username as
//! the envelope sender and send `RCPT TO` for To, Cc and Bcc in that order.
//! A refused recipient is reported in [`SendReport`] while the others still
//! get the message, unless [`SenderConfig::require_all_recipients`] is set.
//!
//! ## Logging
//!
//! Progress goes to an [`EventSink`]. The default [`LogSink`] forwards to
//! the `log` facade; install any logger to see it.

mod error;
pub mod mail;
pub mod smtp;

pub use error::{Error, ErrorKind, Result, SmtpFailure};
pub use mail::{Address, Attachment, Message, MimeComposer};
pub use smtp::{
    EventSink, LogSink, MemorySink, NullSink, RejectedRecipient, SendEvent, SendReport, Sender,
    SenderConfig, SmtpReply, SmtpSession, SmtpState,
};
