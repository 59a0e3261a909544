//! SMTP client implementation

pub mod commands;
pub mod events;
pub mod response;
pub mod sender;
pub mod session;
pub mod stream;

pub use commands::SmtpCommand;
pub use events::{EventSink, LogSink, MemorySink, NullSink, SendEvent};
pub use response::SmtpReply;
pub use sender::{RejectedRecipient, SendReport, Sender, SenderConfig};
pub use session::{Extensions, SmtpSession, SmtpState};
