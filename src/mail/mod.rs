//! Message model and MIME composition

pub mod address;
pub mod composer;
pub mod content_type;
pub mod encoding;
pub mod message;

pub use address::Address;
pub use composer::MimeComposer;
pub use message::{Attachment, Message};
