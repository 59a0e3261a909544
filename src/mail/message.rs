//! Email message data structures

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::mail::address::Address;
use crate::mail::composer::MimeComposer;

/// A file carried by a message. The media type is worked out when composing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub content: Vec<u8>,
}

/// An email message to be composed and sent
#[derive(Debug, Clone, Default)]
pub struct Message {
    from: Address,
    to: Vec<Address>,
    cc: Vec<Address>,
    bcc: Vec<Address>,
    subject: String,
    body_text: Option<String>,
    body_html: Option<String>,
    attachments: Vec<Attachment>,
}

impl Message {
    /// Create a message with a subject and no body
    pub fn new(subject: &str) -> Self {
        Self {
            subject: subject.to_owned(),
            ..Self::default()
        }
    }

    /// Set the plain text body
    pub fn with_text(mut self, text: &str) -> Self {
        self.body_text = Some(text.to_owned());
        self
    }

    /// Set the HTML body
    pub fn with_html(mut self, html: &str) -> Self {
        self.body_html = Some(html.to_owned());
        self
    }

    pub fn set_from(&mut self, from: &str) {
        self.from = Address::parse(from);
    }

    /// Replace the To list
    pub fn set_to<I, S>(&mut self, to: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.to = parse_all(to);
    }

    /// Replace the Cc list
    pub fn set_cc<I, S>(&mut self, cc: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.cc = parse_all(cc);
    }

    /// Replace the Bcc list
    pub fn set_bcc<I, S>(&mut self, bcc: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.bcc = parse_all(bcc);
    }

    /// Read a whole file and attach it under its base name.
    ///
    /// Nothing is attached unless the file was read completely.
    pub fn attach_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = fs::read(path).map_err(|source| Error::AttachmentRead {
            path: path.to_path_buf(),
            source,
        })?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.attach(&name, content);
        Ok(())
    }

    /// Attach in-memory content. An existing attachment with the same name
    /// gets replaced where it stands.
    pub fn attach(&mut self, name: &str, content: Vec<u8>) {
        match self.attachments.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.content = content,
            None => self.attachments.push(Attachment {
                name: name.to_owned(),
                content,
            }),
        }
    }

    pub fn from(&self) -> &Address {
        &self.from
    }

    pub fn to(&self) -> &[Address] {
        &self.to
    }

    pub fn cc(&self) -> &[Address] {
        &self.cc
    }

    pub fn bcc(&self) -> &[Address] {
        &self.bcc
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn body_text(&self) -> Option<&str> {
        self.body_text.as_deref()
    }

    pub fn body_html(&self) -> Option<&str> {
        self.body_html.as_deref()
    }

    /// Attachments in the order they were added
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Every address RCPT TO goes to: To, then Cc, then Bcc
    pub fn envelope_recipients(&self) -> impl Iterator<Item = &Address> {
        self.to.iter().chain(&self.cc).chain(&self.bcc)
    }

    /// Compose the message into the bytes sent after DATA
    pub fn to_bytes(&self) -> Vec<u8> {
        MimeComposer::new().compose(self)
    }
}

fn parse_all<I, S>(addresses: I) -> Vec<Address>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    addresses
        .into_iter()
        .map(|a| Address::parse(a.as_ref()))
        .collect()
}
