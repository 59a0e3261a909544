//! Client side SMTP session state machine

use std::io::{self, BufRead, BufReader, Read, Write};

use crate::error::SmtpFailure;
use crate::smtp::commands::{SmtpCommand, plain_credentials};
use crate::smtp::response::SmtpReply;

/// Where a client session currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpState {
    /// No socket yet, or the greeting has not been read
    Disconnected,
    /// Greeting and EHLO/HELO done
    Connected,
    /// AUTH accepted
    Authenticated,
    /// MAIL FROM accepted
    SenderSet,
    /// RCPT TO issued for every recipient
    RecipientsAccepted,
    /// DATA accepted with 354, message bytes are being written
    DataOpen,
    /// Final reply for the message received
    Sent,
    /// QUIT sent or socket dropped
    Closed,
}

/// Extensions advertised in the EHLO reply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extensions {
    keywords: Vec<String>,
}

impl Extensions {
    fn from_ehlo(reply: &SmtpReply) -> Self {
        // First line is the server greeting, the rest are keywords
        let keywords = reply
            .lines
            .iter()
            .skip(1)
            .map(|line| line.trim().to_ascii_uppercase())
            .collect();
        Self { keywords }
    }

    /// Whether `keyword` (e.g. `AUTH`, `8BITMIME`) was advertised
    pub fn supports(&self, keyword: &str) -> bool {
        self.params(keyword).is_some()
    }

    /// Parameters following `keyword`
    pub fn params(&self, keyword: &str) -> Option<&str> {
        let keyword = keyword.to_ascii_uppercase();
        self.keywords.iter().find_map(|line| {
            let mut parts = line.splitn(2, ' ');
            let name = parts.next()?;
            (name == keyword).then(|| parts.next().unwrap_or(""))
        })
    }

    /// Whether `mechanism` appears among the AUTH parameters
    pub fn supports_auth(&self, mechanism: &str) -> bool {
        self.params("AUTH")
            .is_some_and(|params| params.split_whitespace().any(|m| m == mechanism))
    }
}

/// One client conversation with a mail server over `S`
pub struct SmtpSession<S: Read + Write> {
    stream: BufReader<S>,
    state: SmtpState,
    extensions: Option<Extensions>,
}

impl<S: Read + Write> SmtpSession<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufReader::new(stream),
            state: SmtpState::Disconnected,
            extensions: None,
        }
    }

    pub fn state(&self) -> SmtpState {
        self.state
    }

    /// Extensions from EHLO; `None` after a HELO fallback
    pub fn extensions(&self) -> Option<&Extensions> {
        self.extensions.as_ref()
    }

    pub fn get_ref(&self) -> &S {
        self.stream.get_ref()
    }

    pub fn get_mut(&mut self) -> &mut S {
        self.stream.get_mut()
    }

    /// Read the 220 greeting, then introduce ourselves with EHLO (HELO as fallback)
    pub fn open(&mut self, hello_name: &str) -> Result<SmtpReply, SmtpFailure> {
        let greeting = self.read_reply()?.expect(220)?;

        let ehlo = self.command(&SmtpCommand::Ehlo(hello_name))?;
        if ehlo.is_positive() {
            self.extensions = Some(Extensions::from_ehlo(&ehlo));
        } else {
            self.command(&SmtpCommand::Helo(hello_name))?.expect(250)?;
            self.extensions = None;
        }

        self.state = SmtpState::Connected;
        Ok(greeting)
    }

    /// `AUTH PLAIN` with an initial response
    pub fn auth_plain(&mut self, username: &str, password: &str) -> Result<(), SmtpFailure> {
        let supported = self
            .extensions
            .as_ref()
            .is_some_and(|ext| ext.supports_auth("PLAIN"));
        if !supported {
            return Err(SmtpFailure::Unsupported("AUTH PLAIN"));
        }

        let credentials = plain_credentials(username, password);
        let mut reply = self.command(&SmtpCommand::AuthPlain(credentials.clone()))?;
        if reply.is_intermediate() {
            reply = self.command(&SmtpCommand::AuthResponse(credentials))?;
        }
        reply.expect(235)?;

        self.state = SmtpState::Authenticated;
        Ok(())
    }

    pub fn mail(&mut self, from: &str) -> Result<SmtpReply, SmtpFailure> {
        check_argument(from)?;
        let eight_bit = self
            .extensions
            .as_ref()
            .is_some_and(|ext| ext.supports("8BITMIME"));
        let reply = self
            .command(&SmtpCommand::Mail { from, eight_bit })?
            .expect(250)?;
        self.state = SmtpState::SenderSet;
        Ok(reply)
    }

    /// One RCPT TO. A rejection leaves the session usable for more recipients.
    pub fn rcpt(&mut self, to: &str) -> Result<SmtpReply, SmtpFailure> {
        check_argument(to)?;
        let reply = self.command(&SmtpCommand::Rcpt(to))?;
        if !reply.is_positive() {
            return Err(SmtpFailure::Reply(reply));
        }
        Ok(reply)
    }

    /// Called once every recipient has been tried
    pub fn recipients_done(&mut self) {
        self.state = SmtpState::RecipientsAccepted;
    }

    /// DATA, the message itself, and the final dot; returns the server's verdict
    pub fn data(&mut self, message: &[u8]) -> Result<SmtpReply, SmtpFailure> {
        self.command(&SmtpCommand::Data)?.expect(354)?;
        self.state = SmtpState::DataOpen;

        let mut writer = DotStuffer::new(self.stream.get_mut());
        writer.write_all(message)?;
        writer.finish()?;
        self.stream.get_mut().flush()?;

        let reply = self.read_reply()?.expect(250)?;
        self.state = SmtpState::Sent;
        Ok(reply)
    }

    pub fn quit(&mut self) -> Result<SmtpReply, SmtpFailure> {
        self.state = SmtpState::Closed;
        self.command(&SmtpCommand::Quit)?.expect(221)
    }

    /// Send a command line and read the reply
    pub fn command(&mut self, command: &SmtpCommand<'_>) -> Result<SmtpReply, SmtpFailure> {
        let stream = self.stream.get_mut();
        stream.write_all(command.to_line().as_bytes())?;
        stream.flush()?;
        self.read_reply()
    }

    /// Read a full, possibly multiline, reply
    pub fn read_reply(&mut self) -> Result<SmtpReply, SmtpFailure> {
        let mut lines = Vec::new();
        let mut buffer = Vec::new();

        loop {
            buffer.clear();
            if self.stream.read_until(b'\n', &mut buffer)? == 0 {
                return Err(SmtpFailure::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by server",
                )));
            }

            let line = String::from_utf8_lossy(&buffer);
            let (code, last, text) = SmtpReply::parse_line(&line)?;
            lines.push(text.to_owned());

            if last {
                return Ok(SmtpReply::new_multiline(code, lines));
            }
        }
    }
}

// An address reaches the wire inside a single command line
fn check_argument(arg: &str) -> Result<(), SmtpFailure> {
    if arg.contains(['\r', '\n']) {
        return Err(SmtpFailure::LineBreak(arg.to_owned()));
    }
    Ok(())
}

/// Writer for the DATA phase.
///
/// Doubles a leading `.` on every line and turns bare `\n` into `\r\n`.
pub struct DotStuffer<W: Write> {
    inner: W,
    line_start: bool,
    after_cr: bool,
}

impl<W: Write> DotStuffer<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            line_start: true,
            after_cr: false,
        }
    }

    /// Terminate the last line if needed and write the `.` end marker
    pub fn finish(mut self) -> io::Result<W> {
        if self.after_cr {
            self.inner.write_all(b"\n")?;
        } else if !self.line_start {
            self.inner.write_all(b"\r\n")?;
        }
        self.inner.write_all(b".\r\n")?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for DotStuffer<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut out = Vec::with_capacity(buf.len() + buf.len() / 64 + 2);

        for &byte in buf {
            match byte {
                b'\n' => {
                    if !self.after_cr {
                        out.push(b'\r');
                    }
                    out.push(b'\n');
                    self.line_start = true;
                    self.after_cr = false;
                    continue;
                }
                _ if self.after_cr => {
                    // Lone CR: complete it to a line break
                    out.push(b'\n');
                    self.line_start = true;
                }
                _ => {}
            }

            if self.line_start && byte == b'.' {
                out.push(b'.');
            }
            out.push(byte);
            self.after_cr = byte == b'\r';
            self.line_start = false;
        }

        self.inner.write_all(&out)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
