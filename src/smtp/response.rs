//! SMTP reply handling

use std::fmt;

use crate::error::SmtpFailure;

/// A reply received from an SMTP server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpReply {
    /// The three digit reply code (e.g. 250, 354, 550)
    pub code: u16,
    /// Text of every reply line, without code and separator
    pub lines: Vec<String>,
}

impl SmtpReply {
    /// Create a single line reply
    pub fn new(code: u16, message: &str) -> Self {
        Self {
            code,
            lines: vec![message.to_owned()],
        }
    }

    /// Create a multiline reply
    pub fn new_multiline(code: u16, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// Parse one reply line.
    ///
    /// Returns the code, whether this is the last line of the reply
    /// and the text following the separator.
    pub fn parse_line(line: &str) -> Result<(u16, bool, &str), SmtpFailure> {
        let line = line.trim_end_matches(['\r', '\n']);
        let bytes = line.as_bytes();

        if bytes.len() < 3 || !bytes[..3].iter().all(u8::is_ascii_digit) {
            return Err(SmtpFailure::MalformedReply(line.to_owned()));
        }

        let code = line[..3]
            .parse::<u16>()
            .map_err(|_| SmtpFailure::MalformedReply(line.to_owned()))?;

        match bytes.get(3) {
            None => Ok((code, true, "")),
            Some(b' ') => Ok((code, true, &line[4..])),
            Some(b'-') => Ok((code, false, &line[4..])),
            Some(_) => Err(SmtpFailure::MalformedReply(line.to_owned())),
        }
    }

    /// Text of the first line
    pub fn message(&self) -> &str {
        self.lines.first().map(String::as_str).unwrap_or("")
    }

    /// 2xx
    pub fn is_positive(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// 3xx, the server waits for more input
    pub fn is_intermediate(&self) -> bool {
        (300..400).contains(&self.code)
    }

    /// Require a specific reply code, turning anything else into a failure
    pub fn expect(self, code: u16) -> Result<Self, SmtpFailure> {
        if self.code == code {
            Ok(self)
        } else {
            Err(SmtpFailure::Reply(self))
        }
    }
}

impl fmt::Display for SmtpReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.lines.join(" "))
    }
}
