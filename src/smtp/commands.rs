//! SMTP commands issued by the client

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// A command line sent to the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtpCommand<'a> {
    Ehlo(&'a str),
    Helo(&'a str),
    /// `AUTH PLAIN` with the initial response already encoded
    AuthPlain(String),
    /// Bare base64 line answering a `334` challenge
    AuthResponse(String),
    Mail { from: &'a str, eight_bit: bool },
    Rcpt(&'a str),
    Data,
    Quit,
}

impl SmtpCommand<'_> {
    /// The full line including CRLF
    pub fn to_line(&self) -> String {
        format!("{self}\r\n")
    }
}

impl fmt::Display for SmtpCommand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmtpCommand::Ehlo(domain) => write!(f, "EHLO {domain}"),
            SmtpCommand::Helo(domain) => write!(f, "HELO {domain}"),
            SmtpCommand::AuthPlain(response) => write!(f, "AUTH PLAIN {response}"),
            SmtpCommand::AuthResponse(response) => write!(f, "{response}"),
            SmtpCommand::Mail { from, eight_bit } => {
                write!(f, "MAIL FROM:<{from}>")?;
                if *eight_bit {
                    write!(f, " BODY=8BITMIME")?;
                }
                Ok(())
            }
            SmtpCommand::Rcpt(to) => write!(f, "RCPT TO:<{to}>"),
            SmtpCommand::Data => write!(f, "DATA"),
            SmtpCommand::Quit => write!(f, "QUIT"),
        }
    }
}

/// Initial response for `AUTH PLAIN` (RFC 4616) with an empty authorization identity
pub fn plain_credentials(username: &str, password: &str) -> String {
    let mut raw = Vec::with_capacity(username.len() + password.len() + 2);
    raw.push(0);
    raw.extend_from_slice(username.as_bytes());
    raw.push(0);
    raw.extend_from_slice(password.as_bytes());
    STANDARD.encode(raw)
}
