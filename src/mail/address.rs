//! Mailbox addresses

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use crate::mail::encoding::encoded_word;

/// A mailbox: an address with an optional display name.
///
/// Parsing never fails; whatever is given is carried as-is so the server
/// decides what it accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Address {
    name: Option<String>,
    email: String,
}

impl Address {
    pub fn new(email: &str) -> Self {
        Self {
            name: None,
            email: email.trim().to_owned(),
        }
    }

    pub fn with_name(name: &str, email: &str) -> Self {
        let name = name.trim();
        Self {
            name: (!name.is_empty()).then(|| name.to_owned()),
            email: email.trim().to_owned(),
        }
    }

    /// Accepts `addr`, `<addr>`, `Name <addr>` and `"Quoted Name" <addr>`
    pub fn parse(input: &str) -> Self {
        let input = input.trim();

        if let (Some(open), true) = (input.rfind('<'), input.ends_with('>')) {
            let email = &input[open + 1..input.len() - 1];
            let name = input[..open].trim();
            let name = name
                .strip_prefix('"')
                .and_then(|n| n.strip_suffix('"'))
                .map(unescape_quoted)
                .unwrap_or_else(|| name.to_owned());
            return Self::with_name(&name, email);
        }

        Self::new(input)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The bare address used for the SMTP envelope
    pub fn email(&self) -> &str {
        &self.email
    }
}

impl FromStr for Address {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let email = strip_controls(&self.email);
        match &self.name {
            None => f.write_str(&email),
            // Control characters, CR and LF included, never reach a header raw
            Some(name) if !name.is_ascii() || name.chars().any(char::is_control) => {
                write!(f, "{} <{}>", encoded_word(name.as_bytes()), email)
            }
            Some(name) if name.chars().any(is_special) => {
                write!(f, "\"{}\" <{}>", escape_quoted(name), email)
            }
            Some(name) => write!(f, "{} <{}>", name, email),
        }
    }
}

/// Render addresses comma separated, the way the header lines want them
pub fn join(addresses: &[Address]) -> String {
    addresses
        .iter()
        .map(Address::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn strip_controls(s: &str) -> Cow<'_, str> {
    if s.chars().any(char::is_control) {
        Cow::Owned(s.chars().filter(|c| !c.is_control()).collect())
    } else {
        Cow::Borrowed(s)
    }
}

// RFC 5322 specials
fn is_special(c: char) -> bool {
    matches!(
        c,
        '(' | ')' | '<' | '>' | '[' | ']' | ':' | ';' | '@' | '\\' | ',' | '.' | '"'
    )
}

fn escape_quoted(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    for c in name.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn unescape_quoted(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut chars = name.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}
