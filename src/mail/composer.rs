//! MIME serialization of a [`Message`]
//!
//! The layout is fixed:
//!
//! ```text
//! multipart/mixed                 (only with attachments)
//! ├── multipart/alternative       (only with both bodies)
//! │   ├── text/html
//! │   └── text/plain              (last, the preferred fallback)
//! ├── attachment 1 (base64)
//! └── attachment N (base64)
//! ```
//!
//! Without attachments and with a single body the message is one flat part.
//! Every line ends in CRLF.

use rand::Rng;

use crate::mail::address;
use crate::mail::content_type;
use crate::mail::encoding::{encoded_word, write_base64_lines};
use crate::mail::message::{Attachment, Message};

const CRLF: &[u8] = b"\r\n";

/// Turns messages into the byte stream handed to DATA
#[derive(Debug, Clone)]
pub struct MimeComposer {
    mixed_boundary: String,
    alternative_boundary: String,
}

impl Default for MimeComposer {
    fn default() -> Self {
        Self::new()
    }
}

impl MimeComposer {
    /// Composer with two fresh random boundaries
    pub fn new() -> Self {
        Self {
            mixed_boundary: random_boundary(),
            alternative_boundary: random_boundary(),
        }
    }

    /// Composer with fixed boundaries, for reproducible output
    pub fn with_boundaries(mixed: &str, alternative: &str) -> Self {
        Self {
            mixed_boundary: mixed.to_owned(),
            alternative_boundary: alternative.to_owned(),
        }
    }

    pub fn mixed_boundary(&self) -> &str {
        &self.mixed_boundary
    }

    pub fn alternative_boundary(&self) -> &str {
        &self.alternative_boundary
    }

    pub fn compose(&self, message: &Message) -> Vec<u8> {
        let html = non_empty(message.body_html());
        let text = non_empty(message.body_text());
        let has_attachments = !message.attachments().is_empty();
        let has_body = html.is_some() || text.is_some();

        let mut out = Vec::with_capacity(estimated_size(message));
        write_headers(&mut out, message);

        if has_attachments {
            header(
                &mut out,
                "Content-Type",
                &format!("multipart/mixed; boundary={}", self.mixed_boundary),
            );
            out.extend_from_slice(CRLF);

            if has_body {
                delimiter(&mut out, &self.mixed_boundary);
                self.write_bodies(&mut out, html, text);
            }

            for attachment in message.attachments() {
                delimiter(&mut out, &self.mixed_boundary);
                write_attachment(&mut out, attachment);
            }

            close_delimiter(&mut out, &self.mixed_boundary);
        } else if has_body {
            self.write_bodies(&mut out, html, text);
        } else {
            // Nothing to carry; still end the header block
            out.extend_from_slice(CRLF);
        }

        out
    }

    fn write_bodies(&self, out: &mut Vec<u8>, html: Option<&str>, text: Option<&str>) {
        match (html, text) {
            (Some(html), Some(text)) => {
                header(
                    out,
                    "Content-Type",
                    &format!(
                        "multipart/alternative; boundary={}",
                        self.alternative_boundary
                    ),
                );
                out.extend_from_slice(CRLF);
                delimiter(out, &self.alternative_boundary);
                write_body(out, "text/html", html);
                delimiter(out, &self.alternative_boundary);
                write_body(out, "text/plain", text);
                close_delimiter(out, &self.alternative_boundary);
            }
            (Some(html), None) => write_body(out, "text/html", html),
            (None, Some(text)) => write_body(out, "text/plain", text),
            (None, None) => {}
        }
    }
}

fn write_headers(out: &mut Vec<u8>, message: &Message) {
    header(out, "From", &message.from().to_string());
    header(out, "To", &address::join(message.to()));
    if !message.cc().is_empty() {
        header(out, "Cc", &address::join(message.cc()));
    }
    header(out, "Subject", &encoded_word(message.subject().as_bytes()));
    header(out, "MIME-Version", "1.0");
}

fn write_body(out: &mut Vec<u8>, media_type: &str, content: &str) {
    header(out, "Content-Type", &format!("{media_type}; charset=utf-8"));
    out.extend_from_slice(CRLF);
    push_crlf_lines(out, content.as_bytes());
    out.extend_from_slice(CRLF);
}

/// Copy `text`, turning bare LF and lone CR into CRLF
fn push_crlf_lines(out: &mut Vec<u8>, text: &[u8]) {
    let mut bytes = text.iter().copied().peekable();
    while let Some(b) = bytes.next() {
        match b {
            b'\r' => {
                out.extend_from_slice(CRLF);
                bytes.next_if_eq(&b'\n');
            }
            b'\n' => out.extend_from_slice(CRLF),
            _ => out.push(b),
        }
    }
}

fn write_attachment(out: &mut Vec<u8>, attachment: &Attachment) {
    let media_type = content_type::for_attachment(&attachment.name, &attachment.content);
    header(out, "Content-Type", &media_type);
    header(out, "Content-Transfer-Encoding", "base64");
    header(
        out,
        "Content-Disposition",
        &format!(
            "attachment; filename=\"{}\"",
            encoded_word(attachment.name.as_bytes())
        ),
    );
    out.extend_from_slice(CRLF);
    write_base64_lines(out, &attachment.content);
}

fn header(out: &mut Vec<u8>, name: &str, value: &str) {
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(b": ");
    out.extend_from_slice(value.as_bytes());
    out.extend_from_slice(CRLF);
}

// Every part written before a delimiter ends in CRLF, which serves as the
// delimiter's leading line break.
fn delimiter(out: &mut Vec<u8>, boundary: &str) {
    out.extend_from_slice(b"--");
    out.extend_from_slice(boundary.as_bytes());
    out.extend_from_slice(CRLF);
}

fn close_delimiter(out: &mut Vec<u8>, boundary: &str) {
    out.extend_from_slice(b"--");
    out.extend_from_slice(boundary.as_bytes());
    out.extend_from_slice(b"--");
    out.extend_from_slice(CRLF);
}

fn non_empty(body: Option<&str>) -> Option<&str> {
    body.filter(|b| !b.is_empty())
}

/// 30 random bytes in hex, like other MIME writers use
fn random_boundary() -> String {
    let bytes: [u8; 30] = rand::thread_rng().r#gen();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn estimated_size(message: &Message) -> usize {
    let bodies =
        message.body_text().map_or(0, str::len) + message.body_html().map_or(0, str::len);
    let attachments: usize = message
        .attachments()
        .iter()
        .map(|a| a.content.len() * 4 / 3 + a.content.len() / 38 + 256)
        .sum();
    1024 + bodies + attachments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn composer() -> MimeComposer {
        MimeComposer::with_boundaries("MIXED", "ALT")
    }

    fn compose(message: &Message) -> String {
        String::from_utf8(composer().compose(message)).unwrap()
    }

    fn base_message() -> Message {
        let mut message = Message::new("Hi");
        message.set_from("alice@example.com");
        message.set_to(["bob@example.com"]);
        message
    }

    #[test]
    fn test_body_line_endings_normalized() {
        let message = base_message().with_text("one\ntwo\r\nthree\rfour");
        let out = compose(&message);
        assert!(out.ends_with("\r\n\r\none\r\ntwo\r\nthree\r\nfour\r\n"));

        let mut crlf = Vec::new();
        push_crlf_lines(&mut crlf, b"a\n\nb\r\r\n");
        assert_eq!(crlf, b"a\r\n\r\nb\r\n\r\n");
    }

    #[test]
    fn test_flat_text_message() {
        let message = base_message().with_text("hello");
        assert_eq!(
            compose(&message),
            "From: alice@example.com\r\n\
             To: bob@example.com\r\n\
             Subject: =?UTF-8?B?SGk=?=\r\n\
             MIME-Version: 1.0\r\n\
             Content-Type: text/plain; charset=utf-8\r\n\
             \r\n\
             hello\r\n"
        );
    }

    #[test]
    fn test_flat_html_message() {
        let message = base_message().with_html("<p>hi</p>");
        let out = compose(&message);
        assert!(out.ends_with("Content-Type: text/html; charset=utf-8\r\n\r\n<p>hi</p>\r\n"));
        assert!(!out.contains("--"));
    }

    #[test]
    fn test_cc_header_only_when_present() {
        let mut message = base_message().with_text("hello");
        assert!(!compose(&message).contains("Cc:"));

        message.set_cc(["carol@example.com", "Dave <dave@example.com>"]);
        assert!(compose(&message).contains("Cc: carol@example.com,Dave <dave@example.com>\r\n"));
    }

    #[test]
    fn test_bcc_never_in_headers() {
        let mut message = base_message().with_text("hello");
        message.set_bcc(["secret@example.com"]);
        assert!(!compose(&message).contains("secret@example.com"));
    }

    #[test]
    fn test_alternative_message() {
        let message = base_message().with_text("plain").with_html("<b>rich</b>");
        let out = compose(&message);
        let body = out.split_once("MIME-Version: 1.0\r\n").unwrap().1;

        assert_eq!(
            body,
            "Content-Type: multipart/alternative; boundary=ALT\r\n\
             \r\n\
             --ALT\r\n\
             Content-Type: text/html; charset=utf-8\r\n\
             \r\n\
             <b>rich</b>\r\n\
             --ALT\r\n\
             Content-Type: text/plain; charset=utf-8\r\n\
             \r\n\
             plain\r\n\
             --ALT--\r\n"
        );
    }

    #[test]
    fn test_empty_bodies_count_as_absent() {
        let message = base_message().with_text("").with_html("<p>only</p>");
        let out = compose(&message);
        assert!(!out.contains("multipart"));
        assert_eq!(out.matches("Content-Type:").count(), 1);
    }

    #[test]
    fn test_no_body_no_attachments() {
        let out = compose(&base_message());
        assert!(out.ends_with("MIME-Version: 1.0\r\n\r\n"));
        assert!(!out.contains("Content-Type"));
    }

    #[test]
    fn test_mixed_with_text_and_attachment() {
        let mut message = base_message().with_text("see attached");
        message.attach("a.txt", b"hello".to_vec());
        let out = compose(&message);
        let body = out.split_once("MIME-Version: 1.0\r\n").unwrap().1;

        assert_eq!(
            body,
            "Content-Type: multipart/mixed; boundary=MIXED\r\n\
             \r\n\
             --MIXED\r\n\
             Content-Type: text/plain; charset=utf-8\r\n\
             \r\n\
             see attached\r\n\
             --MIXED\r\n\
             Content-Type: text/plain\r\n\
             Content-Transfer-Encoding: base64\r\n\
             Content-Disposition: attachment; filename=\"=?UTF-8?B?YS50eHQ=?=\"\r\n\
             \r\n\
             aGVsbG8=\r\n\
             --MIXED--\r\n"
        );
    }

    #[test]
    fn test_mixed_nests_alternative() {
        let mut message = base_message().with_text("plain").with_html("<i>rich</i>");
        message.attach("one.bin", vec![0, 1, 2]);
        message.attach("two.bin", vec![3, 4, 5]);
        let out = compose(&message);

        let alt_open = out.find("multipart/alternative; boundary=ALT").unwrap();
        let alt_close = out.find("--ALT--\r\n").unwrap();
        let first_attachment = out.find("=?UTF-8?B?b25lLmJpbg==?=").unwrap();
        assert!(out.find("multipart/mixed; boundary=MIXED").unwrap() < alt_open);
        assert!(alt_close < first_attachment);
        assert_eq!(out.matches("--MIXED\r\n").count(), 3);
        assert!(out.ends_with("--MIXED--\r\n"));
    }

    #[test]
    fn test_attachment_order_is_insertion_order() {
        let mut message = base_message().with_text("x");
        for name in ["c.bin", "a.bin", "b.bin"] {
            message.attach(name, vec![0xAB]);
        }
        let out = compose(&message);
        let positions: Vec<usize> = ["c.bin", "a.bin", "b.bin"]
            .iter()
            .map(|n| out.find(&encoded_word(n.as_bytes())).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_empty_attachment() {
        let mut message = base_message();
        message.attach("empty.dat", Vec::new());
        let out = compose(&message);
        assert!(out.ends_with("filename=\"=?UTF-8?B?ZW1wdHkuZGF0?=\"\r\n\r\n--MIXED--\r\n"));
    }

    #[test]
    fn test_random_boundaries_differ() {
        let composer = MimeComposer::new();
        assert_eq!(composer.mixed_boundary().len(), 60);
        assert_ne!(composer.mixed_boundary(), composer.alternative_boundary());
        assert_ne!(MimeComposer::new().mixed_boundary(), composer.mixed_boundary());
    }
}
