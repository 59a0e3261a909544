//! Scripted in-process SMTP server for exercising the sender over real sockets

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::{ServerConfig, ServerConnection, StreamOwned};

// Self-signed for CN=localhost and 127.0.0.1
const CERT_DER: &[u8] = include_bytes!("../data/localhost.cert.der");
const KEY_DER: &[u8] = include_bytes!("../data/localhost.key.der");

/// How the fake server answers
#[derive(Debug, Clone)]
pub struct Script {
    /// First line sent on connect; `None` never greets
    pub greeting: Option<&'static str>,
    /// Keywords advertised after EHLO; `None` refuses EHLO
    pub extensions: Option<Vec<&'static str>>,
    pub reject_mail: bool,
    pub reject_rcpt: Vec<&'static str>,
    /// Recipients answered with a line that is not an SMTP reply
    pub garble_rcpt: Vec<&'static str>,
    /// Recipients that make the server drop the connection
    pub hang_up_rcpt: Vec<&'static str>,
    /// Reply to any AUTH command
    pub auth_reply: &'static str,
    /// Reply to the final dot
    pub data_reply: &'static str,
    pub quit_reply: &'static str,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            greeting: Some("220 test.local ESMTP ready"),
            extensions: Some(vec!["8BITMIME", "SIZE 10485760"]),
            reject_mail: false,
            reject_rcpt: Vec::new(),
            garble_rcpt: Vec::new(),
            hang_up_rcpt: Vec::new(),
            auth_reply: "235 2.7.0 Authentication successful",
            data_reply: "250 2.0.0 Ok: queued as 12345",
            quit_reply: "221 2.0.0 Bye",
        }
    }
}

/// What the server saw on one connection
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    /// Every command line, CRLF stripped
    pub commands: Vec<String>,
    /// Raw DATA payload as it crossed the wire, final dot excluded
    pub data: Option<String>,
}

impl Transcript {
    pub fn verbs(&self) -> Vec<String> {
        self.commands
            .iter()
            .map(|c| c.split([' ', ':']).next().unwrap_or("").to_uppercase())
            .collect()
    }

    /// Message with dot-stuffing undone
    pub fn message(&self) -> Option<String> {
        self.data.as_ref().map(|data| {
            data.split_inclusive("\r\n")
                .map(|line| line.strip_prefix('.').unwrap_or(line))
                .collect()
        })
    }
}

/// Serve a single connection with `script`; the transcript arrives once the
/// client hangs up.
pub fn start_server(script: Script) -> (String, mpsc::Receiver<Transcript>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        if let Ok((stream, _)) = listener.accept() {
            let transcript = handle_client(stream, &script);
            let _ = tx.send(transcript);
        }
    });

    (addr, rx)
}

/// Like [`start_server`], with TLS from the first byte
pub fn start_tls_server(script: Script) -> (String, mpsc::Receiver<Transcript>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let config = Arc::new(tls_config());
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        if let Ok((tcp, _)) = listener.accept() {
            let conn = ServerConnection::new(config).unwrap();
            let transcript = handle_client(StreamOwned::new(conn, tcp), &script);
            let _ = tx.send(transcript);
        }
    });

    (addr, rx)
}

fn tls_config() -> ServerConfig {
    let cert = CertificateDer::from(CERT_DER.to_vec());
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(KEY_DER.to_vec()));
    ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert], key)
        .unwrap()
}

/// A local address nothing listens on
pub fn closed_port() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().to_string()
}

pub fn recv(rx: &mpsc::Receiver<Transcript>) -> Transcript {
    rx.recv_timeout(Duration::from_secs(5))
        .expect("server never finished")
}

fn handle_client<S: Read + Write>(stream: S, script: &Script) -> Transcript {
    let mut transcript = Transcript::default();
    let mut reader = BufReader::new(stream);

    match script.greeting {
        Some(greeting) => reply(reader.get_mut(), greeting),
        None => {
            // Hold the line open until the client gives up
            let mut sink = Vec::new();
            let _ = reader.read_until(b'\n', &mut sink);
            return transcript;
        }
    }

    let mut line_buffer = Vec::new();
    let mut in_data_mode = false;
    let mut data = String::new();

    loop {
        line_buffer.clear();
        match reader.read_until(b'\n', &mut line_buffer) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let line = String::from_utf8_lossy(&line_buffer).into_owned();
        let stream = reader.get_mut();

        if in_data_mode {
            if line == ".\r\n" {
                in_data_mode = false;
                transcript.data = Some(std::mem::take(&mut data));
                reply(stream, script.data_reply);
            } else {
                data.push_str(&line);
            }
            continue;
        }

        let command = line.trim_end_matches(['\r', '\n']).to_owned();
        transcript.commands.push(command.clone());
        let upper = command.to_uppercase();

        if upper.starts_with("EHLO") {
            match &script.extensions {
                Some(extensions) => {
                    let mut lines = vec!["test.local".to_owned()];
                    lines.extend(extensions.iter().map(|e| e.to_string()));
                    multiline(stream, 250, &lines);
                }
                None => reply(stream, "502 5.5.2 Command not recognized"),
            }
        } else if upper.starts_with("HELO") {
            reply(stream, "250 test.local");
        } else if upper.starts_with("MAIL FROM:") {
            if script.reject_mail {
                reply(stream, "550 5.7.1 Sender rejected");
            } else {
                reply(stream, "250 2.1.0 Ok");
            }
        } else if upper.starts_with("RCPT TO:") {
            let address = command[8..].trim().trim_start_matches('<').trim_end_matches('>');
            if script.hang_up_rcpt.iter().any(|r| *r == address) {
                break;
            } else if script.garble_rcpt.iter().any(|r| *r == address) {
                reply(stream, "mailbox ok, probably");
            } else if script.reject_rcpt.iter().any(|r| *r == address) {
                reply(stream, "550 5.1.1 No such user here");
            } else {
                reply(stream, "250 2.1.5 Ok");
            }
        } else if upper.starts_with("AUTH") {
            reply(stream, script.auth_reply);
        } else if upper == "DATA" {
            in_data_mode = true;
            reply(stream, "354 End data with <CR><LF>.<CR><LF>");
        } else if upper == "QUIT" {
            reply(stream, script.quit_reply);
            break;
        } else {
            reply(stream, "500 5.5.1 Unknown command");
        }
    }

    transcript
}

fn reply(stream: &mut impl Write, line: &str) {
    let _ = stream.write_all(format!("{line}\r\n").as_bytes());
    let _ = stream.flush();
}

fn multiline(stream: &mut impl Write, code: u16, lines: &[String]) {
    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        let sep = if i + 1 == lines.len() { ' ' } else { '-' };
        out.push_str(&format!("{code}{sep}{line}\r\n"));
    }
    let _ = stream.write_all(out.as_bytes());
    let _ = stream.flush();
}
