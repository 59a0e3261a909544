//! Basic usage example for mimepost
//!
//! Builds a message with both bodies and an attachment, prints the MIME
//! output, and sends it when `MIMEPOST_HOST` is set.

use mimepost::{MemorySink, Message, SendEvent, Sender, SenderConfig};
use std::env;
use std::sync::Arc;
use std::time::Duration;

fn main() {
    println!("mimepost Basic Usage Example");
    println!("============================");

    let mut message = Message::new("Quarterly numbers 📈")
        .with_text("Hello Bob,\n\nThe numbers are attached.\n")
        .with_html("<p>Hello Bob,</p><p>The numbers are <b>attached</b>.</p>");
    message.set_from("Alice <alice@example.com>");
    message.set_to(["Bob <bob@example.com>"]);
    message.set_cc(["carol@example.com"]);
    message.set_bcc(["audit@example.com"]);
    message.attach("numbers.csv", b"quarter,revenue\nQ1,100\nQ2,140\n".to_vec());
    message.attach("レポート.txt", "売上は好調です".as_bytes().to_vec());

    let bytes = message.to_bytes();
    println!("\nComposed {} bytes:\n", bytes.len());
    println!("{}", String::from_utf8_lossy(&bytes));

    let envelope: Vec<&str> = message.envelope_recipients().map(|a| a.email()).collect();
    println!("Envelope recipients: {envelope:?}");

    let Ok(host) = env::var("MIMEPOST_HOST") else {
        println!("\nSet MIMEPOST_HOST (and optionally MIMEPOST_USER / MIMEPOST_PASSWORD) to send it.");
        return;
    };

    let user = env::var("MIMEPOST_USER").unwrap_or_else(|_| "alice@example.com".to_owned());
    let password = env::var("MIMEPOST_PASSWORD").unwrap_or_default();
    let config = SenderConfig::new(&user, &password, &host).with_timeout(Duration::from_secs(10));

    let events = Arc::new(MemorySink::new());
    let sender = Sender::from_config(config).with_event_sink(events.clone());

    println!("\nSending through {host}...");
    match sender.send(&message) {
        Ok(report) => {
            println!("Accepted: {:?}", report.accepted);
            for rejected in &report.rejected {
                println!("Rejected: {} ({})", rejected.address, rejected.error);
            }
        }
        Err(e) => eprintln!("Failed to send: {e}"),
    }

    println!("\nEvents:");
    for event in events.events() {
        match event {
            SendEvent::Connected { greeting } => println!("  connected: {greeting}"),
            other => println!("  {other:?}"),
        }
    }
}
