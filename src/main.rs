use mimepost::{Message, SendEvent, Sender, SenderConfig};
use std::env;
use std::process;
use std::sync::Arc;
use std::time::Duration;

const USAGE: &str = "usage: mimepost <to>[,<to>...] <subject> <text> [attachment...]

environment:
  MIMEPOST_HOST      server host:port (default localhost:25)
  MIMEPOST_USER      envelope sender and AUTH user
  MIMEPOST_PASSWORD  AUTH password; empty sends over plain TCP
  MIMEPOST_INSECURE  set to 1 to skip TLS certificate checks
  MIMEPOST_TIMEOUT   seconds to wait on the network";

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 4 {
        eprintln!("{USAGE}");
        process::exit(2);
    }

    let recipients: Vec<&str> = args[1]
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .collect();
    let subject = args[2].as_str();
    let text = args[3].as_str();

    let host = env::var("MIMEPOST_HOST").unwrap_or_else(|_| "localhost:25".to_owned());
    let user = env::var("MIMEPOST_USER").unwrap_or_default();
    let password = env::var("MIMEPOST_PASSWORD").unwrap_or_default();
    let insecure = matches!(env::var("MIMEPOST_INSECURE").as_deref(), Ok("1" | "true"));

    let mut config = SenderConfig::new(&user, &password, &host).with_accept_invalid_certs(insecure);
    if let Some(secs) = env::var("MIMEPOST_TIMEOUT")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
    {
        config = config.with_timeout(Duration::from_secs(secs));
    }

    let mut message = Message::new(subject).with_text(text);
    message.set_from(&user);
    message.set_to(&recipients);
    for path in &args[4..] {
        if let Err(e) = message.attach_file(path) {
            eprintln!("{e}");
            process::exit(1);
        }
    }

    let sender = Sender::from_config(config).with_event_sink(Arc::new(print_event));

    match sender.send(&message) {
        Ok(report) => {
            println!(
                "Sent to {} of {} recipient(s)",
                report.accepted.len(),
                report.accepted.len() + report.rejected.len()
            );
            for rejected in &report.rejected {
                println!("  rejected {}: {}", rejected.address, rejected.error);
            }
        }
        Err(e) => {
            eprintln!("Failed to send: {e}");
            process::exit(1);
        }
    }
}

fn print_event(event: &SendEvent) {
    match event {
        SendEvent::Connecting { host, tls, .. } => {
            let mode = if *tls { "TLS" } else { "plain" };
            eprintln!("connecting to {host} ({mode})");
        }
        SendEvent::Connected { greeting } => eprintln!("< {greeting}"),
        SendEvent::Authenticated { username } => eprintln!("authenticated as {username}"),
        SendEvent::RecipientRejected { address, error, .. } => {
            eprintln!("recipient {address} rejected: {error}")
        }
        SendEvent::MessageAccepted { bytes, reply } => eprintln!("sent {bytes} bytes: {reply}"),
        SendEvent::QuitFailed { error } => eprintln!("QUIT failed: {error}"),
        SendEvent::RecipientAccepted { .. } | SendEvent::Closed => {}
    }
}
