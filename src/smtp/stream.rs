//! Plain and TLS sockets behind one Read + Write type

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, ClientConnection, DigitallySignedStruct, RootCertStore, StreamOwned};

/// Connection to the mail server
pub enum MailStream {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

impl MailStream {
    /// Open a plain TCP connection
    pub fn connect_plain(addr: &str, timeout: Option<Duration>) -> io::Result<Self> {
        Ok(MailStream::Plain(connect_tcp(addr, timeout)?))
    }

    /// Open a TCP connection and run the TLS handshake on it
    pub fn connect_tls(
        addr: &str,
        server_name: &str,
        accept_invalid_certs: bool,
        timeout: Option<Duration>,
    ) -> io::Result<Self> {
        let name = ServerName::try_from(server_name.to_owned())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let config = tls_config(accept_invalid_certs);
        let conn = ClientConnection::new(config, name).map_err(io::Error::other)?;

        let tcp = connect_tcp(addr, timeout)?;
        let mut stream = StreamOwned::new(conn, tcp);
        // Drive the handshake now so certificate problems surface as connect errors
        while stream.conn.is_handshaking() {
            stream.conn.complete_io(&mut stream.sock)?;
        }

        Ok(MailStream::Tls(Box::new(stream)))
    }

    /// Best-effort close of the underlying socket
    pub fn shutdown(&mut self) {
        match self {
            MailStream::Plain(tcp) => {
                let _ = tcp.shutdown(Shutdown::Both);
            }
            MailStream::Tls(tls) => {
                tls.conn.send_close_notify();
                let _ = tls.conn.complete_io(&mut tls.sock);
                let _ = tls.sock.shutdown(Shutdown::Both);
            }
        }
    }
}

impl Read for MailStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            MailStream::Plain(tcp) => tcp.read(buf),
            MailStream::Tls(tls) => tls.read(buf),
        }
    }
}

impl Write for MailStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            MailStream::Plain(tcp) => tcp.write(buf),
            MailStream::Tls(tls) => tls.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            MailStream::Plain(tcp) => tcp.flush(),
            MailStream::Tls(tls) => tls.flush(),
        }
    }
}

fn connect_tcp(addr: &str, timeout: Option<Duration>) -> io::Result<TcpStream> {
    let tcp = match timeout {
        Some(timeout) => {
            let mut last_err = None;
            let mut connected = None;
            for socket_addr in addr.to_socket_addrs()? {
                match TcpStream::connect_timeout(&socket_addr, timeout) {
                    Ok(tcp) => {
                        connected = Some(tcp);
                        break;
                    }
                    Err(e) => last_err = Some(e),
                }
            }
            match connected {
                Some(tcp) => tcp,
                None => {
                    return Err(last_err.unwrap_or_else(|| {
                        io::Error::new(io::ErrorKind::NotFound, "address resolved to nothing")
                    }));
                }
            }
        }
        None => TcpStream::connect(addr)?,
    };

    tcp.set_read_timeout(timeout)?;
    tcp.set_write_timeout(timeout)?;
    Ok(tcp)
}

fn tls_config(accept_invalid_certs: bool) -> Arc<ClientConfig> {
    let mut root_store = RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let mut config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    if accept_invalid_certs {
        config
            .dangerous()
            .set_certificate_verifier(Arc::new(NoCertVerifier));
    }

    Arc::new(config)
}

/// Split `host:port` and return the host part, without IPv6 brackets.
///
/// An unbracketed address with more than one colon is an IPv6 literal
/// and comes back whole.
pub fn server_name(addr: &str) -> &str {
    if let Some(rest) = addr.strip_prefix('[') {
        return rest.split_once(']').map_or(rest, |(host, _)| host);
    }
    match addr.rsplit_once(':') {
        Some((host, port))
            if !host.contains(':')
                && !port.is_empty()
                && port.bytes().all(|b| b.is_ascii_digit()) =>
        {
            host
        }
        _ => addr,
    }
}

// Used only when certificate verification is explicitly turned off
#[derive(Debug)]
struct NoCertVerifier;

impl ServerCertVerifier for NoCertVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
