use log::debug;
use mailin_embedded::{response, Handler, Response, Server, SslConfig};
use std::net::{IpAddr, SocketAddr, TcpListener};
use tokio::sync::{
    mpsc::{self, UnboundedReceiver, UnboundedSender},
    Mutex,
};

const SERVER_NAME: &str = "contact-form-relay.test";

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Accept,
    RejectAll,
}

#[derive(Clone)]
struct RecordingHandler {
    mode: Mode,
    buffer: Vec<u8>,
    delivered: UnboundedSender<String>,
}

impl Handler for RecordingHandler {
    fn helo(&mut self, _ip: IpAddr, _domain: &str) -> Response {
        match self.mode {
            Mode::Accept => response::OK,
            Mode::RejectAll => response::INTERNAL_ERROR,
        }
    }

    fn mail(&mut self, _ip: IpAddr, _domain: &str, from: &str) -> Response {
        debug!("MAIL FROM {from}");
        match self.mode {
            Mode::Accept => response::OK,
            Mode::RejectAll => response::INTERNAL_ERROR,
        }
    }

    fn data(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.buffer.extend_from_slice(buf);
        Ok(())
    }

    fn data_end(&mut self) -> Response {
        let mail = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        debug!("Received mail:\n{mail}");
        // The receiving side may already be gone at the end of a test.
        let _ = self.delivered.send(mail);
        response::OK
    }

    fn auth_plain(
        &mut self,
        _authorization_id: &str,
        authentication_id: &str,
        _password: &str,
    ) -> Response {
        debug!("AUTH PLAIN as {authentication_id}");
        response::AUTH_OK
    }
}

/// A plain-text SMTP server on an ephemeral local port.
///
/// Each instance owns its port, so tests using separate instances do not see each other's mail.
pub struct FakeSmtpServer {
    address: SocketAddr,
    delivered: Mutex<UnboundedReceiver<String>>,
}

impl FakeSmtpServer {
    /// Starts a server which accepts every message.
    pub fn start() -> Self {
        Self::start_in_mode(Mode::Accept)
    }

    /// Starts a server which answers every transaction with a 4xx error.
    pub fn start_rejecting() -> Self {
        Self::start_in_mode(Mode::RejectAll)
    }

    fn start_in_mode(mode: Mode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut server = Server::new(RecordingHandler {
            mode,
            buffer: Vec::new(),
            delivered: sender,
        });
        server
            .with_name(SERVER_NAME)
            .with_ssl(SslConfig::None)
            .unwrap()
            .with_tcp_listener(listener);
        std::thread::spawn(move || {
            if let Err(error) = server.serve() {
                debug!("Fake SMTP server on {address} stopped: {error:?}");
            }
        });
        Self {
            address,
            delivered: Mutex::new(receiver),
        }
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn url(&self) -> String {
        format!("smtp://{}", self.address)
    }

    /// Waits for the next message the server accepts and returns it as raw SMTP data.
    pub async fn next_mail(&self) -> Option<String> {
        self.delivered.lock().await.recv().await
    }
}
