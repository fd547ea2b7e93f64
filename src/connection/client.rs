use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::connection::event::{ClientEvent, EventReceiver};
use crate::connection::session;
use crate::connection::shared::Shared;
use crate::connection::state::ConnectionState;
use crate::connection::writer::WriterCommand;
use crate::endpoint::Endpoint;
use crate::error::Error;
use crate::protocol::Frame;

/// WebSocket client handle.
///
/// Each accepted [`connect`](Self::connect) spawns one task that opens the
/// stream, performs the handshake and runs the read loop, plus one writer
/// task that owns the write half. Results are reported on the
/// [`EventReceiver`] returned by [`Client::new`]; no method on this type
/// returns an error.
///
/// Cloning yields another handle to the same connection. Dropping the last
/// handle disconnects.
///
/// Must be used within a Tokio runtime.
#[derive(Clone)]
pub struct Client {
    shared: Arc<Shared>,
    _guard: Arc<DropGuard>,
}

struct DropGuard(Arc<Shared>);

impl Drop for DropGuard {
    fn drop(&mut self) {
        self.0.teardown(None, false);
    }
}

impl Client {
    /// Create a disconnected client and the receiver for its events.
    #[must_use]
    pub fn new(config: ClientConfig) -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::new(config, tx));
        let client = Self {
            _guard: Arc::new(DropGuard(shared.clone())),
            shared,
        };
        (client, rx)
    }

    /// Connect to a `ws://` endpoint over TCP.
    ///
    /// Returns immediately. Ignored with a warning while another connection
    /// is connecting or open. `wss://` endpoints use port 443 but no TLS.
    ///
    /// Emits `Connected` once the upgrade completes, or `Error` followed by
    /// `Disconnected` if the URI, the TCP connect or the handshake fails.
    pub fn connect(&self, uri: &str) {
        let Some((id, shutdown)) = self.shared.begin() else {
            warn!(uri, "connect ignored: already connecting or connected");
            return;
        };

        let endpoint = match Endpoint::parse(uri) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                warn!(error = %e, uri, "invalid endpoint");
                self.shared.emit_for(id, ClientEvent::Error(e));
                self.shared.teardown(Some(id), false);
                return;
            }
        };
        if endpoint.is_secure() {
            warn!(endpoint = %endpoint, "wss endpoint: connecting without TLS");
        }

        info!(endpoint = %endpoint, "connecting");
        let (host, port) = endpoint.socket_addr();
        let open = async move {
            TcpStream::connect((host.as_str(), port))
                .await
                .map_err(|e| Error::ConnectFailed(format!("{host}:{port}: {e}")))
        };
        tokio::spawn(session::run(
            self.shared.clone(),
            id,
            endpoint,
            open,
            shutdown,
        ));
    }

    /// Run a session over an already-open stream.
    ///
    /// Behaves like [`connect`](Self::connect) from the handshake on; the
    /// endpoint supplies the request target and `Host`/`Origin` headers.
    pub fn connect_with<S>(&self, endpoint: Endpoint, stream: S)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let Some((id, shutdown)) = self.shared.begin() else {
            warn!(endpoint = %endpoint, "connect ignored: already connecting or connected");
            return;
        };
        info!(endpoint = %endpoint, "connecting over supplied stream");
        tokio::spawn(session::run(
            self.shared.clone(),
            id,
            endpoint,
            async move { Ok::<_, Error>(stream) },
            shutdown,
        ));
    }

    /// Queue `text` as a single text frame.
    ///
    /// Without an open connection the message is dropped with a warning. A
    /// message larger than the frame limit is rejected with an `Error` event
    /// and the connection stays open.
    pub fn send(&self, text: impl Into<String>) {
        let text = text.into();
        let Some(writer) = self.shared.writer() else {
            warn!(len = text.len(), "send ignored: not connected");
            return;
        };
        if let Err(e) = self.shared.config.limits.check_payload_size(text.len()) {
            warn!(error = %e, "send rejected");
            self.shared.emit(ClientEvent::Error(e));
            return;
        }
        debug!(len = text.len(), "queueing message");
        if writer.send(WriterCommand::Frame(Frame::text(text))).is_err() {
            debug!("writer stopped before message was queued");
        }
    }

    /// Close the connection.
    ///
    /// Sends a best-effort close frame, drops the stream and emits
    /// `Disconnected`. Calling it again, or without a connection, does
    /// nothing.
    pub fn disconnect(&self) {
        if self.shared.teardown(None, false) {
            info!("disconnected");
        }
    }

    /// Whether messages can be sent right now.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.writer().is_some()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
