//! State shared between the public handle, the session task and the writer.
//!
//! Every state change and every event emission happens under one lock, which
//! is what keeps events for a connection ordered and stops anything from being
//! emitted for a connection after its `Disconnected`.

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::config::ClientConfig;
use crate::connection::event::ClientEvent;
use crate::connection::state::ConnectionState;
use crate::connection::writer::WriterCommand;

pub(crate) type WriterTx = mpsc::UnboundedSender<WriterCommand>;

/// Handle to the live session, dropped on teardown.
struct Session {
    id: u64,
    /// Dropping this wakes the session task out of connect or read.
    _shutdown: oneshot::Sender<()>,
    writer: Option<WriterHandle>,
}

/// Queue into the writer task plus the signal that abandons a stalled write.
pub(crate) struct WriterHandle {
    pub(crate) tx: WriterTx,
    pub(crate) _stop: oneshot::Sender<()>,
}

struct Inner {
    state: ConnectionState,
    session: Option<Session>,
    next_id: u64,
}

pub(crate) struct Shared {
    inner: Mutex<Inner>,
    events: mpsc::UnboundedSender<ClientEvent>,
    pub(crate) config: ClientConfig,
}

impl Shared {
    pub(crate) fn new(config: ClientConfig, events: mpsc::UnboundedSender<ClientEvent>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: ConnectionState::Disconnected,
                session: None,
                next_id: 0,
            }),
            events,
            config,
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    /// Move to `Connecting` and register a new session.
    ///
    /// Returns `None` if a session is already connecting or open.
    pub(crate) fn begin(&self) -> Option<(u64, oneshot::Receiver<()>)> {
        let mut inner = self.inner.lock();
        if inner.state.is_active() {
            return None;
        }
        inner.next_id += 1;
        let id = inner.next_id;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        inner.session = Some(Session {
            id,
            _shutdown: shutdown_tx,
            writer: None,
        });
        inner.state = ConnectionState::Connecting;
        Some((id, shutdown_rx))
    }

    /// Move session `id` to `Open` and emit `Connected`.
    ///
    /// Returns `false` if the session was torn down in the meantime.
    pub(crate) fn open(&self, id: u64, writer: WriterHandle) -> bool {
        let mut inner = self.inner.lock();
        match inner.session.as_mut() {
            Some(session) if session.id == id => {
                session.writer = Some(writer);
                inner.state = ConnectionState::Open;
                let _ = self.events.send(ClientEvent::Connected);
                true
            }
            _ => false,
        }
    }

    /// Writer queue of the open session, if its writer is still alive.
    pub(crate) fn writer(&self) -> Option<WriterTx> {
        let inner = self.inner.lock();
        if !inner.state.can_send() {
            return None;
        }
        inner
            .session
            .as_ref()
            .and_then(|s| s.writer.as_ref())
            .map(|w| &w.tx)
            .filter(|tx| !tx.is_closed())
            .cloned()
    }

    /// Emit `event` only while session `id` is still current.
    pub(crate) fn emit_for(&self, id: u64, event: ClientEvent) {
        let inner = self.inner.lock();
        if inner.session.as_ref().is_some_and(|s| s.id == id) {
            let _ = self.events.send(event);
        }
    }

    /// Emit an event not tied to any session.
    pub(crate) fn emit(&self, event: ClientEvent) {
        let _inner = self.inner.lock();
        let _ = self.events.send(event);
    }

    /// Tear down session `id`, or whichever session exists when `id` is `None`.
    ///
    /// The first caller for a session wins: it queues the close command and
    /// drops the session handle, which cancels the session task and makes the
    /// writer abandon any write the peer is not draining. It then emits
    /// `Disconnected`. Later calls are no-ops.
    pub(crate) fn teardown(&self, id: Option<u64>, closed_by_peer: bool) -> bool {
        let mut inner = self.inner.lock();
        let matches = match (&inner.session, id) {
            (Some(session), Some(id)) => session.id == id,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if !matches {
            return false;
        }

        let Some(session) = inner.session.take() else {
            return false;
        };
        inner.state = if closed_by_peer {
            ConnectionState::Closed
        } else {
            ConnectionState::Disconnected
        };

        if let Some(writer) = &session.writer {
            let _ = writer.tx.send(WriterCommand::Close {
                send_close_frame: self.config.close_on_disconnect,
            });
        }
        debug!(session = session.id, state = %inner.state, "session torn down");
        drop(session);

        let _ = self.events.send(ClientEvent::Disconnected);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared() -> (Shared, mpsc::UnboundedReceiver<ClientEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Shared::new(ClientConfig::default(), tx), rx)
    }

    fn writer_handle() -> (
        WriterHandle,
        mpsc::UnboundedReceiver<WriterCommand>,
        oneshot::Receiver<()>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = WriterHandle {
            tx,
            _stop: stop_tx,
        };
        (handle, rx, stop_rx)
    }

    #[test]
    fn test_begin_rejects_second_session() {
        let (shared, _rx) = shared();
        assert!(shared.begin().is_some());
        assert_eq!(shared.state(), ConnectionState::Connecting);
        assert!(shared.begin().is_none());
    }

    #[test]
    fn test_teardown_once() {
        let (shared, mut rx) = shared();
        let (id, _shutdown) = shared.begin().unwrap();

        assert!(shared.teardown(Some(id), false));
        assert!(!shared.teardown(Some(id), false));
        assert!(!shared.teardown(None, false));

        assert_eq!(rx.try_recv().unwrap(), ClientEvent::Disconnected);
        assert!(rx.try_recv().is_err());
        assert_eq!(shared.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_teardown_signals_shutdown() {
        let (shared, _rx) = shared();
        let (id, mut shutdown) = shared.begin().unwrap();
        assert!(shutdown.try_recv().is_err());
        shared.teardown(Some(id), false);
        assert!(matches!(
            shutdown.try_recv(),
            Err(oneshot::error::TryRecvError::Closed)
        ));
    }

    #[test]
    fn test_stale_session_ignored() {
        let (shared, mut rx) = shared();
        let (old, _s1) = shared.begin().unwrap();
        shared.teardown(Some(old), false);
        let (_new, _s2) = shared.begin().unwrap();
        let _ = rx.try_recv();

        let (handle, _wrx, _stop) = writer_handle();
        assert!(!shared.open(old, handle));
        shared.emit_for(old, ClientEvent::Message("late".into()));
        assert!(!shared.teardown(Some(old), false));
        assert!(rx.try_recv().is_err());
        assert_eq!(shared.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_open_then_peer_close() {
        let (shared, mut rx) = shared();
        let (id, _shutdown) = shared.begin().unwrap();
        let (handle, mut writer_rx, mut stop) = writer_handle();

        assert!(shared.open(id, handle));
        assert_eq!(rx.try_recv().unwrap(), ClientEvent::Connected);
        assert!(shared.writer().is_some());

        shared.teardown(Some(id), true);
        assert_eq!(shared.state(), ConnectionState::Closed);
        assert!(shared.writer().is_none());
        assert!(matches!(
            writer_rx.try_recv().unwrap(),
            WriterCommand::Close {
                send_close_frame: true
            }
        ));
        assert!(matches!(
            stop.try_recv(),
            Err(oneshot::error::TryRecvError::Closed)
        ));
        assert_eq!(rx.try_recv().unwrap(), ClientEvent::Disconnected);
        assert!(shared.begin().is_some());
    }
}
