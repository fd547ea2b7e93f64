//! Connection task: opens the stream, performs the upgrade handshake and runs
//! the read loop until the session ends.

use std::future::Future;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::close::CloseFrame;
use crate::codec::{FrameReader, FrameWriter, hex_dump};
use crate::connection::event::ClientEvent;
use crate::connection::shared::{Shared, WriterHandle, WriterTx};
use crate::connection::writer::{self, WriterCommand};
use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::protocol::{Frame, HandshakeRequest, HandshakeResponse, OpCode};

type Halves<S> = (FrameReader<ReadHalf<S>>, FrameWriter<WriteHalf<S>>);

/// What the read loop should do with a decoded frame.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Action {
    /// Hand the text to the application.
    Deliver(String),
    /// Queue a frame for the writer.
    Reply(Frame),
    /// The server closed the connection.
    Close(Option<CloseFrame>),
    Ignore,
}

enum Outcome {
    PeerClosed,
    Failed(Error),
}

/// Drive session `id` from connect to teardown.
///
/// `open` produces the byte stream. Dropping the session's shutdown handle
/// cancels the task wherever it is.
pub(crate) async fn run<S, F>(
    shared: Arc<Shared>,
    id: u64,
    endpoint: Endpoint,
    open: F,
    mut shutdown: oneshot::Receiver<()>,
) where
    S: AsyncRead + AsyncWrite + Send + 'static,
    F: Future<Output = Result<S>>,
{
    let established = tokio::select! {
        res = establish(&shared, &endpoint, open) => res,
        _ = &mut shutdown => {
            debug!(session = id, "connect cancelled");
            return;
        }
    };

    let (mut reader, writer) = match established {
        Ok(halves) => halves,
        Err(e) => {
            warn!(error = %e, endpoint = %endpoint, "connection failed");
            shared.emit_for(id, ClientEvent::Error(e));
            shared.teardown(Some(id), false);
            return;
        }
    };

    let (tx, rx) = mpsc::unbounded_channel();
    let (stop_tx, stop_rx) = oneshot::channel();
    tokio::spawn(writer::run(writer, rx, stop_rx, shared.clone(), id));
    let handle = WriterHandle {
        tx: tx.clone(),
        _stop: stop_tx,
    };
    if !shared.open(id, handle) {
        return;
    }
    info!(endpoint = %endpoint, "connected");

    if let Some(message) = &shared.config.initial_message {
        debug!(len = message.len(), "sending initial message");
        if tx.send(WriterCommand::Frame(Frame::text(message.clone()))).is_err() {
            debug!("writer gone, initial message dropped");
        }
    }

    let outcome = tokio::select! {
        outcome = read_loop(&mut reader, &shared, id, &tx) => outcome,
        _ = &mut shutdown => {
            debug!(session = id, "read loop cancelled");
            return;
        }
    };

    match outcome {
        Outcome::PeerClosed => {
            shared.teardown(Some(id), true);
        }
        Outcome::Failed(e) => {
            warn!(error = %e, "read loop stopped");
            shared.emit_for(id, ClientEvent::Error(e));
            shared.teardown(Some(id), false);
        }
    }
}

async fn establish<S, F>(shared: &Shared, endpoint: &Endpoint, open: F) -> Result<Halves<S>>
where
    S: AsyncRead + AsyncWrite,
    F: Future<Output = Result<S>>,
{
    let stream = open.await?;
    let (read_half, write_half) = tokio::io::split(stream);
    let config = &shared.config;
    let mut reader = FrameReader::new(read_half, config.read_buffer_size, config.limits.clone());
    let mut writer = FrameWriter::new(write_half);

    let request = HandshakeRequest::new(endpoint, config.origin.as_deref())?;
    let mut head = Vec::with_capacity(256);
    request.write(&mut head);
    debug!(path = %request.target, host = %request.host, "sending upgrade request");
    writer
        .write_raw(&head)
        .await
        .map_err(|e| Error::HandshakeFailed(format!("writing upgrade request: {e}")))?;

    let head = reader.read_head().await.map_err(|e| match e {
        Error::HandshakeTooLarge { .. } => e,
        other => Error::HandshakeFailed(format!("reading upgrade response: {other}")),
    })?;
    let response = HandshakeResponse::parse(&head)?;
    debug!(status = response.status, reason = %response.reason, "upgrade response");
    response.validate(&request, config.verify_accept)?;

    Ok((reader, writer))
}

async fn read_loop<R>(
    reader: &mut FrameReader<R>,
    shared: &Shared,
    id: u64,
    writer: &WriterTx,
) -> Outcome
where
    R: AsyncRead + Unpin,
{
    loop {
        let frame = match reader.read_frame().await {
            Ok(frame) => frame,
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "skipping frame");
                continue;
            }
            Err(Error::ConnectionClosed) => {
                return Outcome::Failed(Error::ReadFailed("end of stream".into()));
            }
            Err(e) => return Outcome::Failed(Error::ReadFailed(e.to_string())),
        };

        // Whole frame already consumed, so skipping keeps framing intact.
        if let Err(e) = frame.validate() {
            warn!(error = %e, raw = %hex_dump(frame.payload()), "skipping frame");
            continue;
        }

        match dispatch(frame) {
            Action::Deliver(text) => shared.emit_for(id, ClientEvent::Message(text)),
            Action::Reply(frame) => {
                if writer.send(WriterCommand::Frame(frame)).is_err() {
                    debug!("writer gone, reply dropped");
                }
            }
            Action::Close(_) => return Outcome::PeerClosed,
            Action::Ignore => {}
        }
    }
}

/// Decide what to do with one decoded frame.
///
/// Expects a frame that already passed [`Frame::validate`].
pub(crate) fn dispatch(frame: Frame) -> Action {
    match frame.opcode {
        OpCode::Close => {
            let close = frame.close_frame();
            match &close {
                Some(c) => info!(code = %c.code, reason = %c.reason, "server closed connection"),
                None => info!("server closed connection without status"),
            }
            Action::Close(close)
        }
        OpCode::Ping => {
            debug!(len = frame.payload().len(), "ping");
            Action::Reply(Frame::pong(frame.into_payload()))
        }
        OpCode::Pong => {
            debug!(len = frame.payload().len(), "pong");
            Action::Ignore
        }
        OpCode::Text if !frame.fin => {
            warn!("fragmented text message ignored");
            Action::Ignore
        }
        OpCode::Text => match String::from_utf8(frame.into_payload()) {
            Ok(text) => Action::Deliver(text),
            Err(e) => {
                warn!(
                    error = %Error::InvalidUtf8,
                    raw = %hex_dump(e.as_bytes()),
                    "dropping text frame"
                );
                Action::Ignore
            }
        },
        other => {
            debug!(opcode = %other, len = frame.payload().len(), "ignoring frame");
            Action::Ignore
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::close::CloseCode;
    use crate::config::{ClientConfig, Limits};
    use std::io::Cursor;

    fn wire(first: u8, payload: &[u8]) -> Vec<u8> {
        let mut buf = vec![first];
        if payload.len() <= 125 {
            buf.push(payload.len() as u8);
        } else {
            buf.push(126);
            buf.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        }
        buf.extend_from_slice(payload);
        buf
    }

    fn session() -> (Shared, u64, EventsRx, oneshot::Receiver<()>) {
        let (events_tx, events) = mpsc::unbounded_channel();
        let shared = Shared::new(ClientConfig::default(), events_tx);
        let (id, shutdown) = shared.begin().unwrap();
        (shared, id, events, shutdown)
    }

    type EventsRx = mpsc::UnboundedReceiver<ClientEvent>;

    #[tokio::test]
    async fn test_read_loop_skips_invalid_control_frames() {
        let mut oversized_close = vec![0x03, 0xE8];
        oversized_close.extend(std::iter::repeat_n(b'x', 128));

        let mut data = wire(0x09, b"frag");
        data.extend(wire(0x88, &oversized_close));
        data.extend(wire(0x89, b"ok"));
        data.extend(wire(0x81, b"after"));
        let mut reader = FrameReader::new(Cursor::new(data), 64, Limits::default());

        let (shared, id, mut events, _shutdown) = session();
        let (tx, mut writer_rx) = mpsc::unbounded_channel();

        let outcome = read_loop(&mut reader, &shared, id, &tx).await;
        assert!(matches!(outcome, Outcome::Failed(Error::ReadFailed(_))));

        assert_eq!(events.try_recv().unwrap(), ClientEvent::Message("after".into()));
        assert!(events.try_recv().is_err());
        match writer_rx.try_recv().unwrap() {
            WriterCommand::Frame(frame) => assert_eq!(frame, Frame::pong(b"ok".to_vec())),
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(writer_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_read_loop_stops_at_close() {
        let mut close = vec![0x03, 0xE8];
        close.extend_from_slice(b"bye");
        let mut data = wire(0x88, &close);
        data.extend(wire(0x81, b"late"));
        let mut reader = FrameReader::new(Cursor::new(data), 64, Limits::default());

        let (shared, id, mut events, _shutdown) = session();
        let (tx, _writer_rx) = mpsc::unbounded_channel();

        let outcome = read_loop(&mut reader, &shared, id, &tx).await;
        assert!(matches!(outcome, Outcome::PeerClosed));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_text_delivered() {
        assert_eq!(
            dispatch(Frame::text("hello")),
            Action::Deliver("hello".into())
        );
    }

    #[test]
    fn test_ping_echoed_as_pong() {
        assert_eq!(
            dispatch(Frame::ping(b"abc".to_vec())),
            Action::Reply(Frame::pong(b"abc".to_vec()))
        );
    }

    #[test]
    fn test_pong_ignored() {
        assert_eq!(dispatch(Frame::pong(b"x".to_vec())), Action::Ignore);
    }

    #[test]
    fn test_close_carries_code_and_reason() {
        assert_eq!(
            dispatch(Frame::close(Some(CloseCode::Normal), "bye")),
            Action::Close(Some(CloseFrame::new(CloseCode::Normal, "bye")))
        );
        assert_eq!(dispatch(Frame::close(None, "")), Action::Close(None));
    }

    #[test]
    fn test_binary_and_continuation_ignored() {
        assert_eq!(
            dispatch(Frame::new(true, OpCode::Binary, vec![1, 2, 3])),
            Action::Ignore
        );
        assert_eq!(
            dispatch(Frame::new(true, OpCode::Continuation, b"tail".to_vec())),
            Action::Ignore
        );
    }

    #[test]
    fn test_fragmented_text_ignored() {
        assert_eq!(
            dispatch(Frame::new(false, OpCode::Text, b"part".to_vec())),
            Action::Ignore
        );
    }

    #[test]
    fn test_invalid_utf8_ignored() {
        assert_eq!(
            dispatch(Frame::new(true, OpCode::Text, vec![0xff, 0xfe])),
            Action::Ignore
        );
    }
}
