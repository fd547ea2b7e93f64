//! Single writer task: every frame of a session goes through here, so frames
//! from concurrent `send()` calls and read-loop pongs never interleave.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWrite;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::close::CloseCode;
use crate::codec::FrameWriter;
use crate::connection::event::ClientEvent;
use crate::connection::shared::Shared;
use crate::error::Error;
use crate::protocol::Frame;

/// Work queued for the writer task.
#[derive(Debug)]
pub(crate) enum WriterCommand {
    /// Encode and write one frame.
    Frame(Frame),
    /// Optionally send a normal close frame, then shut the stream down.
    Close { send_close_frame: bool },
}

/// Upper bound on the best-effort close frame and stream shutdown.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Drain `commands` into `writer` until a close command arrives, the queue is
/// dropped, a write fails, or `stop` fires.
///
/// `stop` fires when the session is torn down. A queued close command is
/// still honored after that, but a frame write the peer is not draining is
/// abandoned so the stream is released.
pub(crate) async fn run<W>(
    mut writer: FrameWriter<W>,
    mut commands: mpsc::UnboundedReceiver<WriterCommand>,
    mut stop: oneshot::Receiver<()>,
    shared: Arc<Shared>,
    session: u64,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let command = tokio::select! {
            biased;
            command = commands.recv() => match command {
                Some(command) => command,
                None => break,
            },
            _ = &mut stop => {
                debug!(session, "writer stopped by teardown");
                break;
            }
        };

        match command {
            WriterCommand::Frame(frame) => {
                let result = tokio::select! {
                    biased;
                    result = writer.write_frame(&frame) => result,
                    _ = &mut stop => {
                        debug!(session, opcode = %frame.opcode, "write abandoned on teardown");
                        break;
                    }
                };
                if let Err(e) = result {
                    match e {
                        // Nothing was written; the stream is still usable.
                        Error::PayloadTooLarge { .. } => {
                            warn!(error = %e, "dropping outgoing frame");
                            shared.emit_for(session, ClientEvent::Error(e));
                        }
                        _ => {
                            debug!(error = %e, "write failed");
                            let err = Error::SendFailed(e.to_string());
                            shared.emit_for(session, ClientEvent::Error(err));
                            shared.teardown(Some(session), false);
                            break;
                        }
                    }
                }
            }
            WriterCommand::Close { send_close_frame } => {
                close(&mut writer, send_close_frame).await;
                break;
            }
        }
    }
    debug!(session, "writer stopped");
}

async fn close<W: AsyncWrite + Unpin>(writer: &mut FrameWriter<W>, send_close_frame: bool) {
    if send_close_frame {
        let frame = Frame::close(Some(CloseCode::Normal), "");
        match timeout(CLOSE_TIMEOUT, writer.write_frame(&frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "failed to send close frame"),
            Err(_) => {
                debug!("close frame timed out");
                return;
            }
        }
    }
    match timeout(CLOSE_TIMEOUT, writer.shutdown()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "stream shutdown failed"),
        Err(_) => debug!("stream shutdown timed out"),
    }
}
