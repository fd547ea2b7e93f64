use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::protocol::handshake::find_head_end;
use crate::protocol::{Frame, FrameHeader};

/// Bytes of each frame shown in trace-level dumps.
const HEX_DUMP_LIMIT: usize = 50;

pub(crate) fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .iter()
        .take(HEX_DUMP_LIMIT)
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Read half: turns a byte stream into frames.
///
/// Bytes are accumulated until a whole frame is buffered, so a frame split
/// across reads, or several frames delivered by one read, decode the same way.
/// Frames the client cannot represent are stepped over in full and reported
/// as recoverable errors.
pub struct FrameReader<R> {
    io: R,
    read_buf: BytesMut,
    chunk: usize,
    limits: Limits,
    discard: u64,
}

impl<R> FrameReader<R> {
    #[must_use]
    pub fn new(io: R, read_buffer_size: usize, limits: Limits) -> Self {
        Self {
            io,
            read_buf: BytesMut::with_capacity(read_buffer_size),
            chunk: read_buffer_size,
            limits,
            discard: 0,
        }
    }

    /// Bytes received but not yet consumed.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.read_buf.len()
    }

    #[must_use]
    pub fn into_inner(self) -> R {
        self.io
    }
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    async fn fill(&mut self) -> Result<()> {
        self.read_buf.reserve(self.chunk);
        let n = self.io.read_buf(&mut self.read_buf).await?;
        trace!(bytes = n, "read from stream");
        if n == 0 {
            return Err(Error::ConnectionClosed);
        }
        Ok(())
    }

    /// Read the upgrade response head, up to and including the blank line.
    ///
    /// Anything the server sent after the head stays buffered for
    /// [`read_frame`](Self::read_frame).
    ///
    /// # Errors
    ///
    /// - [`Error::HandshakeTooLarge`] if no blank line arrives within the limit
    /// - [`Error::ConnectionClosed`] on end of stream
    /// - [`Error::Io`] on read failure
    pub async fn read_head(&mut self) -> Result<Vec<u8>> {
        loop {
            if let Some(end) = find_head_end(&self.read_buf) {
                self.limits.check_handshake_size(end)?;
                return Ok(self.read_buf.split_to(end).to_vec());
            }
            self.limits.check_handshake_size(self.read_buf.len())?;
            self.fill().await?;
        }
    }

    /// Read the next frame.
    ///
    /// # Errors
    ///
    /// Recoverable (see [`Error::is_recoverable`]), with the frame skipped:
    /// - [`Error::UnsupportedLength`] for the 64-bit length form
    /// - [`Error::PayloadTooLarge`] above `limits.max_frame_payload`
    /// - [`Error::ReservedOpcode`] for undefined opcodes
    ///
    /// Fatal: [`Error::ConnectionClosed`] on end of stream, [`Error::Io`] on
    /// read failure.
    pub async fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if self.discard > 0 {
                let n = self.discard.min(self.read_buf.len() as u64);
                self.read_buf.advance(n as usize);
                self.discard -= n;
                if self.discard > 0 {
                    self.fill().await?;
                    continue;
                }
            }

            match FrameHeader::parse(&self.read_buf) {
                Ok(header) => {
                    if let Some(err) = self.oversized(&header) {
                        trace!(raw = %hex_dump(&self.read_buf), "skipping frame");
                        self.discard = header.frame_len();
                        return Err(err);
                    }
                    match Frame::parse(&self.read_buf) {
                        Ok((frame, consumed)) => {
                            trace!(
                                raw = %hex_dump(&self.read_buf[..consumed]),
                                fin = frame.fin,
                                opcode = %frame.opcode,
                                "decoded frame"
                            );
                            self.read_buf.advance(consumed);
                            return Ok(frame);
                        }
                        Err(Error::IncompleteFrame { .. }) => {}
                        Err(err @ Error::ReservedOpcode(_)) => {
                            self.discard = header.frame_len();
                            return Err(err);
                        }
                        Err(e) => return Err(e),
                    }
                }
                Err(Error::IncompleteFrame { .. }) => {}
                Err(e) => return Err(e),
            }

            self.fill().await?;
        }
    }

    fn oversized(&self, header: &FrameHeader) -> Option<Error> {
        if header.long_form {
            Some(Error::UnsupportedLength(header.payload_len))
        } else if header.payload_len > self.limits.max_frame_payload as u64 {
            Some(Error::PayloadTooLarge {
                size: header.payload_len as usize,
                max: self.limits.max_frame_payload,
            })
        } else {
            None
        }
    }
}

/// Write half: masks and writes frames.
pub struct FrameWriter<W> {
    io: W,
}

impl<W> FrameWriter<W> {
    #[must_use]
    pub fn new(io: W) -> Self {
        Self { io }
    }

    #[must_use]
    pub fn into_inner(self) -> W {
        self.io
    }
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Write raw bytes (the upgrade request) and flush.
    pub async fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.io.write_all(bytes).await?;
        self.io.flush().await?;
        Ok(())
    }

    /// Encode `frame` with a fresh masking key, write it and flush.
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let wire = frame.encode()?;
        self.io.write_all(&wire).await?;
        self.io.flush().await?;
        trace!(raw = %hex_dump(&wire), opcode = %frame.opcode, "sent frame");
        Ok(())
    }

    /// Shut down the write direction of the stream.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.io.shutdown().await?;
        Ok(())
    }
}
