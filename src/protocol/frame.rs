//! Frame parsing and serialization (RFC 6455 Section 5.2).
//!
//! Only the 7-bit and 16-bit length forms are supported in either direction.
//! A frame that announces the 64-bit form is reported as
//! [`Error::UnsupportedLength`] once its header is complete, which lets the
//! reader step over it without losing frame alignment.

use crate::close::{CloseCode, CloseFrame};
use crate::error::{Error, Result};
use crate::protocol::OpCode;
use crate::protocol::mask::{apply_mask, generate_mask};

/// Maximum payload size for control frames.
pub const MAX_CONTROL_FRAME_PAYLOAD: usize = 125;

/// Largest payload expressible without the 64-bit length form.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// Decoded fixed part of a frame: everything before the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Final fragment flag.
    pub fin: bool,
    /// Raw opcode nibble; may be a reserved value.
    pub opcode: u8,
    /// Masking key, if the mask bit was set.
    pub mask: Option<[u8; 4]>,
    /// Declared payload length.
    pub payload_len: u64,
    /// Whether the 64-bit length form (marker 127) was used.
    pub long_form: bool,
    /// Bytes occupied by the header including any masking key.
    pub header_len: usize,
}

impl FrameHeader {
    /// Parse a header from the start of `buf`.
    ///
    /// # Errors
    ///
    /// [`Error::IncompleteFrame`] if `buf` ends before the header does.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 2 {
            return Err(Error::IncompleteFrame {
                needed: 2 - buf.len(),
            });
        }

        let byte0 = buf[0];
        let byte1 = buf[1];
        let masked = byte1 & 0x80 != 0;

        let (payload_len, len_size, long_form) = match byte1 & 0x7F {
            126 => {
                if buf.len() < 4 {
                    return Err(Error::IncompleteFrame {
                        needed: 4 - buf.len(),
                    });
                }
                (u64::from(u16::from_be_bytes([buf[2], buf[3]])), 2, false)
            }
            127 => {
                if buf.len() < 10 {
                    return Err(Error::IncompleteFrame {
                        needed: 10 - buf.len(),
                    });
                }
                let mut len = [0u8; 8];
                len.copy_from_slice(&buf[2..10]);
                (u64::from_be_bytes(len), 8, true)
            }
            short => (u64::from(short), 0, false),
        };

        let mask_offset = 2 + len_size;
        let header_len = if masked { mask_offset + 4 } else { mask_offset };
        if buf.len() < header_len {
            return Err(Error::IncompleteFrame {
                needed: header_len - buf.len(),
            });
        }

        let mask = masked.then(|| {
            [
                buf[mask_offset],
                buf[mask_offset + 1],
                buf[mask_offset + 2],
                buf[mask_offset + 3],
            ]
        });

        Ok(Self {
            fin: byte0 & 0x80 != 0,
            opcode: byte0 & 0x0F,
            mask,
            payload_len,
            long_form,
            header_len,
        })
    }

    /// Header plus payload, saturating on absurd 64-bit lengths.
    #[must_use]
    pub fn frame_len(&self) -> u64 {
        (self.header_len as u64).saturating_add(self.payload_len)
    }
}

/// A single WebSocket frame.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
/// |I|S|S|S|  (4)  |A|     (7)     |        (16, if len==126)      |
/// |N|V|V|V|       |S|             |                               |
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |                Masking key (client -> server only)            |
/// +---------------------------------------------------------------+
/// |                          Payload data                         |
/// +---------------------------------------------------------------+
/// ```
///
/// The payload held by a `Frame` is always unmasked; `masked` records whether
/// the wire form carried a masking key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag.
    pub fin: bool,
    /// Frame opcode.
    pub opcode: OpCode,
    /// Whether the frame was masked on the wire.
    pub masked: bool,
    payload: Vec<u8>,
}

impl Frame {
    #[must_use]
    pub fn new(fin: bool, opcode: OpCode, payload: Vec<u8>) -> Self {
        Self {
            fin,
            opcode,
            masked: false,
            payload,
        }
    }

    /// Create a text frame.
    #[must_use]
    pub fn text(data: impl Into<String>) -> Self {
        Self::new(true, OpCode::Text, data.into().into_bytes())
    }

    /// Create a close frame with optional status code and reason.
    #[must_use]
    pub fn close(code: Option<CloseCode>, reason: &str) -> Self {
        let payload = match code {
            Some(code) => {
                let mut data = code.as_u16().to_be_bytes().to_vec();
                data.extend_from_slice(reason.as_bytes());
                data
            }
            None => Vec::new(),
        };
        Self::new(true, OpCode::Close, payload)
    }

    /// Create a ping frame.
    #[must_use]
    pub fn ping(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Ping, data.into())
    }

    /// Create a pong frame.
    #[must_use]
    pub fn pong(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Pong, data.into())
    }

    /// Get the (unmasked) payload bytes.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Take ownership of the payload.
    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Interpret the payload of a close frame.
    ///
    /// The first two bytes are the big-endian status code and the remainder a
    /// UTF-8 reason. An empty payload yields `None`; a one-byte payload or a
    /// reason that is not UTF-8 is reported as a protocol error close.
    #[must_use]
    pub fn close_frame(&self) -> Option<CloseFrame> {
        let payload = self.payload();
        match payload.len() {
            0 => None,
            1 => Some(CloseFrame::new(
                CloseCode::ProtocolError,
                "Invalid close frame",
            )),
            _ => {
                let code = CloseCode::from_u16(u16::from_be_bytes([payload[0], payload[1]]));
                match std::str::from_utf8(&payload[2..]) {
                    Ok(reason) => Some(CloseFrame::new(code, reason)),
                    Err(_) => Some(CloseFrame::new(CloseCode::InvalidPayload, "")),
                }
            }
        }
    }

    /// Parse one frame from the start of `buf`, unmasking the payload if the
    /// mask bit is set.
    ///
    /// Returns the frame and the number of bytes consumed.
    ///
    /// # Errors
    ///
    /// - [`Error::IncompleteFrame`] if `buf` holds less than a whole frame
    /// - [`Error::UnsupportedLength`] if the 64-bit length form is used
    /// - [`Error::ReservedOpcode`] if the opcode is not defined
    pub fn parse(buf: &[u8]) -> Result<(Self, usize)> {
        let header = FrameHeader::parse(buf)?;
        if header.long_form {
            return Err(Error::UnsupportedLength(header.payload_len));
        }

        // Bounded by MAX_PAYLOAD_LEN + 8, no overflow possible.
        let total = header.header_len + header.payload_len as usize;
        if buf.len() < total {
            return Err(Error::IncompleteFrame {
                needed: total - buf.len(),
            });
        }

        let opcode = OpCode::try_from(header.opcode)?;

        let mut payload = buf[header.header_len..total].to_vec();
        if let Some(mask) = header.mask {
            apply_mask(&mut payload, mask);
        }

        let frame = Frame {
            fin: header.fin,
            opcode,
            masked: header.mask.is_some(),
            payload,
        };
        Ok((frame, total))
    }

    /// Check that a control frame is unfragmented and within 125 bytes.
    ///
    /// # Errors
    ///
    /// [`Error::ProtocolViolation`] describing the offending property.
    pub fn validate(&self) -> Result<()> {
        if self.opcode.is_control() {
            if !self.fin {
                return Err(Error::ProtocolViolation(format!(
                    "fragmented {} frame",
                    self.opcode
                )));
            }
            if self.payload.len() > MAX_CONTROL_FRAME_PAYLOAD {
                return Err(Error::ProtocolViolation(format!(
                    "{} payload of {} bytes exceeds {}",
                    self.opcode,
                    self.payload.len(),
                    MAX_CONTROL_FRAME_PAYLOAD
                )));
            }
        }
        Ok(())
    }

    /// Size of the masked wire encoding.
    #[must_use]
    pub fn wire_size(&self) -> usize {
        let len = self.payload.len();
        let ext = if len <= 125 { 0 } else { 2 };
        2 + ext + 4 + len
    }

    /// Serialize the frame masked with `mask`.
    ///
    /// # Errors
    ///
    /// [`Error::PayloadTooLarge`] if the payload exceeds 65535 bytes.
    pub fn encode_with_mask(&self, mask: [u8; 4]) -> Result<Vec<u8>> {
        let len = self.payload.len();
        if len > MAX_PAYLOAD_LEN {
            return Err(Error::PayloadTooLarge {
                size: len,
                max: MAX_PAYLOAD_LEN,
            });
        }

        let mut buf = Vec::with_capacity(self.wire_size());
        let fin_bit = if self.fin { 0x80 } else { 0x00 };
        buf.push(fin_bit | self.opcode.as_u8());

        if len <= 125 {
            buf.push(0x80 | len as u8);
        } else {
            buf.push(0x80 | 126);
            buf.extend_from_slice(&(len as u16).to_be_bytes());
        }

        buf.extend_from_slice(&mask);
        let start = buf.len();
        buf.extend_from_slice(&self.payload);
        apply_mask(&mut buf[start..], mask);
        Ok(buf)
    }

    /// Serialize the frame masked with a freshly generated key.
    ///
    /// # Errors
    ///
    /// [`Error::PayloadTooLarge`] for oversized payloads, [`Error::Io`] if no
    /// entropy is available.
    pub fn encode(&self) -> Result<Vec<u8>> {
        // Check size before drawing a key so oversize frames don't consume entropy.
        if self.payload.len() > MAX_PAYLOAD_LEN {
            return Err(Error::PayloadTooLarge {
                size: self.payload.len(),
                max: MAX_PAYLOAD_LEN,
            });
        }
        self.encode_with_mask(generate_mask()?)
    }
}
