//! WebSocket protocol core (RFC 6455 subset): framing, masking, handshake.

pub mod frame;
pub mod handshake;
pub mod mask;
pub mod opcode;

pub use frame::{Frame, FrameHeader};
pub use handshake::{HandshakeRequest, HandshakeResponse, WS_GUID, compute_accept_key};
pub use mask::{apply_mask, generate_mask};
pub use opcode::OpCode;
