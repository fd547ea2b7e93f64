//! Frame-level I/O over async streams.
//!
//! The two halves are independent so the read loop and the writer task can
//! each own one side of a split stream.

mod framed;

pub(crate) use framed::hex_dump;
pub use framed::{FrameReader, FrameWriter};
