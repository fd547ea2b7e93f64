//! Events delivered to the application.

use tokio::sync::mpsc;

use crate::error::Error;

/// Receiving end of a client's event channel.
pub type EventReceiver = mpsc::UnboundedReceiver<ClientEvent>;

/// Something that happened on the connection.
///
/// Events arrive on one channel in the order they were produced, whether they
/// came from the read loop or the writer. For each accepted `connect()` the
/// sequence ends with exactly one `Disconnected`; nothing for that connection
/// follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// The upgrade handshake succeeded.
    Connected,
    /// A text message arrived.
    Message(String),
    /// The connection is gone.
    Disconnected,
    /// Something failed; a `Disconnected` usually follows.
    Error(Error),
}
