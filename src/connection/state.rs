//! Client connection state.

/// Lifecycle state of a [`Client`](crate::Client).
///
/// `Disconnected → Connecting → Open → Disconnected`, or `Open → Closed` when
/// the server ends the connection with a close frame. Both `Disconnected` and
/// `Closed` accept a new `connect()`. There is no intermediate closing state:
/// a disconnect is complete from the caller's point of view as soon as it is
/// requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No connection and none in progress.
    #[default]
    Disconnected,
    /// Stream being opened or upgrade handshake in progress.
    Connecting,
    /// Handshake complete; messages can be sent.
    Open,
    /// The server sent a close frame and the connection was torn down.
    ///
    /// Behaves like `Disconnected` in every respect; it only records that the
    /// server initiated the close.
    Closed,
}

impl ConnectionState {
    /// Whether a `connect()` call would be ignored.
    #[must_use]
    #[inline]
    pub const fn is_active(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Open)
    }

    /// Returns `true` only for `Open`.
    #[must_use]
    #[inline]
    pub const fn can_send(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Open => "Open",
            ConnectionState::Closed => "Closed",
        };
        f.write_str(name)
    }
}
