//! Client configuration and limits.

use crate::protocol::frame::MAX_PAYLOAD_LEN;

/// Resource limits applied while talking to a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum size of the upgrade response, headers included.
    ///
    /// Default: 8 KB (8192)
    pub max_handshake_size: usize,

    /// Maximum payload accepted in either direction.
    ///
    /// Capped at 65535 since the 64-bit length form is not supported.
    ///
    /// Default: 65535
    pub max_frame_payload: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_handshake_size: 8192,
            max_frame_payload: MAX_PAYLOAD_LEN,
        }
    }
}

impl Limits {
    /// Create new limits, clamping the payload limit to 65535.
    #[must_use]
    pub const fn new(max_handshake_size: usize, max_frame_payload: usize) -> Self {
        let max_frame_payload = if max_frame_payload > MAX_PAYLOAD_LEN {
            MAX_PAYLOAD_LEN
        } else {
            max_frame_payload
        };
        Self {
            max_handshake_size,
            max_frame_payload,
        }
    }

    /// Validate that handshake size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HandshakeTooLarge`](crate::Error::HandshakeTooLarge) if `size` exceeds the configured maximum.
    pub const fn check_handshake_size(&self, size: usize) -> Result<(), crate::Error> {
        if size > self.max_handshake_size {
            Err(crate::Error::HandshakeTooLarge {
                size,
                max: self.max_handshake_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate that a payload fits the configured maximum.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PayloadTooLarge`](crate::Error::PayloadTooLarge) if `size` exceeds the configured maximum.
    pub const fn check_payload_size(&self, size: usize) -> Result<(), crate::Error> {
        if size > self.max_frame_payload {
            Err(crate::Error::PayloadTooLarge {
                size,
                max: self.max_frame_payload,
            })
        } else {
            Ok(())
        }
    }
}

/// WebSocket client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Resource limits.
    pub limits: Limits,

    /// Bytes requested from the stream per read.
    ///
    /// Default: 4 KB (4096)
    pub read_buffer_size: usize,

    /// Text message sent right after the connection opens.
    ///
    /// Default: None
    pub initial_message: Option<String>,

    /// Value of the `Origin` request header.
    ///
    /// If `None`, `http://<host>` is sent.
    /// Default: None
    pub origin: Option<String>,

    /// Check `Sec-WebSocket-Accept`, `Upgrade` and `Connection` in the
    /// upgrade response.
    ///
    /// When `false` only the `101` status is required.
    /// Default: true
    pub verify_accept: bool,

    /// Send a close frame before dropping the stream on disconnect.
    ///
    /// Default: true
    pub close_on_disconnect: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            read_buffer_size: 4096,
            initial_message: None,
            origin: None,
            verify_accept: true,
            close_on_disconnect: true,
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept any `101` response without checking the upgrade headers.
    #[must_use]
    pub fn lenient() -> Self {
        Self {
            verify_accept: false,
            ..Default::default()
        }
    }

    /// Set custom limits.
    #[must_use]
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set read buffer size.
    #[must_use]
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(16);
        self
    }

    /// Send `message` as soon as the connection opens.
    #[must_use]
    pub fn with_initial_message(mut self, message: impl Into<String>) -> Self {
        self.initial_message = Some(message.into());
        self
    }

    /// Override the `Origin` header.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Check `Upgrade`, `Connection` and `Sec-WebSocket-Accept` in the 101 response.
    #[must_use]
    pub fn with_verify_accept(mut self, verify: bool) -> Self {
        self.verify_accept = verify;
        self
    }

    /// Send a normal close frame before shutting the stream on disconnect.
    #[must_use]
    pub fn with_close_on_disconnect(mut self, send_close: bool) -> Self {
        self.close_on_disconnect = send_close;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_default() {
        let limits = Limits::default();
        assert_eq!(limits.max_handshake_size, 8192);
        assert_eq!(limits.max_frame_payload, 65_535);
    }

    #[test]
    fn test_limits_clamp_payload() {
        let limits = Limits::new(1024, 1 << 20);
        assert_eq!(limits.max_frame_payload, 65_535);
        assert_eq!(Limits::new(1024, 512).max_frame_payload, 512);
    }

    #[test]
    fn test_limits_checks() {
        let limits = Limits::default();
        assert!(limits.check_handshake_size(1024).is_ok());
        assert!(limits.check_handshake_size(10_000).is_err());
        assert!(limits.check_payload_size(65_535).is_ok());
        assert!(limits.check_payload_size(65_536).is_err());
    }

    #[test]
    fn test_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.read_buffer_size, 4096);
        assert!(config.initial_message.is_none());
        assert!(config.origin.is_none());
        assert!(config.verify_accept);
        assert!(config.close_on_disconnect);
    }

    #[test]
    fn test_config_lenient() {
        assert!(!ClientConfig::lenient().verify_accept);
    }

    #[test]
    fn test_config_builder() {
        let config = ClientConfig::new()
            .with_limits(Limits::new(4096, 1024))
            .with_read_buffer_size(1024)
            .with_initial_message(r#"{"type":"hello"}"#)
            .with_origin("http://localhost")
            .with_close_on_disconnect(false);

        assert_eq!(config.limits.max_handshake_size, 4096);
        assert_eq!(config.read_buffer_size, 1024);
        assert_eq!(config.initial_message.as_deref(), Some(r#"{"type":"hello"}"#));
        assert_eq!(config.origin.as_deref(), Some("http://localhost"));
        assert!(!config.close_on_disconnect);
    }
}
