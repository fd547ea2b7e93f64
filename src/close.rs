//! Close status codes (RFC 6455 Section 7.4).

/// Status code carried in the first two bytes of a close frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CloseCode {
    /// 1000
    #[default]
    Normal,
    /// 1001
    GoingAway,
    /// 1002
    ProtocolError,
    /// 1003
    UnsupportedData,
    /// 1007
    InvalidPayload,
    /// 1008
    PolicyViolation,
    /// 1009
    MessageTooBig,
    /// 1010
    MandatoryExtension,
    /// 1011
    InternalError,
    /// Any other value, kept verbatim.
    Other(u16),
}

impl CloseCode {
    #[must_use]
    pub const fn from_u16(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::GoingAway,
            1002 => CloseCode::ProtocolError,
            1003 => CloseCode::UnsupportedData,
            1007 => CloseCode::InvalidPayload,
            1008 => CloseCode::PolicyViolation,
            1009 => CloseCode::MessageTooBig,
            1010 => CloseCode::MandatoryExtension,
            1011 => CloseCode::InternalError,
            other => CloseCode::Other(other),
        }
    }

    #[must_use]
    pub const fn as_u16(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::GoingAway => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::UnsupportedData => 1003,
            CloseCode::InvalidPayload => 1007,
            CloseCode::PolicyViolation => 1008,
            CloseCode::MessageTooBig => 1009,
            CloseCode::MandatoryExtension => 1010,
            CloseCode::InternalError => 1011,
            CloseCode::Other(code) => *code,
        }
    }

    /// Human-readable name used in close logs.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            CloseCode::Normal => "Normal Closure",
            CloseCode::GoingAway => "Going Away",
            CloseCode::ProtocolError => "Protocol Error",
            CloseCode::UnsupportedData => "Unsupported Data",
            CloseCode::InvalidPayload => "Invalid frame payload data",
            CloseCode::PolicyViolation => "Policy Violation",
            CloseCode::MessageTooBig => "Message Too Big",
            CloseCode::MandatoryExtension => "Mandatory Extension",
            CloseCode::InternalError => "Internal Server Error",
            CloseCode::Other(_) => "Unknown",
        }
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.as_u16(), self.description())
    }
}

/// Decoded close frame payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    /// The close status code.
    pub code: CloseCode,
    /// Reason text; may be empty.
    pub reason: String,
}

impl CloseFrame {
    #[must_use]
    pub fn new(code: CloseCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes_roundtrip() {
        for code in [1000, 1001, 1002, 1003, 1007, 1008, 1009, 1010, 1011] {
            let parsed = CloseCode::from_u16(code);
            assert!(!matches!(parsed, CloseCode::Other(_)), "{code}");
            assert_eq!(parsed.as_u16(), code);
        }
    }

    #[test]
    fn test_unknown_code_preserved() {
        let code = CloseCode::from_u16(4000);
        assert_eq!(code, CloseCode::Other(4000));
        assert_eq!(code.as_u16(), 4000);
        assert_eq!(code.description(), "Unknown");
    }

    #[test]
    fn test_display() {
        assert_eq!(CloseCode::Normal.to_string(), "1000 (Normal Closure)");
        assert_eq!(
            CloseCode::InternalError.to_string(),
            "1011 (Internal Server Error)"
        );
    }
}
