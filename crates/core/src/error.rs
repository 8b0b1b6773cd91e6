//! Error types for unifying-core.
//!
//! Transport failures, timeouts and protocol errors are kept in separate
//! variants so callers can tell "the channel broke" from "nobody answered"
//! from "the device said no".

use crate::hidpp10::RegisterError;
use crate::hidpp20::FeatureError;
use thiserror::Error;

/// Core library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// The channel write/read/wait primitive failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// No matching message arrived within the timeout budget.
    #[error("timeout: {0}")]
    Timeout(String),

    /// HID++ 1.0 error frame (sub-id 0x8F) answering the request.
    #[error("HID++ 1.0 error 0x{code:02X} ({})", RegisterError::describe(*code))]
    Register { code: u8 },

    /// HID++ 2.0 error frame (feature index 0xFF) answering the request.
    #[error("HID++ 2.0 error 0x{code:02X} ({})", FeatureError::describe(*code))]
    Feature { code: u8 },

    /// Device index outside 1..=6 (or 0xFF where the receiver is allowed).
    #[error("invalid device index: 0x{0:02X}")]
    InvalidDeviceIndex(u8),

    /// Frame could not be decoded or encoded.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// Device speaks a protocol version too old for the operation.
    #[error("unsupported HID++ version {}.{}", *version >> 8, *version & 0xFF)]
    UnsupportedProtocol { version: u16 },

    /// Feature lookup returned index 0.
    #[error("feature 0x{feature:04X} not supported by device")]
    FeatureNotFound { feature: u16 },

    /// No receiver found during enumeration.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// Permission denied opening the hidraw node.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Configuration could not be read or is invalid.
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    /// The embedded HID++ 1.0 error code, if this is a register error.
    pub fn register_code(&self) -> Option<u8> {
        match self {
            Self::Register { code } => Some(*code),
            _ => None,
        }
    }

    /// The embedded HID++ 2.0 error code, if this is a feature error.
    pub fn feature_code(&self) -> Option<u8> {
        match self {
            Self::Feature { code } => Some(*code),
            _ => None,
        }
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_error_display_names_code() {
        let err = Error::Register { code: 0x02 };
        assert_eq!(err.to_string(), "HID++ 1.0 error 0x02 (invalid address)");
        assert_eq!(err.register_code(), Some(0x02));
        assert_eq!(err.feature_code(), None);
    }

    #[test]
    fn feature_error_display_handles_unknown_code() {
        let err = Error::Feature { code: 0x42 };
        assert_eq!(err.to_string(), "HID++ 2.0 error 0x42 (unrecognized)");
    }

    #[test]
    fn unsupported_protocol_display() {
        let err = Error::UnsupportedProtocol { version: 0x0100 };
        assert_eq!(err.to_string(), "unsupported HID++ version 1.0");
    }
}
