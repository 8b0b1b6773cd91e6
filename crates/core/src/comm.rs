//! Caller-side error classification and whole-operation retry.
//!
//! The protocol layers never retry on their own: a failed exchange or a
//! failed feature enumeration is reported as-is. Callers that want another
//! attempt wrap the complete operation with [`with_retry`].

use crate::error::{Error, Result};
use crate::hidpp10::RegisterError;
use crate::hidpp20::FeatureError;
use tracing::{debug, warn};

/// Maximum retry attempts for transient errors.
pub const MAX_RETRIES: u32 = 3;

/// Classification of communication errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient errors that may succeed on retry (timeout, busy).
    Transient,
    /// The channel itself failed or the receiver is gone.
    Disconnected,
    /// Permission denied opening the hidraw node.
    PermissionDenied,
    /// Device returned an error code.
    Protocol,
    /// Caller passed something the protocol cannot express.
    InvalidRequest,
}

impl ErrorClass {
    /// Classify an error for retry decisions.
    pub fn classify(err: &Error) -> Self {
        match err {
            Error::Timeout(_) => Self::Transient,
            Error::Register { code } if *code == RegisterError::Busy.code() => Self::Transient,
            Error::Feature { code } if *code == FeatureError::Busy.code() => Self::Transient,
            Error::Register { .. }
            | Error::Feature { .. }
            | Error::UnsupportedProtocol { .. }
            | Error::FeatureNotFound { .. } => Self::Protocol,
            Error::Transport(_) | Error::DeviceNotFound(_) => Self::Disconnected,
            Error::PermissionDenied(_) => Self::PermissionDenied,
            Error::InvalidDeviceIndex(_) | Error::MalformedFrame(_) | Error::Config(_) => {
                Self::InvalidRequest
            }
        }
    }

    /// Whether this error class is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient)
    }
}

/// Run `op`, retrying it up to `max_retries` more times on transient errors.
///
/// Returns the first success, or the last error.
pub fn with_retry<T>(max_retries: u32, mut op: impl FnMut() -> Result<T>) -> Result<T> {
    let mut attempt = 0;
    loop {
        match op() {
            Ok(value) => {
                if attempt > 0 {
                    debug!("operation succeeded on attempt {}", attempt + 1);
                }
                return Ok(value);
            }
            Err(e) => {
                let class = ErrorClass::classify(&e);
                if !class.is_retryable() || attempt == max_retries {
                    warn!(
                        "operation failed (class={:?}, attempt={}/{}): {}",
                        class,
                        attempt + 1,
                        max_retries + 1,
                        e
                    );
                    return Err(e);
                }
                debug!(
                    "transient error (attempt {}/{}): {}, retrying...",
                    attempt + 1,
                    max_retries + 1,
                    e
                );
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_timeout_as_transient() {
        let err = Error::Timeout("2000 ms elapsed".into());
        assert_eq!(ErrorClass::classify(&err), ErrorClass::Transient);
        assert!(ErrorClass::classify(&err).is_retryable());
    }

    #[test]
    fn classify_busy_codes_as_transient() {
        assert_eq!(
            ErrorClass::classify(&Error::Register { code: 0x07 }),
            ErrorClass::Transient
        );
        assert_eq!(
            ErrorClass::classify(&Error::Feature { code: 0x08 }),
            ErrorClass::Transient
        );
    }

    #[test]
    fn classify_protocol_error() {
        let err = Error::Register { code: 0x02 };
        assert_eq!(ErrorClass::classify(&err), ErrorClass::Protocol);
        assert!(!ErrorClass::classify(&err).is_retryable());
    }

    #[test]
    fn classify_transport_failure_as_disconnected() {
        let err = Error::Transport("write: No such device".into());
        assert_eq!(ErrorClass::classify(&err), ErrorClass::Disconnected);
    }

    #[test]
    fn classify_permission_denied() {
        let err = Error::PermissionDenied("/dev/hidraw0".into());
        assert_eq!(ErrorClass::classify(&err), ErrorClass::PermissionDenied);
    }

    #[test]
    fn retry_succeeds_after_transient_errors() {
        let mut calls = 0;
        let result = with_retry(3, || {
            calls += 1;
            if calls < 3 {
                Err(Error::Timeout("no reply".into()))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn retry_stops_on_non_retryable() {
        let mut calls = 0;
        let result: Result<()> = with_retry(3, || {
            calls += 1;
            Err(Error::Register { code: 0x02 })
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn retry_gives_up_after_max_retries() {
        let mut calls = 0;
        let result: Result<()> = with_retry(2, || {
            calls += 1;
            Err(Error::Timeout("no reply".into()))
        });
        assert!(matches!(result, Err(Error::Timeout(_))));
        assert_eq!(calls, 3);
    }
}
