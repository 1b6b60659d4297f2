// Session error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Session error code constants
///
/// These constants provide a single source of truth for error codes
/// shared between the core and embedding hosts.
///
/// Error code range: 1001-1003
pub struct SessionErrorCodes {}

impl SessionErrorCodes {
    /// Platform refused to activate the audio session
    pub const ACTIVATION_FAILED: i32 = 1001;

    /// Session is already active
    pub const ALREADY_ACTIVE: i32 = 1002;

    /// Mutex/RwLock was poisoned
    pub const LOCK_POISONED: i32 = 1003;
}

/// Log a session error with structured context
///
/// Logs with the numeric code, the component, and a human-readable
/// message so hosts can grep or alert on codes. Never panics.
pub fn log_session_error(err: &SessionError, context: &str) {
    error!(
        "Session error in {}: code={}, component=SessionController, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Session-related errors
///
/// These errors cover platform audio session activation and the
/// controller's internal state handling.
///
/// Error code range: 1001-1003
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// Platform refused to activate the audio session
    ActivationFailed { reason: String },

    /// Session is already active
    AlreadyActive,

    /// Mutex/RwLock was poisoned
    LockPoisoned { component: String },
}

impl ErrorCode for SessionError {
    fn code(&self) -> i32 {
        match self {
            SessionError::ActivationFailed { .. } => SessionErrorCodes::ACTIVATION_FAILED,
            SessionError::AlreadyActive => SessionErrorCodes::ALREADY_ACTIVE,
            SessionError::LockPoisoned { .. } => SessionErrorCodes::LOCK_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            SessionError::ActivationFailed { reason } => {
                format!("Failed to activate audio session: {}", reason)
            }
            SessionError::AlreadyActive => {
                "Audio session already active. Call deactivate() first.".to_string()
            }
            SessionError::LockPoisoned { component } => {
                format!("Lock poisoned on {}", component)
            }
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SessionError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for SessionError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_codes() {
        assert_eq!(
            SessionError::ActivationFailed {
                reason: "test".to_string()
            }
            .code(),
            SessionErrorCodes::ACTIVATION_FAILED
        );
        assert_eq!(
            SessionError::AlreadyActive.code(),
            SessionErrorCodes::ALREADY_ACTIVE
        );
        assert_eq!(
            SessionError::LockPoisoned {
                component: "test".to_string()
            }
            .code(),
            SessionErrorCodes::LOCK_POISONED
        );
    }

    #[test]
    fn test_session_error_messages() {
        let err = SessionError::ActivationFailed {
            reason: "route busy".to_string(),
        };
        assert_eq!(err.message(), "Failed to activate audio session: route busy");

        let err = SessionError::AlreadyActive;
        assert!(err.message().contains("already active"));

        let err = SessionError::LockPoisoned {
            component: "SessionController".to_string(),
        };
        assert_eq!(err.message(), "Lock poisoned on SessionController");
    }

    #[test]
    fn test_session_error_display() {
        let err = SessionError::ActivationFailed {
            reason: "route busy".to_string(),
        };
        let display = format!("{}", err);
        assert!(display.contains("SessionError"));
        assert!(display.contains(&err.code().to_string()));
    }
}
