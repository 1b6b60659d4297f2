// Engine lifecycle error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Engine error code constants
///
/// Single source of truth for engine lifecycle error codes shared
/// between the core and embedding hosts.
///
/// Error code range: 2001-2005
pub struct EngineErrorCodes {}

impl EngineErrorCodes {
    /// Engine backend failed to start
    pub const ACTIVATION_FAILED: i32 = 2001;

    /// Engine teardown-and-rebuild cycle failed on the rebuild half
    pub const RESET_FAILED: i32 = 2002;

    /// Engine is already running
    pub const ALREADY_RUNNING: i32 = 2003;

    /// Engine is not running
    pub const NOT_RUNNING: i32 = 2004;

    /// Opaque backend failure (platform call returned an error)
    pub const BACKEND_FAILURE: i32 = 2005;
}

/// Log an engine error with structured context
///
/// Mirrors [`log_session_error`](crate::error::log_session_error): numeric
/// code, component, human-readable message. Never panics.
pub fn log_engine_error(err: &EngineError, context: &str) {
    error!(
        "Engine error in {}: code={}, component=EngineLifecycle, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Engine lifecycle errors
///
/// Cover starting, stopping, and resetting the shared engine resource.
///
/// Error code range: 2001-2005
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Engine backend failed to start
    ActivationFailed { reason: String },

    /// Reset (stop + start) failed during the start half; engine left Stopped
    ResetFailed { reason: String },

    /// Engine is already running
    AlreadyRunning,

    /// Engine is not running
    NotRunning,

    /// Opaque backend failure
    BackendFailure { details: String },
}

impl ErrorCode for EngineError {
    fn code(&self) -> i32 {
        match self {
            EngineError::ActivationFailed { .. } => EngineErrorCodes::ACTIVATION_FAILED,
            EngineError::ResetFailed { .. } => EngineErrorCodes::RESET_FAILED,
            EngineError::AlreadyRunning => EngineErrorCodes::ALREADY_RUNNING,
            EngineError::NotRunning => EngineErrorCodes::NOT_RUNNING,
            EngineError::BackendFailure { .. } => EngineErrorCodes::BACKEND_FAILURE,
        }
    }

    fn message(&self) -> String {
        match self {
            EngineError::ActivationFailed { reason } => {
                format!("Failed to start engine: {}", reason)
            }
            EngineError::ResetFailed { reason } => {
                format!("Engine reset failed: {}", reason)
            }
            EngineError::AlreadyRunning => {
                "Engine already running. Call stop() first.".to_string()
            }
            EngineError::NotRunning => {
                "Engine not running. Claim ownership to start it.".to_string()
            }
            EngineError::BackendFailure { details } => {
                format!("Engine backend failure: {}", details)
            }
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EngineError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for EngineError {}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::BackendFailure {
            details: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_codes() {
        assert_eq!(
            EngineError::ActivationFailed {
                reason: "test".to_string()
            }
            .code(),
            EngineErrorCodes::ACTIVATION_FAILED
        );
        assert_eq!(
            EngineError::ResetFailed {
                reason: "test".to_string()
            }
            .code(),
            EngineErrorCodes::RESET_FAILED
        );
        assert_eq!(
            EngineError::AlreadyRunning.code(),
            EngineErrorCodes::ALREADY_RUNNING
        );
        assert_eq!(EngineError::NotRunning.code(), EngineErrorCodes::NOT_RUNNING);
        assert_eq!(
            EngineError::BackendFailure {
                details: "test".to_string()
            }
            .code(),
            EngineErrorCodes::BACKEND_FAILURE
        );
    }

    #[test]
    fn test_engine_error_messages() {
        let err = EngineError::ActivationFailed {
            reason: "device gone".to_string(),
        };
        assert_eq!(err.message(), "Failed to start engine: device gone");

        let err = EngineError::AlreadyRunning;
        assert!(err.message().contains("already running"));

        let err = EngineError::NotRunning;
        assert!(err.message().contains("not running"));

        let err = EngineError::ResetFailed {
            reason: "start half failed".to_string(),
        };
        assert!(err.message().contains("reset failed"));
    }

    #[test]
    fn test_engine_error_display() {
        let err = EngineError::NotRunning;
        let display = format!("{}", err);
        assert!(display.contains("EngineError"));
        assert!(display.contains(&err.code().to_string()));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::other("test io error");
        let engine_err: EngineError = io_err.into();
        match engine_err {
            EngineError::BackendFailure { details } => {
                assert!(details.contains("test io error"));
            }
            _ => panic!("Expected BackendFailure"),
        }
    }
}
