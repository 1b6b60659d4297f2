// Composed arbitration error type

use crate::error::{EngineError, ErrorCode, SessionError};
use log::error;
use std::fmt;

/// Arbitration error code constants
///
/// Codes unique to the coordinator itself; wrapped session/engine errors
/// keep their own ranges (1001-1003 and 2001-2005).
///
/// Error code range: 3001
pub struct ArbiterErrorCodes {}

impl ArbiterErrorCodes {
    /// Mutex/RwLock was poisoned inside the coordinator
    pub const LOCK_POISONED: i32 = 3001;
}

/// Log an arbitration error with structured context
pub fn log_arbiter_error(err: &ArbiterError, context: &str) {
    error!(
        "Arbitration error in {}: code={}, component=ArbitrationCoordinator, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors surfaced by claim/release/recovery paths
///
/// A claim touches both the session and the engine, so its failure wraps
/// whichever stage failed; the numeric code is the wrapped error's code.
#[derive(Debug, Clone, PartialEq)]
pub enum ArbiterError {
    /// Session activation stage failed
    Session(SessionError),

    /// Engine start/reset stage failed
    Engine(EngineError),

    /// Mutex/RwLock was poisoned
    LockPoisoned { component: String },
}

impl ErrorCode for ArbiterError {
    fn code(&self) -> i32 {
        match self {
            ArbiterError::Session(err) => err.code(),
            ArbiterError::Engine(err) => err.code(),
            ArbiterError::LockPoisoned { .. } => ArbiterErrorCodes::LOCK_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            ArbiterError::Session(err) => err.message(),
            ArbiterError::Engine(err) => err.message(),
            ArbiterError::LockPoisoned { component } => {
                format!("Lock poisoned on {}", component)
            }
        }
    }
}

impl fmt::Display for ArbiterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ArbiterError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ArbiterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ArbiterError::Session(err) => Some(err),
            ArbiterError::Engine(err) => Some(err),
            ArbiterError::LockPoisoned { .. } => None,
        }
    }
}

impl From<SessionError> for ArbiterError {
    fn from(err: SessionError) -> Self {
        ArbiterError::Session(err)
    }
}

impl From<EngineError> for ArbiterError {
    fn from(err: EngineError) -> Self {
        ArbiterError::Engine(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EngineErrorCodes, SessionErrorCodes};

    #[test]
    fn test_arbiter_error_delegates_codes() {
        let err = ArbiterError::Session(SessionError::ActivationFailed {
            reason: "test".to_string(),
        });
        assert_eq!(err.code(), SessionErrorCodes::ACTIVATION_FAILED);

        let err = ArbiterError::Engine(EngineError::NotRunning);
        assert_eq!(err.code(), EngineErrorCodes::NOT_RUNNING);

        let err = ArbiterError::LockPoisoned {
            component: "OwnershipBroker".to_string(),
        };
        assert_eq!(err.code(), ArbiterErrorCodes::LOCK_POISONED);
    }

    #[test]
    fn test_from_conversions() {
        let err: ArbiterError = SessionError::AlreadyActive.into();
        assert!(matches!(err, ArbiterError::Session(_)));

        let err: ArbiterError = EngineError::AlreadyRunning.into();
        assert!(matches!(err, ArbiterError::Engine(_)));
    }

    #[test]
    fn test_arbiter_error_display() {
        let err = ArbiterError::Engine(EngineError::ResetFailed {
            reason: "start half failed".to_string(),
        });
        let display = format!("{}", err);
        assert!(display.contains("ArbiterError"));
        assert!(display.contains(&err.code().to_string()));
    }

    #[test]
    fn test_source_exposes_wrapped_error() {
        use std::error::Error;

        let err = ArbiterError::Session(SessionError::AlreadyActive);
        assert!(err.source().is_some());

        let err = ArbiterError::LockPoisoned {
            component: "test".to_string(),
        };
        assert!(err.source().is_none());
    }
}
