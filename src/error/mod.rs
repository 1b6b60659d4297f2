// Error types for the audio arbitration core
//
// This module defines custom error types for session, engine, and arbitration
// operations, providing structured error handling with numeric codes suitable
// for host applications embedding the arbiter.

mod arbiter;
mod engine;
mod session;

pub use arbiter::{log_arbiter_error, ArbiterError, ArbiterErrorCodes};
pub use engine::{log_engine_error, EngineError, EngineErrorCodes};
pub use session::{log_session_error, SessionError, SessionErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling in
/// hosts that log or surface arbiter failures numerically.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
