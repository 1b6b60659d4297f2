//! Backend abstractions for the shared engine resource.

use std::time::Instant;

use crate::error::EngineError;

/// Trait implemented by platform-specific engine backends.
///
/// A backend owns the opaque engine object: `start` brings it up ready for
/// an owner to configure, `stop` tears it down. Both calls are bounded; the
/// core never polls or retries them.
pub trait EngineBackend: Send + Sync {
    fn start(&self) -> Result<(), EngineError>;
    fn stop(&self) -> Result<(), EngineError>;
}

/// Trait representing a monotonic time source used for telemetry timestamps.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Instant;
}

/// Default time source backed by `Instant::now`.
#[derive(Default)]
pub struct SystemTimeSource {
    _unit: (),
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
