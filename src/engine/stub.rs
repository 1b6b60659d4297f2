use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::error::EngineError;

use super::{EngineBackend, TimeSource};

/// In-memory engine backend used for deterministic testing and CLI tooling.
///
/// Simulates the engine lifecycle without real audio I/O; start failures can
/// be scripted to exercise reset and claim rollback paths.
pub struct StubEngineBackend {
    running: AtomicBool,
    starts: AtomicU64,
    stops: AtomicU64,
    fail_next_starts: AtomicU32,
}

impl StubEngineBackend {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            starts: AtomicU64::new(0),
            stops: AtomicU64::new(0),
            fail_next_starts: AtomicU32::new(0),
        }
    }

    /// Script the next `count` start attempts to fail.
    pub fn fail_next_starts(&self, count: u32) {
        self.fail_next_starts.store(count, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of successful starts so far.
    pub fn start_count(&self) -> u64 {
        self.starts.load(Ordering::SeqCst)
    }

    /// Number of successful stops so far.
    pub fn stop_count(&self) -> u64 {
        self.stops.load(Ordering::SeqCst)
    }
}

impl Default for StubEngineBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBackend for StubEngineBackend {
    fn start(&self) -> Result<(), EngineError> {
        let remaining = self.fail_next_starts.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next_starts.store(remaining - 1, Ordering::SeqCst);
            return Err(EngineError::ActivationFailed {
                reason: "scripted start failure".to_string(),
            });
        }

        if self.running.swap(true, Ordering::SeqCst) {
            return Err(EngineError::AlreadyRunning);
        }

        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) -> Result<(), EngineError> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(EngineError::NotRunning);
        }
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Deterministic time source for tests and CLI runs.
///
/// Each call to `now()` advances by a fixed 10ms to guarantee monotonic
/// timestamps even when nothing real is running.
pub struct StubTimeSource {
    start: Instant,
    offset_ms: AtomicU64,
}

impl StubTimeSource {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset_ms: AtomicU64::new(0),
        }
    }
}

impl Default for StubTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for StubTimeSource {
    fn now(&self) -> Instant {
        let ms = self.offset_ms.fetch_add(10, Ordering::SeqCst);
        self.start + Duration::from_millis(ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_start_stop_cycle() {
        let backend = StubEngineBackend::new();
        backend.start().expect("start should succeed");
        assert!(backend.is_running());

        match backend.start() {
            Err(EngineError::AlreadyRunning) => {}
            other => panic!("Expected AlreadyRunning, got {:?}", other),
        }

        backend.stop().expect("stop should succeed");
        assert!(!backend.is_running());
        assert_eq!(backend.start_count(), 1);
        assert_eq!(backend.stop_count(), 1);
    }

    #[test]
    fn stub_time_source_is_monotonic() {
        let source = StubTimeSource::new();
        let first = source.now();
        let second = source.now();
        assert!(second > first);
        assert_eq!(second.duration_since(first), Duration::from_millis(10));
    }
}
