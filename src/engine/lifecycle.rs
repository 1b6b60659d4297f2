use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{log_engine_error, EngineError, ErrorCode};
use crate::telemetry::{self, LifecyclePhase};

use super::EngineBackend;

/// Engine run state as observed by owners.
///
/// Consumers only ever see `Stopped` or fully `Running`; the teardown and
/// rebuild halves of a reset happen inside one serialized operation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Stopped,
    Running,
}

/// Cheap cloneable reference to the running engine.
///
/// The generation identifies the start that minted the handle; a handle held
/// across a stop or reset compares unequal to a freshly fetched one and must
/// be re-fetched rather than reused.
#[derive(Clone)]
pub struct EngineHandle {
    backend: Arc<dyn EngineBackend>,
    generation: u64,
}

impl EngineHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The opaque engine object for the owner to configure.
    pub fn backend(&self) -> Arc<dyn EngineBackend> {
        Arc::clone(&self.backend)
    }
}

/// Owns the start/stop/reset lifecycle of the shared engine resource.
///
/// All mutation flows through the coordinator's serialized context, so state
/// here is simple atomics rather than locks.
pub struct EngineLifecycle {
    backend: Arc<dyn EngineBackend>,
    running: AtomicBool,
    generation: AtomicU64,
}

impl EngineLifecycle {
    pub fn new(backend: Arc<dyn EngineBackend>) -> Self {
        Self {
            backend,
            running: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        }
    }

    /// Start the engine.
    ///
    /// Bumps the handle generation on success.
    ///
    /// # Errors
    /// * `EngineError::AlreadyRunning` - engine is already running
    /// * `EngineError::ActivationFailed` - backend refused; state stays Stopped
    pub fn start(&self) -> Result<(), EngineError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(EngineError::AlreadyRunning);
        }

        self.backend.start()?;
        self.running.store(true, Ordering::SeqCst);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        telemetry::hub().record_lifecycle(LifecyclePhase::EngineStarted);
        log::info!("[EngineLifecycle] Engine started (generation {})", generation);
        Ok(())
    }

    /// Stop the engine unconditionally; idempotent when already stopped.
    ///
    /// A backend stop failure is logged and the engine is still treated as
    /// torn down, since the platform object is gone either way.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        if let Err(err) = self.backend.stop() {
            log_engine_error(&err, "stop");
        }
        telemetry::hub().record_lifecycle(LifecyclePhase::EngineStopped);
        log::info!("[EngineLifecycle] Engine stopped");
    }

    /// Full teardown + rebuild, used to recover after external invalidation.
    ///
    /// # Errors
    /// * `EngineError::ResetFailed` - the rebuild half failed; engine left Stopped
    pub fn reset(&self) -> Result<(), EngineError> {
        self.stop();
        match self.start() {
            Ok(()) => {
                telemetry::hub().record_lifecycle(LifecyclePhase::EngineReset);
                log::info!(
                    "[EngineLifecycle] Engine reset complete (generation {})",
                    self.current_generation()
                );
                Ok(())
            }
            Err(err) => {
                let reason = match err {
                    EngineError::ActivationFailed { reason } => reason,
                    other => other.message(),
                };
                let reset_err = EngineError::ResetFailed { reason };
                log_engine_error(&reset_err, "reset");
                Err(reset_err)
            }
        }
    }

    /// Fetch a handle to the running engine.
    ///
    /// # Errors
    /// * `EngineError::NotRunning` - engine is stopped; no handle exists
    pub fn handle(&self) -> Result<EngineHandle, EngineError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(EngineError::NotRunning);
        }
        Ok(EngineHandle {
            backend: Arc::clone(&self.backend),
            generation: self.generation.load(Ordering::SeqCst),
        })
    }

    pub fn state(&self) -> EngineState {
        if self.is_running() {
            EngineState::Running
        } else {
            EngineState::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Generation of the most recent successful start.
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::StubEngineBackend;
    use crate::error::ErrorCode;

    fn lifecycle_with_stub() -> (EngineLifecycle, Arc<StubEngineBackend>) {
        let backend = Arc::new(StubEngineBackend::new());
        let lifecycle = EngineLifecycle::new(Arc::clone(&backend) as Arc<dyn EngineBackend>);
        (lifecycle, backend)
    }

    #[test]
    fn start_transitions_to_running() {
        let (lifecycle, backend) = lifecycle_with_stub();
        assert_eq!(lifecycle.state(), EngineState::Stopped);

        lifecycle.start().expect("start should succeed");
        assert_eq!(lifecycle.state(), EngineState::Running);
        assert!(backend.is_running());
        assert_eq!(lifecycle.current_generation(), 1);
    }

    #[test]
    fn double_start_reports_already_running() {
        let (lifecycle, _backend) = lifecycle_with_stub();
        lifecycle.start().expect("start should succeed");

        match lifecycle.start() {
            Err(EngineError::AlreadyRunning) => {}
            other => panic!("Expected AlreadyRunning, got {:?}", other),
        }
    }

    #[test]
    fn failed_start_leaves_engine_stopped() {
        let (lifecycle, backend) = lifecycle_with_stub();
        backend.fail_next_starts(1);

        assert!(matches!(
            lifecycle.start(),
            Err(EngineError::ActivationFailed { .. })
        ));
        assert_eq!(lifecycle.state(), EngineState::Stopped);
        assert_eq!(lifecycle.current_generation(), 0);
    }

    #[test]
    fn stop_is_idempotent() {
        let (lifecycle, backend) = lifecycle_with_stub();
        lifecycle.start().expect("start should succeed");

        lifecycle.stop();
        lifecycle.stop();
        assert_eq!(lifecycle.state(), EngineState::Stopped);
        assert_eq!(backend.stop_count(), 1);
    }

    #[test]
    fn reset_bumps_generation() {
        let (lifecycle, backend) = lifecycle_with_stub();
        lifecycle.start().expect("start should succeed");
        let before = lifecycle.current_generation();

        lifecycle.reset().expect("reset should succeed");
        assert_eq!(lifecycle.state(), EngineState::Running);
        assert!(lifecycle.current_generation() > before);
        assert_eq!(backend.start_count(), 2);
        assert_eq!(backend.stop_count(), 1);
    }

    #[test]
    fn failed_reset_surfaces_reset_failed() {
        let (lifecycle, backend) = lifecycle_with_stub();
        lifecycle.start().expect("start should succeed");
        backend.fail_next_starts(1);

        match lifecycle.reset() {
            Err(EngineError::ResetFailed { reason }) => {
                assert!(reason.contains("scripted start failure"));
            }
            other => panic!("Expected ResetFailed, got {:?}", other),
        }
        assert_eq!(lifecycle.state(), EngineState::Stopped);
    }

    #[test]
    fn handle_requires_running_engine() {
        let (lifecycle, _backend) = lifecycle_with_stub();

        match lifecycle.handle() {
            Err(EngineError::NotRunning) => {}
            other => panic!(
                "Expected NotRunning, got {:?}",
                other.map(|handle| handle.generation())
            ),
        }

        lifecycle.start().expect("start should succeed");
        let handle = lifecycle.handle().expect("handle should exist");
        assert_eq!(handle.generation(), 1);
    }

    #[test]
    fn handles_from_different_generations_are_distinguishable() {
        let (lifecycle, _backend) = lifecycle_with_stub();
        lifecycle.start().expect("start should succeed");
        let stale = lifecycle.handle().expect("handle should exist");

        lifecycle.reset().expect("reset should succeed");
        let fresh = lifecycle.handle().expect("handle should exist");
        assert_ne!(stale.generation(), fresh.generation());
    }

    #[test]
    fn reset_failure_keeps_activation_failed_code_distinct() {
        let (lifecycle, backend) = lifecycle_with_stub();
        backend.fail_next_starts(1);

        let direct = lifecycle.start().unwrap_err();
        backend.fail_next_starts(1);
        let via_reset = lifecycle.reset().unwrap_err();
        assert_ne!(direct.code(), via_reset.code());
    }
}
