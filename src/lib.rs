// Audio Arbiter - ownership and lifecycle coordination for a shared engine
// Single preemptive owner, serialized recovery, stale-handle signaling

// Module declarations
pub mod broker;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod session;
pub mod telemetry;

// Re-exports for convenience
pub use broker::{EvictionNotice, EvictionReason, EvictionSignal, OwnerToken};
pub use config::ArbiterConfig;
pub use coordinator::{
    ArbiterEvent, ArbiterEventKind, ArbiterSnapshot, ArbitrationCoordinator, CoordinatorState,
};
pub use engine::{EngineBackend, EngineHandle, EngineState, TimeSource};
pub use error::{ArbiterError, EngineError, ErrorCode, SessionError};
pub use session::{SessionBackend, SessionEvent, SessionEventPublisher, SessionState};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_surface_is_wired() {
        let coordinator = ArbitrationCoordinator::with_config(ArbiterConfig::default());
        assert_eq!(coordinator.state(), CoordinatorState::Idle);
        assert!(coordinator.current_owner().is_none());
    }
}
