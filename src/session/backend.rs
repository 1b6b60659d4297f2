use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use crate::error::SessionError;

/// Trait implemented by platform-specific session backends.
///
/// A backend owns the actual platform calls that acquire and relinquish
/// the audio session. [`activate`](SessionBackend::activate) must leave the
/// platform session untouched on failure.
pub trait SessionBackend: Send + Sync {
    fn activate(&self) -> Result<(), SessionError>;
    fn deactivate(&self) -> Result<(), SessionError>;
}

/// In-memory session backend used for deterministic testing and CLI tooling.
///
/// Activation failures can be scripted ahead of time to exercise claim
/// rollback and recovery paths without a real platform session.
pub struct StubSessionBackend {
    active: AtomicBool,
    activations: AtomicU64,
    deactivations: AtomicU64,
    fail_next_activations: AtomicU32,
}

impl StubSessionBackend {
    pub fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            activations: AtomicU64::new(0),
            deactivations: AtomicU64::new(0),
            fail_next_activations: AtomicU32::new(0),
        }
    }

    /// Script the next `count` activation attempts to fail.
    pub fn fail_next_activations(&self, count: u32) {
        self.fail_next_activations.store(count, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Number of successful activations so far.
    pub fn activation_count(&self) -> u64 {
        self.activations.load(Ordering::SeqCst)
    }

    /// Number of deactivation calls so far.
    pub fn deactivation_count(&self) -> u64 {
        self.deactivations.load(Ordering::SeqCst)
    }
}

impl Default for StubSessionBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBackend for StubSessionBackend {
    fn activate(&self) -> Result<(), SessionError> {
        let remaining = self.fail_next_activations.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next_activations
                .store(remaining - 1, Ordering::SeqCst);
            return Err(SessionError::ActivationFailed {
                reason: "scripted activation failure".to_string(),
            });
        }

        if self.active.swap(true, Ordering::SeqCst) {
            return Err(SessionError::AlreadyActive);
        }

        self.activations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn deactivate(&self) -> Result<(), SessionError> {
        // Relinquishing an inactive session is harmless on real platforms too.
        self.active.store(false, Ordering::SeqCst);
        self.deactivations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_tracks_activation_state() {
        let backend = StubSessionBackend::new();
        assert!(!backend.is_active());

        backend.activate().expect("first activation should succeed");
        assert!(backend.is_active());
        assert_eq!(backend.activation_count(), 1);

        backend.deactivate().expect("deactivation should succeed");
        assert!(!backend.is_active());
        assert_eq!(backend.deactivation_count(), 1);
    }

    #[test]
    fn stub_rejects_double_activation() {
        let backend = StubSessionBackend::new();
        backend.activate().expect("first activation should succeed");

        match backend.activate() {
            Err(SessionError::AlreadyActive) => {}
            other => panic!("Expected AlreadyActive, got {:?}", other),
        }
    }

    #[test]
    fn stub_scripted_failures_consume_in_order() {
        let backend = StubSessionBackend::new();
        backend.fail_next_activations(2);

        assert!(matches!(
            backend.activate(),
            Err(SessionError::ActivationFailed { .. })
        ));
        assert!(matches!(
            backend.activate(),
            Err(SessionError::ActivationFailed { .. })
        ));
        assert!(backend.activate().is_ok());
    }
}
