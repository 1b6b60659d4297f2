use std::sync::{Mutex, MutexGuard};

use futures::Stream;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::runtime::Builder;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::error::{log_session_error, SessionError};
use crate::telemetry::{self, LifecyclePhase};

use super::{SessionBackend, SessionEvent, SessionEventPublisher};

/// Platform session activation state.
///
/// `Interrupted` is a transient external state: the platform has taken the
/// session away and will hand it back via an `InterruptionEnded` event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Inactive,
    Active,
    Interrupted,
}

/// Wraps the platform session lifecycle and the invalidation event fan-out.
///
/// Activation state is tracked here; the platform calls themselves go through
/// the injected [`SessionBackend`].
pub struct SessionController {
    backend: Arc<dyn SessionBackend>,
    state: Mutex<SessionState>,
    events_tx: broadcast::Sender<SessionEvent>,
}

impl SessionController {
    pub fn new(backend: Arc<dyn SessionBackend>, event_buffer: usize) -> Self {
        let (events_tx, _) = broadcast::channel(event_buffer);
        Self {
            backend,
            state: Mutex::new(SessionState::Inactive),
            events_tx,
        }
    }

    /// Safely acquire the state lock
    ///
    /// Returns MutexGuard or SessionError::LockPoisoned on lock failure
    fn lock_state(&self) -> Result<MutexGuard<'_, SessionState>, SessionError> {
        self.state.lock().map_err(|_| SessionError::LockPoisoned {
            component: "SessionController".to_string(),
        })
    }

    /// Activate the platform session.
    ///
    /// # Errors
    /// * `SessionError::AlreadyActive` - session is already active
    /// * `SessionError::ActivationFailed` - platform refused the activation;
    ///   state stays as it was
    pub fn activate(&self) -> Result<(), SessionError> {
        let mut state = self.lock_state()?;
        if *state == SessionState::Active {
            return Err(SessionError::AlreadyActive);
        }

        self.backend.activate()?;
        *state = SessionState::Active;
        telemetry::hub().record_lifecycle(LifecyclePhase::SessionActivated);
        log::info!("[SessionController] Session activated");
        Ok(())
    }

    /// Deactivate the platform session, best-effort.
    ///
    /// Failures are logged and swallowed; the tracked state always ends up
    /// `Inactive`. Idempotent when already inactive.
    pub fn deactivate(&self) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        if *state == SessionState::Inactive {
            return;
        }

        if let Err(err) = self.backend.deactivate() {
            log_session_error(&err, "deactivate");
        }
        *state = SessionState::Inactive;
        telemetry::hub().record_lifecycle(LifecyclePhase::SessionDeactivated);
        log::info!("[SessionController] Session deactivated");
    }

    /// Mark the session interrupted because the platform has taken it.
    ///
    /// The backend is told to relinquish its activation so its view matches
    /// the platform teardown. Returns whether the session actually moved
    /// `Active` -> `Interrupted`.
    pub fn suspend(&self) -> bool {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        if *state != SessionState::Active {
            return false;
        }

        if let Err(err) = self.backend.deactivate() {
            log_session_error(&err, "suspend");
        }
        *state = SessionState::Interrupted;
        telemetry::hub().record_lifecycle(LifecyclePhase::SessionInterrupted);
        log::info!("[SessionController] Session interrupted by platform");
        true
    }

    /// Re-activate after an interruption (or from cold).
    ///
    /// Idempotent when already active. A failed reactivation leaves the
    /// session `Inactive`; no retry is scheduled here.
    pub fn reactivate(&self) -> Result<(), SessionError> {
        let mut state = self.lock_state()?;
        if *state == SessionState::Active {
            return Ok(());
        }

        match self.backend.activate() {
            Ok(()) => {
                *state = SessionState::Active;
                telemetry::hub().record_lifecycle(LifecyclePhase::SessionActivated);
                log::info!("[SessionController] Session reactivated");
                Ok(())
            }
            Err(err) => {
                *state = SessionState::Inactive;
                log_session_error(&err, "reactivate");
                Err(err)
            }
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
            .lock()
            .map(|state| *state)
            .unwrap_or_else(|err| *err.into_inner())
    }

    /// Push endpoint for platform glue to report invalidation events.
    pub fn publisher(&self) -> SessionEventPublisher {
        SessionEventPublisher::new(self.events_tx.clone())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    /// Invalidation events as an async stream.
    ///
    /// Subscribes at call time; events published before this call are not
    /// replayed.
    pub fn events(&self) -> impl Stream<Item = SessionEvent> + Unpin {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut events_rx = self.events_tx.subscribe();

        std::thread::spawn(move || {
            let rt = Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("Failed to create Tokio runtime");
            rt.block_on(async move {
                while let Ok(event) = events_rx.recv().await {
                    if tx.send(event).is_err() {
                        break;
                    }
                }
            });
        });

        UnboundedReceiverStream::new(rx)
    }
}
