//! ArbitrationCoordinator: composes session, engine, and ownership state.
//!
//! This is the public entry point of the crate. It serializes every
//! claim/release/event application behind one state lock, reacts to platform
//! invalidation events by rebuilding the engine, and tells the current owner
//! when its handle went stale.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::broker::{EvictionNotice, EvictionReason, EvictionSignal, OwnerToken, OwnershipBroker};
use crate::config::ArbiterConfig;
use crate::engine::{
    EngineBackend, EngineHandle, EngineLifecycle, EngineState, StubEngineBackend, StubTimeSource,
    TimeSource,
};
use crate::error::{log_arbiter_error, ArbiterError, EngineError, ErrorCode};
use crate::session::{
    SessionBackend, SessionController, SessionEvent, SessionEventPublisher, SessionState,
    StubSessionBackend,
};
use crate::telemetry::{self, RecoveryOutcome};

mod subscriptions;

/// Telemetry event emitted by the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbiterEvent {
    pub timestamp_ms: u64,
    pub kind: ArbiterEventKind,
    pub detail: Option<String>,
}

/// Types of telemetry events supported by the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ArbiterEventKind {
    EngineStarted { generation: u64 },
    EngineStopped,
    EngineReset { generation: u64 },
    OwnerClaimed { owner: String },
    OwnerReleased { owner: String },
    OwnerEvicted { owner: String },
    SessionInterrupted,
    SessionResumed,
    RecoveryFailed,
    Warning,
}

/// Coordinator phase as observed between operations.
///
/// `Recovering` covers both halves of an interruption episode and the parked
/// state after a failed rebuild.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorState {
    Idle,
    Active,
    Recovering,
}

/// Read-only aggregate of arbiter state for tests, CLI, and host diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbiterSnapshot {
    pub coordinator: CoordinatorState,
    pub owner: Option<String>,
    pub engine: EngineState,
    pub session: SessionState,
    pub engine_generation: u64,
}

/// Shared core holding the components and the serialized state lock.
///
/// The event pump clones an `Arc` of this so events and direct calls apply
/// through the same lock, in order.
struct ArbiterCore {
    config: ArbiterConfig,
    session: SessionController,
    engine: EngineLifecycle,
    broker: OwnershipBroker,
    state: Mutex<CoordinatorState>,
    telemetry_tx: broadcast::Sender<ArbiterEvent>,
    time_source: Arc<dyn TimeSource>,
    start_instant: Instant,
}

impl ArbiterCore {
    /// Safely acquire the coordinator state lock
    ///
    /// Returns MutexGuard or ArbiterError::LockPoisoned on lock failure
    fn lock_state(&self) -> Result<MutexGuard<'_, CoordinatorState>, ArbiterError> {
        self.state.lock().map_err(|_| ArbiterError::LockPoisoned {
            component: "ArbitrationCoordinator".to_string(),
        })
    }

    // ========================================================================
    // CLAIM / RELEASE
    // ========================================================================

    fn claim(&self, owner: OwnerToken) -> Result<EvictionSignal, ArbiterError> {
        let mut state = self.lock_state()?;

        let previous = self.broker.current_owner().filter(|prev| *prev != owner);
        let signal = self.broker.claim(owner.clone());
        if let Some(previous) = previous {
            self.emit_event(
                ArbiterEventKind::OwnerEvicted {
                    owner: previous.to_string(),
                },
                None,
            );
        }

        // A pure handoff leaves the running engine alone; anything else has
        // to bring the session and engine up first.
        if *state != CoordinatorState::Active {
            if let Err(err) = self.bring_up() {
                self.broker.clear();
                self.session.deactivate();
                *state = CoordinatorState::Idle;
                telemetry::hub().record_error(err.code(), "claim");
                log_arbiter_error(&err, "claim");
                return Err(err);
            }
            *state = CoordinatorState::Active;
        }

        telemetry::hub().record_ownership(Some(owner.as_str()));
        self.emit_event(
            ArbiterEventKind::OwnerClaimed {
                owner: owner.to_string(),
            },
            None,
        );
        log::info!("[ArbitrationCoordinator] {} now owns the engine", owner);
        Ok(signal)
    }

    fn bring_up(&self) -> Result<(), ArbiterError> {
        if self.session.state() != SessionState::Active {
            self.session.activate()?;
        }
        if !self.engine.is_running() {
            self.engine.start()?;
            self.emit_event(
                ArbiterEventKind::EngineStarted {
                    generation: self.engine.current_generation(),
                },
                None,
            );
        }
        Ok(())
    }

    fn release(&self, owner: &OwnerToken) {
        let mut state = match self.lock_state() {
            Ok(guard) => guard,
            Err(err) => {
                log_arbiter_error(&err, "release");
                return;
            }
        };

        if !self.broker.release(owner) {
            return;
        }

        self.emit_event(
            ArbiterEventKind::OwnerReleased {
                owner: owner.to_string(),
            },
            None,
        );
        if self.engine.is_running() {
            self.engine.stop();
            self.emit_event(ArbiterEventKind::EngineStopped, None);
        }
        if self.config.recovery.deactivate_on_release {
            self.session.deactivate();
        }
        *state = CoordinatorState::Idle;
        telemetry::hub().record_ownership(None);
        log::info!("[ArbitrationCoordinator] Engine idle after release");
    }

    // ========================================================================
    // PLATFORM EVENT APPLICATION
    // ========================================================================

    fn dispatch_event(&self, event: SessionEvent) {
        let mut state = match self.lock_state() {
            Ok(guard) => guard,
            Err(err) => {
                log_arbiter_error(&err, "dispatch_event");
                return;
            }
        };
        log::debug!(
            "[ArbitrationCoordinator] Applying {:?} while {:?}",
            event,
            *state
        );

        match event {
            SessionEvent::InterruptionBegan => self.on_interruption_began(&mut state),
            SessionEvent::InterruptionEnded => self.on_interruption_ended(&mut state),
            SessionEvent::RouteChanged | SessionEvent::ServiceReset => {
                self.on_engine_invalidated(&mut state, event)
            }
        }
    }

    fn on_interruption_began(&self, state: &mut CoordinatorState) {
        let suspended = self.session.suspend();
        if self.engine.is_running() {
            self.engine.stop();
            self.emit_event(
                ArbiterEventKind::EngineStopped,
                Some("interruption began".to_string()),
            );
        }
        if suspended {
            self.emit_event(ArbiterEventKind::SessionInterrupted, None);
        }
        if *state == CoordinatorState::Active {
            *state = CoordinatorState::Recovering;
            log::info!("[ArbitrationCoordinator] Interruption began; engine parked until it ends");
        }
    }

    fn on_interruption_ended(&self, state: &mut CoordinatorState) {
        match *state {
            CoordinatorState::Recovering => {
                if !self.config.recovery.auto_resume {
                    telemetry::hub().record_recovery(
                        RecoveryOutcome::Deferred,
                        "interruption ended; auto resume disabled",
                    );
                    self.emit_event(
                        ArbiterEventKind::Warning,
                        Some("interruption ended; waiting for the next claim".to_string()),
                    );
                    return;
                }

                match self.resume() {
                    Ok(()) => {
                        *state = CoordinatorState::Active;
                        self.notify_reconfigure(None);
                        telemetry::hub()
                            .record_recovery(RecoveryOutcome::Resumed, "interruption ended");
                        self.emit_event(ArbiterEventKind::SessionResumed, None);
                        log::info!("[ArbitrationCoordinator] Recovered from interruption");
                    }
                    Err(err) => {
                        // Parked in Recovering; the next claim or interruption
                        // end is what retries.
                        self.notify_reconfigure(Some(err.clone()));
                        telemetry::hub().record_recovery(RecoveryOutcome::Failed, err.message());
                        telemetry::hub().record_error(err.code(), "resume");
                        self.emit_event(ArbiterEventKind::RecoveryFailed, Some(err.message()));
                        log_arbiter_error(&err, "resume");
                    }
                }
            }
            CoordinatorState::Idle => {
                // Nobody owns the engine; settle the session bookkeeping so a
                // later claim sees an accurate precondition.
                if self.session.state() == SessionState::Interrupted {
                    self.session.deactivate();
                }
            }
            CoordinatorState::Active => {
                log::debug!("[ArbitrationCoordinator] Stale interruption end ignored");
            }
        }
    }

    fn on_engine_invalidated(&self, state: &mut CoordinatorState, event: SessionEvent) {
        match *state {
            CoordinatorState::Active => match self.engine.reset() {
                Ok(()) => {
                    self.notify_reconfigure(None);
                    telemetry::hub()
                        .record_recovery(RecoveryOutcome::ResetCompleted, format!("{:?}", event));
                    self.emit_event(
                        ArbiterEventKind::EngineReset {
                            generation: self.engine.current_generation(),
                        },
                        None,
                    );
                }
                Err(err) => {
                    let err = ArbiterError::from(err);
                    *state = CoordinatorState::Recovering;
                    self.notify_reconfigure(Some(err.clone()));
                    telemetry::hub().record_recovery(RecoveryOutcome::Failed, err.message());
                    telemetry::hub().record_error(err.code(), "reset");
                    self.emit_event(ArbiterEventKind::RecoveryFailed, Some(err.message()));
                    log_arbiter_error(&err, "reset");
                }
            },
            CoordinatorState::Recovering => {
                // Engine is already down; the rebuild stays deferred until the
                // next claim or interruption end.
                telemetry::hub().record_recovery(RecoveryOutcome::Deferred, format!("{:?}", event));
                self.emit_event(
                    ArbiterEventKind::Warning,
                    Some(format!("{:?} while recovering; rebuild deferred", event)),
                );
            }
            CoordinatorState::Idle => {
                log::debug!("[ArbitrationCoordinator] {:?} ignored while idle", event);
            }
        }
    }

    fn resume(&self) -> Result<(), ArbiterError> {
        self.session.reactivate()?;
        self.engine.start()?;
        self.emit_event(
            ArbiterEventKind::EngineStarted {
                generation: self.engine.current_generation(),
            },
            None,
        );
        Ok(())
    }

    /// Tell the unchanged owner its engine handle is invalid.
    fn notify_reconfigure(&self, failure: Option<ArbiterError>) {
        self.broker.notify_current(EvictionNotice {
            reason: EvictionReason::ReconfigureRequired,
            failure,
        });
    }

    // ========================================================================
    // TELEMETRY
    // ========================================================================

    fn publish_event(
        tx: &broadcast::Sender<ArbiterEvent>,
        time_source: &Arc<dyn TimeSource>,
        start_instant: Instant,
        kind: ArbiterEventKind,
        detail: Option<String>,
    ) {
        let timestamp_ms = time_source
            .now()
            .saturating_duration_since(start_instant)
            .as_millis() as u64;
        let _ = tx.send(ArbiterEvent {
            timestamp_ms,
            kind,
            detail,
        });
    }

    fn emit_event(&self, kind: ArbiterEventKind, detail: Option<String>) {
        Self::publish_event(
            &self.telemetry_tx,
            &self.time_source,
            self.start_instant,
            kind,
            detail,
        );
    }

    fn state(&self) -> CoordinatorState {
        self.state
            .lock()
            .map(|state| *state)
            .unwrap_or_else(|err| *err.into_inner())
    }
}

/// Public facade over the arbitration core.
pub struct ArbitrationCoordinator {
    core: Arc<ArbiterCore>,
    pump_started: AtomicBool,
}

impl ArbitrationCoordinator {
    /// Create a coordinator with stub backends and file-loaded configuration.
    pub fn new() -> Self {
        Self::with_config(ArbiterConfig::load())
    }

    /// Create a coordinator with stub backends and the given configuration.
    pub fn with_config(config: ArbiterConfig) -> Self {
        Self::with_parts(
            config,
            Arc::new(StubSessionBackend::new()),
            Arc::new(StubEngineBackend::new()),
            Arc::new(StubTimeSource::default()),
        )
    }

    /// Create a coordinator with injected platform backends.
    pub fn with_parts(
        config: ArbiterConfig,
        session_backend: Arc<dyn SessionBackend>,
        engine_backend: Arc<dyn EngineBackend>,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        let (telemetry_tx, _) = broadcast::channel(config.channels.telemetry_buffer);
        let session = SessionController::new(session_backend, config.channels.session_event_buffer);
        let engine = EngineLifecycle::new(engine_backend);

        Self {
            core: Arc::new(ArbiterCore {
                config,
                session,
                engine,
                broker: OwnershipBroker::new(),
                state: Mutex::new(CoordinatorState::Idle),
                telemetry_tx,
                time_source,
                start_instant: Instant::now(),
            }),
            pump_started: AtomicBool::new(false),
        }
    }

    /// Claim exclusive ownership of the engine.
    ///
    /// A different previous owner has its eviction signal fired before this
    /// returns. On first claim (or while recovering) the session is activated
    /// and the engine started; on failure the claim rolls back to no owner.
    ///
    /// # Errors
    /// * `ArbiterError::Session` - session activation failed
    /// * `ArbiterError::Engine` - engine start failed
    pub fn claim(&self, owner: impl Into<OwnerToken>) -> Result<EvictionSignal, ArbiterError> {
        let signal = self.core.claim(owner.into())?;
        self.start_event_pump();
        Ok(signal)
    }

    /// Release ownership; stops the engine when the last owner leaves.
    ///
    /// A stale release from an already-preempted owner is a no-op.
    pub fn release(&self, owner: impl Into<OwnerToken>) {
        let owner = owner.into();
        self.core.release(&owner);
    }

    /// Fetch the engine handle for the current owner to configure.
    ///
    /// # Errors
    /// * `EngineError::NotRunning` - no owner, or recovery still pending
    pub fn handle(&self) -> Result<EngineHandle, EngineError> {
        self.core.engine.handle()
    }

    pub fn current_owner(&self) -> Option<OwnerToken> {
        self.core.broker.current_owner()
    }

    pub fn state(&self) -> CoordinatorState {
        self.core.state()
    }

    pub fn snapshot(&self) -> ArbiterSnapshot {
        ArbiterSnapshot {
            coordinator: self.core.state(),
            owner: self
                .core
                .broker
                .current_owner()
                .map(|owner| owner.to_string()),
            engine: self.core.engine.state(),
            session: self.core.session.state(),
            engine_generation: self.core.engine.current_generation(),
        }
    }

    /// Apply one platform event on the caller's context.
    ///
    /// Hosts that already serialize their platform callbacks call this
    /// directly instead of going through the event pump.
    pub fn dispatch_event(&self, event: SessionEvent) {
        self.core.dispatch_event(event);
    }

    /// Push endpoint for platform glue to report invalidation events.
    pub fn session_publisher(&self) -> SessionEventPublisher {
        self.core.session.publisher()
    }

    /// Start the worker draining published session events, once.
    ///
    /// Also started lazily by the first successful claim. Events published
    /// before the pump (or a direct subscriber) exists are dropped.
    pub fn start_event_pump(&self) {
        if self
            .pump_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let core = Arc::clone(&self.core);
        // Subscribe here so events published right after this call are seen.
        let mut events_rx = core.session.subscribe();

        // Spawn a dedicated thread with its own Tokio runtime
        // This keeps event application off the host's threads and works even
        // when the host has no Tokio runtime of its own
        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("Failed to create Tokio runtime for event pump");

            rt.block_on(async move {
                loop {
                    match events_rx.recv().await {
                        Ok(event) => {
                            tracing::debug!("[EventPump] Applying {:?}", event);
                            core.dispatch_event(event);
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!("[EventPump] Lagged; skipped {} events", skipped);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            });
        });
    }
}

impl Default for ArbitrationCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

// ========================================================================
// TEST HELPERS
// ========================================================================
