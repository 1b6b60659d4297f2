use futures::Stream;
use tokio::runtime::Builder;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::{ArbiterEvent, ArbitrationCoordinator};
use crate::config::ArbiterConfig;
use crate::session::SessionEvent;

impl ArbitrationCoordinator {
    // ========================================================================
    // STREAM SUBSCRIPTIONS
    // ========================================================================

    pub fn subscribe_telemetry(&self) -> mpsc::UnboundedReceiver<ArbiterEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut broadcast_rx = self.core.telemetry_tx.subscribe();

        std::thread::spawn(move || {
            let rt = Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("Failed to create Tokio runtime");
            rt.block_on(async move {
                while let Ok(event) = broadcast_rx.recv().await {
                    if tx.send(event).is_err() {
                        break;
                    }
                }
            });
        });

        rx
    }

    pub fn subscribe_session_events(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut broadcast_rx = self.core.session.subscribe();

        std::thread::spawn(move || {
            let rt = Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("Failed to create Tokio runtime");
            rt.block_on(async move {
                while let Ok(event) = broadcast_rx.recv().await {
                    if tx.send(event).is_err() {
                        break;
                    }
                }
            });
        });

        rx
    }

    pub fn telemetry_receiver(&self) -> broadcast::Receiver<ArbiterEvent> {
        self.core.telemetry_tx.subscribe()
    }

    // ========================================================================
    // ASYNC STREAM ADAPTERS
    // ========================================================================

    pub async fn telemetry_stream(&self) -> impl Stream<Item = ArbiterEvent> + Unpin {
        UnboundedReceiverStream::new(self.subscribe_telemetry())
    }

    pub async fn session_event_stream(&self) -> impl Stream<Item = SessionEvent> + Unpin {
        UnboundedReceiverStream::new(self.subscribe_session_events())
    }

    // ========================================================================
    // DIAGNOSTICS
    // ========================================================================

    /// Milliseconds elapsed since the coordinator was created (used for telemetry).
    pub fn uptime_ms(&self) -> u64 {
        self.core
            .time_source
            .now()
            .saturating_duration_since(self.core.start_instant)
            .as_millis() as u64
    }

    /// Snapshot the active configuration (tooling helper).
    pub fn config_snapshot(&self) -> ArbiterConfig {
        self.core.config.clone()
    }
}
