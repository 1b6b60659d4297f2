//! Diagnostics telemetry collector and helpers.
//!
//! The collector multiplexes ownership changes, session/engine lifecycle
//! transitions, and recovery outcomes into a bounded history plus async
//! broadcast stream. Counters aggregate per-kind totals for cheap reporting.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;
use tokio::sync::{broadcast, mpsc};

pub mod events;

pub use events::{LifecyclePhase, MetricEvent, RecoveryOutcome};

/// Global telemetry hub shared across the crate.
static HUB: Lazy<TelemetryHub> = Lazy::new(TelemetryHub::default);

/// Access the global telemetry hub.
pub fn hub() -> &'static TelemetryHub {
    &HUB
}

/// Snapshot of collector state for CLI/host reporting.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TelemetrySnapshot {
    pub recent: Vec<MetricEvent>,
    pub total_events: u64,
    pub dropped_events: u64,
    pub counters: HashMap<String, u64>,
}

/// Broadcast-based collector retaining a bounded history of metrics.
pub struct TelemetryCollector {
    tx: broadcast::Sender<MetricEvent>,
    history: Mutex<VecDeque<MetricEvent>>,
    history_capacity: usize,
    total_events: AtomicU64,
    dropped_history: AtomicU64,
}

impl TelemetryCollector {
    pub fn new(buffer: usize, history_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer);
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            total_events: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
        }
    }

    pub fn publish(&self, event: MetricEvent) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        {
            let mut history = self.history.lock().expect("history poisoned");
            if history.len() == self.history_capacity {
                history.pop_front();
                self.dropped_history.fetch_add(1, Ordering::Relaxed);
            }
            history.push_back(event.clone());
        }

        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MetricEvent> {
        self.tx.subscribe()
    }

    pub fn subscribe_unbounded(&self) -> mpsc::UnboundedReceiver<MetricEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut broadcast_rx = self.tx.subscribe();

        tokio::spawn(async move {
            while let Ok(event) = broadcast_rx.recv().await {
                if tx.send(event).is_err() {
                    break;
                }
            }
        });

        rx
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let history = self.history.lock().expect("history poisoned");
        TelemetrySnapshot {
            recent: history.iter().cloned().collect(),
            total_events: self.total_events.load(Ordering::Relaxed),
            dropped_events: self.dropped_history.load(Ordering::Relaxed),
            counters: HashMap::new(),
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new(256, 64)
    }
}

/// Top-level hub wrapping collector state plus per-kind counters.
pub struct TelemetryHub {
    collector: TelemetryCollector,
    counters: Mutex<HashMap<&'static str, u64>>,
}

impl TelemetryHub {
    pub fn new(channel_capacity: usize, history_capacity: usize) -> Self {
        Self {
            collector: TelemetryCollector::new(channel_capacity, history_capacity),
            counters: Mutex::new(HashMap::new()),
        }
    }

    pub fn collector(&self) -> &TelemetryCollector {
        &self.collector
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let mut snapshot = self.collector.snapshot();
        let counters = self.counters.lock().expect("counter lock poisoned");
        snapshot.counters = counters
            .iter()
            .map(|(key, value)| ((*key).to_string(), *value))
            .collect();
        snapshot
    }

    pub fn record_ownership(&self, owner: Option<&str>) {
        self.collector.publish(MetricEvent::Ownership {
            owner: owner.map(str::to_string),
            timestamp_ms: now_timestamp_ms(),
        });
        self.bump("ownership_changes");
    }

    pub fn record_lifecycle(&self, phase: LifecyclePhase) {
        self.collector.publish(MetricEvent::Lifecycle {
            phase,
            timestamp_ms: now_timestamp_ms(),
        });
        self.bump(match phase {
            LifecyclePhase::SessionActivated => "session_activations",
            LifecyclePhase::SessionDeactivated => "session_deactivations",
            LifecyclePhase::SessionInterrupted => "session_interruptions",
            LifecyclePhase::EngineStarted => "engine_starts",
            LifecyclePhase::EngineStopped => "engine_stops",
            LifecyclePhase::EngineReset => "engine_resets",
        });
    }

    pub fn record_recovery(&self, outcome: RecoveryOutcome, context: impl Into<String>) {
        self.collector.publish(MetricEvent::Recovery {
            outcome,
            context: context.into(),
        });
        self.bump(match outcome {
            RecoveryOutcome::Resumed => "recoveries_resumed",
            RecoveryOutcome::ResetCompleted => "recoveries_reset",
            RecoveryOutcome::Deferred => "recoveries_deferred",
            RecoveryOutcome::Failed => "recoveries_failed",
        });
    }

    pub fn record_error(&self, code: i32, context: impl Into<String>) {
        self.collector.publish(MetricEvent::Error {
            code,
            context: context.into(),
        });
        self.bump("errors");
    }

    fn bump(&self, key: &'static str) {
        let mut counters = self.counters.lock().expect("counter lock poisoned");
        *counters.entry(key).or_insert(0) += 1;
    }
}

impl Default for TelemetryHub {
    fn default() -> Self {
        Self::new(256, 64)
    }
}

fn now_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_preserves_order_within_history() {
        let collector = TelemetryCollector::new(8, 3);
        collector.publish(MetricEvent::Lifecycle {
            phase: LifecyclePhase::EngineStarted,
            timestamp_ms: 1,
        });
        collector.publish(MetricEvent::Lifecycle {
            phase: LifecyclePhase::EngineStopped,
            timestamp_ms: 2,
        });
        collector.publish(MetricEvent::Ownership {
            owner: Some("metronome".to_string()),
            timestamp_ms: 3,
        });

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.recent.len(), 3);
        assert!(matches!(
            snapshot.recent[0],
            MetricEvent::Lifecycle {
                phase: LifecyclePhase::EngineStarted,
                ..
            }
        ));
        assert!(matches!(snapshot.recent[2], MetricEvent::Ownership { .. }));
    }

    #[test]
    fn collector_drops_history_when_full() {
        let collector = TelemetryCollector::new(8, 2);
        for timestamp_ms in 1..=3 {
            collector.publish(MetricEvent::Lifecycle {
                phase: LifecyclePhase::EngineReset,
                timestamp_ms,
            });
        }

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.recent.len(), 2);
        assert_eq!(snapshot.dropped_events, 1);
        assert!(matches!(
            snapshot.recent[0],
            MetricEvent::Lifecycle { timestamp_ms: 2, .. }
        ));
    }

    #[test]
    fn hub_counts_per_kind() {
        let hub = TelemetryHub::new(8, 8);
        hub.record_ownership(Some("metronome"));
        hub.record_ownership(None);
        hub.record_recovery(RecoveryOutcome::Failed, "reset after route change");

        let snapshot = hub.snapshot();
        assert_eq!(snapshot.counters.get("ownership_changes"), Some(&2));
        assert_eq!(snapshot.counters.get("recoveries_failed"), Some(&1));
        assert!(snapshot
            .recent
            .iter()
            .any(|event| matches!(event, MetricEvent::Recovery { .. })));
    }

    #[test]
    fn metric_events_serialize_with_tagged_payloads() {
        let event = MetricEvent::Error {
            code: 2002,
            context: "reset".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"error\""));
        assert!(json.contains("\"payload\""));

        let parsed: MetricEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }

    #[tokio::test]
    async fn subscribers_receive_published_metrics() {
        let collector = TelemetryCollector::new(8, 8);
        let mut rx = collector.subscribe_unbounded();

        collector.publish(MetricEvent::Lifecycle {
            phase: LifecyclePhase::EngineStarted,
            timestamp_ms: 7,
        });

        let received = tokio::time::timeout(std::time::Duration::from_millis(200), rx.recv())
            .await
            .expect("metric should arrive promptly")
            .expect("channel should stay open");
        assert!(matches!(received, MetricEvent::Lifecycle { .. }));
    }
}
