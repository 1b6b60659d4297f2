//! Core telemetry event types describing diagnostics data exposed to
//! CLI surfaces and host dashboards.

use serde::{Deserialize, Serialize};

/// High-level lifecycle stages reported by session/engine instrumentation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    SessionActivated,
    SessionDeactivated,
    SessionInterrupted,
    EngineStarted,
    EngineStopped,
    EngineReset,
}

/// Outcome classes for recovery attempts after external invalidation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryOutcome {
    /// Session reactivated and engine restarted after an interruption.
    Resumed,
    /// Engine rebuilt in place after a route change or service reset.
    ResetCompleted,
    /// Invalidation observed while already torn down; rebuild stays deferred.
    Deferred,
    Failed,
}

/// Rich metric events covering ownership, lifecycle, and recovery details.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    Ownership {
        owner: Option<String>,
        timestamp_ms: u64,
    },
    Lifecycle {
        phase: LifecyclePhase,
        timestamp_ms: u64,
    },
    Recovery {
        outcome: RecoveryOutcome,
        context: String,
    },
    Error {
        code: i32,
        context: String,
    },
}
