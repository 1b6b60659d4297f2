//! Exclusive, preemptive ownership tracking for the shared engine.
//!
//! At most one owner holds the claim at any instant. Claiming over a
//! different owner delivers that owner's eviction notice before the claim
//! call returns, so the preempted side can release its resources before the
//! new owner starts configuring the engine.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ArbiterError;

/// Opaque identity supplied by a claimant.
///
/// Never interpreted, only compared for equality; cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnerToken(Arc<str>);

impl OwnerToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OwnerToken {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

impl From<String> for OwnerToken {
    fn from(value: String) -> Self {
        Self(Arc::from(value.as_str()))
    }
}

impl fmt::Display for OwnerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why the current owner is being told to let go of its engine handle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EvictionReason {
    /// Another owner claimed the engine; this tenure is over.
    Preempted,
    /// Ownership is unchanged but the engine was rebuilt; re-fetch the
    /// handle and reconfigure.
    ReconfigureRequired,
}

/// One delivery on the tenure's eviction mailbox.
#[derive(Debug, Clone, PartialEq)]
pub struct EvictionNotice {
    pub reason: EvictionReason,
    /// Set when an automatic recovery attempt failed; the owner decides
    /// whether to re-claim or walk away.
    pub failure: Option<ArbiterError>,
}

/// Receiving half of a tenure's eviction mailbox.
///
/// The preemption notice fires at most once per tenure. After a same-owner
/// re-claim the superseded signal goes permanently silent (all receive
/// methods return `None`). Dropping the signal never affects arbitration.
#[derive(Debug)]
pub struct EvictionSignal {
    rx: mpsc::UnboundedReceiver<EvictionNotice>,
}

impl EvictionSignal {
    /// Non-blocking poll for a pending notice.
    pub fn try_notice(&mut self) -> Option<EvictionNotice> {
        self.rx.try_recv().ok()
    }

    /// Await the next notice; `None` once the tenure is superseded.
    pub async fn notice(&mut self) -> Option<EvictionNotice> {
        self.rx.recv().await
    }

    /// Blocking receive for owners living outside an async runtime.
    pub fn blocking_notice(&mut self) -> Option<EvictionNotice> {
        self.rx.blocking_recv()
    }
}

struct Tenure {
    owner: OwnerToken,
    notice_tx: mpsc::UnboundedSender<EvictionNotice>,
}

/// Tracks the current owner and delivers eviction notices.
///
/// Lock-protected internally; `claim`/`release` keep infallible signatures
/// by recovering a poisoned lock (the tenure value is always consistent).
pub struct OwnershipBroker {
    tenure: Mutex<Option<Tenure>>,
}

impl OwnershipBroker {
    pub fn new() -> Self {
        Self {
            tenure: Mutex::new(None),
        }
    }

    /// Register `owner` as the current owner.
    ///
    /// A different previous owner has its eviction notice delivered before
    /// this returns. A same-owner re-claim evicts nobody; the previously
    /// returned signal goes silent and a fresh one is bound.
    pub fn claim(&self, owner: OwnerToken) -> EvictionSignal {
        let (notice_tx, rx) = mpsc::unbounded_channel();
        let mut tenure = self.tenure.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(previous) = tenure.take() {
            if previous.owner != owner {
                let _ = previous.notice_tx.send(EvictionNotice {
                    reason: EvictionReason::Preempted,
                    failure: None,
                });
                log::info!(
                    "[OwnershipBroker] Evicted {} in favor of {}",
                    previous.owner,
                    owner
                );
            } else {
                log::debug!("[OwnershipBroker] {} re-claimed its own tenure", owner);
            }
        }

        *tenure = Some(Tenure { owner, notice_tx });
        EvictionSignal { rx }
    }

    /// Clear the claim if `owner` still holds it.
    ///
    /// A stale release from an already-preempted owner is a no-op; returns
    /// whether the claim was actually cleared.
    pub fn release(&self, owner: &OwnerToken) -> bool {
        let mut tenure = self.tenure.lock().unwrap_or_else(PoisonError::into_inner);
        match tenure.as_ref() {
            Some(current) if current.owner == *owner => {
                *tenure = None;
                log::info!("[OwnershipBroker] {} released its claim", owner);
                true
            }
            _ => {
                log::debug!("[OwnershipBroker] Ignoring stale release from {}", owner);
                false
            }
        }
    }

    pub fn current_owner(&self) -> Option<OwnerToken> {
        self.tenure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|tenure| tenure.owner.clone())
    }

    /// Fire-and-forget delivery to the active tenure, if any.
    ///
    /// Used by the coordinator to tell the unchanged owner its engine handle
    /// was invalidated by a reset.
    pub fn notify_current(&self, notice: EvictionNotice) {
        let tenure = self.tenure.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = tenure.as_ref() {
            let _ = current.notice_tx.send(notice);
        }
    }

    /// Drop the tenure without notifying anyone; claim rollback only.
    pub(crate) fn clear(&self) {
        let mut tenure = self.tenure.lock().unwrap_or_else(PoisonError::into_inner);
        *tenure = None;
    }
}

impl Default for OwnershipBroker {
    fn default() -> Self {
        Self::new()
    }
}
