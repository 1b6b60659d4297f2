//! Platform audio session control and invalidation events.
//!
//! The controller wraps an injected [`SessionBackend`] with state tracking
//! and fans platform invalidation events out to subscribers.

mod backend;
mod controller;
mod events;

pub use backend::{SessionBackend, StubSessionBackend};
pub use controller::{SessionController, SessionState};
pub use events::{SessionEvent, SessionEventPublisher};
