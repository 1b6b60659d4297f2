//! Engine lifecycle ownership: start, stop, reset, and handle minting.
//!
//! This module exposes trait-based backends (`backend`) and the
//! [`EngineLifecycle`] state owner the coordinator drives. The engine itself
//! stays opaque; owners configure it through a generation-tagged handle.

mod backend;
mod lifecycle;
mod stub;

pub use backend::{EngineBackend, SystemTimeSource, TimeSource};
pub use lifecycle::{EngineHandle, EngineLifecycle, EngineState};
pub use stub::{StubEngineBackend, StubTimeSource};
