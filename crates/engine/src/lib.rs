//! The inventory process execution engine.
//!
//! Accepts process submissions, guarantees at most one active process per
//! inventory within a family, dispatches work through typed in-memory
//! queues to per-family worker pools, and supports cooperative plus
//! forceful cancellation of running work. Every process row moves through
//! a forward-only state machine: `Requested` → `Running` → one terminal
//! state.
//!
//! The engine owns no scan or migration logic; concrete work is plugged
//! in through [`processor::Processor`] implementations registered at
//! startup.

pub mod cancel;
pub mod config;
mod dispatch;
pub mod engine;
pub mod error;
pub mod processor;
pub mod queue;
pub mod submit;

pub use engine::Engine;
pub use error::EngineError;
