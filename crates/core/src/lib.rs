//! Shared domain types for the stevedore backend.
//!
//! Everything here is persistence- and transport-agnostic: ID aliases,
//! the inventory process code enums, the cancellation registries, and the
//! in-memory queue item handed from the submission gate to the dispatch
//! workers.

pub mod cancel;
pub mod codes;
pub mod item;
pub mod types;
