//! # TagSense Presence Engine (tagsense-engine)
//!
//! Core presence tracking and command dispatch:
//! resolves noisy, repeated, multi-reader RFID readings into a
//! consistent "who is where" view, ages out stale presence, maintains
//! location history, and runs the command outbox consumed by hardware
//! agents.
//!
//! All coordination happens through the shared store; every write is an
//! independent last-writer-wins operation, and partial-write states are
//! tolerated and self-healing rather than prevented.

pub mod commands;
pub mod identity;
pub mod ingest;
pub mod presence;
pub mod reaper;
pub mod tasks;

pub use tagsense_common::{Error, Result, Store};
