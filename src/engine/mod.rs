//! Loading engine.
//!
//! This module contains:
//! - EpisodeLoader for building per-partition sessions
//! - ParallelLoader for running every partition on its own thread

pub mod loader;

pub use loader::{EpisodeLoader, ParallelLoader, WorkerBatch};
