//! Batch scheduling.
//!
//! This module handles:
//! - Partitioning episode indices across workers
//! - Per-slot cursors over in-flight episodes
//! - The round loop that keeps batches at the target width

pub mod batch;
pub mod partition;
pub mod slot;

pub use batch::{BacklogOrder, BatchScheduler, ScheduledBatch, SessionState, SessionStats};
pub use partition::{select_indices, Partition};
pub use slot::SlotPosition;
