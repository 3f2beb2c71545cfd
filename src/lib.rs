//! episode-batcher: streaming batch scheduling for episodic data.
//!
//! This crate turns a set of variable-length episodes into a stream of
//! fixed-width batches:
//! - Episodes are grouped once from a pull-based source into a shared store
//! - The store is partitioned round-robin across worker threads
//! - Each partition keeps its batch at the target width, refilling slots
//!   from a seeded, shuffled backlog as episodes finish
//! - Stateful per-slot transformers and pluggable assemblers produce the
//!   batch contents

pub mod config;
pub mod error;

pub mod collate;
pub mod core;
pub mod engine;
pub mod scheduler;
pub mod source;
pub mod transform;

pub use collate::{BatchAssembler, TensorAssembler, TensorBatch, VecAssembler};
pub use config::{CollateConfig, Config, HistoryConfig, LoaderConfig};
pub use crate::core::{Episode, EpisodeId, EpisodeStore, Step};
pub use engine::{EpisodeLoader, ParallelLoader, WorkerBatch};
pub use error::{Error, Result};
pub use scheduler::{
    select_indices, BacklogOrder, BatchScheduler, Partition, ScheduledBatch, SessionState,
    SessionStats, SlotPosition,
};
pub use source::{EpisodeSource, JsonlSource, VecSource};
pub use transform::{HistoryTransformer, IdentityTransformer, Observation, StepTransformer};
