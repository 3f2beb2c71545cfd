//! Error types for episode-batcher.

use thiserror::Error;

/// Result type alias for episode-batcher operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for episode-batcher.
#[derive(Error, Debug)]
pub enum Error {
    /// The episode source failed while the store was being drained.
    #[error("episode source failed after {steps_read} steps: {reason}")]
    Source { steps_read: usize, reason: String },

    /// A step transformer failed to fork, observe or self-observe.
    #[error("step transformer failed: {0}")]
    Transformer(String),

    /// The batch assembler rejected a round's contributions.
    #[error("batch assembly failed: {0}")]
    Assembly(String),

    /// An episode with no steps was handed to the store.
    #[error("episode {0} has no steps")]
    EmptyEpisode(usize),

    /// Partition index out of range for the partition count.
    #[error("invalid partition {partition_id} of {num_partitions}")]
    InvalidPartition {
        partition_id: usize,
        num_partitions: usize,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A loader worker thread panicked.
    #[error("worker {0} panicked")]
    WorkerPanicked(usize),

    /// Tensor operation error.
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
