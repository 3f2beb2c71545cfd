//! Configuration types for episode-batcher.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Top-level configuration, as read from a JSON file by the CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scheduling and worker settings.
    pub loader: LoaderConfig,
    /// Dialogue history settings for the history transformer.
    pub history: HistoryConfig,
    /// Collation settings for the tensor assembler.
    pub collate: CollateConfig,
}

impl Config {
    /// Read and validate a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every section.
    pub fn validate(&self) -> Result<()> {
        self.loader.validate()?;
        self.history.validate()
    }
}

/// Loader configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Target batch width (active slots per partition).
    pub batch_size: usize,
    /// Number of worker partitions.
    pub num_workers: usize,
    /// Base seed for backlog shuffling. Drawn from entropy when `None`.
    pub seed: Option<u64>,
    /// Shuffle each partition's backlog. When false episodes are started
    /// in ascending index order.
    pub shuffle: bool,
    /// Finished batches a parallel loader may hold before workers block.
    pub prefetch_batches: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            num_workers: 1,
            seed: None,
            shuffle: true,
            prefetch_batches: 2,
        }
    }
}

impl LoaderConfig {
    /// Create a loader config with the given batch width.
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            ..Default::default()
        }
    }

    /// Set the number of worker partitions.
    pub fn num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    /// Set the base shuffle seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Enable or disable backlog shuffling.
    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Set the prefetch depth of the parallel loader.
    pub fn prefetch_batches(mut self, prefetch_batches: usize) -> Self {
        self.prefetch_batches = prefetch_batches;
        self
    }

    /// Validate the settings.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the batch width or worker count is zero.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be positive".into()));
        }
        if self.num_workers == 0 {
            return Err(Error::Config("num_workers must be positive".into()));
        }
        Ok(())
    }

    /// Seed for one partition's session.
    ///
    /// Each partition gets its own stream so sessions stay reproducible
    /// regardless of how many workers run alongside.
    pub fn partition_seed(base: u64, partition_id: usize) -> u64 {
        base.wrapping_add((partition_id as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }
}

/// Dialogue history configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of turns kept in the history (`None` = unbounded).
    pub history_size: Option<usize>,
    /// Keep only the last N tokens of the flattened history.
    pub text_truncate: Option<usize>,
    /// Separator between turns.
    pub delimiter: String,
    /// Append the first label of each step as the agent's own reply.
    pub include_labels: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            history_size: None,
            text_truncate: None,
            delimiter: "\n".to_string(),
            include_labels: true,
        }
    }
}

impl HistoryConfig {
    /// Validate the settings.
    pub fn validate(&self) -> Result<()> {
        if self.history_size == Some(0) {
            return Err(Error::Config("history_size must be positive".into()));
        }
        if self.text_truncate == Some(0) {
            return Err(Error::Config("text_truncate must be positive".into()));
        }
        Ok(())
    }
}

/// Collation configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CollateConfig {
    /// Token id used to right-pad shorter rows.
    pub pad_token_id: u32,
}
