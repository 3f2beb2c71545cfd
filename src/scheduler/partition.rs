//! Round-robin partitioning of episode indices across workers.

use crate::core::episode::EpisodeId;
use crate::error::{Error, Result};

/// Indices in `[0, total)` owned by `partition_id`, ascending.
///
/// Index `i` belongs to partition `i % num_partitions`. The caller
/// guarantees `partition_id < num_partitions`.
///
/// ```
/// use episode_batcher::scheduler::partition::select_indices;
///
/// assert_eq!(select_indices(7, 3, 0), vec![0, 3, 6]);
/// assert_eq!(select_indices(7, 3, 2), vec![2, 5]);
/// ```
pub fn select_indices(total: usize, num_partitions: usize, partition_id: usize) -> Vec<EpisodeId> {
    debug_assert!(partition_id < num_partitions);
    (partition_id..total).step_by(num_partitions.max(1)).collect()
}

/// One worker's share of the episode store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    id: usize,
    count: usize,
    indices: Vec<EpisodeId>,
}

impl Partition {
    /// Select partition `partition_id` of `num_partitions` over `total`
    /// episodes.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPartition` if `num_partitions` is zero or
    /// `partition_id` is out of range.
    pub fn new(total: usize, num_partitions: usize, partition_id: usize) -> Result<Self> {
        if num_partitions == 0 || partition_id >= num_partitions {
            return Err(Error::InvalidPartition {
                partition_id,
                num_partitions,
            });
        }
        Ok(Self {
            id: partition_id,
            count: num_partitions,
            indices: select_indices(total, num_partitions, partition_id),
        })
    }

    /// The single partition that owns every episode.
    pub fn whole(total: usize) -> Self {
        Self {
            id: 0,
            count: 1,
            indices: (0..total).collect(),
        }
    }

    /// Partition index.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Total partition count.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Owned episode indices, ascending.
    pub fn indices(&self) -> &[EpisodeId] {
        &self.indices
    }

    /// Number of owned episodes.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Whether the partition owns no episodes.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub(crate) fn into_indices(self) -> Vec<EpisodeId> {
        self.indices
    }
}
