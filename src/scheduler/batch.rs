//! Streaming batch scheduler.
//!
//! A session keeps up to `target_width` episodes in flight, one per slot.
//! Each round visits every active slot once and emits one batch with one
//! contribution per surviving slot. Slots whose episode runs out are
//! refilled from the backlog immediately and still contribute in the same
//! round; once the backlog is empty they are retired, so batch width never
//! grows within a session.
//!
//! ## Session States
//!
//! ```text
//!   new() ──► Priming ──(no episodes)──────────────────────────► Done
//!                │                                               ▲
//!                ▼                                               │
//!             Running ──(backlog empty)──► Draining ──(no slots)─┘
//! ```
//!
//! ## Round Traversal
//!
//! Slots are visited from the highest index down. Removing slot `i` only
//! shifts slots above `i`, which were already visited this round, so no
//! slot is skipped or visited twice.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use episode_batcher::collate::VecAssembler;
//! use episode_batcher::core::{EpisodeStore, Step};
//! use episode_batcher::scheduler::{BacklogOrder, BatchScheduler, Partition};
//! use episode_batcher::transform::IdentityTransformer;
//!
//! let store = Arc::new(
//!     EpisodeStore::from_episodes(vec![
//!         vec![Step::new("a"), Step::new("b").done()],
//!         vec![Step::new("c").done()],
//!     ])
//!     .unwrap(),
//! );
//! let partition = Partition::whole(store.len());
//! let scheduler = BatchScheduler::new(
//!     store,
//!     partition,
//!     &IdentityTransformer,
//!     VecAssembler,
//!     2,
//!     BacklogOrder::Sequential,
//! )
//! .unwrap();
//!
//! let widths: Vec<usize> = scheduler.map(|b| b.unwrap().width()).collect();
//! assert_eq!(widths, vec![2, 1]);
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, info};

use super::partition::Partition;
use super::slot::{Slot, SlotPosition};
use crate::collate::BatchAssembler;
use crate::core::episode::{EpisodeId, EpisodeStore};
use crate::error::{Error, Result};
use crate::transform::StepTransformer;

/// Order in which a session starts its partition's episodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BacklogOrder {
    /// Ascending episode index.
    Sequential,
    /// Shuffled by a generator seeded for this session only.
    Shuffled {
        /// Session seed.
        seed: u64,
    },
}

impl BacklogOrder {
    /// Arrange `indices` in this order.
    pub fn arrange(&self, mut indices: Vec<EpisodeId>) -> Vec<EpisodeId> {
        if let Self::Shuffled { seed } = *self {
            let mut rng = StdRng::seed_from_u64(seed);
            indices.shuffle(&mut rng);
        }
        indices
    }
}

/// Lifecycle state of a scheduling session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Filling the initial slots.
    Priming,
    /// Emitting rounds; the backlog can still refill slots.
    Running,
    /// Emitting rounds; the backlog is empty and width only shrinks.
    Draining,
    /// No further batches.
    Done,
}

impl SessionState {
    /// Whether more batches may follow.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Draining)
    }

    /// Get the state name as a static string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Priming => "Priming",
            Self::Running => "Running",
            Self::Draining => "Draining",
            Self::Done => "Done",
        }
    }
}

/// Counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Batches emitted.
    pub rounds: usize,
    /// Contributions across all batches (= steps consumed).
    pub contributions: usize,
    /// Slots refilled from the backlog after their episode ran out.
    pub refills: usize,
    /// Slots removed because the backlog was empty.
    pub retired: usize,
}

/// One emitted round.
#[derive(Debug, Clone)]
pub struct ScheduledBatch<B> {
    /// Zero-based round number within the session.
    pub round: usize,
    /// Origin of each contribution, in contribution order.
    pub positions: Vec<SlotPosition>,
    /// The assembled batch.
    pub batch: B,
}

impl<B> ScheduledBatch<B> {
    /// Number of contributions in this batch.
    pub fn width(&self) -> usize {
        self.positions.len()
    }
}

/// Scheduling session over one partition.
///
/// Iterating yields one `ScheduledBatch` per round. An error ends the
/// session: the failing round yields `Err` and iteration stops.
pub struct BatchScheduler<T, A>
where
    T: StepTransformer,
    A: BatchAssembler<T::Output>,
{
    store: Arc<EpisodeStore>,
    partition_id: usize,
    slots: Vec<Slot<T>>,
    backlog: VecDeque<EpisodeId>,
    assembler: A,
    state: SessionState,
    stats: SessionStats,
}

impl<T, A> BatchScheduler<T, A>
where
    T: StepTransformer,
    A: BatchAssembler<T::Output>,
{
    /// Prime a session.
    ///
    /// Orders the partition's episodes, then fills up to `target_width`
    /// slots, forking one transformer from `prototype` per slot.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for a zero width or a partition that refers
    /// past the end of the store, and propagates fork failures.
    pub fn new(
        store: Arc<EpisodeStore>,
        partition: Partition,
        prototype: &T,
        assembler: A,
        target_width: usize,
        order: BacklogOrder,
    ) -> Result<Self> {
        if target_width == 0 {
            return Err(Error::Config("target batch width must be positive".into()));
        }
        if let Some(&last) = partition.indices().last() {
            if last >= store.len() {
                return Err(Error::Config(format!(
                    "partition refers to episode {last} but the store holds {}",
                    store.len()
                )));
            }
        }

        let partition_id = partition.id();
        let mut backlog: VecDeque<EpisodeId> = order.arrange(partition.into_indices()).into();

        let mut slots = Vec::with_capacity(target_width.min(backlog.len()));
        while slots.len() < target_width {
            let Some(episode) = backlog.pop_front() else {
                break;
            };
            slots.push(Slot::new(episode, prototype.fork()?));
        }

        let mut scheduler = Self {
            store,
            partition_id,
            slots,
            backlog,
            assembler,
            state: SessionState::Priming,
            stats: SessionStats::default(),
        };
        scheduler.update_state();

        debug!(
            partition = partition_id,
            slots = scheduler.slots.len(),
            backlog = scheduler.backlog.len(),
            state = scheduler.state.as_str(),
            "primed session"
        );
        Ok(scheduler)
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Counters so far.
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Number of active slots.
    pub fn num_active(&self) -> usize {
        self.slots.len()
    }

    /// Number of episodes not yet started.
    pub fn num_backlog(&self) -> usize {
        self.backlog.len()
    }

    /// Episodes currently held by the slots, by slot index.
    pub fn active_episodes(&self) -> Vec<EpisodeId> {
        self.slots.iter().map(Slot::episode).collect()
    }

    /// Run one round.
    ///
    /// Returns `Ok(None)` once the session is done.
    pub fn next_round(&mut self) -> Result<Option<ScheduledBatch<A::Batch>>> {
        if !self.state.is_active() {
            return Ok(None);
        }
        match self.run_round() {
            Ok(batch) => {
                self.update_state();
                if batch.is_none() || self.state == SessionState::Done {
                    self.state = SessionState::Done;
                    info!(
                        partition = self.partition_id,
                        rounds = self.stats.rounds,
                        contributions = self.stats.contributions,
                        refills = self.stats.refills,
                        "session finished"
                    );
                }
                Ok(batch)
            }
            Err(e) => {
                self.state = SessionState::Done;
                self.slots.clear();
                Err(e)
            }
        }
    }

    fn run_round(&mut self) -> Result<Option<ScheduledBatch<A::Batch>>> {
        let mut contributions = Vec::with_capacity(self.slots.len());
        let mut positions = Vec::with_capacity(self.slots.len());

        'slots: for i in (0..self.slots.len()).rev() {
            let (position, step) = loop {
                if let Some(next) = self.slots[i].advance(&self.store) {
                    break next;
                }
                match self.backlog.pop_front() {
                    Some(episode) => {
                        debug!(partition = self.partition_id, slot = i, episode, "refilled slot");
                        self.slots[i].reset_to(episode);
                        self.stats.refills += 1;
                    }
                    None => {
                        debug!(partition = self.partition_id, slot = i, "retired slot");
                        self.slots.remove(i);
                        self.stats.retired += 1;
                        continue 'slots;
                    }
                }
            };

            let transformer = &mut self.slots[i].transformer;
            let contribution = transformer.observe(step)?;
            transformer.self_observe()?;

            contributions.push(contribution);
            positions.push(position);
        }

        if contributions.is_empty() {
            return Ok(None);
        }

        let batch = self.assembler.assemble(contributions)?;
        let round = self.stats.rounds;
        self.stats.rounds += 1;
        self.stats.contributions += positions.len();

        Ok(Some(ScheduledBatch {
            round,
            positions,
            batch,
        }))
    }

    fn update_state(&mut self) {
        self.state = if self.slots.is_empty() {
            SessionState::Done
        } else if self.backlog.is_empty() {
            SessionState::Draining
        } else {
            SessionState::Running
        };
    }
}

impl<T, A> Iterator for BatchScheduler<T, A>
where
    T: StepTransformer,
    A: BatchAssembler<T::Output>,
{
    type Item = Result<ScheduledBatch<A::Batch>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_round().transpose()
    }
}

impl<T, A> std::iter::FusedIterator for BatchScheduler<T, A>
where
    T: StepTransformer,
    A: BatchAssembler<T::Output>,
{
}
