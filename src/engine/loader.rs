//! Episode loaders.
//!
//! `EpisodeLoader` turns a shared store and a `LoaderConfig` into one
//! scheduling session per partition. `ParallelLoader` runs every partition
//! on its own thread and merges their batches into one stream.
//!
//! ## Worker Layout
//!
//! ```text
//!                      Arc<EpisodeStore> (read-only)
//!            ┌──────────────────┼──────────────────┐
//!            ▼                  ▼                  ▼
//!     ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//!     │  worker 0   │    │  worker 1   │    │  worker N   │
//!     │ 0, N, 2N... │    │ 1, N+1, ... │    │     ...     │
//!     │  session    │    │  session    │    │  session    │
//!     └──────┬──────┘    └──────┬──────┘    └──────┬──────┘
//!            └──────────────────┼──────────────────┘
//!                               ▼
//!                   bounded channel (prefetch)
//!                               ▼
//!                         consumer (Iterator)
//! ```

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::{self, Receiver};
use tracing::{debug, info, warn};

use crate::collate::BatchAssembler;
use crate::config::LoaderConfig;
use crate::core::episode::EpisodeStore;
use crate::error::{Error, Result};
use crate::scheduler::{BacklogOrder, BatchScheduler, Partition, ScheduledBatch, SessionStats};
use crate::transform::StepTransformer;

/// Builds per-partition scheduling sessions over a shared store.
#[derive(Debug, Clone)]
pub struct EpisodeLoader {
    store: Arc<EpisodeStore>,
    config: LoaderConfig,
    seed: u64,
}

impl EpisodeLoader {
    /// Create a loader.
    ///
    /// When the config has no seed one is drawn from entropy and logged, so
    /// a run can be repeated.
    pub fn new(store: Arc<EpisodeStore>, config: LoaderConfig) -> Result<Self> {
        config.validate()?;
        let seed = match config.seed {
            Some(seed) => seed,
            None => {
                let seed: u64 = rand::random();
                info!(seed, "no loader seed configured, drew one from entropy");
                seed
            }
        };
        Ok(Self {
            store,
            config,
            seed,
        })
    }

    /// The shared store.
    pub fn store(&self) -> &Arc<EpisodeStore> {
        &self.store
    }

    /// Loader configuration.
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Base seed in effect.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Episodes owned by worker `partition_id`.
    pub fn partition(&self, partition_id: usize) -> Result<Partition> {
        Partition::new(self.store.len(), self.config.num_workers, partition_id)
    }

    /// Backlog order for worker `partition_id`.
    pub fn backlog_order(&self, partition_id: usize) -> BacklogOrder {
        if self.config.shuffle {
            BacklogOrder::Shuffled {
                seed: LoaderConfig::partition_seed(self.seed, partition_id),
            }
        } else {
            BacklogOrder::Sequential
        }
    }

    /// Prime the session for one partition.
    pub fn session<T, A>(
        &self,
        partition_id: usize,
        prototype: &T,
        assembler: A,
    ) -> Result<BatchScheduler<T, A>>
    where
        T: StepTransformer,
        A: BatchAssembler<T::Output>,
    {
        let partition = self.partition(partition_id)?;
        BatchScheduler::new(
            Arc::clone(&self.store),
            partition,
            prototype,
            assembler,
            self.config.batch_size,
            self.backlog_order(partition_id),
        )
    }

    /// Start one worker thread per partition.
    ///
    /// Every session is primed before any thread starts, so fork failures
    /// are reported here rather than through the stream.
    pub fn spawn<T, A>(&self, prototype: &T, assembler: A) -> Result<ParallelLoader<A::Batch>>
    where
        T: StepTransformer + Send + 'static,
        A: BatchAssembler<T::Output> + Clone + Send + 'static,
        A::Batch: Send + 'static,
    {
        let sessions = (0..self.config.num_workers)
            .map(|id| self.session(id, prototype, assembler.clone()))
            .collect::<Result<Vec<_>>>()?;

        let (sender, receiver) = channel::bounded(self.config.prefetch_batches);
        // Handles go straight into the loader so a failed spawn still joins
        // the threads already running when `loader` is dropped.
        let mut loader = ParallelLoader {
            receiver: Some(receiver),
            workers: Vec::with_capacity(sessions.len()),
            stats: Vec::new(),
        };

        for (worker_id, mut session) in sessions.into_iter().enumerate() {
            let sender = sender.clone();
            let handle = std::thread::Builder::new()
                .name(format!("episode-worker-{worker_id}"))
                .spawn(move || {
                    while let Some(item) = session.next() {
                        let item = item.map(|inner| WorkerBatch { worker_id, inner });
                        if sender.send(item).is_err() {
                            debug!(worker = worker_id, "consumer hung up, stopping");
                            break;
                        }
                    }
                    session.stats()
                })?;
            loader.workers.push((worker_id, handle));
        }

        info!(
            workers = loader.workers.len(),
            episodes = self.store.len(),
            batch_size = self.config.batch_size,
            "started parallel loader"
        );

        Ok(loader)
    }
}

/// A batch tagged with the worker that produced it.
#[derive(Debug, Clone)]
pub struct WorkerBatch<B> {
    /// Partition index of the producing worker.
    pub worker_id: usize,
    /// The scheduled batch.
    pub inner: ScheduledBatch<B>,
}

/// Merged batch stream from all worker partitions.
///
/// Batches from different workers interleave in arrival order; batches from
/// one worker keep their round order. Dropping the loader stops the workers
/// at their next round boundary.
pub struct ParallelLoader<B> {
    receiver: Option<Receiver<Result<WorkerBatch<B>>>>,
    workers: Vec<(usize, JoinHandle<SessionStats>)>,
    stats: Vec<(usize, SessionStats)>,
}

impl<B> ParallelLoader<B> {
    /// Per-worker session counters, available once the stream has ended.
    pub fn stats(&self) -> &[(usize, SessionStats)] {
        &self.stats
    }

    /// Join every worker, keeping their counters.
    ///
    /// Returns the id of the first worker that panicked, if any.
    fn join_workers(&mut self) -> Option<usize> {
        let mut panicked = None;
        for (worker_id, handle) in self.workers.drain(..) {
            match handle.join() {
                Ok(stats) => self.stats.push((worker_id, stats)),
                Err(_) => {
                    warn!(worker = worker_id, "worker panicked");
                    panicked.get_or_insert(worker_id);
                }
            }
        }
        panicked
    }
}

impl<B> Iterator for ParallelLoader<B> {
    type Item = Result<WorkerBatch<B>>;

    fn next(&mut self) -> Option<Self::Item> {
        let receiver = self.receiver.as_ref()?;
        match receiver.recv() {
            Ok(item) => Some(item),
            Err(_) => {
                // Every sender is gone: all workers have returned or panicked.
                self.receiver = None;
                self.join_workers().map(|id| Err(Error::WorkerPanicked(id)))
            }
        }
    }
}

impl<B> Drop for ParallelLoader<B> {
    fn drop(&mut self) {
        // Hang up first so blocked workers fail their send and exit.
        self.receiver.take();
        self.join_workers();
    }
}
