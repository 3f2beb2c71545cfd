//! Episodes and the episode store.
//!
//! The store is built once, by draining an [`EpisodeSource`], and is
//! read-only afterwards. Worker partitions share it through an `Arc`.

use std::ops::Index;

use tracing::{debug, info};

use crate::core::step::Step;
use crate::error::{Error, Result};
use crate::source::EpisodeSource;

/// Position of an episode within the store.
pub type EpisodeId = usize;

/// An ordered, non-empty sequence of steps.
#[derive(Debug, Clone, PartialEq)]
pub struct Episode {
    steps: Vec<Step>,
}

impl Episode {
    /// Wrap a list of steps.
    ///
    /// Returns `None` for an empty list.
    pub fn new(steps: Vec<Step>) -> Option<Self> {
        if steps.is_empty() {
            None
        } else {
            Some(Self { steps })
        }
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false; episodes hold at least one step.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step at `index`, if any.
    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    /// All steps in order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Whether the last step carries the terminal flag.
    ///
    /// False only for a trailing episode cut off by the end of the source.
    pub fn is_terminated(&self) -> bool {
        self.steps.last().is_some_and(|s| s.episode_done)
    }
}

/// The full, ordered set of episodes.
///
/// # Example
///
/// ```
/// use episode_batcher::core::episode::EpisodeStore;
/// use episode_batcher::core::step::Step;
/// use episode_batcher::source::VecSource;
///
/// let mut source = VecSource::new(vec![
///     Step::new("a"),
///     Step::new("b").done(),
///     Step::new("c"),
/// ]);
/// let store = EpisodeStore::build(&mut source).unwrap();
/// assert_eq!(store.len(), 2);
/// assert_eq!(store.num_steps(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct EpisodeStore {
    episodes: Vec<Episode>,
}

impl EpisodeStore {
    /// Drain `source` into a store.
    ///
    /// Steps accumulate into the current episode until one has
    /// `episode_done` set. Steps left over when the source reports its epoch
    /// complete form a final episode.
    ///
    /// # Errors
    ///
    /// Returns `Error::Source` if the source fails. Nothing is retried.
    pub fn build<S: EpisodeSource + ?Sized>(source: &mut S) -> Result<Self> {
        let mut episodes = Vec::new();
        let mut pending = Vec::new();
        let mut steps_read = 0usize;

        while !source.epoch_done() {
            let step = source.next_step().map_err(|e| match e {
                Error::Source { .. } => e,
                other => Error::Source {
                    steps_read,
                    reason: other.to_string(),
                },
            })?;
            steps_read += 1;

            let done = step.episode_done;
            pending.push(step);
            if done {
                episodes.push(Episode {
                    steps: std::mem::take(&mut pending),
                });
            }
        }

        if !pending.is_empty() {
            debug!(steps = pending.len(), "source ended mid-episode, keeping trailing steps");
            episodes.push(Episode { steps: pending });
        }

        info!(episodes = episodes.len(), steps = steps_read, "built episode store");
        Ok(Self { episodes })
    }

    /// Build a store from pre-grouped episodes.
    ///
    /// # Errors
    ///
    /// Returns `Error::EmptyEpisode` for the first episode with no steps.
    pub fn from_episodes(episodes: Vec<Vec<Step>>) -> Result<Self> {
        let episodes = episodes
            .into_iter()
            .enumerate()
            .map(|(i, steps)| Episode::new(steps).ok_or(Error::EmptyEpisode(i)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { episodes })
    }

    /// Number of episodes.
    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    /// Whether the store holds no episodes.
    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }

    /// Total number of steps across all episodes.
    pub fn num_steps(&self) -> usize {
        self.episodes.iter().map(Episode::len).sum()
    }

    /// Episode by id.
    pub fn get(&self, id: EpisodeId) -> Option<&Episode> {
        self.episodes.get(id)
    }

    /// Iterate over episodes in store order.
    pub fn iter(&self) -> std::slice::Iter<'_, Episode> {
        self.episodes.iter()
    }
}

impl Index<EpisodeId> for EpisodeStore {
    type Output = Episode;

    fn index(&self, id: EpisodeId) -> &Episode {
        &self.episodes[id]
    }
}
