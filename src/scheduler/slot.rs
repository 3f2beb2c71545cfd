//! Active slots: a cursor over one episode plus its own transformer.

use serde::Serialize;

use crate::core::episode::{EpisodeId, EpisodeStore};
use crate::core::step::Step;

/// Where a contribution came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SlotPosition {
    /// Episode the step belongs to.
    pub episode: EpisodeId,
    /// Index of the step within the episode.
    pub step: usize,
}

/// Cursor over one episode's remaining steps.
#[derive(Debug)]
pub(crate) struct Slot<T> {
    episode: EpisodeId,
    /// Index of the next step to hand out.
    next: usize,
    pub(crate) transformer: T,
}

impl<T> Slot<T> {
    pub(crate) fn new(episode: EpisodeId, transformer: T) -> Self {
        Self {
            episode,
            next: 0,
            transformer,
        }
    }

    pub(crate) fn episode(&self) -> EpisodeId {
        self.episode
    }

    /// Point the cursor at the first step of `episode`, keeping the
    /// transformer.
    pub(crate) fn reset_to(&mut self, episode: EpisodeId) {
        self.episode = episode;
        self.next = 0;
    }

    /// Move to the next step, or `None` once the episode is exhausted.
    pub(crate) fn advance<'s>(
        &mut self,
        store: &'s EpisodeStore,
    ) -> Option<(SlotPosition, &'s Step)> {
        let step = store.get(self.episode)?.step(self.next)?;
        let position = SlotPosition {
            episode: self.episode,
            step: self.next,
        };
        self.next += 1;
        Some((position, step))
    }
}
