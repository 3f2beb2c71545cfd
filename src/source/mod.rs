//! Episode sources.
//!
//! A source is a single-use, pull-based stream of steps. The episode store
//! drains it exactly once.

pub mod jsonl;

use std::collections::VecDeque;

use crate::core::step::Step;
use crate::error::{Error, Result};

pub use jsonl::JsonlSource;

/// Pull interface over a stream of steps.
pub trait EpisodeSource {
    /// Whether every step of the epoch has been produced.
    fn epoch_done(&self) -> bool;

    /// Produce the next step.
    ///
    /// Only called while `epoch_done` returns false.
    fn next_step(&mut self) -> Result<Step>;
}

/// In-memory source over a list of steps.
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    steps: VecDeque<Step>,
    produced: usize,
}

impl VecSource {
    /// Create a source that yields `steps` in order.
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: steps.into(),
            produced: 0,
        }
    }

    /// Number of steps not yet produced.
    pub fn remaining(&self) -> usize {
        self.steps.len()
    }
}

impl EpisodeSource for VecSource {
    fn epoch_done(&self) -> bool {
        self.steps.is_empty()
    }

    fn next_step(&mut self) -> Result<Step> {
        let step = self.steps.pop_front().ok_or_else(|| Error::Source {
            steps_read: self.produced,
            reason: "next step requested after end of epoch".into(),
        })?;
        self.produced += 1;
        Ok(step)
    }
}
