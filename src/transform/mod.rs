//! Step transformers.
//!
//! A transformer turns one raw step into one batch contribution. It is
//! stateful within an episode, so the scheduler forks an independent
//! instance for every active slot from a prototype.

pub mod history;

use crate::core::step::Step;
use crate::error::Result;

pub use history::{HistoryTransformer, Observation};

/// Per-slot step processing.
///
/// The scheduler calls `observe` once per step and `self_observe` right
/// after it. Forked instances must not share mutable state.
pub trait StepTransformer: Sized {
    /// Contribution produced for each observed step.
    type Output;

    /// Create an independent instance for a new slot.
    fn fork(&self) -> Result<Self>;

    /// Consume one step and produce its contribution.
    fn observe(&mut self, step: &Step) -> Result<Self::Output>;

    /// Update internal state after `observe`, without new input.
    fn self_observe(&mut self) -> Result<()>;
}

/// Passes steps through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransformer;

impl StepTransformer for IdentityTransformer {
    type Output = Step;

    fn fork(&self) -> Result<Self> {
        Ok(Self)
    }

    fn observe(&mut self, step: &Step) -> Result<Step> {
        Ok(step.clone())
    }

    fn self_observe(&mut self) -> Result<()> {
        Ok(())
    }
}
