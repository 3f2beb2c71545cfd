//! Batch assembly.
//!
//! An assembler collates one round's contributions, in the order the
//! scheduler visited the slots, into a single batch value.

pub mod tensor;

use crate::error::Result;

pub use tensor::{TensorAssembler, TensorBatch};

/// Collates contributions into a batch.
///
/// Must be deterministic in the order of `contributions`.
pub trait BatchAssembler<C> {
    /// Assembled batch type.
    type Batch;

    /// Build one batch from one round's contributions.
    fn assemble(&self, contributions: Vec<C>) -> Result<Self::Batch>;
}

/// Keeps the contributions as a plain vector.
#[derive(Debug, Clone, Copy, Default)]
pub struct VecAssembler;

impl<C> BatchAssembler<C> for VecAssembler {
    type Batch = Vec<C>;

    fn assemble(&self, contributions: Vec<C>) -> Result<Vec<C>> {
        Ok(contributions)
    }
}
