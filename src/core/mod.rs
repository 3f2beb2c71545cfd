//! Core data model.
//!
//! - Step: one record of an episode
//! - Episode and EpisodeStore: the grouped, read-only episode set

pub mod episode;
pub mod step;

pub use episode::{Episode, EpisodeId, EpisodeStore};
pub use step::Step;
