//! Dialogue-history transformer.
//!
//! Each slot keeps the running history of its current episode. Observing a
//! step appends the step text; self-observing appends the agent's own reply
//! (the first label) so the next turn sees the full exchange. History is
//! cleared after the terminal step of an episode.
//!
//! ```text
//!   step 1 text ─► observe ─► [t1]            ─► Observation("t1")
//!                  self_observe ─► [t1, l1]
//!   step 2 text ─► observe ─► [t1, l1, t2]    ─► Observation("t1\nl1\nt2")
//!                  self_observe ─► cleared (episode_done)
//! ```

use std::collections::VecDeque;

use serde::Serialize;

use super::StepTransformer;
use crate::config::HistoryConfig;
use crate::core::step::Step;
use crate::error::{Error, Result};

/// Padding token id.
pub const PAD_TOKEN_ID: u32 = 0;

/// Number of reserved ids below the first byte token.
pub const NUM_SPECIAL_TOKENS: u32 = 4;

/// Byte-level tokenization: each UTF-8 byte maps to its own id above the
/// reserved range.
pub fn tokenize(text: &str) -> Vec<u32> {
    text.bytes().map(|b| b as u32 + NUM_SPECIAL_TOKENS).collect()
}

/// Inverse of [`tokenize`]. Reserved ids are skipped.
pub fn detokenize(ids: &[u32]) -> String {
    let bytes: Vec<u8> = ids
        .iter()
        .filter(|&&id| id >= NUM_SPECIAL_TOKENS)
        .filter_map(|&id| u8::try_from(id - NUM_SPECIAL_TOKENS).ok())
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Contribution produced by [`HistoryTransformer`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    /// Flattened history, including the current step.
    pub text: String,
    /// Labels of the current step.
    pub labels: Vec<String>,
    /// Tokenized `text`, truncated from the left.
    pub token_ids: Vec<u32>,
    /// Whether the current step ends its episode.
    pub episode_done: bool,
    /// Zero-based turn within the episode.
    pub turn: usize,
}

/// Stateful transformer that accumulates dialogue history per episode.
#[derive(Debug, Clone)]
pub struct HistoryTransformer {
    config: HistoryConfig,
    turns: VecDeque<String>,
    /// Reply to append on the next `self_observe`.
    pending_reply: Option<String>,
    /// Whether the last observed step was terminal.
    last_done: bool,
    /// Whether `observe` ran since the last `self_observe`.
    observed: bool,
    turn: usize,
}

impl HistoryTransformer {
    /// Create a transformer with empty history.
    pub fn new(config: HistoryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            turns: VecDeque::new(),
            pending_reply: None,
            last_done: false,
            observed: false,
            turn: 0,
        })
    }

    /// Current history turns.
    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.turns.iter().map(String::as_str)
    }

    /// Turn index of the next observed step.
    pub fn turn(&self) -> usize {
        self.turn
    }

    fn push_turn(&mut self, text: String) {
        self.turns.push_back(text);
        if let Some(limit) = self.config.history_size {
            while self.turns.len() > limit {
                self.turns.pop_front();
            }
        }
    }

    fn reset(&mut self) {
        self.turns.clear();
        self.pending_reply = None;
        self.last_done = false;
        self.turn = 0;
    }
}

impl StepTransformer for HistoryTransformer {
    type Output = Observation;

    /// Forks start with empty history and share only the configuration.
    fn fork(&self) -> Result<Self> {
        Self::new(self.config.clone())
    }

    fn observe(&mut self, step: &Step) -> Result<Observation> {
        if !step.text.is_empty() {
            self.push_turn(step.text.clone());
        }

        let parts: Vec<&str> = self.turns.iter().map(String::as_str).collect();
        let text = parts.join(&self.config.delimiter);

        let mut token_ids = tokenize(&text);
        if let Some(limit) = self.config.text_truncate {
            if token_ids.len() > limit {
                token_ids.drain(..token_ids.len() - limit);
            }
        }

        self.pending_reply = if self.config.include_labels {
            step.first_label().map(str::to_string)
        } else {
            None
        };
        self.last_done = step.episode_done;
        self.observed = true;

        Ok(Observation {
            text,
            labels: step.labels.clone(),
            token_ids,
            episode_done: step.episode_done,
            turn: self.turn,
        })
    }

    fn self_observe(&mut self) -> Result<()> {
        if !self.observed {
            return Err(Error::Transformer(
                "self_observe called without a preceding observe".into(),
            ));
        }
        self.observed = false;

        if self.last_done {
            self.reset();
            return Ok(());
        }
        if let Some(reply) = self.pending_reply.take() {
            self.push_turn(reply);
        }
        self.turn += 1;
        Ok(())
    }
}
