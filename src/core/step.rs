//! A single record within an episode.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One step of an episode.
///
/// Only `episode_done` matters to the scheduler. Everything else is payload
/// for the step transformer; unknown JSON fields survive in `extra`.
///
/// # Example
///
/// ```
/// use episode_batcher::core::step::Step;
///
/// let step = Step::new("hello").with_labels(["hi there"]).done();
/// assert!(step.episode_done);
/// assert_eq!(step.first_label(), Some("hi there"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Optional speaker or task identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Observation text.
    #[serde(default)]
    pub text: String,
    /// Target responses for this step.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    /// Marks the final step of its episode.
    #[serde(default)]
    pub episode_done: bool,
    /// Any other fields of the record.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Step {
    /// Create a non-terminal step with the given text.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Set the labels.
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Set the identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Mark this step as the last of its episode.
    pub fn done(mut self) -> Self {
        self.episode_done = true;
        self
    }

    /// The first label, if any.
    pub fn first_label(&self) -> Option<&str> {
        self.labels.first().map(String::as_str)
    }
}
