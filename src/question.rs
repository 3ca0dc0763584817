//! Question identifiers.
//!
//! A [`Question`] names a fact slot: clients write known answers against it,
//! rules derive answers for it, and dependency sets are sets of questions.

use serde::{Deserialize, Serialize};

/// A non-empty string identifier for a fact slot.
///
/// Equality and hashing are identifier equality. Questions are immutable and
/// cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Question(String);

impl Question {
    /// Create a question. Returns `None` for an empty identifier.
    pub fn new(identifier: impl Into<String>) -> Option<Self> {
        let identifier = identifier.into();
        if identifier.is_empty() {
            None
        } else {
            Some(Self(identifier))
        }
    }

    /// The identifier string.
    pub fn identifier(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Question {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Question::new(value).ok_or_else(|| "question identifier must be non-empty".to_string())
    }
}

impl From<Question> for String {
    fn from(question: Question) -> Self {
        question.0
    }
}

impl std::fmt::Display for Question {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
