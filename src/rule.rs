//! Rule records.

use crate::answer::Answer;
use crate::predicate::Predicate;
use crate::question::Question;

/// A conditional implication: when `predicate` holds, `question` resolves to
/// `answer` (or to whatever the named assignment function computes from it).
///
/// Rules are plain data. Keeping the assignment as a *name* rather than a
/// function value keeps rules fully serializable; the Brain resolves the
/// name against its registry when the rule fires.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// Selection precedence; higher wins. Ties fall back to predicate size.
    pub priority: i32,
    pub predicate: Predicate,
    /// The question this rule produces an answer for.
    pub question: Question,
    pub answer: Answer,
    /// Optional name of a Brain-registered function that computes the final
    /// answer when the rule fires.
    pub assignment: Option<String>,
}

impl Rule {
    pub fn new(
        priority: i32,
        predicate: Predicate,
        question: Question,
        answer: impl Into<Answer>,
    ) -> Self {
        Self {
            priority,
            predicate,
            question,
            answer: answer.into(),
            assignment: None,
        }
    }

    pub fn with_assignment(mut self, name: impl Into<String>) -> Self {
        self.assignment = Some(name.into());
        self
    }
}
