//! Facts store: known answers, inferred-answer cache, and invalidation.
//!
//! Every inferred answer records the questions it was derived from; a
//! reverse index maps each depended-on question to the inferred entries
//! that must be dropped when it changes. Only direct dependents are evicted
//! on a write — indirect dependents become garbage that is cleared lazily,
//! because a later ask re-runs the evaluator and re-registers its current
//! dependencies.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::answer::{Answer, AnswerWithDependencies};
use crate::brain::Brain;
use crate::error::{AnswerError, AnswerResult};
use crate::extension::ExtensionValue;
use crate::question::Question;

/// The mutable question-to-answer store.
///
/// A `Facts` borrows its rules from a shared [`Brain`]; several stores may
/// share one Brain, each with its own caches. The engine is single-threaded:
/// an `ask` may recurse through the Brain back into this store, but nothing
/// is ever queried concurrently.
pub struct Facts {
    brain: Arc<Brain>,
    known: HashMap<Question, AnswerWithDependencies>,
    inferred: HashMap<Question, AnswerWithDependencies>,
    /// Reverse index: depended-on question → inferred questions to evict
    /// when it changes.
    dependents: HashMap<Question, HashSet<Question>>,
    cache_answers: bool,
}

impl Facts {
    /// Create a store over a shared Brain.
    ///
    /// With `cache_answers` off, every ask re-derives; the inferred map and
    /// reverse index stay unused. This is the freshness-versus-work
    /// trade-off: caching saves re-evaluation, re-deriving never serves a
    /// stale answer through a path the index has not seen.
    pub fn new(brain: Arc<Brain>, cache_answers: bool) -> Self {
        Self {
            brain,
            known: HashMap::new(),
            inferred: HashMap::new(),
            dependents: HashMap::new(),
            cache_answers,
        }
    }

    pub fn brain(&self) -> &Arc<Brain> {
        &self.brain
    }

    pub fn cache_answers(&self) -> bool {
        self.cache_answers
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Write a known answer, evicting every inferred answer that depends on
    /// this question.
    pub fn know(&mut self, question: Question, answer: impl Into<Answer>) {
        self.forget_inferred_dependent_on(&question);
        self.known
            .insert(question, AnswerWithDependencies::known(answer.into()));
    }

    /// Remove a known answer if present, evicting dependents the same way.
    pub fn forget(&mut self, question: &Question) {
        self.known.remove(question);
        self.forget_inferred_dependent_on(question);
    }

    /// Convenience: `Some` knows, `None` forgets.
    pub fn set(&mut self, question: Question, answer: Option<Answer>) {
        match answer {
            Some(answer) => self.know(question, answer),
            None => self.forget(&question),
        }
    }

    /// Drop all state: known answers, inferred cache, and the reverse index.
    pub fn clear(&mut self) {
        self.known.clear();
        self.inferred.clear();
        self.dependents.clear();
    }

    fn forget_inferred_dependent_on(&mut self, question: &Question) {
        if let Some(dependents) = self.dependents.remove(question) {
            tracing::trace!(
                question = %question,
                evicted = dependents.len(),
                "invalidating inferred answers"
            );
            for dependent in dependents {
                self.inferred.remove(&dependent);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// Answer a question: known answers first, then the inferred cache,
    /// then rule derivation through the Brain.
    pub fn ask(&mut self, question: &Question) -> AnswerResult<AnswerWithDependencies> {
        if let Some(known) = self.known.get(question) {
            return Ok(known.clone());
        }
        if self.cache_answers {
            if let Some(inferred) = self.inferred.get(question) {
                return Ok(inferred.clone());
            }
        }

        let brain = Arc::clone(&self.brain);
        let derived = brain.ask(question, self)?;

        if self.cache_answers {
            for dependency in &derived.dependencies {
                self.dependents
                    .entry(dependency.clone())
                    .or_default()
                    .insert(question.clone());
            }
            self.inferred.insert(question.clone(), derived.clone());
        }
        Ok(derived)
    }

    /// Typed ask: the answer must be a `Bool`.
    pub fn ask_bool(&mut self, question: &Question) -> AnswerResult<bool> {
        match self.ask(question)?.answer {
            Answer::Bool(value) => Ok(value),
            answer => Err(AnswerError::AnswerTypeDoesNotMatchAskType {
                answer,
                expected: "bool",
            }),
        }
    }

    /// Typed ask: the answer must be an `Int`.
    pub fn ask_int(&mut self, question: &Question) -> AnswerResult<i64> {
        match self.ask(question)?.answer {
            Answer::Int(value) => Ok(value),
            answer => Err(AnswerError::AnswerTypeDoesNotMatchAskType {
                answer,
                expected: "int",
            }),
        }
    }

    /// Typed ask: the answer must be a `Double`.
    pub fn ask_double(&mut self, question: &Question) -> AnswerResult<f64> {
        match self.ask(question)?.answer {
            Answer::Double(value) => Ok(value),
            answer => Err(AnswerError::AnswerTypeDoesNotMatchAskType {
                answer,
                expected: "double",
            }),
        }
    }

    /// Typed ask: the answer must be a `String`.
    pub fn ask_string(&mut self, question: &Question) -> AnswerResult<String> {
        match self.ask(question)?.answer {
            Answer::String(value) => Ok(value),
            answer => Err(AnswerError::AnswerTypeDoesNotMatchAskType {
                answer,
                expected: "string",
            }),
        }
    }

    /// Typed ask for a registered extension type: the answer must be a
    /// `Comparable` or `Equatable` whose dynamic value is a `T`.
    pub fn ask_custom<T>(&mut self, question: &Question) -> AnswerResult<T>
    where
        T: ExtensionValue + Clone + 'static,
    {
        let answer = self.ask(question)?.answer;
        let value = match &answer {
            Answer::Comparable(v) | Answer::Equatable(v) => v.as_any().downcast_ref::<T>(),
            _ => None,
        };
        match value {
            Some(v) => Ok(v.clone()),
            None => Err(AnswerError::AnswerTypeDoesNotMatchAskType {
                answer,
                expected: std::any::type_name::<T>(),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    pub fn known_count(&self) -> usize {
        self.known.len()
    }

    pub fn inferred_count(&self) -> usize {
        self.inferred.len()
    }

    /// Inferred questions directly dependent on the given question.
    pub fn dependents_of(&self, question: &Question) -> HashSet<Question> {
        self.dependents.get(question).cloned().unwrap_or_default()
    }
}

impl std::fmt::Debug for Facts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Facts")
            .field("known", &self.known.len())
            .field("inferred", &self.inferred.len())
            .field("cache_answers", &self.cache_answers)
            .finish()
    }
}
