//! The Brain: rule index, candidate selection, and assignment registry.
//!
//! Rules are indexed by the question they produce, each list kept sorted
//! descending by `(priority, predicate size)` so the head of the list is
//! always the strongest candidate. Structural ambiguities (two rules landing
//! on the same rank) are journaled at insertion; runtime ambiguities (peers
//! matching at once) are handled per the construction-time [`Strategy`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::answer::AnswerWithDependencies;
use crate::error::{AnswerError, AnswerResult, AssignmentError};
use crate::facts::Facts;
use crate::question::Question;
use crate::rule::Rule;

/// What to do when several equally-ranked rules match at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Fail the ask with [`AnswerError::Ambiguous`].
    #[default]
    Fail,
    /// Fire the first match and journal the whole peer group into the
    /// produced answer's `ambiguous_rules`.
    Undefined,
}

/// An assignment function: computes the final answer for a fired rule from
/// the rule itself, the facts, and the dependency set captured by the
/// winning predicate evaluation.
pub type AssignmentFn = Arc<
    dyn Fn(&Rule, &mut Facts, &HashSet<Question>) -> Result<AnswerWithDependencies, AssignmentError>
        + Send
        + Sync,
>;

/// A rule plus its predicate size, captured once at insertion.
#[derive(Debug, Clone)]
struct RankedRule {
    rule: Rule,
    size: usize,
}

impl RankedRule {
    fn rank(&self) -> (i32, usize) {
        (self.rule.priority, self.size)
    }
}

/// The rule index plus assignment registry.
///
/// A Brain is configured once (rules added, assignments registered) and then
/// shared read-only — typically behind an `Arc` — by any number of `Facts`
/// instances, each carrying its own caches.
pub struct Brain {
    strategy: Strategy,
    rules: HashMap<Question, Vec<RankedRule>>,
    assignments: HashMap<String, AssignmentFn>,
    /// Structural ambiguities recorded at insertion: pairs of rules for the
    /// same question sharing both priority and predicate size.
    ambiguous: HashMap<Question, Vec<(Rule, Rule)>>,
}

impl Brain {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            rules: HashMap::new(),
            assignments: HashMap::new(),
            ambiguous: HashMap::new(),
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Add a batch of rules.
    ///
    /// Every affected per-question list is re-sorted descending by
    /// `(priority, size)`; the sort is stable, so rules of equal rank keep
    /// insertion order. The insertion-time ambiguity journal for each
    /// affected question is rebuilt from the full list.
    pub fn add_rules(&mut self, rules: Vec<Rule>) {
        let mut touched = HashSet::new();
        for rule in rules {
            let size = rule.predicate.size();
            touched.insert(rule.question.clone());
            self.rules
                .entry(rule.question.clone())
                .or_default()
                .push(RankedRule { rule, size });
        }

        for question in touched {
            let Some(list) = self.rules.get_mut(&question) else {
                continue;
            };
            list.sort_by(|a, b| b.rank().cmp(&a.rank()));

            let mut pairs = Vec::new();
            let mut run_start = 0;
            for i in 1..=list.len() {
                if i == list.len() || list[i].rank() != list[run_start].rank() {
                    for a in run_start..i {
                        for b in (a + 1)..i {
                            pairs.push((list[a].rule.clone(), list[b].rule.clone()));
                        }
                    }
                    run_start = i;
                }
            }

            if pairs.is_empty() {
                self.ambiguous.remove(&question);
            } else {
                tracing::debug!(
                    question = %question,
                    pairs = pairs.len(),
                    "ambiguous rule pairs recorded at insertion"
                );
                self.ambiguous.insert(question, pairs);
            }
        }
    }

    /// Register an assignment function under a name.
    ///
    /// Must complete before the first `ask`; firing a rule whose assignment
    /// name is unregistered fails with [`AssignmentError::AssignmentNotFound`].
    pub fn add_assignment<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&Rule, &mut Facts, &HashSet<Question>) -> Result<AnswerWithDependencies, AssignmentError>
            + Send
            + Sync
            + 'static,
    {
        self.assignments.insert(name.into(), Arc::new(function));
    }

    /// Answer a question from rules. Invoked by `Facts::ask` on cache miss.
    ///
    /// Walks the sorted rule list collecting every matching rule, stopping
    /// as soon as a rule ranks strictly below the first match: rules sharing
    /// the maximum `(priority, size)` are peers, strictly-dominated rules
    /// are ignored.
    pub fn ask(&self, question: &Question, facts: &mut Facts) -> AnswerResult<AnswerWithDependencies> {
        let ranked = match self.rules.get(question) {
            Some(list) if !list.is_empty() => list,
            _ => return Err(AnswerError::NoRuleFound(question.clone())),
        };

        let mut candidates: Vec<(&RankedRule, crate::predicate::Evaluation)> = Vec::new();
        for entry in ranked {
            if let Some((first, _)) = candidates.first() {
                if entry.rank() < first.rank() {
                    break;
                }
            }
            let eval = entry
                .rule
                .predicate
                .evaluate(facts)
                .map_err(AnswerError::CandidateEvaluationFailed)?;
            if eval.value {
                candidates.push((entry, eval));
            }
        }

        tracing::debug!(
            question = %question,
            candidates = candidates.len(),
            "candidate walk complete"
        );

        if candidates.is_empty() {
            return Err(AnswerError::NoRuleFound(question.clone()));
        }

        let peer_group = if candidates.len() > 1 {
            match self.strategy {
                Strategy::Fail => return Err(AnswerError::Ambiguous(question.clone())),
                Strategy::Undefined => {
                    Some(candidates.iter().map(|(r, _)| r.rule.clone()).collect())
                }
            }
        } else {
            None
        };

        let (winner, eval) = candidates.swap_remove(0);
        self.fire(&winner.rule, eval, peer_group, facts)
    }

    /// Produce the answer for a matched rule.
    fn fire(
        &self,
        rule: &Rule,
        eval: crate::predicate::Evaluation,
        peer_group: Option<Vec<Rule>>,
        facts: &mut Facts,
    ) -> AnswerResult<AnswerWithDependencies> {
        tracing::trace!(
            question = %rule.question,
            priority = rule.priority,
            assignment = rule.assignment.as_deref().unwrap_or("-"),
            "firing rule"
        );

        let mut ambiguous_rules = eval.ambiguous_rules;
        if let Some(group) = peer_group {
            ambiguous_rules.push(group);
        }

        match &rule.assignment {
            None => Ok(AnswerWithDependencies {
                answer: rule.answer.clone(),
                dependencies: eval.dependencies,
                ambiguous_rules,
            }),
            Some(name) => {
                let function = self.assignments.get(name).ok_or_else(|| {
                    AnswerError::AssignmentFailed(AssignmentError::AssignmentNotFound(name.clone()))
                })?;
                let mut produced = (function.as_ref())(rule, facts, &eval.dependencies)
                    .map_err(AnswerError::AssignmentFailed)?;
                // The predicate consulted these questions regardless of what
                // the assignment returns; invalidation must see them.
                produced.dependencies.extend(eval.dependencies);
                produced.ambiguous_rules.extend(ambiguous_rules);
                Ok(produced)
            }
        }
    }

    /// Number of rules across all questions.
    pub fn rule_count(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }

    /// Rules for a question in selection order, strongest first.
    pub fn rules_for(&self, question: &Question) -> Vec<&Rule> {
        self.rules
            .get(question)
            .map(|list| list.iter().map(|r| &r.rule).collect())
            .unwrap_or_default()
    }

    /// Insertion-time ambiguity journal for a question.
    pub fn ambiguous_at_insertion(&self, question: &Question) -> &[(Rule, Rule)] {
        self.ambiguous
            .get(question)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl std::fmt::Debug for Brain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Brain")
            .field("strategy", &self.strategy)
            .field("rules", &self.rule_count())
            .field("assignments", &self.assignments.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::Answer;
    use crate::predicate::{Op, Predicate};

    fn q(id: &str) -> Question {
        Question::new(id).unwrap()
    }

    fn rule(priority: i32, predicate: Predicate, question: &str, answer: &str) -> Rule {
        Rule::new(priority, predicate, q(question), answer)
    }

    fn facts_for(brain: Brain) -> Facts {
        Facts::new(Arc::new(brain), false)
    }

    #[test]
    fn rules_sorted_by_priority_then_size() {
        let mut brain = Brain::new(Strategy::Fail);
        brain.add_rules(vec![
            rule(0, Predicate::True, "q", "fallback"),
            rule(
                1,
                Predicate::And(vec![
                    Predicate::comparison(q("a"), Op::Eq, "x"),
                    Predicate::comparison(q("b"), Op::Eq, "y"),
                ]),
                "q",
                "specific",
            ),
            rule(1, Predicate::comparison(q("a"), Op::Eq, "x"), "q", "loose"),
            rule(2, Predicate::True, "q", "urgent"),
        ]);

        let answers: Vec<&Answer> = brain
            .rules_for(&q("q"))
            .into_iter()
            .map(|r| &r.answer)
            .collect();
        assert_eq!(
            answers,
            vec![
                &Answer::from("urgent"),
                &Answer::from("specific"),
                &Answer::from("loose"),
                &Answer::from("fallback"),
            ]
        );
    }

    #[test]
    fn insertion_journal_records_equal_ranks() {
        let mut brain = Brain::new(Strategy::Fail);
        brain.add_rules(vec![
            rule(1, Predicate::True, "q", "a"),
            rule(1, Predicate::True, "q", "b"),
            rule(2, Predicate::True, "q", "c"),
        ]);

        let journal = brain.ambiguous_at_insertion(&q("q"));
        assert_eq!(journal.len(), 1);
        assert_eq!(journal[0].0.answer, Answer::from("a"));
        assert_eq!(journal[0].1.answer, Answer::from("b"));

        // No journal for an unambiguous question.
        let mut clean = Brain::new(Strategy::Fail);
        clean.add_rules(vec![rule(1, Predicate::True, "q", "only")]);
        assert!(clean.ambiguous_at_insertion(&q("q")).is_empty());
    }

    #[test]
    fn three_way_tie_records_all_pairs() {
        let mut brain = Brain::new(Strategy::Fail);
        brain.add_rules(vec![
            rule(1, Predicate::True, "q", "a"),
            rule(1, Predicate::True, "q", "b"),
            rule(1, Predicate::True, "q", "c"),
        ]);
        assert_eq!(brain.ambiguous_at_insertion(&q("q")).len(), 3);
    }

    #[test]
    fn no_rule_found() {
        let brain = Brain::new(Strategy::Fail);
        let mut facts = facts_for(brain);
        let brain = Arc::clone(facts.brain());
        let err = brain.ask(&q("missing"), &mut facts).unwrap_err();
        assert!(matches!(err, AnswerError::NoRuleFound(_)));
    }

    #[test]
    fn dominated_rules_are_not_candidates() {
        let mut brain = Brain::new(Strategy::Fail);
        brain.add_rules(vec![
            rule(2, Predicate::comparison(q("a"), Op::Eq, "x"), "q", "high"),
            rule(1, Predicate::True, "q", "low"),
        ]);
        let mut facts = facts_for(brain);
        facts.know(q("a"), Answer::from("x"));

        // Both match, but the priority-1 rule is strictly dominated.
        let result = facts.ask(&q("q")).unwrap();
        assert_eq!(result.answer, Answer::from("high"));
        assert!(result.ambiguous_rules.is_empty());
    }

    #[test]
    fn ambiguity_fails_under_fail_strategy() {
        let mut brain = Brain::new(Strategy::Fail);
        brain.add_rules(vec![
            rule(1, Predicate::True, "q", "a"),
            rule(1, Predicate::True, "q", "b"),
        ]);
        let mut facts = facts_for(brain);
        let err = facts.ask(&q("q")).unwrap_err();
        assert!(matches!(err, AnswerError::Ambiguous(_)));
    }

    #[test]
    fn ambiguity_is_journaled_under_undefined_strategy() {
        let mut brain = Brain::new(Strategy::Undefined);
        brain.add_rules(vec![
            rule(1, Predicate::True, "q", "a"),
            rule(1, Predicate::True, "q", "b"),
        ]);
        let mut facts = facts_for(brain);
        let result = facts.ask(&q("q")).unwrap();
        assert_eq!(result.answer, Answer::from("a"));
        assert_eq!(result.ambiguous_rules.len(), 1);
        assert_eq!(result.ambiguous_rules[0].len(), 2);
    }

    #[test]
    fn candidate_evaluation_error_aborts_the_walk() {
        let mut brain = Brain::new(Strategy::Fail);
        brain.add_rules(vec![rule(
            1,
            Predicate::comparison(q("n"), Op::Lt, "x"),
            "q",
            "never",
        )]);
        let mut facts = facts_for(brain);
        facts.know(q("n"), Answer::Int(3));

        let err = facts.ask(&q("q")).unwrap_err();
        assert!(matches!(err, AnswerError::CandidateEvaluationFailed(_)));
    }

    #[test]
    fn assignment_fires_by_name() {
        let mut brain = Brain::new(Strategy::Fail);
        brain.add_rules(vec![rule(1, Predicate::True, "q", "raw").with_assignment("upper")]);
        brain.add_assignment("upper", |rule: &Rule, _facts: &mut Facts, deps| {
            let Answer::String(s) = &rule.answer else {
                return Err(AssignmentError::InvalidAnswer {
                    reason: "expected a string payload".to_string(),
                    raw: format!("{:?}", rule.answer),
                });
            };
            Ok(AnswerWithDependencies::new(
                Answer::from(s.to_uppercase()),
                deps.clone(),
            ))
        });

        let mut facts = facts_for(brain);
        let result = facts.ask(&q("q")).unwrap();
        assert_eq!(result.answer, Answer::from("RAW"));
    }

    #[test]
    fn missing_assignment_is_an_error() {
        let mut brain = Brain::new(Strategy::Fail);
        brain.add_rules(vec![rule(1, Predicate::True, "q", "raw").with_assignment("nope")]);
        let mut facts = facts_for(brain);
        let err = facts.ask(&q("q")).unwrap_err();
        assert!(matches!(
            err,
            AnswerError::AssignmentFailed(AssignmentError::AssignmentNotFound(_))
        ));
    }

    #[test]
    fn failing_assignment_surfaces() {
        let mut brain = Brain::new(Strategy::Fail);
        brain.add_rules(vec![rule(1, Predicate::True, "q", "raw").with_assignment("boom")]);
        brain.add_assignment("boom", |_: &Rule, _: &mut Facts, _: &HashSet<Question>| {
            Err(AssignmentError::Failed {
                reason: "deliberate".to_string(),
            })
        });
        let mut facts = facts_for(brain);
        let err = facts.ask(&q("q")).unwrap_err();
        assert!(matches!(
            err,
            AnswerError::AssignmentFailed(AssignmentError::Failed { .. })
        ));
    }

    #[test]
    fn assignment_keeps_predicate_dependencies() {
        let mut brain = Brain::new(Strategy::Fail);
        brain.add_rules(vec![rule(
            1,
            Predicate::comparison(q("base"), Op::Eq, "yes"),
            "q",
            "payload",
        )
        .with_assignment("identity")]);
        brain.add_assignment("identity", |rule: &Rule, _: &mut Facts, _| {
            // Deliberately drops the passed dependency set.
            Ok(AnswerWithDependencies::known(rule.answer.clone()))
        });

        let mut facts = facts_for(brain);
        facts.know(q("base"), Answer::from("yes"));
        let result = facts.ask(&q("q")).unwrap();
        assert!(result.dependencies.contains(&q("base")));
    }
}
