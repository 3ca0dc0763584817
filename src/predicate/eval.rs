//! Predicate evaluator: recursive, short-circuiting, dependency-capturing.
//!
//! Evaluation is deterministic and side-effect-free on the facts except via
//! `Facts::ask`, which may cache inferred answers. Every question consulted
//! on the way to a verdict lands in the evaluation's dependency set; any
//! runtime ambiguity surfaced by nested asks is carried along unchanged.

use std::collections::HashSet;

use crate::answer::Answer;
use crate::error::{EvalError, EvalResult};
use crate::facts::Facts;
use crate::question::Question;
use crate::rule::Rule;

use super::{Expr, Op, Predicate};

/// The outcome of evaluating a predicate against a facts store.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub value: bool,
    /// Every question consulted while producing `value`.
    pub dependencies: HashSet<Question>,
    /// Ambiguity groups journaled by nested asks (under `Strategy::Undefined`).
    pub ambiguous_rules: Vec<Vec<Rule>>,
}

impl Evaluation {
    fn constant(value: bool) -> Self {
        Self {
            value,
            dependencies: HashSet::new(),
            ambiguous_rules: Vec::new(),
        }
    }

    /// Negate the value, keeping dependencies and ambiguities.
    fn invert(mut self) -> Self {
        self.value = !self.value;
        self
    }

    fn absorb(&mut self, other: Evaluation) {
        self.dependencies.extend(other.dependencies);
        self.ambiguous_rules.extend(other.ambiguous_rules);
    }
}

impl Predicate {
    /// Evaluate this predicate against the given facts.
    ///
    /// `And` folds left with short-circuit identity `false`, `Or` with
    /// identity `true`; both keep the dependencies of every operand
    /// evaluated up to the short-circuit point. Errors abort immediately.
    pub fn evaluate(&self, facts: &mut Facts) -> EvalResult<Evaluation> {
        match self {
            Predicate::False => Ok(Evaluation::constant(false)),
            Predicate::True => Ok(Evaluation::constant(true)),
            Predicate::Not(p) => Ok(p.evaluate(facts)?.invert()),
            Predicate::And(ps) => {
                let mut acc = Evaluation::constant(true);
                for p in ps {
                    let eval = p.evaluate(facts)?;
                    let matched = eval.value;
                    acc.absorb(eval);
                    if !matched {
                        acc.value = false;
                        return Ok(acc);
                    }
                }
                Ok(acc)
            }
            Predicate::Or(ps) => {
                let mut acc = Evaluation::constant(false);
                for p in ps {
                    let eval = p.evaluate(facts)?;
                    let matched = eval.value;
                    acc.absorb(eval);
                    if matched {
                        acc.value = true;
                        return Ok(acc);
                    }
                }
                Ok(acc)
            }
            Predicate::Comparison(lhs, op, rhs) => compare(lhs, *op, rhs, facts),
        }
    }
}

/// Resolve a question operand: its answer plus the dependency bookkeeping.
fn ask_operand(question: &Question, facts: &mut Facts) -> EvalResult<(Answer, Evaluation)> {
    let awd = facts
        .ask(question)
        .map_err(|e| EvalError::QuestionEvaluationFailed(Box::new(e)))?;
    let mut eval = Evaluation::constant(true);
    eval.dependencies.extend(awd.dependencies);
    eval.dependencies.insert(question.clone());
    eval.ambiguous_rules.extend(awd.ambiguous_rules);
    Ok((awd.answer, eval))
}

/// The type-aware comparison table.
fn compare(lhs: &Expr, op: Op, rhs: &Expr, facts: &mut Facts) -> EvalResult<Evaluation> {
    match (lhs, rhs) {
        // Two sub-predicates: recursive boolean compare, equality only.
        (Expr::Predicate(l), Expr::Predicate(r)) => {
            if !op.is_equality() {
                return Err(EvalError::PredicatesNotComparable { op });
            }
            let mut left = l.evaluate(facts)?;
            let right = r.evaluate(facts)?;
            let value = match op {
                Op::Eq => left.value == right.value,
                _ => left.value != right.value,
            };
            left.absorb(right);
            left.value = value;
            Ok(left)
        }

        // Sub-predicate against a looked-up answer, which must be a bool.
        (Expr::Predicate(p), Expr::Question(q)) | (Expr::Question(q), Expr::Predicate(p)) => {
            if !op.is_equality() {
                return Err(EvalError::PredicatesNotComparable { op });
            }
            let (answer, mut acc) = ask_operand(q, facts)?;
            let Answer::Bool(asked) = answer else {
                return Err(EvalError::TypeMismatch {
                    lhs: "predicate".to_string(),
                    rhs: answer.describe(),
                });
            };
            let eval = p.evaluate(facts)?;
            let value = match op {
                Op::Eq => eval.value == asked,
                _ => eval.value != asked,
            };
            acc.absorb(eval);
            acc.value = value;
            Ok(acc)
        }

        // A literal can never equal a sub-predicate.
        (Expr::Predicate(_), Expr::Answer(a)) | (Expr::Answer(a), Expr::Predicate(_)) => {
            Err(EvalError::TypeMismatch {
                lhs: "predicate".to_string(),
                rhs: a.describe(),
            })
        }

        // Two looked-up answers.
        (Expr::Question(l), Expr::Question(r)) => {
            let (left, mut acc) = ask_operand(l, facts)?;
            let (right, right_eval) = ask_operand(r, facts)?;
            acc.absorb(right_eval);
            acc.value = left.compare(&right, op)?;
            Ok(acc)
        }

        // Looked-up answer against a literal.
        (Expr::Question(q), Expr::Answer(a)) => {
            let (answer, mut acc) = ask_operand(q, facts)?;
            acc.value = answer.compare(a, op)?;
            Ok(acc)
        }

        // Literal on the left: mirror the operator.
        (Expr::Answer(a), Expr::Question(q)) => {
            let (answer, mut acc) = ask_operand(q, facts)?;
            acc.value = answer.compare(a, op.swap())?;
            Ok(acc)
        }

        // Two literals.
        (Expr::Answer(l), Expr::Answer(r)) => {
            let mut eval = Evaluation::constant(false);
            eval.value = l.compare(r, op)?;
            Ok(eval)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::{Brain, Strategy};
    use std::sync::Arc;

    fn q(id: &str) -> Question {
        Question::new(id).unwrap()
    }

    fn empty_facts() -> Facts {
        Facts::new(Arc::new(Brain::new(Strategy::Fail)), false)
    }

    fn eval(p: &Predicate, facts: &mut Facts) -> Evaluation {
        p.evaluate(facts).unwrap()
    }

    #[test]
    fn constants() {
        let mut facts = empty_facts();
        assert!(!eval(&Predicate::False, &mut facts).value);
        assert!(eval(&Predicate::True, &mut facts).value);
    }

    #[test]
    fn not_inverts_and_preserves_dependencies() {
        let mut facts = empty_facts();
        facts.know(q("sky"), Answer::from("blue"));

        let inner = Predicate::comparison(q("sky"), Op::Eq, "blue");
        let outer = Predicate::Not(Box::new(inner.clone()));

        let direct = eval(&inner, &mut facts);
        let inverted = eval(&outer, &mut facts);
        assert_eq!(inverted.value, !direct.value);
        assert_eq!(inverted.dependencies, direct.dependencies);
    }

    #[test]
    fn empty_and_is_true_empty_or_is_false() {
        let mut facts = empty_facts();
        assert!(eval(&Predicate::And(vec![]), &mut facts).value);
        assert!(!eval(&Predicate::Or(vec![]), &mut facts).value);
    }

    #[test]
    fn and_short_circuits_but_keeps_dependencies_so_far() {
        let mut facts = empty_facts();
        facts.know(q("a"), Answer::from("x"));
        facts.know(q("b"), Answer::from("y"));

        // First operand false: the second question is never consulted.
        let p = Predicate::And(vec![
            Predicate::comparison(q("a"), Op::Eq, "nope"),
            Predicate::comparison(q("b"), Op::Eq, "y"),
        ]);
        let result = eval(&p, &mut facts);
        assert!(!result.value);
        assert!(result.dependencies.contains(&q("a")));
        assert!(!result.dependencies.contains(&q("b")));
    }

    #[test]
    fn or_short_circuits_on_first_true() {
        let mut facts = empty_facts();
        facts.know(q("a"), Answer::from("x"));
        facts.know(q("b"), Answer::from("y"));

        let p = Predicate::Or(vec![
            Predicate::comparison(q("a"), Op::Eq, "x"),
            Predicate::comparison(q("b"), Op::Eq, "y"),
        ]);
        let result = eval(&p, &mut facts);
        assert!(result.value);
        assert!(result.dependencies.contains(&q("a")));
        assert!(!result.dependencies.contains(&q("b")));
    }

    #[test]
    fn all_true_and_accumulates_every_dependency() {
        let mut facts = empty_facts();
        facts.know(q("a"), Answer::from("x"));
        facts.know(q("b"), Answer::from("y"));

        let p = Predicate::And(vec![
            Predicate::comparison(q("a"), Op::Eq, "x"),
            Predicate::comparison(q("b"), Op::Eq, "y"),
        ]);
        let result = eval(&p, &mut facts);
        assert!(result.value);
        assert_eq!(
            result.dependencies,
            HashSet::from([q("a"), q("b")])
        );
    }

    #[test]
    fn question_vs_question_with_widening() {
        let mut facts = empty_facts();
        facts.know(q("count"), Answer::Int(3));
        facts.know(q("limit"), Answer::Double(3.5));

        let p = Predicate::Comparison(
            Expr::Question(q("count")),
            Op::Lt,
            Expr::Question(q("limit")),
        );
        let result = eval(&p, &mut facts);
        assert!(result.value);
        assert_eq!(result.dependencies, HashSet::from([q("count"), q("limit")]));
    }

    #[test]
    fn literal_on_the_left_mirrors_the_operator() {
        let mut facts = empty_facts();
        facts.know(q("count"), Answer::Int(3));

        // 5 > count  ⇔  count < 5
        let p = Predicate::Comparison(
            Expr::Answer(Answer::Int(5)),
            Op::Gt,
            Expr::Question(q("count")),
        );
        assert!(eval(&p, &mut facts).value);

        let p = Predicate::Comparison(
            Expr::Answer(Answer::Int(5)),
            Op::Le,
            Expr::Question(q("count")),
        );
        assert!(!eval(&p, &mut facts).value);
    }

    #[test]
    fn predicate_vs_predicate_equality() {
        let mut facts = empty_facts();
        let p = Predicate::Comparison(
            Expr::Predicate(Box::new(Predicate::True)),
            Op::Eq,
            Expr::Predicate(Box::new(Predicate::False)),
        );
        assert!(!eval(&p, &mut facts).value);

        let p = Predicate::Comparison(
            Expr::Predicate(Box::new(Predicate::True)),
            Op::Ne,
            Expr::Predicate(Box::new(Predicate::False)),
        );
        assert!(eval(&p, &mut facts).value);
    }

    #[test]
    fn predicate_vs_predicate_ordering_is_rejected() {
        let mut facts = empty_facts();
        let p = Predicate::Comparison(
            Expr::Predicate(Box::new(Predicate::True)),
            Op::Lt,
            Expr::Predicate(Box::new(Predicate::False)),
        );
        let err = p.evaluate(&mut facts).unwrap_err();
        assert!(matches!(err, EvalError::PredicatesNotComparable { .. }));
    }

    #[test]
    fn predicate_vs_question_requires_bool() {
        let mut facts = empty_facts();
        facts.know(q("flag"), Answer::Bool(true));
        facts.know(q("name"), Answer::from("x"));

        let p = Predicate::Comparison(
            Expr::Predicate(Box::new(Predicate::True)),
            Op::Eq,
            Expr::Question(q("flag")),
        );
        let result = eval(&p, &mut facts);
        assert!(result.value);
        assert!(result.dependencies.contains(&q("flag")));

        let p = Predicate::Comparison(
            Expr::Predicate(Box::new(Predicate::True)),
            Op::Eq,
            Expr::Question(q("name")),
        );
        let err = p.evaluate(&mut facts).unwrap_err();
        assert!(matches!(err, EvalError::TypeMismatch { .. }));
    }

    #[test]
    fn predicate_vs_answer_is_a_mismatch() {
        let mut facts = empty_facts();
        let p = Predicate::Comparison(
            Expr::Predicate(Box::new(Predicate::True)),
            Op::Eq,
            Expr::Answer(Answer::Bool(true)),
        );
        let err = p.evaluate(&mut facts).unwrap_err();
        assert!(matches!(err, EvalError::TypeMismatch { .. }));
    }

    #[test]
    fn unanswerable_question_propagates() {
        let mut facts = empty_facts();
        let p = Predicate::comparison(q("missing"), Op::Eq, "x");
        let err = p.evaluate(&mut facts).unwrap_err();
        assert!(matches!(err, EvalError::QuestionEvaluationFailed(_)));
    }

    #[test]
    fn literal_vs_literal() {
        let mut facts = empty_facts();
        let p = Predicate::Comparison(
            Expr::Answer(Answer::Int(2)),
            Op::Lt,
            Expr::Answer(Answer::Double(2.5)),
        );
        let result = eval(&p, &mut facts);
        assert!(result.value);
        assert!(result.dependencies.is_empty());
    }
}
