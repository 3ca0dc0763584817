//! Rule-file linter: static checks against an optional specification.
//!
//! The linter always performs structural checks (duplicate lines, and the
//! comparisons the evaluator would reject immediately regardless of facts).
//! When a [`LintSpec`] is supplied it additionally verifies that every
//! produced question is declared, that each has a `priority 0, TRUEPREDICATE`
//! fallback, that produced answers satisfy their constraints, and that
//! left-hand-side comparisons are type-consistent with the declarations.

use std::collections::HashMap;

use serde::Deserialize;

use crate::answer::Answer;
use crate::parse::ParsedRule;
use crate::predicate::{Expr, Op, Predicate};
use crate::question::Question;

// ---------------------------------------------------------------------------
// Specification
// ---------------------------------------------------------------------------

/// A type constraint on the answers a question may take.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawConstraint")]
pub enum AnswerConstraint {
    /// A closed set of string answers.
    Strings(Vec<String>),
    String,
    Bool,
    Int,
    Double,
    Any,
}

/// The on-disk constraint form: a JSON string array means `Strings`, a
/// literal keyword names a scalar constraint.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawConstraint {
    Many(Vec<String>),
    One(String),
}

impl TryFrom<RawConstraint> for AnswerConstraint {
    type Error = String;

    fn try_from(raw: RawConstraint) -> Result<Self, Self::Error> {
        match raw {
            RawConstraint::Many(values) => Ok(AnswerConstraint::Strings(values)),
            RawConstraint::One(keyword) => match keyword.as_str() {
                "string" => Ok(AnswerConstraint::String),
                "bool" => Ok(AnswerConstraint::Bool),
                "int" => Ok(AnswerConstraint::Int),
                "double" => Ok(AnswerConstraint::Double),
                "any" => Ok(AnswerConstraint::Any),
                other => Err(format!(
                    "unknown constraint \"{other}\" (expected an array of strings, \
                     or one of \"string\", \"bool\", \"int\", \"double\", \"any\")"
                )),
            },
        }
    }
}

impl AnswerConstraint {
    /// Whether a produced (right-hand-side) answer satisfies this constraint.
    fn allows_answer(&self, answer: &Answer) -> bool {
        match (self, answer) {
            (AnswerConstraint::Strings(allowed), Answer::String(s)) => allowed.contains(s),
            (AnswerConstraint::String, Answer::String(_)) => true,
            (AnswerConstraint::Bool, Answer::Bool(_)) => true,
            (AnswerConstraint::Int, Answer::Int(_)) => true,
            (AnswerConstraint::Double, Answer::Double(_)) => true,
            (AnswerConstraint::Any, _) => true,
            _ => false,
        }
    }

    /// Whether a compared (left-hand-side) literal is type-consistent.
    ///
    /// Numeric widening mirrors the evaluator: an int-declared question may
    /// be compared with a double literal and vice versa. Booleans are
    /// handled separately by the caller.
    fn allows_literal(&self, literal: &Answer) -> bool {
        match (self, literal) {
            (AnswerConstraint::Strings(allowed), Answer::String(s)) => allowed.contains(s),
            (AnswerConstraint::String, Answer::String(_)) => true,
            (AnswerConstraint::Int | AnswerConstraint::Double, Answer::Int(_) | Answer::Double(_)) => {
                true
            }
            (AnswerConstraint::Any, _) => true,
            _ => false,
        }
    }

    fn describe(&self) -> String {
        match self {
            AnswerConstraint::Strings(values) => format!("one of {values:?}"),
            AnswerConstraint::String => "string".to_string(),
            AnswerConstraint::Bool => "bool".to_string(),
            AnswerConstraint::Int => "int".to_string(),
            AnswerConstraint::Double => "double".to_string(),
            AnswerConstraint::Any => "any".to_string(),
        }
    }
}

/// The linter specification: constraints on questions appearing in
/// predicates (`lhs`) and on questions rules produce (`rhs`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LintSpec {
    #[serde(default)]
    pub lhs: HashMap<Question, AnswerConstraint>,
    #[serde(default)]
    pub rhs: HashMap<Question, AnswerConstraint>,
}

// ---------------------------------------------------------------------------
// Issues
// ---------------------------------------------------------------------------

/// One linter finding, anchored to a source line.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct LintIssue {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for LintIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

fn issue(line: usize, message: impl Into<String>) -> LintIssue {
    LintIssue {
        line,
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Linter
// ---------------------------------------------------------------------------

/// Lint a parsed rule set, returning issues sorted by line then message.
pub fn lint(rules: &[ParsedRule], spec: Option<&LintSpec>) -> Vec<LintIssue> {
    let mut issues = Vec::new();

    check_duplicates(rules, &mut issues);
    for parsed in rules {
        check_predicate(&parsed.rule.predicate, parsed.line, spec, &mut issues);
    }
    if let Some(spec) = spec {
        check_rhs(rules, spec, &mut issues);
    }

    issues.sort();
    issues
}

fn check_duplicates(rules: &[ParsedRule], issues: &mut Vec<LintIssue>) {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for parsed in rules {
        match seen.get(parsed.source.as_str()) {
            Some(first) => issues.push(issue(
                parsed.line,
                format!("duplicate rule line (first occurrence at line {first})"),
            )),
            None => {
                seen.insert(&parsed.source, parsed.line);
            }
        }
    }
}

/// Structural rejects plus lhs type-consistency for one predicate tree.
fn check_predicate(
    predicate: &Predicate,
    line: usize,
    spec: Option<&LintSpec>,
    issues: &mut Vec<LintIssue>,
) {
    match predicate {
        Predicate::False | Predicate::True => {}
        Predicate::Not(p) => check_predicate(p, line, spec, issues),
        Predicate::And(ps) | Predicate::Or(ps) => {
            for p in ps {
                check_predicate(p, line, spec, issues);
            }
        }
        Predicate::Comparison(lhs, op, rhs) => {
            check_comparison(lhs, *op, rhs, line, spec, issues);
            for side in [lhs, rhs] {
                if let Expr::Predicate(p) = side {
                    check_predicate(p, line, spec, issues);
                }
            }
        }
    }
}

fn check_comparison(
    lhs: &Expr,
    op: Op,
    rhs: &Expr,
    line: usize,
    spec: Option<&LintSpec>,
    issues: &mut Vec<LintIssue>,
) {
    // Structural rejects: these fail at evaluation time regardless of facts.
    match (lhs, rhs) {
        (Expr::Predicate(_), Expr::Predicate(_)) if !op.is_equality() => {
            issues.push(issue(
                line,
                format!("two sub-predicates cannot be ordered with {op}"),
            ));
            return;
        }
        (Expr::Predicate(_), Expr::Answer(_)) | (Expr::Answer(_), Expr::Predicate(_)) => {
            issues.push(issue(line, "a sub-predicate cannot be compared with a literal"));
            return;
        }
        (Expr::Predicate(_), Expr::Question(_)) | (Expr::Question(_), Expr::Predicate(_))
            if !op.is_equality() =>
        {
            issues.push(issue(
                line,
                format!("a sub-predicate and a question cannot be ordered with {op}"),
            ));
            return;
        }
        _ => {}
    }

    let Some(spec) = spec else { return };

    match (lhs, rhs) {
        (Expr::Question(q), Expr::Answer(a)) | (Expr::Answer(a), Expr::Question(q)) => {
            if let Some(constraint) = spec.lhs.get(q) {
                if *constraint == AnswerConstraint::Bool {
                    issues.push(issue(
                        line,
                        format!(
                            "bool question \"{q}\" may only be compared with a sub-predicate"
                        ),
                    ));
                } else if !constraint.allows_literal(a) {
                    issues.push(issue(
                        line,
                        format!(
                            "question \"{q}\" is declared {} but compared with {}",
                            constraint.describe(),
                            a.describe()
                        ),
                    ));
                }
            }
        }
        (Expr::Question(a), Expr::Question(b)) => {
            for q in [a, b] {
                if spec.lhs.get(q) == Some(&AnswerConstraint::Bool) {
                    issues.push(issue(
                        line,
                        format!(
                            "bool question \"{q}\" may only be compared with a sub-predicate"
                        ),
                    ));
                }
            }
            if let (Some(ca), Some(cb)) = (spec.lhs.get(a), spec.lhs.get(b)) {
                if !constraints_compatible(ca, cb) {
                    issues.push(issue(
                        line,
                        format!(
                            "questions \"{a}\" ({}) and \"{b}\" ({}) have incompatible types",
                            ca.describe(),
                            cb.describe()
                        ),
                    ));
                }
            }
        }
        (Expr::Predicate(_), Expr::Question(q)) | (Expr::Question(q), Expr::Predicate(_)) => {
            if let Some(constraint) = spec.lhs.get(q) {
                if !matches!(constraint, AnswerConstraint::Bool | AnswerConstraint::Any) {
                    issues.push(issue(
                        line,
                        format!(
                            "question \"{q}\" is declared {} but compared with a sub-predicate",
                            constraint.describe()
                        ),
                    ));
                }
            }
        }
        _ => {}
    }
}

fn constraints_compatible(a: &AnswerConstraint, b: &AnswerConstraint) -> bool {
    use AnswerConstraint::*;
    match (a, b) {
        (Any, _) | (_, Any) => true,
        (Bool, _) | (_, Bool) => false,
        (Strings(_) | String, Strings(_) | String) => true,
        (Int | Double, Int | Double) => true,
        _ => false,
    }
}

/// Spec checks on what the rules produce.
fn check_rhs(rules: &[ParsedRule], spec: &LintSpec, issues: &mut Vec<LintIssue>) {
    // First rule line per produced question, in file order.
    let mut first_line: HashMap<&Question, usize> = HashMap::new();
    let mut has_fallback: HashMap<&Question, bool> = HashMap::new();

    for parsed in rules {
        let question = &parsed.rule.question;
        first_line.entry(question).or_insert(parsed.line);
        let fallback = parsed.rule.priority == 0 && parsed.rule.predicate == Predicate::True;
        *has_fallback.entry(question).or_insert(false) |= fallback;

        if !spec.rhs.contains_key(question) {
            issues.push(issue(
                parsed.line,
                format!("question \"{question}\" is not declared in the lint specification"),
            ));
        } else if parsed.rule.assignment.is_none() {
            let constraint = &spec.rhs[question];
            if !constraint.allows_answer(&parsed.rule.answer) {
                issues.push(issue(
                    parsed.line,
                    format!(
                        "answer {} for question \"{question}\" violates the {} constraint",
                        parsed.rule.answer.describe(),
                        constraint.describe()
                    ),
                ));
            }
        }
    }

    for (question, fallback) in has_fallback {
        if !fallback {
            issues.push(issue(
                first_line[question],
                format!(
                    "question \"{question}\" has no fallback rule (priority 0, TRUEPREDICATE)"
                ),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_rules;

    fn q(id: &str) -> Question {
        Question::new(id).unwrap()
    }

    fn parsed(input: &str) -> Vec<ParsedRule> {
        parse_rules(input).unwrap()
    }

    fn beach_spec() -> LintSpec {
        serde_json::from_str(
            r#"{
                "lhs": {
                    "weather": ["sunny", "rainy"],
                    "season": "string",
                    "temperature": "int",
                    "stormy": "bool"
                },
                "rhs": {
                    "beach": ["full", "empty"],
                    "visitors": "int"
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn spec_decodes_both_constraint_forms() {
        let spec = beach_spec();
        assert_eq!(
            spec.lhs[&q("weather")],
            AnswerConstraint::Strings(vec!["sunny".into(), "rainy".into()])
        );
        assert_eq!(spec.lhs[&q("season")], AnswerConstraint::String);
        assert_eq!(spec.rhs[&q("visitors")], AnswerConstraint::Int);
    }

    #[test]
    fn unknown_constraint_keyword_fails_decode() {
        let result: Result<LintSpec, _> =
            serde_json::from_str(r#"{ "lhs": { "x": "float" }, "rhs": {} }"#);
        assert!(result.is_err());
    }

    #[test]
    fn clean_ruleset_has_no_issues() {
        let rules = parsed(
            "0: TRUEPREDICATE => beach = empty\n\
             2: weather == \"sunny\" AND season == \"summer\" => beach = full\n\
             0: TRUEPREDICATE => visitors = (int)0",
        );
        assert!(lint(&rules, Some(&beach_spec())).is_empty());
    }

    #[test]
    fn duplicate_lines_are_flagged_once_per_repeat() {
        let rules = parsed(
            "0: TRUEPREDICATE => beach = empty\n\
             0: TRUEPREDICATE => beach = empty\n\
             0: TRUEPREDICATE => beach = empty",
        );
        let issues = lint(&rules, None);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].line, 2);
        assert!(issues[0].message.contains("first occurrence at line 1"));
        assert_eq!(issues[1].line, 3);
    }

    #[test]
    fn structural_rejects_without_a_spec() {
        let rules = parsed("1: (a == 1) < (b == 2) => q = v");
        let issues = lint(&rules, None);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("ordered"));

        let rules = parsed("1: (a == 1) == true => q = v");
        let issues = lint(&rules, None);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("literal"));
    }

    #[test]
    fn undeclared_rhs_question() {
        let rules = parsed("0: TRUEPREDICATE => tide = low");
        let issues = lint(&rules, Some(&beach_spec()));
        assert!(issues
            .iter()
            .any(|i| i.message.contains("not declared")));
    }

    #[test]
    fn missing_fallback_rule() {
        let rules = parsed("2: weather == \"sunny\" => beach = full");
        let issues = lint(&rules, Some(&beach_spec()));
        assert!(issues.iter().any(|i| i.message.contains("no fallback")));
    }

    #[test]
    fn rhs_answer_outside_the_constraint() {
        let rules = parsed(
            "0: TRUEPREDICATE => beach = crowded\n\
             0: TRUEPREDICATE => visitors = (string)many",
        );
        let issues = lint(&rules, Some(&beach_spec()));
        assert!(issues.iter().any(|i| i.line == 1 && i.message.contains("violates")));
        assert!(issues.iter().any(|i| i.line == 2 && i.message.contains("violates")));
    }

    #[test]
    fn assignment_rules_skip_the_answer_constraint() {
        let rules = parsed("0: TRUEPREDICATE => visitors = (count)gate records");
        let issues = lint(&rules, Some(&beach_spec()));
        assert!(!issues.iter().any(|i| i.message.contains("violates")));
    }

    #[test]
    fn lhs_literal_type_violations() {
        // int question compared with a string literal
        let rules = parsed("0: temperature == \"hot\" => beach = empty\n0: TRUEPREDICATE => beach = empty");
        let issues = lint(&rules, Some(&beach_spec()));
        assert!(issues
            .iter()
            .any(|i| i.line == 1 && i.message.contains("declared int")));

        // widening is allowed
        let rules = parsed("0: TRUEPREDICATE => beach = empty\n1: temperature > 25.5 => beach = full");
        let issues = lint(&rules, Some(&beach_spec()));
        assert!(issues.is_empty());
    }

    #[test]
    fn strings_constraint_checks_membership() {
        let rules = parsed("0: TRUEPREDICATE => beach = empty\n1: weather == \"snowy\" => beach = empty");
        let issues = lint(&rules, Some(&beach_spec()));
        assert!(issues.iter().any(|i| i.message.contains("weather")));
    }

    #[test]
    fn bool_question_only_against_sub_predicates() {
        let spec = beach_spec();

        let rules = parsed("0: TRUEPREDICATE => beach = empty\n1: stormy == true => beach = empty");
        let issues = lint(&rules, Some(&spec));
        assert!(issues
            .iter()
            .any(|i| i.message.contains("only be compared with a sub-predicate")));

        let rules = parsed(
            "0: TRUEPREDICATE => beach = empty\n\
             1: (weather == \"rainy\") == stormy => beach = empty",
        );
        let issues = lint(&rules, Some(&spec));
        assert!(issues.is_empty());

        // A non-bool question against a sub-predicate is the mirror issue.
        let rules = parsed(
            "0: TRUEPREDICATE => beach = empty\n\
             1: (weather == \"rainy\") == season => beach = empty",
        );
        let issues = lint(&rules, Some(&spec));
        assert!(issues
            .iter()
            .any(|i| i.message.contains("compared with a sub-predicate")));
    }

    #[test]
    fn incompatible_question_pair() {
        let rules = parsed(
            "0: TRUEPREDICATE => beach = empty\n\
             1: temperature == season => beach = empty",
        );
        let issues = lint(&rules, Some(&beach_spec()));
        assert!(issues.iter().any(|i| i.message.contains("incompatible")));
    }

    #[test]
    fn issues_sorted_by_line_then_message() {
        let rules = parsed(
            "2: temperature == \"hot\" => tide = low\n\
             1: weather == \"snowy\" => beach = full",
        );
        let issues = lint(&rules, Some(&beach_spec()));
        let lines: Vec<usize> = issues.iter().map(|i| i.line).collect();
        let mut sorted = lines.clone();
        sorted.sort();
        assert_eq!(lines, sorted);
    }
}
