//! Typed answer values and answers-with-dependencies.
//!
//! [`Answer`] is the tagged union a question resolves to. Comparison
//! semantics for the whole engine live here in [`Answer::compare`]:
//! numeric widening between `Int` and `Double`, equality-only booleans,
//! and dispatch into user-extended comparable/equatable types.

use std::collections::HashSet;

use crate::error::EvalError;
use crate::extension::ExtensionValue;
use crate::predicate::Op;
use crate::question::Question;
use crate::rule::Rule;

/// A typed answer value.
///
/// `Comparable` and `Equatable` are the extension points: boxed values of a
/// user-registered type with total equality (and, for `Comparable`, a total
/// order).
#[derive(Debug, Clone)]
pub enum Answer {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Comparable(Box<dyn ExtensionValue>),
    Equatable(Box<dyn ExtensionValue>),
}

impl Answer {
    /// The variant name, used in diagnostics and typed-ask mismatch errors.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Answer::Bool(_) => "bool",
            Answer::Int(_) => "int",
            Answer::Double(_) => "double",
            Answer::String(_) => "string",
            Answer::Comparable(_) => "comparable",
            Answer::Equatable(_) => "equatable",
        }
    }

    /// Evaluate `self <op> rhs` under the engine's type-aware rules.
    ///
    /// Two answers are comparable iff they are the same scalar variant, the
    /// same registered extension type, or an `Int`/`Double` pair (the integer
    /// widens). Booleans and equatable extension types admit only `eq`/`ne`;
    /// ordering them is `PredicatesNotComparable`. Everything else is a
    /// `TypeMismatch`.
    pub fn compare(&self, rhs: &Answer, op: Op) -> Result<bool, EvalError> {
        match (self, rhs) {
            (Answer::Int(l), Answer::Int(r)) => Ok(op.holds_for(l, r)),
            (Answer::Double(l), Answer::Double(r)) => Ok(op.holds_for(l, r)),
            (Answer::Int(l), Answer::Double(r)) => Ok(op.holds_for(&(*l as f64), r)),
            (Answer::Double(l), Answer::Int(r)) => Ok(op.holds_for(l, &(*r as f64))),
            (Answer::String(l), Answer::String(r)) => Ok(op.holds_for(l, r)),
            (Answer::Bool(l), Answer::Bool(r)) => match op {
                Op::Eq => Ok(l == r),
                Op::Ne => Ok(l != r),
                _ => Err(EvalError::PredicatesNotComparable { op }),
            },
            (Answer::Comparable(l), Answer::Comparable(r)) => {
                if l.type_name() != r.type_name() {
                    return Err(self.mismatch(rhs));
                }
                match op {
                    Op::Eq => Ok(l.eq_dyn(r.as_ref())),
                    Op::Ne => Ok(!l.eq_dyn(r.as_ref())),
                    _ => {
                        let ordering = l
                            .cmp_dyn(r.as_ref())
                            .ok_or(EvalError::PredicatesNotComparable { op })?;
                        Ok(op.holds_for_ordering(ordering))
                    }
                }
            }
            (Answer::Equatable(l), Answer::Equatable(r)) => {
                if l.type_name() != r.type_name() {
                    return Err(self.mismatch(rhs));
                }
                match op {
                    Op::Eq => Ok(l.eq_dyn(r.as_ref())),
                    Op::Ne => Ok(!l.eq_dyn(r.as_ref())),
                    _ => Err(EvalError::PredicatesNotComparable { op }),
                }
            }
            _ => Err(self.mismatch(rhs)),
        }
    }

    fn mismatch(&self, rhs: &Answer) -> EvalError {
        EvalError::TypeMismatch {
            lhs: self.describe(),
            rhs: rhs.describe(),
        }
    }

    /// Variant name plus extension type name, for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Answer::Comparable(v) => format!("comparable({})", v.type_name()),
            Answer::Equatable(v) => format!("equatable({})", v.type_name()),
            other => other.variant_name().to_string(),
        }
    }
}

impl PartialEq for Answer {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Answer::Bool(l), Answer::Bool(r)) => l == r,
            (Answer::Int(l), Answer::Int(r)) => l == r,
            (Answer::Double(l), Answer::Double(r)) => l == r,
            (Answer::String(l), Answer::String(r)) => l == r,
            (Answer::Comparable(l), Answer::Comparable(r))
            | (Answer::Equatable(l), Answer::Equatable(r)) => {
                l.type_name() == r.type_name() && l.eq_dyn(r.as_ref())
            }
            _ => false,
        }
    }
}

impl From<bool> for Answer {
    fn from(value: bool) -> Self {
        Answer::Bool(value)
    }
}

impl From<i64> for Answer {
    fn from(value: i64) -> Self {
        Answer::Int(value)
    }
}

impl From<f64> for Answer {
    fn from(value: f64) -> Self {
        Answer::Double(value)
    }
}

impl From<&str> for Answer {
    fn from(value: &str) -> Self {
        Answer::String(value.to_string())
    }
}

impl From<String> for Answer {
    fn from(value: String) -> Self {
        Answer::String(value)
    }
}

/// An answer together with the questions consulted to derive it and any
/// runtime ambiguity encountered along the way.
///
/// The dependency set drives cache invalidation in the facts store; the
/// ambiguity groups are populated only under the `Undefined` strategy
/// (see [`crate::brain::Strategy`]).
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerWithDependencies {
    pub answer: Answer,
    pub dependencies: HashSet<Question>,
    pub ambiguous_rules: Vec<Vec<Rule>>,
}

impl AnswerWithDependencies {
    pub fn new(answer: Answer, dependencies: HashSet<Question>) -> Self {
        Self {
            answer,
            dependencies,
            ambiguous_rules: Vec::new(),
        }
    }

    /// Wrap a client-written known answer: no dependencies, no ambiguity.
    pub fn known(answer: Answer) -> Self {
        Self::new(answer, HashSet::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use std::cmp::Ordering;

    #[derive(Debug, Clone, PartialEq)]
    struct Grade(u8);

    impl ExtensionValue for Grade {
        fn type_name(&self) -> &str {
            "Grade"
        }

        fn eq_dyn(&self, other: &dyn ExtensionValue) -> bool {
            other
                .as_any()
                .downcast_ref::<Grade>()
                .is_some_and(|g| g == self)
        }

        fn cmp_dyn(&self, other: &dyn ExtensionValue) -> Option<Ordering> {
            other
                .as_any()
                .downcast_ref::<Grade>()
                .map(|g| self.0.cmp(&g.0))
        }

        fn encode(&self) -> serde_json::Value {
            serde_json::json!(self.0)
        }

        fn clone_dyn(&self) -> Box<dyn ExtensionValue> {
            Box::new(self.clone())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Tag(String);

    impl ExtensionValue for Tag {
        fn type_name(&self) -> &str {
            "Tag"
        }

        fn eq_dyn(&self, other: &dyn ExtensionValue) -> bool {
            other
                .as_any()
                .downcast_ref::<Tag>()
                .is_some_and(|t| t == self)
        }

        fn encode(&self) -> serde_json::Value {
            serde_json::json!(self.0)
        }

        fn clone_dyn(&self) -> Box<dyn ExtensionValue> {
            Box::new(self.clone())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn same_variant_ordering() {
        assert!(Answer::Int(2).compare(&Answer::Int(3), Op::Lt).unwrap());
        assert!(Answer::Double(2.5)
            .compare(&Answer::Double(2.5), Op::Le)
            .unwrap());
        assert!(Answer::from("alpha")
            .compare(&Answer::from("beta"), Op::Lt)
            .unwrap());
    }

    #[test]
    fn int_double_widening_both_directions() {
        assert!(Answer::Int(2).compare(&Answer::Double(2.5), Op::Lt).unwrap());
        assert!(Answer::Double(2.5).compare(&Answer::Int(2), Op::Gt).unwrap());
        assert!(Answer::Int(2).compare(&Answer::Double(2.0), Op::Eq).unwrap());
    }

    #[test]
    fn bool_pair_allows_only_equality() {
        assert!(Answer::Bool(true)
            .compare(&Answer::Bool(true), Op::Eq)
            .unwrap());
        assert!(Answer::Bool(true)
            .compare(&Answer::Bool(false), Op::Ne)
            .unwrap());
        let err = Answer::Bool(true)
            .compare(&Answer::Bool(false), Op::Lt)
            .unwrap_err();
        assert!(matches!(err, EvalError::PredicatesNotComparable { .. }));
    }

    #[test]
    fn bool_against_non_bool_is_a_mismatch() {
        let err = Answer::Bool(true)
            .compare(&Answer::Int(1), Op::Eq)
            .unwrap_err();
        assert!(matches!(err, EvalError::TypeMismatch { .. }));
    }

    #[test]
    fn no_widening_beyond_int_double() {
        let err = Answer::Int(1)
            .compare(&Answer::from("1"), Op::Eq)
            .unwrap_err();
        assert!(matches!(err, EvalError::TypeMismatch { .. }));
    }

    #[test]
    fn comparable_extension_full_ordering() {
        let a = Answer::Comparable(Box::new(Grade(2)));
        let b = Answer::Comparable(Box::new(Grade(5)));
        assert!(a.compare(&b, Op::Lt).unwrap());
        assert!(a.compare(&b, Op::Ne).unwrap());
        assert!(!a.compare(&b, Op::Eq).unwrap());
    }

    #[test]
    fn equatable_extension_equality_only() {
        let a = Answer::Equatable(Box::new(Tag("red".into())));
        let b = Answer::Equatable(Box::new(Tag("red".into())));
        assert!(a.compare(&b, Op::Eq).unwrap());
        let err = a.compare(&b, Op::Lt).unwrap_err();
        assert!(matches!(err, EvalError::PredicatesNotComparable { .. }));
    }

    #[test]
    fn different_extension_types_mismatch() {
        let a = Answer::Comparable(Box::new(Grade(2)));
        let b = Answer::Comparable(Box::new(Grade(2)));
        assert_eq!(a, b);

        let tag = Answer::Equatable(Box::new(Tag("x".into())));
        let err = a.compare(&tag, Op::Eq).unwrap_err();
        assert!(matches!(err, EvalError::TypeMismatch { .. }));
    }

    #[test]
    fn structural_equality_is_variant_strict() {
        // Widening applies to comparison, not to structural equality.
        assert_ne!(Answer::Int(1), Answer::Double(1.0));
        assert_eq!(Answer::Int(1), Answer::Int(1));
    }

    #[test]
    fn known_answers_have_no_dependencies() {
        let awd = AnswerWithDependencies::known(Answer::from("blue"));
        assert!(awd.dependencies.is_empty());
        assert!(awd.ambiguous_rules.is_empty());
    }
}
