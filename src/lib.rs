//! # maat
//!
//! A forward-chaining inference rule engine: clients supply **known facts**,
//! the [`Brain`](brain::Brain) supplies **rules**, and questions resolve to
//! typed answers with their dependency sets tracked for cache invalidation.
//!
//! ## Architecture
//!
//! - **Value model** (`question`, `answer`, `extension`): typed answers with
//!   user-extended comparable/equatable types behind a registry
//! - **Predicates** (`predicate`): a boolean algebra over comparisons with a
//!   recursive, short-circuiting, dependency-capturing evaluator
//! - **Brain** (`brain`): the rule index with priority × specificity
//!   selection, ambiguity journaling, and named assignment functions
//! - **Facts** (`facts`): the mutable store with cache-on-read and a reverse
//!   dependency index driving invalidation
//! - **Serialization** (`codec`, `parse`, `lint`): the canonical JSON rule
//!   form, the human rule-file parser, and the static linter
//!
//! ## Library usage
//!
//! ```
//! use std::sync::Arc;
//! use maat::answer::Answer;
//! use maat::brain::{Brain, Strategy};
//! use maat::facts::Facts;
//! use maat::predicate::{Op, Predicate};
//! use maat::question::Question;
//! use maat::rule::Rule;
//!
//! let sky = Question::new("sky").unwrap();
//! let weather = Question::new("weather").unwrap();
//!
//! let mut brain = Brain::new(Strategy::Fail);
//! brain.add_rules(vec![Rule::new(
//!     1,
//!     Predicate::comparison(sky.clone(), Op::Eq, "blue"),
//!     weather.clone(),
//!     "sunny",
//! )]);
//!
//! let mut facts = Facts::new(Arc::new(brain), true);
//! facts.know(sky, "blue");
//! let result = facts.ask(&weather).unwrap();
//! assert_eq!(result.answer, Answer::from("sunny"));
//! ```

pub mod answer;
pub mod brain;
pub mod codec;
pub mod error;
pub mod extension;
pub mod facts;
pub mod lint;
pub mod parse;
pub mod predicate;
pub mod question;
pub mod rule;

pub use answer::{Answer, AnswerWithDependencies};
pub use brain::{Brain, Strategy};
pub use error::{AnswerError, EvalError, MaatError, MaatResult};
pub use extension::{ExtensionValue, TypeRegistry};
pub use facts::Facts;
pub use predicate::{Expr, Op, Predicate};
pub use question::Question;
pub use rule::Rule;
