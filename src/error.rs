//! Rich diagnostic error types for the maat engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]`
//! derives, providing error codes and help text so users know exactly what
//! went wrong and how to fix it. Every fallible operation returns one of
//! these sums; there is no exception-for-control-flow anywhere in the crate.

use miette::Diagnostic;
use thiserror::Error;

use crate::answer::Answer;
use crate::predicate::Op;
use crate::question::Question;

/// Top-level error type for the maat engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full
/// diagnostic chain (error codes, help text) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum MaatError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Answer(#[from] AnswerError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Assignment(#[from] AssignmentError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Lint(#[from] LintError),
}

// ---------------------------------------------------------------------------
// Answer errors (from Facts::ask)
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum AnswerError {
    #[error("no rule found for question \"{0}\"")]
    #[diagnostic(
        code(maat::answer::no_rule),
        help(
            "No rule in the Brain produces this question, or none of its \
             predicates matched the current facts. Add a rule for the \
             question, or a priority-0 fallback with a True predicate."
        )
    )]
    NoRuleFound(Question),

    #[error("ambiguous rules for question \"{0}\"")]
    #[diagnostic(
        code(maat::answer::ambiguous),
        help(
            "Several rules with equal priority and specificity matched at \
             once. Raise one rule's priority, make its predicate more \
             specific, or construct the Brain with Strategy::Undefined to \
             accept the first match and journal the rest."
        )
    )]
    Ambiguous(Question),

    #[error("candidate predicate evaluation failed")]
    #[diagnostic(
        code(maat::answer::candidate_failed),
        help(
            "A candidate rule's predicate could not be evaluated. The inner \
             error identifies the comparison that failed."
        )
    )]
    CandidateEvaluationFailed(#[source] EvalError),

    #[error("assignment failed")]
    #[diagnostic(
        code(maat::answer::assignment_failed),
        help("The winning rule's assignment function reported an error.")
    )]
    AssignmentFailed(#[source] AssignmentError),

    #[error("answer {answer:?} does not match the asked type \"{expected}\"")]
    #[diagnostic(
        code(maat::answer::ask_type),
        help(
            "The typed ask expected a different answer variant. Use the \
             untyped ask, or fix the rule or known fact that produced this \
             answer."
        )
    )]
    AnswerTypeDoesNotMatchAskType {
        answer: Answer,
        expected: &'static str,
    },
}

// ---------------------------------------------------------------------------
// Evaluation errors (from the predicate evaluator)
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum EvalError {
    #[error("type mismatch: cannot compare {lhs} with {rhs}")]
    #[diagnostic(
        code(maat::eval::type_mismatch),
        help(
            "Comparison operands must be the same variant, the same \
             registered extension type, or an int/double pair. Check the \
             rule's literal against the answers the compared questions \
             actually produce."
        )
    )]
    TypeMismatch { lhs: String, rhs: String },

    #[error("operands are not comparable with {op}")]
    #[diagnostic(
        code(maat::eval::not_comparable),
        help(
            "Only == and != apply here: booleans, sub-predicates, and \
             equatable extension types carry no order. Use an equality \
             operator instead."
        )
    )]
    PredicatesNotComparable { op: Op },

    #[error("evaluation of a compared question failed")]
    #[diagnostic(
        code(maat::eval::question_failed),
        help(
            "A question referenced by the predicate could not be answered. \
             The inner error identifies the question and cause."
        )
    )]
    QuestionEvaluationFailed(#[source] Box<AnswerError>),
}

// ---------------------------------------------------------------------------
// Assignment errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum AssignmentError {
    #[error("assignment not found: \"{0}\"")]
    #[diagnostic(
        code(maat::assignment::not_found),
        help(
            "No assignment function with this name is registered on the \
             Brain. Register it with Brain::add_assignment before the first \
             ask."
        )
    )]
    AssignmentNotFound(String),

    #[error("assignment failed: {reason}")]
    #[diagnostic(
        code(maat::assignment::failed),
        help("The assignment function itself reported a failure.")
    )]
    Failed { reason: String },

    #[error("assignment produced an invalid answer from \"{raw}\": {reason}")]
    #[diagnostic(
        code(maat::assignment::invalid_answer),
        help(
            "The assignment function could not turn the rule's raw answer \
             payload into a typed answer. Check the payload format the \
             assignment expects."
        )
    )]
    InvalidAnswer { reason: String, raw: String },
}

// ---------------------------------------------------------------------------
// Human rule file parse errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ParseError {
    #[error("line {line}: missing \"{delimiter}\" delimiter")]
    #[diagnostic(
        code(maat::parse::missing_delimiter),
        help(
            "Rule lines have the shape \
             `<priority> : <predicate> => <question> = <answer>`."
        )
    )]
    MissingDelimiter { line: usize, delimiter: &'static str },

    #[error("line {line}: invalid priority \"{text}\"")]
    #[diagnostic(
        code(maat::parse::invalid_priority),
        help("The priority before the ':' must be an integer.")
    )]
    InvalidPriority { line: usize, text: String },

    #[error("line {line}: empty question")]
    #[diagnostic(
        code(maat::parse::empty_question),
        help("The question between \"=>\" and \"=\" must be non-empty.")
    )]
    EmptyQuestion { line: usize },

    #[error("line {line}: invalid ({keyword}) answer \"{payload}\"")]
    #[diagnostic(
        code(maat::parse::invalid_typed_answer),
        help(
            "Typed answers are (bool)true|false, (int)<integer>, \
             (double)<number>, (string)<text>. Any other bracketed name is \
             an assignment identifier."
        )
    )]
    InvalidTypedAnswer {
        line: usize,
        keyword: String,
        payload: String,
    },

    #[error("line {line}: empty answer after ({name})")]
    #[diagnostic(
        code(maat::parse::empty_answer),
        help("An assignment identifier must be followed by its answer text.")
    )]
    EmptyAnswer { line: usize, name: String },

    #[error("line {line}: expected a rule line, comment, or blank line")]
    #[diagnostic(
        code(maat::parse::not_a_rule),
        help(
            "Rule lines start with a digit (the priority); comments start \
             with //."
        )
    )]
    NotARule { line: usize },

    #[error("line {line}: {source}")]
    #[diagnostic(
        code(maat::parse::predicate),
        help("The predicate between ':' and \"=>\" could not be parsed.")
    )]
    Predicate {
        line: usize,
        #[source]
        source: FormatError,
    },

    #[error("line {line}: {source}")]
    #[diagnostic(
        code(maat::parse::conversion),
        help(
            "The predicate parsed, but used a construct the engine does not \
             evaluate."
        )
    )]
    Conversion {
        line: usize,
        #[source]
        source: ConversionError,
    },
}

impl ParseError {
    /// 1-based source line the error was found on.
    pub fn line(&self) -> usize {
        match self {
            ParseError::MissingDelimiter { line, .. }
            | ParseError::InvalidPriority { line, .. }
            | ParseError::EmptyQuestion { line }
            | ParseError::InvalidTypedAnswer { line, .. }
            | ParseError::EmptyAnswer { line, .. }
            | ParseError::NotARule { line }
            | ParseError::Predicate { line, .. }
            | ParseError::Conversion { line, .. } => *line,
        }
    }
}

// ---------------------------------------------------------------------------
// Predicate-format errors
// ---------------------------------------------------------------------------

/// Errors from the predicate-format tokenizer and parser.
#[derive(Debug, Error, Diagnostic)]
pub enum FormatError {
    #[error("unexpected character '{ch}' at byte {offset}")]
    #[diagnostic(code(maat::format::unexpected_char))]
    UnexpectedCharacter { ch: char, offset: usize },

    #[error("unterminated string literal starting at byte {offset}")]
    #[diagnostic(
        code(maat::format::unterminated_string),
        help("String literals are double-quoted; close the quote.")
    )]
    UnterminatedString { offset: usize },

    #[error("invalid number \"{text}\"")]
    #[diagnostic(code(maat::format::invalid_number))]
    InvalidNumber { text: String },

    #[error("unexpected token \"{found}\", expected {expected}")]
    #[diagnostic(code(maat::format::unexpected_token))]
    UnexpectedToken { found: String, expected: String },

    #[error("unexpected end of input, expected {expected}")]
    #[diagnostic(code(maat::format::unexpected_end))]
    UnexpectedEnd { expected: String },

    #[error("trailing input after predicate: \"{rest}\"")]
    #[diagnostic(
        code(maat::format::trailing),
        help("Combine multiple conditions with AND/OR instead of juxtaposition.")
    )]
    TrailingTokens { rest: String },
}

// ---------------------------------------------------------------------------
// Format-AST conversion errors
// ---------------------------------------------------------------------------

/// Errors converting the generic predicate-format AST into a
/// [`crate::predicate::Predicate`].
#[derive(Debug, Error, Diagnostic)]
pub enum ConversionError {
    #[error("compound predicate has no subpredicates")]
    #[diagnostic(
        code(maat::convert::empty_compound),
        help("AND/OR need at least one operand in the rule format.")
    )]
    CompoundHasNoSubpredicates,

    #[error("input was not recognized as a predicate: {description}")]
    #[diagnostic(
        code(maat::convert::unrecognized),
        help(
            "The expression is valid format syntax but is not a boolean \
             predicate (e.g. a bare identifier or literal at the top level)."
        )
    )]
    InputWasNotRecognized { description: String },

    #[error("unsupported operator \"{operator}\"")]
    #[diagnostic(
        code(maat::convert::unsupported_operator),
        help("The engine evaluates ==, !=, <, >, <=, and >= only.")
    )]
    UnsupportedOperator { operator: String },

    #[error("unsupported expression: {description}")]
    #[diagnostic(
        code(maat::convert::unsupported_expression),
        help("Comparison operands are questions, literals, or sub-predicates.")
    )]
    UnsupportedExpression { description: String },

    #[error("unsupported constant value: {description}")]
    #[diagnostic(
        code(maat::convert::unsupported_constant),
        help("Literals are strings, integers, doubles, and booleans.")
    )]
    UnsupportedConstantValue { description: String },
}

// ---------------------------------------------------------------------------
// Lint specification errors
// ---------------------------------------------------------------------------

/// Errors loading a lint specification file.
#[derive(Debug, Error, Diagnostic)]
pub enum LintError {
    #[error("failed to decode lint specification {path}: {source}")]
    #[diagnostic(
        code(maat::lint::decode_failed),
        help(
            "The lint specification is JSON with \"lhs\" and \"rhs\" maps \
             from question to constraint; a constraint is an array of \
             strings, or one of \"string\", \"bool\", \"int\", \"double\", \
             \"any\"."
        )
    )]
    DecodeFailed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// Canonical encoding errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum CodecError {
    #[error("unknown predicate type \"{found}\"")]
    #[diagnostic(
        code(maat::codec::predicate_type),
        help(
            "Valid discriminators: \"false\", \"true\", \"not\", \"and\", \
             \"or\", \"comparison\"."
        )
    )]
    UnknownPredicateType { found: String },

    #[error("unknown operator \"{found}\"")]
    #[diagnostic(
        code(maat::codec::operator),
        help(
            "Valid operators: isEqualTo, isNotEqualTo, isLessThan, \
             isGreaterThan, isLessThanOrEqualTo, isGreaterThanOrEqualTo."
        )
    )]
    UnknownOperator { found: String },

    #[error("invalid expression encoding: {message}")]
    #[diagnostic(
        code(maat::codec::expression),
        help(
            "An expression is a single-field object: {{\"question\": …}}, \
             {{\"answer\": …}}, or {{\"predicate\": …}}."
        )
    )]
    InvalidExpression { message: String },

    #[error("invalid answer encoding: {message}")]
    #[diagnostic(
        code(maat::codec::answer),
        help(
            "An answer is a single-field object: {{\"bool\": …}}, \
             {{\"int\": …}}, {{\"double\": …}}, {{\"string\": …}}, or the \
             two-field comparable/equatable extension forms."
        )
    )]
    InvalidAnswer { message: String },

    #[error("invalid rule encoding: {message}")]
    #[diagnostic(
        code(maat::codec::rule),
        help(
            "A rule object carries priority, predicate, question, answer, \
             and an optional assignment string."
        )
    )]
    InvalidRule { message: String },

    #[error("unknown extension type \"{type_name}\"")]
    #[diagnostic(
        code(maat::codec::unknown_extension),
        help(
            "No decoder is registered for this type name. Register one on \
             the TypeRegistry before decoding."
        )
    )]
    UnknownExtensionType { type_name: String },

    #[error("failed to decode extension type \"{type_name}\": {message}")]
    #[diagnostic(
        code(maat::codec::extension_decode),
        help("The registered decoder rejected the payload.")
    )]
    ExtensionDecodeFailed { type_name: String, message: String },

    #[error("double {value} has no canonical JSON encoding")]
    #[diagnostic(
        code(maat::codec::double),
        help("NaN and infinities cannot be written to a canonical rule file.")
    )]
    UnencodableDouble { value: f64 },
}

/// Convenience alias for functions returning maat results.
pub type MaatResult<T> = std::result::Result<T, MaatError>;

/// Result type for `ask` operations.
pub type AnswerResult<T> = std::result::Result<T, AnswerError>;

/// Result type for predicate evaluation.
pub type EvalResult<T> = std::result::Result<T, EvalError>;

/// Result type for canonical encode/decode operations.
pub type CodecResult<T> = std::result::Result<T, CodecError>;
