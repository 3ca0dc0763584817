//! Human rule file parser.
//!
//! The format is line-oriented:
//!
//! ```text
//! // beach rules
//! 1: TRUEPREDICATE => sky = blue
//! 2: weather == "sunny" AND season == "summer" => beach = full
//! 0: TRUEPREDICATE => visitors = (int)0
//! 3: beach == "full" => announcement = (shout)beach is full
//! ```
//!
//! Comments begin with `//`, blank lines are ignored, and rule lines start
//! with a digit (the priority). The answer after `=` defaults to a string;
//! `(bool)`, `(int)`, `(double)`, and `(string)` force a type, and any other
//! bracketed name is an assignment identifier with a string payload.
//!
//! Parsing collects *all* line errors rather than stopping at the first, so
//! the converter can report every problem in one pass.

use crate::answer::Answer;
use crate::error::ParseError;
use crate::predicate::format;
use crate::question::Question;
use crate::rule::Rule;

/// A parsed rule plus its provenance in the source file.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRule {
    pub rule: Rule,
    /// 1-based source line number.
    pub line: usize,
    /// The trimmed source line, kept for duplicate detection by the linter.
    pub source: String,
}

/// Parse a complete rule file.
///
/// Returns every rule on success, or every error found (ordered by line) on
/// failure.
pub fn parse_rules(input: &str) -> Result<Vec<ParsedRule>, Vec<ParseError>> {
    let mut rules = Vec::new();
    let mut errors = Vec::new();

    for (index, raw_line) in input.lines().enumerate() {
        let line = index + 1;
        let text = raw_line.trim();
        if text.is_empty() || text.starts_with("//") {
            continue;
        }
        match parse_rule_line(text, line) {
            Ok(rule) => rules.push(ParsedRule {
                rule,
                line,
                source: text.to_string(),
            }),
            Err(error) => errors.push(error),
        }
    }

    if errors.is_empty() {
        Ok(rules)
    } else {
        Err(errors)
    }
}

/// Parse one trimmed, non-empty, non-comment line.
fn parse_rule_line(text: &str, line: usize) -> Result<Rule, ParseError> {
    if !text.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(ParseError::NotARule { line });
    }

    let (priority_text, rest) = text
        .split_once(':')
        .ok_or(ParseError::MissingDelimiter { line, delimiter: ":" })?;
    let priority: i32 =
        priority_text
            .trim()
            .parse()
            .map_err(|_| ParseError::InvalidPriority {
                line,
                text: priority_text.trim().to_string(),
            })?;

    let (predicate_text, rest) = rest
        .split_once("=>")
        .ok_or(ParseError::MissingDelimiter { line, delimiter: "=>" })?;

    let (question_text, answer_text) = rest
        .split_once('=')
        .ok_or(ParseError::MissingDelimiter { line, delimiter: "=" })?;
    let question =
        Question::new(question_text.trim()).ok_or(ParseError::EmptyQuestion { line })?;

    let ast = format::parse(predicate_text.trim())
        .map_err(|source| ParseError::Predicate { line, source })?;
    let predicate =
        format::convert(&ast).map_err(|source| ParseError::Conversion { line, source })?;

    let (answer, assignment) = parse_answer_spec(answer_text.trim(), line)?;

    Ok(Rule {
        priority,
        predicate,
        question,
        answer,
        assignment,
    })
}

/// Parse the `<answer-spec>` after the `=`.
fn parse_answer_spec(text: &str, line: usize) -> Result<(Answer, Option<String>), ParseError> {
    let Some(bracketed) = text.strip_prefix('(') else {
        // No bracketed name: the whole text is a string answer.
        return Ok((Answer::String(text.to_string()), None));
    };
    let (name, payload) = bracketed
        .split_once(')')
        .ok_or(ParseError::MissingDelimiter { line, delimiter: ")" })?;
    let name = name.trim();
    let payload = payload.trim();

    match name {
        "bool" => match payload {
            "true" => Ok((Answer::Bool(true), None)),
            "false" => Ok((Answer::Bool(false), None)),
            _ => Err(ParseError::InvalidTypedAnswer {
                line,
                keyword: name.to_string(),
                payload: payload.to_string(),
            }),
        },
        "int" => payload
            .parse::<i64>()
            .map(|i| (Answer::Int(i), None))
            .map_err(|_| ParseError::InvalidTypedAnswer {
                line,
                keyword: name.to_string(),
                payload: payload.to_string(),
            }),
        "double" => payload
            .parse::<f64>()
            .map(|d| (Answer::Double(d), None))
            .map_err(|_| ParseError::InvalidTypedAnswer {
                line,
                keyword: name.to_string(),
                payload: payload.to_string(),
            }),
        "string" => Ok((Answer::String(payload.to_string()), None)),
        _ => {
            if payload.is_empty() {
                return Err(ParseError::EmptyAnswer {
                    line,
                    name: name.to_string(),
                });
            }
            Ok((Answer::String(payload.to_string()), Some(name.to_string())))
        }
    }
}
