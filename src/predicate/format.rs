//! Predicate format: tokenizer, recursive-descent parser, and conversion.
//!
//! The human rule format writes predicates in a general comparison language
//! (`sky == "blue" AND NOT (count < 3)`). Parsing happens in two stages:
//!
//! 1. **Parse**: tokenize and parse into a generic [`FormatExpr`] tree that
//!    represents everything the format can say, including operators and
//!    constants the engine does not evaluate.
//! 2. **Convert**: turn the generic tree into an engine [`Predicate`],
//!    rejecting unsupported constructs with a [`ConversionError`].
//!
//! The parser is hand-rolled (no external parser combinator dependency) for
//! full control over error messages and the small fixed grammar.

use crate::answer::Answer;
use crate::error::{ConversionError, FormatError};
use crate::question::Question;

use super::{Expr, Op, Predicate};

// ---------------------------------------------------------------------------
// Generic format AST
// ---------------------------------------------------------------------------

/// An operator as written in the format. Broader than [`Op`]: the collection
/// and substring operators parse but do not convert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Contains,
    In,
    BeginsWith,
    EndsWith,
    Matches,
}

impl std::fmt::Display for FormatOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            FormatOp::Eq => "==",
            FormatOp::Ne => "!=",
            FormatOp::Lt => "<",
            FormatOp::Gt => ">",
            FormatOp::Le => "<=",
            FormatOp::Ge => ">=",
            FormatOp::Contains => "CONTAINS",
            FormatOp::In => "IN",
            FormatOp::BeginsWith => "BEGINSWITH",
            FormatOp::EndsWith => "ENDSWITH",
            FormatOp::Matches => "MATCHES",
        };
        f.write_str(text)
    }
}

/// A constant as written in the format.
#[derive(Debug, Clone, PartialEq)]
pub enum FormatValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    Null,
}

/// The generic format AST.
#[derive(Debug, Clone, PartialEq)]
pub enum FormatExpr {
    TruePredicate,
    FalsePredicate,
    Constant(FormatValue),
    /// A bare identifier; converts to a question reference.
    Variable(String),
    Not(Box<FormatExpr>),
    And(Vec<FormatExpr>),
    Or(Vec<FormatExpr>),
    Comparison(Box<FormatExpr>, FormatOp, Box<FormatExpr>),
    /// A `{a, b, c}` collection; parses for IN-style comparisons but does
    /// not convert.
    Aggregate(Vec<FormatValue>),
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Ident(String),
    Str(String),
    Int(i64),
    Double(f64),
    Bool(bool),
    Null,
    TruePredicate,
    FalsePredicate,
    And,
    Or,
    Not,
    Op(FormatOp),
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
}

impl TokenKind {
    fn describe(&self) -> String {
        match self {
            TokenKind::Ident(s) => s.clone(),
            TokenKind::Str(s) => format!("\"{s}\""),
            TokenKind::Int(i) => i.to_string(),
            TokenKind::Double(d) => d.to_string(),
            TokenKind::Bool(b) => b.to_string(),
            TokenKind::Null => "NULL".to_string(),
            TokenKind::TruePredicate => "TRUEPREDICATE".to_string(),
            TokenKind::FalsePredicate => "FALSEPREDICATE".to_string(),
            TokenKind::And => "AND".to_string(),
            TokenKind::Or => "OR".to_string(),
            TokenKind::Not => "NOT".to_string(),
            TokenKind::Op(op) => op.to_string(),
            TokenKind::LParen => "(".to_string(),
            TokenKind::RParen => ")".to_string(),
            TokenKind::LBrace => "{".to_string(),
            TokenKind::RBrace => "}".to_string(),
            TokenKind::Comma => ",".to_string(),
        }
    }
}

fn keyword(word: &str) -> Option<TokenKind> {
    match word.to_ascii_uppercase().as_str() {
        "AND" => Some(TokenKind::And),
        "OR" => Some(TokenKind::Or),
        "NOT" => Some(TokenKind::Not),
        "TRUE" => Some(TokenKind::Bool(true)),
        "FALSE" => Some(TokenKind::Bool(false)),
        "NULL" | "NIL" => Some(TokenKind::Null),
        "TRUEPREDICATE" => Some(TokenKind::TruePredicate),
        "FALSEPREDICATE" => Some(TokenKind::FalsePredicate),
        "CONTAINS" => Some(TokenKind::Op(FormatOp::Contains)),
        "IN" => Some(TokenKind::Op(FormatOp::In)),
        "BEGINSWITH" => Some(TokenKind::Op(FormatOp::BeginsWith)),
        "ENDSWITH" => Some(TokenKind::Op(FormatOp::EndsWith)),
        "MATCHES" => Some(TokenKind::Op(FormatOp::Matches)),
        _ => None,
    }
}

fn tokenize(input: &str) -> Result<Vec<(TokenKind, usize)>, FormatError> {
    let mut tokens = Vec::new();
    let bytes = input.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' => i += 1,
            '(' => {
                tokens.push((TokenKind::LParen, i));
                i += 1;
            }
            ')' => {
                tokens.push((TokenKind::RParen, i));
                i += 1;
            }
            '{' => {
                tokens.push((TokenKind::LBrace, i));
                i += 1;
            }
            '}' => {
                tokens.push((TokenKind::RBrace, i));
                i += 1;
            }
            ',' => {
                tokens.push((TokenKind::Comma, i));
                i += 1;
            }
            '=' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push((TokenKind::Op(FormatOp::Eq), i));
                    i += 2;
                } else {
                    tokens.push((TokenKind::Op(FormatOp::Eq), i));
                    i += 1;
                }
            }
            '!' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push((TokenKind::Op(FormatOp::Ne), i));
                    i += 2;
                } else {
                    return Err(FormatError::UnexpectedCharacter { ch: '!', offset: i });
                }
            }
            '<' => match bytes.get(i + 1) {
                Some(&b'=') => {
                    tokens.push((TokenKind::Op(FormatOp::Le), i));
                    i += 2;
                }
                Some(&b'>') => {
                    tokens.push((TokenKind::Op(FormatOp::Ne), i));
                    i += 2;
                }
                _ => {
                    tokens.push((TokenKind::Op(FormatOp::Lt), i));
                    i += 1;
                }
            },
            '>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push((TokenKind::Op(FormatOp::Ge), i));
                    i += 2;
                } else {
                    tokens.push((TokenKind::Op(FormatOp::Gt), i));
                    i += 1;
                }
            }
            '"' => {
                let start = i;
                i += 1;
                let mut raw: Vec<u8> = Vec::new();
                loop {
                    match bytes.get(i) {
                        None => return Err(FormatError::UnterminatedString { offset: start }),
                        Some(&b'"') => {
                            i += 1;
                            break;
                        }
                        Some(&b'\\') if bytes.get(i + 1) == Some(&b'"') => {
                            raw.push(b'"');
                            i += 2;
                        }
                        Some(&b) => {
                            raw.push(b);
                            i += 1;
                        }
                    }
                }
                // Only ASCII bytes were altered, so the slice stays valid UTF-8.
                let value = String::from_utf8_lossy(&raw).into_owned();
                tokens.push((TokenKind::Str(value), start));
            }
            _ if c.is_ascii_digit() || (c == '-' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)) => {
                let start = i;
                i += 1;
                while i < bytes.len()
                    && ((bytes[i] as char).is_ascii_digit() || bytes[i] == b'.')
                {
                    i += 1;
                }
                let text = &input[start..i];
                if text.contains('.') {
                    let value: f64 = text.parse().map_err(|_| FormatError::InvalidNumber {
                        text: text.to_string(),
                    })?;
                    tokens.push((TokenKind::Double(value), start));
                } else {
                    let value: i64 = text.parse().map_err(|_| FormatError::InvalidNumber {
                        text: text.to_string(),
                    })?;
                    tokens.push((TokenKind::Int(value), start));
                }
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                i += 1;
                while i < bytes.len() {
                    let b = bytes[i] as char;
                    if b.is_ascii_alphanumeric() || b == '_' || b == '.' || b == '-' {
                        i += 1;
                    } else {
                        break;
                    }
                }
                let word = &input[start..i];
                let kind = keyword(word).unwrap_or_else(|| TokenKind::Ident(word.to_string()));
                tokens.push((kind, start));
            }
            _ => return Err(FormatError::UnexpectedCharacter { ch: c, offset: i }),
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Recursive descent parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<(TokenKind, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|(kind, _)| kind)
    }

    fn next(&mut self, expected: &str) -> Result<TokenKind, FormatError> {
        match self.tokens.get(self.pos) {
            Some((kind, _)) => {
                let kind = kind.clone();
                self.pos += 1;
                Ok(kind)
            }
            None => Err(FormatError::UnexpectedEnd {
                expected: expected.to_string(),
            }),
        }
    }

    fn expect(&mut self, token: TokenKind, expected: &str) -> Result<(), FormatError> {
        let found = self.next(expected)?;
        if found == token {
            Ok(())
        } else {
            Err(FormatError::UnexpectedToken {
                found: found.describe(),
                expected: expected.to_string(),
            })
        }
    }

    /// `or := and (OR and)*`
    fn parse_or(&mut self) -> Result<FormatExpr, FormatError> {
        let first = self.parse_and()?;
        if self.peek() != Some(&TokenKind::Or) {
            return Ok(first);
        }
        let mut operands = vec![first];
        while self.peek() == Some(&TokenKind::Or) {
            self.pos += 1;
            operands.push(self.parse_and()?);
        }
        Ok(FormatExpr::Or(operands))
    }

    /// `and := unary (AND unary)*`
    fn parse_and(&mut self) -> Result<FormatExpr, FormatError> {
        let first = self.parse_unary()?;
        if self.peek() != Some(&TokenKind::And) {
            return Ok(first);
        }
        let mut operands = vec![first];
        while self.peek() == Some(&TokenKind::And) {
            self.pos += 1;
            operands.push(self.parse_unary()?);
        }
        Ok(FormatExpr::And(operands))
    }

    /// `unary := NOT unary | comparison`
    fn parse_unary(&mut self) -> Result<FormatExpr, FormatError> {
        if self.peek() == Some(&TokenKind::Not) {
            self.pos += 1;
            return Ok(FormatExpr::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_comparison()
    }

    /// `comparison := primary (op primary)?`
    fn parse_comparison(&mut self) -> Result<FormatExpr, FormatError> {
        let lhs = self.parse_primary()?;
        if let Some(TokenKind::Op(op)) = self.peek() {
            let op = *op;
            self.pos += 1;
            let rhs = self.parse_primary()?;
            return Ok(FormatExpr::Comparison(Box::new(lhs), op, Box::new(rhs)));
        }
        Ok(lhs)
    }

    /// `primary := TRUEPREDICATE | FALSEPREDICATE | literal | ident
    ///           | '(' or ')' | '{' literals '}'`
    fn parse_primary(&mut self) -> Result<FormatExpr, FormatError> {
        match self.next("a predicate or operand")? {
            TokenKind::TruePredicate => Ok(FormatExpr::TruePredicate),
            TokenKind::FalsePredicate => Ok(FormatExpr::FalsePredicate),
            TokenKind::Bool(b) => Ok(FormatExpr::Constant(FormatValue::Bool(b))),
            TokenKind::Int(i) => Ok(FormatExpr::Constant(FormatValue::Int(i))),
            TokenKind::Double(d) => Ok(FormatExpr::Constant(FormatValue::Double(d))),
            TokenKind::Str(s) => Ok(FormatExpr::Constant(FormatValue::Str(s))),
            TokenKind::Null => Ok(FormatExpr::Constant(FormatValue::Null)),
            TokenKind::Ident(name) => Ok(FormatExpr::Variable(name)),
            TokenKind::LParen => {
                let inner = self.parse_or()?;
                self.expect(TokenKind::RParen, ")")?;
                Ok(inner)
            }
            TokenKind::LBrace => {
                let mut values = Vec::new();
                if self.peek() == Some(&TokenKind::RBrace) {
                    self.pos += 1;
                    return Ok(FormatExpr::Aggregate(values));
                }
                loop {
                    match self.next("a literal")? {
                        TokenKind::Bool(b) => values.push(FormatValue::Bool(b)),
                        TokenKind::Int(i) => values.push(FormatValue::Int(i)),
                        TokenKind::Double(d) => values.push(FormatValue::Double(d)),
                        TokenKind::Str(s) => values.push(FormatValue::Str(s)),
                        TokenKind::Null => values.push(FormatValue::Null),
                        other => {
                            return Err(FormatError::UnexpectedToken {
                                found: other.describe(),
                                expected: "a literal".to_string(),
                            })
                        }
                    }
                    match self.next(", or }")? {
                        TokenKind::Comma => continue,
                        TokenKind::RBrace => break,
                        other => {
                            return Err(FormatError::UnexpectedToken {
                                found: other.describe(),
                                expected: ", or }".to_string(),
                            })
                        }
                    }
                }
                Ok(FormatExpr::Aggregate(values))
            }
            other => Err(FormatError::UnexpectedToken {
                found: other.describe(),
                expected: "a predicate or operand".to_string(),
            }),
        }
    }
}

/// Parse a predicate-format string into the generic AST.
pub fn parse(input: &str) -> Result<FormatExpr, FormatError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(FormatError::UnexpectedEnd {
            expected: "a predicate".to_string(),
        });
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if parser.pos < parser.tokens.len() {
        let rest: Vec<String> = parser.tokens[parser.pos..]
            .iter()
            .map(|(kind, _)| kind.describe())
            .collect();
        return Err(FormatError::TrailingTokens {
            rest: rest.join(" "),
        });
    }
    Ok(expr)
}

// ---------------------------------------------------------------------------
// Conversion to engine predicates
// ---------------------------------------------------------------------------

fn convert_op(op: FormatOp) -> Result<Op, ConversionError> {
    match op {
        FormatOp::Eq => Ok(Op::Eq),
        FormatOp::Ne => Ok(Op::Ne),
        FormatOp::Lt => Ok(Op::Lt),
        FormatOp::Gt => Ok(Op::Gt),
        FormatOp::Le => Ok(Op::Le),
        FormatOp::Ge => Ok(Op::Ge),
        other => Err(ConversionError::UnsupportedOperator {
            operator: other.to_string(),
        }),
    }
}

fn convert_operand(expr: &FormatExpr) -> Result<Expr, ConversionError> {
    match expr {
        FormatExpr::Variable(name) => {
            let question =
                Question::new(name.clone()).ok_or_else(|| ConversionError::UnsupportedExpression {
                    description: "empty question identifier".to_string(),
                })?;
            Ok(Expr::Question(question))
        }
        FormatExpr::Constant(value) => {
            let answer = match value {
                FormatValue::Bool(b) => Answer::Bool(*b),
                FormatValue::Int(i) => Answer::Int(*i),
                FormatValue::Double(d) => Answer::Double(*d),
                FormatValue::Str(s) => Answer::String(s.clone()),
                FormatValue::Null => {
                    return Err(ConversionError::UnsupportedConstantValue {
                        description: "null has no answer representation".to_string(),
                    })
                }
            };
            Ok(Expr::Answer(answer))
        }
        FormatExpr::Aggregate(_) => Err(ConversionError::UnsupportedExpression {
            description: "aggregate collections cannot be compared directly".to_string(),
        }),
        nested => Ok(Expr::Predicate(Box::new(convert(nested)?))),
    }
}

/// Convert the generic format AST into an engine [`Predicate`].
pub fn convert(expr: &FormatExpr) -> Result<Predicate, ConversionError> {
    match expr {
        FormatExpr::TruePredicate => Ok(Predicate::True),
        FormatExpr::FalsePredicate => Ok(Predicate::False),
        FormatExpr::Not(p) => Ok(Predicate::Not(Box::new(convert(p)?))),
        FormatExpr::And(ps) => {
            if ps.is_empty() {
                return Err(ConversionError::CompoundHasNoSubpredicates);
            }
            Ok(Predicate::And(
                ps.iter().map(convert).collect::<Result<Vec<_>, _>>()?,
            ))
        }
        FormatExpr::Or(ps) => {
            if ps.is_empty() {
                return Err(ConversionError::CompoundHasNoSubpredicates);
            }
            Ok(Predicate::Or(
                ps.iter().map(convert).collect::<Result<Vec<_>, _>>()?,
            ))
        }
        FormatExpr::Comparison(lhs, op, rhs) => Ok(Predicate::Comparison(
            convert_operand(lhs)?,
            convert_op(*op)?,
            convert_operand(rhs)?,
        )),
        FormatExpr::Constant(value) => Err(ConversionError::InputWasNotRecognized {
            description: format!("bare constant {value:?}"),
        }),
        FormatExpr::Variable(name) => Err(ConversionError::InputWasNotRecognized {
            description: format!("bare identifier \"{name}\""),
        }),
        FormatExpr::Aggregate(_) => Err(ConversionError::InputWasNotRecognized {
            description: "bare aggregate collection".to_string(),
        }),
    }
}
