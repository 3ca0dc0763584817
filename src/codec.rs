//! Canonical JSON encoding of rules, predicates, and answers.
//!
//! The canonical form is binary-stable: predicates are tagged objects with a
//! `type` discriminator, operators are bare camel-case strings, expressions
//! and answers are single-field objects. Decoding extension-typed answers
//! consults a [`TypeRegistry`], which is why decode takes a registry
//! parameter and the plain serde derives are not used here.

use serde_json::{json, Map, Value};

use crate::answer::Answer;
use crate::error::{CodecError, CodecResult};
use crate::extension::TypeRegistry;
use crate::predicate::{Expr, Op, Predicate};
use crate::question::Question;
use crate::rule::Rule;

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

fn op_name(op: Op) -> &'static str {
    match op {
        Op::Eq => "isEqualTo",
        Op::Ne => "isNotEqualTo",
        Op::Lt => "isLessThan",
        Op::Gt => "isGreaterThan",
        Op::Le => "isLessThanOrEqualTo",
        Op::Ge => "isGreaterThanOrEqualTo",
    }
}

fn op_from_name(name: &str) -> CodecResult<Op> {
    match name {
        "isEqualTo" => Ok(Op::Eq),
        "isNotEqualTo" => Ok(Op::Ne),
        "isLessThan" => Ok(Op::Lt),
        "isGreaterThan" => Ok(Op::Gt),
        "isLessThanOrEqualTo" => Ok(Op::Le),
        "isGreaterThanOrEqualTo" => Ok(Op::Ge),
        other => Err(CodecError::UnknownOperator {
            found: other.to_string(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Answers
// ---------------------------------------------------------------------------

pub fn encode_answer(answer: &Answer) -> CodecResult<Value> {
    match answer {
        Answer::Bool(b) => Ok(json!({ "bool": b })),
        Answer::Int(i) => Ok(json!({ "int": i })),
        Answer::Double(d) => {
            let number = serde_json::Number::from_f64(*d)
                .ok_or(CodecError::UnencodableDouble { value: *d })?;
            Ok(json!({ "double": number }))
        }
        Answer::String(s) => Ok(json!({ "string": s })),
        Answer::Comparable(v) => Ok(json!({
            "comparableType": v.type_name(),
            "comparable": [v.encode()],
        })),
        Answer::Equatable(v) => Ok(json!({
            "equatableType": v.type_name(),
            "equatable": [v.encode()],
        })),
    }
}

pub fn decode_answer(value: &Value, registry: &TypeRegistry) -> CodecResult<Answer> {
    let object = value.as_object().ok_or_else(|| CodecError::InvalidAnswer {
        message: format!("expected an object, got {value}"),
    })?;

    if let Some(b) = object.get("bool") {
        let b = b.as_bool().ok_or_else(|| CodecError::InvalidAnswer {
            message: format!("\"bool\" field is not a boolean: {b}"),
        })?;
        return Ok(Answer::Bool(b));
    }
    if let Some(i) = object.get("int") {
        let i = i.as_i64().ok_or_else(|| CodecError::InvalidAnswer {
            message: format!("\"int\" field is not an integer: {i}"),
        })?;
        return Ok(Answer::Int(i));
    }
    if let Some(d) = object.get("double") {
        let d = d.as_f64().ok_or_else(|| CodecError::InvalidAnswer {
            message: format!("\"double\" field is not a number: {d}"),
        })?;
        return Ok(Answer::Double(d));
    }
    if let Some(s) = object.get("string") {
        let s = s.as_str().ok_or_else(|| CodecError::InvalidAnswer {
            message: format!("\"string\" field is not a string: {s}"),
        })?;
        return Ok(Answer::String(s.to_string()));
    }
    if object.contains_key("comparableType") || object.contains_key("comparable") {
        let value = decode_extension(object, "comparableType", "comparable", registry)?;
        return Ok(Answer::Comparable(value));
    }
    if object.contains_key("equatableType") || object.contains_key("equatable") {
        let value = decode_extension(object, "equatableType", "equatable", registry)?;
        return Ok(Answer::Equatable(value));
    }

    Err(CodecError::InvalidAnswer {
        message: format!("no recognized answer field in {value}"),
    })
}

fn decode_extension(
    object: &Map<String, Value>,
    type_field: &str,
    payload_field: &str,
    registry: &TypeRegistry,
) -> CodecResult<Box<dyn crate::extension::ExtensionValue>> {
    let type_name = object
        .get(type_field)
        .and_then(Value::as_str)
        .ok_or_else(|| CodecError::InvalidAnswer {
            message: format!("missing or non-string \"{type_field}\" field"),
        })?;
    let payload = object
        .get(payload_field)
        .and_then(Value::as_array)
        .filter(|wrapper| wrapper.len() == 1)
        .map(|wrapper| &wrapper[0])
        .ok_or_else(|| CodecError::InvalidAnswer {
            message: format!("\"{payload_field}\" must be a single-element array"),
        })?;
    registry.decode(type_name, payload)
}

// ---------------------------------------------------------------------------
// Expressions and predicates
// ---------------------------------------------------------------------------

pub fn encode_expr(expr: &Expr) -> CodecResult<Value> {
    match expr {
        Expr::Question(q) => Ok(json!({ "question": q.identifier() })),
        Expr::Answer(a) => Ok(json!({ "answer": encode_answer(a)? })),
        Expr::Predicate(p) => Ok(json!({ "predicate": encode_predicate(p)? })),
    }
}

pub fn decode_expr(value: &Value, registry: &TypeRegistry) -> CodecResult<Expr> {
    let object = value
        .as_object()
        .ok_or_else(|| CodecError::InvalidExpression {
            message: format!("expected an object, got {value}"),
        })?;

    if let Some(q) = object.get("question") {
        let identifier = q.as_str().ok_or_else(|| CodecError::InvalidExpression {
            message: format!("\"question\" field is not a string: {q}"),
        })?;
        let question =
            Question::new(identifier).ok_or_else(|| CodecError::InvalidExpression {
                message: "\"question\" field is empty".to_string(),
            })?;
        return Ok(Expr::Question(question));
    }
    if let Some(a) = object.get("answer") {
        return Ok(Expr::Answer(decode_answer(a, registry)?));
    }
    if let Some(p) = object.get("predicate") {
        return Ok(Expr::Predicate(Box::new(decode_predicate(p, registry)?)));
    }

    Err(CodecError::InvalidExpression {
        message: format!("no recognized expression field in {value}"),
    })
}

pub fn encode_predicate(predicate: &Predicate) -> CodecResult<Value> {
    match predicate {
        Predicate::False => Ok(json!({ "type": "false" })),
        Predicate::True => Ok(json!({ "type": "true" })),
        Predicate::Not(p) => Ok(json!({ "type": "not", "operand": encode_predicate(p)? })),
        Predicate::And(ps) => Ok(json!({
            "type": "and",
            "operands": ps.iter().map(encode_predicate).collect::<CodecResult<Vec<_>>>()?,
        })),
        Predicate::Or(ps) => Ok(json!({
            "type": "or",
            "operands": ps.iter().map(encode_predicate).collect::<CodecResult<Vec<_>>>()?,
        })),
        Predicate::Comparison(lhs, op, rhs) => Ok(json!({
            "type": "comparison",
            "lhs": encode_expr(lhs)?,
            "op": op_name(*op),
            "rhs": encode_expr(rhs)?,
        })),
    }
}

pub fn decode_predicate(value: &Value, registry: &TypeRegistry) -> CodecResult<Predicate> {
    let object = value
        .as_object()
        .ok_or_else(|| CodecError::UnknownPredicateType {
            found: value.to_string(),
        })?;
    let discriminator = object
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| CodecError::UnknownPredicateType {
            found: value.to_string(),
        })?;

    match discriminator {
        "false" => Ok(Predicate::False),
        "true" => Ok(Predicate::True),
        "not" => {
            let operand = object
                .get("operand")
                .ok_or_else(|| CodecError::UnknownPredicateType {
                    found: "not without operand".to_string(),
                })?;
            Ok(Predicate::Not(Box::new(decode_predicate(operand, registry)?)))
        }
        "and" | "or" => {
            let operands = object
                .get("operands")
                .and_then(Value::as_array)
                .ok_or_else(|| CodecError::UnknownPredicateType {
                    found: format!("{discriminator} without operands array"),
                })?;
            let decoded = operands
                .iter()
                .map(|p| decode_predicate(p, registry))
                .collect::<CodecResult<Vec<_>>>()?;
            if discriminator == "and" {
                Ok(Predicate::And(decoded))
            } else {
                Ok(Predicate::Or(decoded))
            }
        }
        "comparison" => {
            let lhs = object
                .get("lhs")
                .ok_or_else(|| CodecError::InvalidExpression {
                    message: "comparison without lhs".to_string(),
                })?;
            let rhs = object
                .get("rhs")
                .ok_or_else(|| CodecError::InvalidExpression {
                    message: "comparison without rhs".to_string(),
                })?;
            let op = object
                .get("op")
                .and_then(Value::as_str)
                .ok_or_else(|| CodecError::UnknownOperator {
                    found: "missing op field".to_string(),
                })?;
            Ok(Predicate::Comparison(
                decode_expr(lhs, registry)?,
                op_from_name(op)?,
                decode_expr(rhs, registry)?,
            ))
        }
        other => Err(CodecError::UnknownPredicateType {
            found: other.to_string(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

pub fn encode_rule(rule: &Rule) -> CodecResult<Value> {
    let mut object = Map::new();
    object.insert("priority".to_string(), json!(rule.priority));
    object.insert("predicate".to_string(), encode_predicate(&rule.predicate)?);
    object.insert("question".to_string(), json!(rule.question.identifier()));
    object.insert("answer".to_string(), encode_answer(&rule.answer)?);
    if let Some(assignment) = &rule.assignment {
        object.insert("assignment".to_string(), json!(assignment));
    }
    Ok(Value::Object(object))
}

pub fn decode_rule(value: &Value, registry: &TypeRegistry) -> CodecResult<Rule> {
    let object = value.as_object().ok_or_else(|| CodecError::InvalidRule {
        message: format!("expected an object, got {value}"),
    })?;

    let priority = object
        .get("priority")
        .and_then(Value::as_i64)
        .ok_or_else(|| CodecError::InvalidRule {
            message: "missing or non-integer \"priority\"".to_string(),
        })?;
    let priority = i32::try_from(priority).map_err(|_| CodecError::InvalidRule {
        message: format!("priority {priority} is out of range"),
    })?;
    let predicate = object
        .get("predicate")
        .ok_or_else(|| CodecError::InvalidRule {
            message: "missing \"predicate\"".to_string(),
        })?;
    let question = object
        .get("question")
        .and_then(Value::as_str)
        .and_then(Question::new)
        .ok_or_else(|| CodecError::InvalidRule {
            message: "missing, non-string, or empty \"question\"".to_string(),
        })?;
    let answer = object.get("answer").ok_or_else(|| CodecError::InvalidRule {
        message: "missing \"answer\"".to_string(),
    })?;
    let assignment = match object.get("assignment") {
        None | Some(Value::Null) => None,
        Some(Value::String(name)) => Some(name.clone()),
        Some(other) => {
            return Err(CodecError::InvalidRule {
                message: format!("\"assignment\" is not a string: {other}"),
            })
        }
    };

    Ok(Rule {
        priority,
        predicate: decode_predicate(predicate, registry)?,
        question,
        answer: decode_answer(answer, registry)?,
        assignment,
    })
}

/// Encode a rule set as the canonical rule file: a JSON array of rule objects.
pub fn encode_rules(rules: &[Rule]) -> CodecResult<Value> {
    Ok(Value::Array(
        rules.iter().map(encode_rule).collect::<CodecResult<Vec<_>>>()?,
    ))
}

/// Decode a canonical rule file.
pub fn decode_rules(value: &Value, registry: &TypeRegistry) -> CodecResult<Vec<Rule>> {
    let array = value.as_array().ok_or_else(|| CodecError::InvalidRule {
        message: format!("canonical rule file must be an array, got {value}"),
    })?;
    array.iter().map(|r| decode_rule(r, registry)).collect()
}
