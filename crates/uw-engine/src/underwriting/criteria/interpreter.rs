use std::borrow::Cow;
use std::cmp::Ordering;

use serde_json::{Map, Value as JsonValue};

use super::parser::{BinaryOp, Binding, Expr, Literal, LogicalOp, UnaryOp};
use super::CriteriaContext;

/// Runtime value produced while evaluating a criteria expression.
///
/// Objects and arrays borrow from the bound client/carrier records; only
/// derived strings are owned.
#[derive(Debug, Clone)]
pub(crate) enum Value<'a> {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Cow<'a, str>),
    Array(&'a [JsonValue]),
    Object(&'a Map<String, JsonValue>),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("cannot read property '{property}' of {target}")]
    PropertyOfNothing {
        property: String,
        target: &'static str,
    },
}

impl<'a> Value<'a> {
    pub(crate) fn from_json(value: &'a JsonValue) -> Self {
        match value {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(flag) => Value::Bool(*flag),
            JsonValue::Number(number) => Value::Number(number.as_f64().unwrap_or(f64::NAN)),
            JsonValue::String(text) => Value::Str(Cow::Borrowed(text.as_str())),
            JsonValue::Array(items) => Value::Array(items.as_slice()),
            JsonValue::Object(map) => Value::Object(map),
        }
    }

    pub(crate) fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(flag) => *flag,
            Value::Number(number) => *number != 0.0 && !number.is_nan(),
            Value::Str(text) => !text.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }

    fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(flag) => f64::from(u8::from(*flag)),
            Value::Number(number) => *number,
            Value::Str(text) => string_to_number(text),
            Value::Array(items) => match items {
                [] => 0.0,
                [single] => Value::from_json(single).to_number(),
                _ => f64::NAN,
            },
            Value::Object(_) => f64::NAN,
        }
    }

    fn to_display(&self) -> Cow<'a, str> {
        match self {
            Value::Undefined => Cow::Borrowed("undefined"),
            Value::Null => Cow::Borrowed("null"),
            Value::Bool(flag) => Cow::Owned(flag.to_string()),
            Value::Number(number) => Cow::Owned(number_to_string(*number)),
            Value::Str(text) => text.clone(),
            Value::Array(items) => Cow::Owned(
                items
                    .iter()
                    .map(|item| match item {
                        JsonValue::Null => String::new(),
                        other => Value::from_json(other).to_display().into_owned(),
                    })
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            Value::Object(_) => Cow::Borrowed("[object Object]"),
        }
    }

    fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }
}

/// String-to-number coercion as rule authors expect from `==` and `<`:
/// blank is 0; decimal literals, `Infinity` and `0x`/`0o`/`0b` integers
/// parse; anything else (including `inf`, `nan` and `1_0`) is NaN.
fn string_to_number(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)] {
        if let Some(digits) = trimmed.strip_prefix(prefix) {
            return radix_to_number(digits, radix);
        }
    }

    let (sign, unsigned) = match trimmed.as_bytes()[0] {
        b'+' => (1.0, &trimmed[1..]),
        b'-' => (-1.0, &trimmed[1..]),
        _ => (1.0, trimmed),
    };
    if unsigned == "Infinity" {
        return sign * f64::INFINITY;
    }
    if !is_decimal_literal(unsigned) {
        return f64::NAN;
    }
    unsigned.parse::<f64>().map_or(f64::NAN, |value| sign * value)
}

fn radix_to_number(digits: &str, radix: u32) -> f64 {
    if digits.is_empty() {
        return f64::NAN;
    }
    digits
        .chars()
        .try_fold(0.0, |acc: f64, ch| {
            ch.to_digit(radix)
                .map(|digit| acc * f64::from(radix) + f64::from(digit))
        })
        .unwrap_or(f64::NAN)
}

/// `digits [. digits] [e [+-] digits]`, where either side of the point may be
/// empty but not both.
fn is_decimal_literal(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut cursor = 0;
    let digits_from = |cursor: &mut usize| {
        let start = *cursor;
        while bytes.get(*cursor).is_some_and(u8::is_ascii_digit) {
            *cursor += 1;
        }
        *cursor - start
    };

    let mut mantissa = digits_from(&mut cursor);
    if bytes.get(cursor) == Some(&b'.') {
        cursor += 1;
        mantissa += digits_from(&mut cursor);
    }
    if mantissa == 0 {
        return false;
    }

    if matches!(bytes.get(cursor), Some(b'e' | b'E')) {
        cursor += 1;
        if matches!(bytes.get(cursor), Some(b'+' | b'-')) {
            cursor += 1;
        }
        if digits_from(&mut cursor) == 0 {
            return false;
        }
    }
    cursor == bytes.len()
}

fn number_to_string(number: f64) -> String {
    if number.is_nan() {
        "NaN".to_string()
    } else if number == f64::INFINITY {
        "Infinity".to_string()
    } else if number == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else if number == 0.0 {
        "0".to_string()
    } else {
        number.to_string()
    }
}

pub(crate) fn evaluate<'a>(
    expr: &Expr,
    context: &CriteriaContext<'a>,
) -> Result<Value<'a>, EvalError> {
    match expr {
        Expr::Literal(literal) => Ok(match literal {
            Literal::Undefined => Value::Undefined,
            Literal::Null => Value::Null,
            Literal::Bool(flag) => Value::Bool(*flag),
            Literal::Number(number) => Value::Number(*number),
            Literal::Str(text) => Value::Str(Cow::Owned(text.clone())),
        }),
        Expr::Binding(Binding::Client) => Ok(Value::Object(context.client)),
        Expr::Binding(Binding::Carrier) => Ok(Value::from_json(context.carrier)),
        Expr::Member { object, property } => {
            let target = evaluate(object, context)?;
            read_property(target, property)
        }
        Expr::Index { object, index } => {
            let target = evaluate(object, context)?;
            let key = evaluate(index, context)?;
            read_index(target, key)
        }
        Expr::Unary { op, operand } => {
            let value = evaluate(operand, context)?;
            Ok(match op {
                UnaryOp::Not => Value::Bool(!value.truthy()),
                UnaryOp::Negate => Value::Number(-value.to_number()),
                UnaryOp::Plus => Value::Number(value.to_number()),
            })
        }
        Expr::Logical { op, left, right } => {
            let left = evaluate(left, context)?;
            let short_circuit = match op {
                LogicalOp::And => !left.truthy(),
                LogicalOp::Or => left.truthy(),
            };
            if short_circuit {
                Ok(left)
            } else {
                evaluate(right, context)
            }
        }
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => {
            if evaluate(test, context)?.truthy() {
                evaluate(consequent, context)
            } else {
                evaluate(alternate, context)
            }
        }
        Expr::Binary { op, left, right } => {
            let left = evaluate(left, context)?;
            let right = evaluate(right, context)?;
            Ok(apply_binary(*op, left, right))
        }
    }
}

fn read_property<'a>(target: Value<'a>, property: &str) -> Result<Value<'a>, EvalError> {
    match target {
        Value::Undefined => Err(EvalError::PropertyOfNothing {
            property: property.to_string(),
            target: "undefined",
        }),
        Value::Null => Err(EvalError::PropertyOfNothing {
            property: property.to_string(),
            target: "null",
        }),
        Value::Object(map) => Ok(map.get(property).map(Value::from_json).unwrap_or(Value::Undefined)),
        Value::Array(items) => Ok(match property {
            "length" => Value::Number(items.len() as f64),
            _ => array_element(items, property),
        }),
        Value::Str(text) => Ok(match property {
            "length" => Value::Number(text.chars().count() as f64),
            _ => Value::Undefined,
        }),
        Value::Bool(_) | Value::Number(_) => Ok(Value::Undefined),
    }
}

fn read_index<'a>(target: Value<'a>, key: Value<'a>) -> Result<Value<'a>, EvalError> {
    let property = key.to_display();
    read_property(target, &property)
}

fn array_element<'a>(items: &'a [JsonValue], property: &str) -> Value<'a> {
    property
        .parse::<usize>()
        .ok()
        .filter(|index| index.to_string() == property)
        .and_then(|index| items.get(index))
        .map(Value::from_json)
        .unwrap_or(Value::Undefined)
}

fn apply_binary<'a>(op: BinaryOp, left: Value<'a>, right: Value<'a>) -> Value<'a> {
    match op {
        BinaryOp::StrictEq => Value::Bool(strict_equals(&left, &right)),
        BinaryOp::StrictNotEq => Value::Bool(!strict_equals(&left, &right)),
        BinaryOp::LooseEq => Value::Bool(loose_equals(&left, &right)),
        BinaryOp::LooseNotEq => Value::Bool(!loose_equals(&left, &right)),
        BinaryOp::Less => Value::Bool(compare(&left, &right) == Some(Ordering::Less)),
        BinaryOp::LessEq => Value::Bool(matches!(
            compare(&left, &right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::Greater => Value::Bool(compare(&left, &right) == Some(Ordering::Greater)),
        BinaryOp::GreaterEq => Value::Bool(matches!(
            compare(&left, &right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOp::Add => add(left, right),
        BinaryOp::Subtract => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Multiply => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Divide => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Remainder => Value::Number(left.to_number() % right.to_number()),
    }
}

fn add<'a>(left: Value<'a>, right: Value<'a>) -> Value<'a> {
    let concatenates = |value: &Value<'_>| {
        matches!(value, Value::Str(_) | Value::Array(_) | Value::Object(_))
    };
    if concatenates(&left) || concatenates(&right) {
        let mut joined = left.to_display().into_owned();
        joined.push_str(&right.to_display());
        Value::Str(Cow::Owned(joined))
    } else {
        Value::Number(left.to_number() + right.to_number())
    }
}

fn strict_equals(left: &Value<'_>, right: &Value<'_>) -> bool {
    match (left, right) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => std::ptr::eq(*a, *b),
        (Value::Object(a), Value::Object(b)) => std::ptr::eq(*a, *b),
        _ => false,
    }
}

fn loose_equals(left: &Value<'_>, right: &Value<'_>) -> bool {
    match (left, right) {
        (a, b) if a.is_nullish() && b.is_nullish() => true,
        (a, b) if a.is_nullish() || b.is_nullish() => false,
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Array(_) | Value::Object(_), Value::Array(_) | Value::Object(_)) => {
            strict_equals(left, right)
        }
        (Value::Array(_) | Value::Object(_), Value::Str(text))
        | (Value::Str(text), Value::Array(_) | Value::Object(_)) => {
            let other = if matches!(left, Value::Str(_)) { right } else { left };
            other.to_display() == *text
        }
        _ => left.to_number() == right.to_number(),
    }
}

/// Relational ordering; `None` when either side is NaN after coercion.
fn compare(left: &Value<'_>, right: &Value<'_>) -> Option<Ordering> {
    if let (Value::Str(a), Value::Str(b)) = (left, right) {
        return Some(a.as_ref().cmp(b.as_ref()));
    }
    left.to_number().partial_cmp(&right.to_number())
}
