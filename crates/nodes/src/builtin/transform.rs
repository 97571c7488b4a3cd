//! Transform node: applies an ordered list of field mutations.

use serde_json::{json, Map, Number, Value};

use crate::kind::{TransformConfig, TransformOperation, Transformation, HANDLE_OUTPUT};
use crate::path::as_number;
use crate::NodeOutcome;

pub fn run(config: &TransformConfig, input: &Value) -> NodeOutcome {
    let transformed = apply_all(&config.transformations, input);
    NodeOutcome::fired(
        json!({
            "transformed": transformed,
            "original": input,
            "applied": config.transformations.len(),
        }),
        HANDLE_OUTPUT,
    )
}

/// Apply `transformations` in order to a shallow copy of `input`.
///
/// A non-object input starts from an empty object.
pub fn apply_all(transformations: &[Transformation], input: &Value) -> Value {
    let mut data = input.as_object().cloned().unwrap_or_default();
    for t in transformations {
        apply(&mut data, t);
    }
    Value::Object(data)
}

fn apply(data: &mut Map<String, Value>, t: &Transformation) {
    let field = t.field.as_str();
    let operand = t.value.as_ref();

    match t.operation {
        TransformOperation::Set => {
            data.insert(field.to_owned(), operand.cloned().unwrap_or(Value::Null));
        }
        TransformOperation::Delete => {
            data.remove(field);
        }
        TransformOperation::Rename => {
            if let Some(new_name) = operand.and_then(Value::as_str).filter(|n| !n.is_empty()) {
                if let Some(v) = data.remove(field) {
                    data.insert(new_name.to_owned(), v);
                }
            }
        }
        TransformOperation::Uppercase => map_str(data, field, |s| s.to_uppercase()),
        TransformOperation::Lowercase => map_str(data, field, |s| s.to_lowercase()),
        TransformOperation::Trim => map_str(data, field, |s| s.trim().to_owned()),
        TransformOperation::Concat => {
            let suffix = operand.map(plain_text).unwrap_or_default();
            let current = data.get(field).map(plain_text).unwrap_or_default();
            data.insert(field.to_owned(), Value::String(current + &suffix));
        }
        TransformOperation::Split => {
            let delimiter = operand.and_then(Value::as_str).unwrap_or(",");
            if let Some(Value::String(s)) = data.get(field) {
                let parts: Vec<Value> = if delimiter.is_empty() {
                    s.chars().map(|c| Value::String(c.to_string())).collect()
                } else {
                    s.split(delimiter).map(|p| Value::String(p.to_owned())).collect()
                };
                data.insert(field.to_owned(), Value::Array(parts));
            }
        }
        TransformOperation::Replace => {
            if let Some((from, to)) = operand.and_then(replace_pair) {
                if !from.is_empty() {
                    map_str(data, field, |s| s.replace(&from, &to));
                }
            }
        }
        TransformOperation::Increment => arithmetic(data, field, operand, 0.0, Arith::Add),
        TransformOperation::Decrement => arithmetic(data, field, operand, 0.0, Arith::Sub),
        TransformOperation::Multiply => arithmetic(data, field, operand, f64::NAN, Arith::Mul),
        TransformOperation::Divide => arithmetic(data, field, operand, f64::NAN, Arith::Div),
        TransformOperation::Unknown => {}
    }
}

fn map_str(data: &mut Map<String, Value>, field: &str, f: impl FnOnce(&str) -> String) {
    if let Some(Value::String(s)) = data.get_mut(field) {
        *s = f(s);
    }
}

fn plain_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Accepts `{"search": .., "replace": ..}` or `[from, to]`.
fn replace_pair(value: &Value) -> Option<(String, String)> {
    match value {
        Value::Object(map) => {
            let from = map.get("search").or_else(|| map.get("from"))?;
            let to = map.get("replace").or_else(|| map.get("to"));
            Some((plain_text(from), to.map(plain_text).unwrap_or_default()))
        }
        Value::Array(items) if !items.is_empty() => Some((
            plain_text(&items[0]),
            items.get(1).map(plain_text).unwrap_or_default(),
        )),
        _ => None,
    }
}

#[derive(Clone, Copy)]
enum Arith {
    Add,
    Sub,
    Mul,
    Div,
}

/// Numeric update; `missing` is the starting value for an absent field
/// (NaN means "leave absent fields alone").
fn arithmetic(
    data: &mut Map<String, Value>,
    field: &str,
    operand: Option<&Value>,
    missing: f64,
    op: Arith,
) {
    let rhs = operand.and_then(as_number).unwrap_or(1.0);
    let lhs = match data.get(field) {
        Some(v) => match as_number(v) {
            Some(n) => n,
            None => return,
        },
        None if missing.is_nan() => return,
        None => missing,
    };

    // Keep integers integral where the arithmetic allows it.
    let integral = |n: f64| n.fract() == 0.0 && n.abs() < i64::MAX as f64;
    let result = match op {
        Arith::Add => lhs + rhs,
        Arith::Sub => lhs - rhs,
        Arith::Mul => lhs * rhs,
        Arith::Div if rhs == 0.0 => return,
        Arith::Div => lhs / rhs,
    };

    let number = if integral(result) {
        Some(Number::from(result as i64))
    } else {
        Number::from_f64(result)
    };
    if let Some(n) = number {
        data.insert(field.to_owned(), Value::Number(n));
    }
}
