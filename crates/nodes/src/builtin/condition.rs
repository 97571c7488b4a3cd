//! Condition node: compares a looked-up value and fires `true` or `false`.

use serde_json::{json, Value};

use crate::kind::{ConditionConfig, ConditionOperator, HANDLE_FALSE, HANDLE_TRUE};
use crate::path::{as_number, is_truthy, lookup};
use crate::NodeOutcome;

pub fn run(config: &ConditionConfig, input: &Value) -> NodeOutcome {
    let actual = lookup(input, &config.expression).cloned().unwrap_or(Value::Null);
    let result = evaluate(config.operator, &actual, &config.value);

    NodeOutcome::fired(
        json!({
            "result": result,
            "expression": config.expression,
            "operator": config.operator,
            "actual_value": actual,
            "expected_value": config.value,
            "data": input,
        }),
        if result { HANDLE_TRUE } else { HANDLE_FALSE },
    )
}

/// Apply `operator` to `actual` and the configured `expected` value.
pub fn evaluate(operator: ConditionOperator, actual: &Value, expected: &Value) -> bool {
    match operator {
        ConditionOperator::Equals => loose_equals(actual, expected),
        ConditionOperator::NotEquals => !loose_equals(actual, expected),
        ConditionOperator::GreaterThan => compare(actual, expected, |a, b| a > b),
        ConditionOperator::GreaterThanOrEqual => compare(actual, expected, |a, b| a >= b),
        ConditionOperator::LessThan => compare(actual, expected, |a, b| a < b),
        ConditionOperator::LessThanOrEqual => compare(actual, expected, |a, b| a <= b),
        ConditionOperator::Contains => contains(actual, expected),
        ConditionOperator::NotContains => !contains(actual, expected),
        ConditionOperator::StartsWith => text(actual).starts_with(&text(expected)),
        ConditionOperator::EndsWith => text(actual).ends_with(&text(expected)),
        ConditionOperator::IsEmpty => is_empty(actual),
        ConditionOperator::IsNotEmpty => !is_empty(actual),
        ConditionOperator::Unknown => is_truthy(actual),
    }
}

/// Equality that tolerates the string/number/bool mixes form inputs produce.
fn loose_equals(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => {
            s.trim().parse::<f64>().ok() == n.as_f64()
        }
        (Value::Bool(b), Value::String(s)) | (Value::String(s), Value::Bool(b)) => {
            match s.to_ascii_lowercase().as_str() {
                "true" => *b,
                "false" => !*b,
                _ => false,
            }
        }
        _ => false,
    }
}

fn compare(actual: &Value, expected: &Value, op: impl Fn(f64, f64) -> bool) -> bool {
    match (as_number(actual), as_number(expected)) {
        (Some(a), Some(b)) => op(a, b),
        _ => false,
    }
}

fn contains(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::Array(items) => items.iter().any(|item| loose_equals(item, expected)),
        Value::Object(map) => expected.as_str().is_some_and(|key| map.contains_key(key)),
        Value::Null => false,
        other => text(other).contains(&text(expected)),
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cond(expression: &str, operator: ConditionOperator, value: Value) -> ConditionConfig {
        ConditionConfig {
            expression: expression.into(),
            operator,
            value,
        }
    }

    #[test]
    fn equals_fires_true_branch() {
        let outcome = run(&cond("x", ConditionOperator::Equals, json!(1)), &json!({ "x": 1 }));
        assert_eq!(outcome.active_handles, vec!["true"]);
        assert_eq!(outcome.output.unwrap()["result"], true);
    }

    #[test]
    fn exactly_one_branch_fires() {
        let outcome = run(&cond("x", ConditionOperator::Equals, json!(1)), &json!({ "x": 2 }));
        assert_eq!(outcome.active_handles, vec!["false"]);
    }

    #[test]
    fn dot_path_and_numeric_comparisons() {
        let input = json!({ "order": { "total": "120.5", "items": ["a", "b"] } });
        assert!(run(&cond("order.total", ConditionOperator::GreaterThan, json!(100)), &input).fires("true"));
        assert!(run(&cond("order.total", ConditionOperator::LessThanOrEqual, json!(120.5)), &input).fires("true"));
        assert!(run(&cond("order.items", ConditionOperator::Contains, json!("b")), &input).fires("true"));
        assert!(run(&cond("order.missing", ConditionOperator::IsEmpty, Value::Null), &input).fires("true"));
    }

    #[test]
    fn string_operators() {
        let name = json!("automation");
        assert!(evaluate(ConditionOperator::StartsWith, &name, &json!("auto")));
        assert!(evaluate(ConditionOperator::EndsWith, &name, &json!("tion")));
        assert!(evaluate(ConditionOperator::NotContains, &name, &json!("zzz")));
        assert!(evaluate(ConditionOperator::IsNotEmpty, &name, &Value::Null));
        assert!(evaluate(ConditionOperator::Equals, &json!("42"), &json!(42)));
        assert!(evaluate(ConditionOperator::NotEquals, &json!("a"), &json!("b")));
    }

    #[test]
    fn unknown_operator_uses_truthiness() {
        assert!(evaluate(ConditionOperator::Unknown, &json!("yes"), &Value::Null));
        assert!(!evaluate(ConditionOperator::Unknown, &json!(0), &Value::Null));
    }
}
