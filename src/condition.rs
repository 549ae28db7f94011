//! Condition strings of `if`/`elif` headers.
//!
//! Evaluation never fails. An operand that does not name a variable is
//! compared as its own text, so `mood == happy` works without quotes.
//!
//! `and`/`or` are not parsed with precedence. The text is split on ` and `
//! and every segment must hold (a segment that itself contains ` or ` holds
//! when any of its pieces does); then the whole text is split on ` or `
//! across all segments and at least one piece must hold. For
//! `a and b or c` this yields `a and (b or c)`.

use crate::types::{parse_number, Value};
use std::cmp::Ordering;
use tracing::trace;

/// Longer operators first so `>=` is not split as `>`.
const COMPARISON_OPERATORS: [&str; 6] = ["==", "!=", ">=", "<=", ">", "<"];

pub fn evaluate(condition: &str, lookup: &dyn Fn(&str) -> Option<Value>) -> bool {
    let condition = condition.trim();

    if condition.eq_ignore_ascii_case("true") {
        return true;
    }
    if condition.eq_ignore_ascii_case("false") {
        return false;
    }

    if let Some(rest) = condition.strip_prefix("not ") {
        return !evaluate(rest.trim(), lookup);
    }

    if condition.contains(" and ") || condition.contains(" or ") {
        return evaluate_logic(condition, lookup);
    }

    if let Some((op, idx)) = find_operator(condition) {
        return evaluate_comparison(condition, op, idx, lookup);
    }

    let result = lookup(condition).map(|v| !v.is_false()).unwrap_or(false);
    trace!(condition, result, "variable truthiness");
    result
}

fn evaluate_logic(condition: &str, lookup: &dyn Fn(&str) -> Option<Value>) -> bool {
    let and_parts: Vec<&str> = condition.split(" and ").collect();

    if !and_parts.iter().all(|part| any_piece(part, lookup)) {
        return false;
    }

    and_parts
        .iter()
        .flat_map(|part| part.split(" or "))
        .any(|piece| evaluate(piece.trim(), lookup))
}

fn any_piece(part: &str, lookup: &dyn Fn(&str) -> Option<Value>) -> bool {
    part.split(" or ").any(|piece| evaluate(piece.trim(), lookup))
}

fn find_operator(condition: &str) -> Option<(&'static str, usize)> {
    COMPARISON_OPERATORS
        .iter()
        .find_map(|op| condition.find(op).map(|idx| (*op, idx)))
}

fn evaluate_comparison(
    condition: &str,
    op: &str,
    idx: usize,
    lookup: &dyn Fn(&str) -> Option<Value>,
) -> bool {
    let left = resolve_operand(&condition[..idx], lookup);
    let right = resolve_operand(&condition[idx + op.len()..], lookup);

    let ordering = match (parse_number(&left), parse_number(&right)) {
        (Some(l), Some(r)) => l.partial_cmp(&r),
        _ => Some(left.to_lowercase().cmp(&right.to_lowercase())),
    };

    let result = ordering.map(|o| satisfies(o, op)).unwrap_or(false);
    trace!(%left, op, %right, result, "comparison");
    result
}

/// Variable value when the operand names one, otherwise its literal text.
fn resolve_operand(raw: &str, lookup: &dyn Fn(&str) -> Option<Value>) -> String {
    let text = raw.trim().trim_matches(|c| c == '"' || c == '\'');
    match lookup(text) {
        Some(value) => value.to_string(),
        None => text.to_string(),
    }
}

fn satisfies(ordering: Ordering, op: &str) -> bool {
    match op {
        "==" => ordering == Ordering::Equal,
        "!=" => ordering != Ordering::Equal,
        ">" => ordering == Ordering::Greater,
        "<" => ordering == Ordering::Less,
        ">=" => ordering != Ordering::Less,
        "<=" => ordering != Ordering::Greater,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::hashmap;
    use std::collections::HashMap;

    fn eval_with(condition: &str, vars: &HashMap<&str, Value>) -> bool {
        evaluate(condition, &|name| vars.get(name).cloned())
    }

    #[test]
    fn test_literals() {
        let vars = HashMap::new();
        assert!(eval_with("True", &vars));
        assert!(eval_with(" true ", &vars));
        assert!(!eval_with("FALSE", &vars));
    }

    #[test]
    fn test_score_and_not_failed() {
        let mut vars = hashmap! {
            "score" => Value::Number(10.0),
            "failed" => Value::Bool(false),
        };
        assert!(eval_with("score >= 10 and not failed", &vars));

        vars.insert("score", Value::Number(9.0));
        assert!(!eval_with("score >= 10 and not failed", &vars));
    }

    #[test]
    fn test_not_negates_remainder() {
        let vars = hashmap! { "failed" => Value::Bool(true) };
        assert!(!eval_with("not failed", &vars));
        assert!(eval_with("not missing", &vars));
    }

    #[test]
    fn test_or_alone() {
        let vars = hashmap! { "b" => Value::Bool(true) };
        assert!(eval_with("a or b", &vars));
        assert!(!eval_with("a or c", &vars));
    }

    #[test]
    fn test_and_or_without_precedence() {
        // Python would read (a and b) or c, which is true here.
        let vars = hashmap! {
            "a" => Value::Bool(false),
            "b" => Value::Bool(false),
            "c" => Value::Bool(true),
        };
        assert!(!eval_with("a and b or c", &vars));

        let vars = hashmap! {
            "a" => Value::Bool(true),
            "b" => Value::Bool(false),
            "c" => Value::Bool(true),
        };
        assert!(eval_with("a and b or c", &vars));
    }

    #[test]
    fn test_string_comparison_is_case_insensitive() {
        let vars = hashmap! { "mood" => Value::Str("Happy".into()) };
        assert!(eval_with("mood == \"happy\"", &vars));
        assert!(eval_with("mood == happy", &vars));
        assert!(eval_with("mood != 'sad'", &vars));
    }

    #[test]
    fn test_numeric_comparison_beats_string_order() {
        let vars = hashmap! { "score" => Value::Number(9.0) };
        // "9" > "10" as strings, but not as numbers.
        assert!(eval_with("score < 10", &vars));
        assert!(!eval_with("score > 10", &vars));
        assert!(eval_with("score <= 9", &vars));
    }

    #[test]
    fn test_unresolved_operands_compare_as_text() {
        let vars = HashMap::new();
        assert!(eval_with("apple < banana", &vars));
        assert!(eval_with("x == x", &vars));
        assert!(!eval_with("x == y", &vars));
    }

    #[test]
    fn test_bare_variable_truthiness() {
        let vars = hashmap! {
            "met" => Value::Str("yes".into()),
            "zero" => Value::Number(0.0),
            "off" => Value::Bool(false),
        };
        assert!(eval_with("met", &vars));
        assert!(eval_with("zero", &vars));
        assert!(!eval_with("off", &vars));
        assert!(!eval_with("undefined", &vars));
    }

    #[test]
    fn test_single_equals_is_not_an_operator() {
        let vars = hashmap! { "a" => Value::Bool(true) };
        assert!(!eval_with("a = b", &vars));
    }
}
