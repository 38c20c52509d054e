//! Collectors
//!
//! Maps a step's command to the way its inputs are folded into the task's
//! accumulated values. Reduce collectors merge partials with a reducer chosen by
//! the definition in the step body; gather collectors place each input under its
//! final output name.

use super::types::Task;
use crate::catalog::types::Message;

use serde_json::{Map, Number, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorKind {
    Sum,
    And,
    Or,
    Gather,
    /// Final gather of a search. Its reply is the whole accumulated result.
    SearchGather,
}

const COLLECTORS: &[(&str, CollectorKind)] = &[
    ("sum", CollectorKind::Sum),
    ("and", CollectorKind::And),
    ("or", CollectorKind::Or),
    ("gather", CollectorKind::Gather),
    ("search_gather", CollectorKind::SearchGather),
];

/// A pure merge of an accumulated value with a new partial.
pub type MergeFn = fn(Value, Value, Option<usize>) -> Value;

const REDUCERS: &[(&str, MergeFn)] = &[("sum", sum), ("and", and), ("or", or)];

impl CollectorKind {
    pub fn lookup(command: &str) -> Option<Self> {
        COLLECTORS
            .iter()
            .find(|(name, _)| *name == command)
            .map(|(_, kind)| *kind)
    }

    pub fn is_gather(&self) -> bool {
        matches!(self, CollectorKind::Gather | CollectorKind::SearchGather)
    }

    pub fn is_final_gather(&self) -> bool {
        matches!(self, CollectorKind::SearchGather)
    }
}

pub fn reducer(reducer_type: &str) -> Option<MergeFn> {
    REDUCERS
        .iter()
        .find(|(name, _)| *name == reducer_type)
        .map(|(_, merge)| *merge)
}

pub fn is_collectable(step: &Message) -> bool {
    CollectorKind::lookup(&step.command).is_some()
}

/// Folds `value`, received for input `name`, into `task.values`.
///
/// Returns false when the task's step has no collector.
pub fn collect(task: &mut Task, name: &str, value: Value) -> bool {
    let Some(kind) = CollectorKind::lookup(&task.step.message.command) else {
        tracing::warn!(
            "No collector for step command '{}'",
            task.step.message.command
        );
        return false;
    };

    if kind.is_gather() {
        gather_into(task, name, value);
    } else {
        reduce_into(task, name, value);
    }
    true
}

fn reduce_into(task: &mut Task, name: &str, value: Value) {
    let Some(definitions) = task
        .step
        .message
        .body
        .get(name)
        .and_then(Value::as_object)
        .cloned()
    else {
        tracing::debug!("No reducer definition for input '{}'", name);
        return;
    };

    for (output, definition) in definitions {
        let reducer_type = definition
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or(task.step.message.command.as_str());
        let Some(merge) = reducer(reducer_type) else {
            tracing::warn!("Unknown reducer type '{}' for '{}'", reducer_type, output);
            continue;
        };
        let limit = definition
            .get("limit")
            .and_then(Value::as_i64)
            .and_then(|limit| usize::try_from(limit).ok());

        let accumulated = task.values.remove(&output).unwrap_or(Value::Null);
        task.values
            .insert(output, merge(accumulated, value.clone(), limit));
    }
}

fn gather_into(task: &mut Task, name: &str, value: Value) {
    let output = task
        .step
        .message
        .body
        .get(name)
        .and_then(|definition| definition.get("output"))
        .and_then(Value::as_str)
        .unwrap_or(name)
        .to_string();
    task.values.insert(output, value);
}

/// Adds numbers, concatenates arrays (truncated to `limit`) and strings, and
/// merges objects key by key. `null` is the identity.
pub fn sum(left: Value, right: Value, limit: Option<usize>) -> Value {
    match (left, right) {
        (Value::Null, right) => truncate(right, limit),
        (left, Value::Null) => left,
        (Value::Number(a), Value::Number(b)) => add_numbers(&a, &b),
        (Value::Array(mut a), Value::Array(b)) => {
            a.extend(b);
            truncate(Value::Array(a), limit)
        }
        (Value::String(a), Value::String(b)) => Value::String(a + &b),
        (Value::Object(a), Value::Object(b)) => Value::Object(merge_objects(a, b, limit)),
        (_, right) => right,
    }
}

pub fn and(left: Value, right: Value, _limit: Option<usize>) -> Value {
    match (left, right) {
        (Value::Null, right) => right,
        (left, Value::Null) => left,
        (Value::Bool(a), Value::Bool(b)) => Value::Bool(a && b),
        (_, right) => right,
    }
}

pub fn or(left: Value, right: Value, _limit: Option<usize>) -> Value {
    match (left, right) {
        (Value::Null, right) => right,
        (left, Value::Null) => left,
        (Value::Bool(a), Value::Bool(b)) => Value::Bool(a || b),
        (_, right) => right,
    }
}

fn add_numbers(a: &Number, b: &Number) -> Value {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64())
        && let Some(total) = x.checked_add(y)
    {
        return Value::from(total);
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64())
        && let Some(total) = x.checked_add(y)
    {
        return Value::from(total);
    }
    let total = a.as_f64().unwrap_or(0.0) + b.as_f64().unwrap_or(0.0);
    Number::from_f64(total).map(Value::Number).unwrap_or(Value::Null)
}

fn merge_objects(
    mut left: Map<String, Value>,
    right: Map<String, Value>,
    limit: Option<usize>,
) -> Map<String, Value> {
    for (key, value) in right {
        let accumulated = left.remove(&key).unwrap_or(Value::Null);
        left.insert(key, sum(accumulated, value, limit));
    }
    left
}

fn truncate(value: Value, limit: Option<usize>) -> Value {
    match (value, limit) {
        (Value::Array(mut items), Some(limit)) => {
            items.truncate(limit);
            Value::Array(items)
        }
        (value, _) => value,
    }
}

/// Whether an accumulated value carries anything.
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}
