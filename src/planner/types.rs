use crate::catalog::types::{Message, ReplicaStrategy, SliceStrategy};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The incoming request a plan is built for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub id: String,
    /// The command name, e.g. `"search"` or `"add"`.
    #[serde(rename = "type")]
    pub command: String,
    pub dataset: String,
    #[serde(default)]
    pub body: Value,
}

impl Request {
    pub fn new(command: impl Into<String>, dataset: impl Into<String>, body: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            command: command.into(),
            dataset: dataset.into(),
            body,
        }
    }
}

/// How one named output is reduced across shards.
#[derive(Debug, Clone, PartialEq)]
pub enum ReducerSpec {
    /// A reducer type name such as `"sum"`.
    Named(String),
    /// A reducer definition object carrying its own `"type"`.
    Definition(Map<String, Value>),
    /// A reducer plus fields merged into the gather step for this output.
    WithGather {
        reduce: Box<ReducerSpec>,
        gather: Map<String, Value>,
    },
}

impl ReducerSpec {
    /// Reads a spec from JSON: a string, a definition object, or
    /// `{"reduce": ..., "gather": {...}}`.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(name) => ReducerSpec::Named(name.clone()),
            Value::Object(object) => match object.get("gather").and_then(Value::as_object) {
                Some(gather) => ReducerSpec::WithGather {
                    reduce: Box::new(Self::from_value(
                        object.get("reduce").unwrap_or(&Value::Null),
                    )),
                    gather: gather.clone(),
                },
                None => ReducerSpec::Definition(object.clone()),
            },
            other => ReducerSpec::Named(other.to_string()),
        }
    }
}

impl From<&str> for ReducerSpec {
    fn from(name: &str) -> Self {
        ReducerSpec::Named(name.to_string())
    }
}

/// Options for the terminal scatter or broadcast step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessorOptions {
    pub body: Option<Value>,
    pub record: Option<Value>,
    pub replica: Option<ReplicaStrategy>,
    pub slice: Option<SliceStrategy>,
    /// Write requests post a completion reply.
    pub write: bool,
}

/// One step of a distribution plan.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanStep {
    Reduce(Message),
    Gather(Message),
    Processor(Message),
}

impl PlanStep {
    pub fn message(&self) -> &Message {
        match self {
            PlanStep::Reduce(message) | PlanStep::Gather(message) | PlanStep::Processor(message) => {
                message
            }
        }
    }

    pub fn into_message(self) -> Message {
        match self {
            PlanStep::Reduce(message) | PlanStep::Gather(message) | PlanStep::Processor(message) => {
                message
            }
        }
    }

    /// The reducer type for reduce steps, `"gather"` for gather steps and the
    /// delivery type for the processor.
    pub fn step_type(&self) -> &str {
        match self {
            PlanStep::Reduce(message) | PlanStep::Gather(message) => &message.command,
            PlanStep::Processor(message) => message.kind.as_str(),
        }
    }
}
