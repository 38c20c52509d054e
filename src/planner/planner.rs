//! Distribution Planner
//!
//! Builds the ordered list of steps one request is executed as: reduce steps,
//! then gather steps, then exactly one scatter or broadcast step.
//!
//! Every planner reduces `"errors"` with `"sum"` so per-shard failures always
//! come back to the caller. The body key `"errors"` is therefore reserved.

use super::types::{PlanStep, ProcessorOptions, ReducerSpec, Request};
use crate::catalog::types::{Message, MessageType, ReplicaStrategy, SliceStrategy};
use crate::error::ConfigurationError;
use crate::session::collector;

use serde_json::{Map, Value, json};

pub const REDUCE_SUM: &str = "sum";
pub const GATHER: &str = "gather";
pub const ERRORS: &str = "errors";

/// `limit` for sum reducers: no truncation.
pub const DEFAULT_LIMIT: i64 = -1;

pub struct DistributedCommandPlanner {
    dataset: String,
    source: Request,
    outputs: Vec<String>,
    reducers: Vec<Message>,
    gatherers: Vec<Message>,
    processor: Option<Message>,
}

impl DistributedCommandPlanner {
    pub fn new(dataset: impl Into<String>, source: Request) -> Self {
        let mut planner = Self {
            dataset: dataset.into(),
            source,
            outputs: Vec::new(),
            reducers: Vec::new(),
            gatherers: Vec::new(),
            processor: None,
        };
        planner.reduce([(ERRORS, ReducerSpec::from(REDUCE_SUM))]);
        planner
    }

    /// Registers a reducer (and its gatherer) for each named output.
    pub fn reduce<I, K>(&mut self, params: I)
    where
        I: IntoIterator<Item = (K, ReducerSpec)>,
        K: Into<String>,
    {
        for (name, spec) in params {
            let name = name.into();
            let (reducer, gather) = match spec {
                ReducerSpec::WithGather { reduce, gather } => (*reduce, Some(gather)),
                other => (other, None),
            };

            self.reducers.push(reducer_message(&name, reducer));
            self.gatherers.push(gatherer_message(&name, gather));
            self.outputs.push(name);
        }
    }

    /// Sends the request to every slice; all replicas unless told otherwise.
    pub fn scatter(&mut self, options: ProcessorOptions) {
        let mut message = self.processor_message(MessageType::Scatter, &options);
        message.replica = options.replica.unwrap_or(ReplicaStrategy::All);
        message.record = options.record;
        self.processor = Some(message);
    }

    /// Sends the request to one copy of every slice, a random live replica by default.
    pub fn broadcast(&mut self, options: ProcessorOptions) {
        let mut message = self.processor_message(MessageType::Broadcast, &options);
        message.replica = options.replica.unwrap_or(ReplicaStrategy::Random);
        self.processor = Some(message);
    }

    pub fn plan(&self) -> Result<Vec<PlanStep>, ConfigurationError> {
        let mut processor = self
            .processor
            .clone()
            .ok_or(ConfigurationError::NoProcessor)?;
        processor.outputs = self.outputs.clone();

        if let Some(unknown) = self
            .reducers
            .iter()
            .find(|reducer| collector::reducer(&reducer.command).is_none())
        {
            return Err(ConfigurationError::UnknownReducer(unknown.command.clone()));
        }

        let mut steps: Vec<PlanStep> = unify(&self.reducers, true)
            .into_iter()
            .map(PlanStep::Reduce)
            .collect();
        steps.extend(unify(&self.gatherers, false).into_iter().map(PlanStep::Gather));
        steps.push(PlanStep::Processor(processor));

        tracing::debug!("distribution plan for {}: {:?}", self.source.command, steps);
        Ok(steps)
    }

    fn processor_message(&self, kind: MessageType, options: &ProcessorOptions) -> Message {
        let mut message = Message::new(kind, self.source.command.clone());
        message.dataset = Some(self.dataset.clone());
        message.body = options
            .body
            .clone()
            .unwrap_or_else(|| self.source.body.clone());
        message.slice = options.slice.clone().unwrap_or(SliceStrategy::All);
        message.post = options.write;
        message
    }
}

/// Merges steps of the same type, keeping first-seen order.
fn unify(steps: &[Message], merge_outputs: bool) -> Vec<Message> {
    let mut unified: Vec<Message> = Vec::new();

    for step in steps {
        match unified.iter_mut().find(|u| u.command == step.command) {
            Some(existing) => {
                if let (Value::Object(into), Value::Object(from)) = (&mut existing.body, &step.body) {
                    for (key, value) in from {
                        into.insert(key.clone(), value.clone());
                    }
                }
                existing.inputs.extend(step.inputs.iter().cloned());
                if merge_outputs {
                    existing.outputs.extend(step.outputs.iter().cloned());
                }
            }
            None => unified.push(step.clone()),
        }
    }

    unified
}

fn reducer_message(name: &str, spec: ReducerSpec) -> Message {
    let definition = reducer_definition(spec);
    let reducer_type = definition
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or(REDUCE_SUM)
        .to_string();

    let mut message = Message::new(MessageType::Reduce, reducer_type);
    message.body = json!({ name: { output_name(name): Value::Object(definition) } });
    message.inputs = vec![name.to_string()];
    message.outputs = vec![output_name(name)];
    message
}

fn reducer_definition(spec: ReducerSpec) -> Map<String, Value> {
    match spec {
        ReducerSpec::Named(reducer_type) => {
            let mut definition = Map::new();
            if reducer_type == REDUCE_SUM {
                definition.insert("limit".to_string(), json!(DEFAULT_LIMIT));
            }
            definition.insert("type".to_string(), Value::String(reducer_type));
            definition
        }
        ReducerSpec::Definition(definition) => definition,
        ReducerSpec::WithGather { reduce, .. } => reducer_definition(*reduce),
    }
}

fn gatherer_message(name: &str, gather: Option<Map<String, Value>>) -> Message {
    let mut gatherer = Map::new();
    gatherer.insert("output".to_string(), Value::String(name.to_string()));
    gatherer.extend(gather.unwrap_or_default());

    let mut message = Message::new(MessageType::Gather, GATHER);
    message.body = json!({ output_name(name): Value::Object(gatherer) });
    message.inputs = vec![output_name(name)];
    message.post = true;
    message
}

pub fn output_name(name: &str) -> String {
    format!("{}_reduced", name)
}
