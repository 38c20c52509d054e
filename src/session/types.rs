use crate::catalog::types::{Message, Route};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Identifier of one request's session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// A plan step with its routes resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedStep {
    pub message: Message,
    pub routes: Vec<Route>,
}

/// A routed step as executed: how many inputs it waits for and where each of
/// its outputs is sent next.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecStep {
    pub message: Message,
    pub routes: Vec<Route>,
    pub n_of_expects: usize,
    /// `output name -> routes of the steps consuming it`
    pub descendants: BTreeMap<String, Vec<Route>>,
}

/// One execution unit of a session, bound to one local route of a step.
#[derive(Debug, Clone)]
pub struct Task {
    pub step: Arc<ExecStep>,
    pub route: Route,
    pub n_of_inputs: usize,
    pub n_of_expects: usize,
    /// Partial results accumulated so far, keyed by output name.
    pub values: Map<String, Value>,
    pub completed: bool,
}

impl Task {
    pub fn new(step: Arc<ExecStep>, route: Route) -> Self {
        let n_of_expects = step.n_of_expects;
        Self {
            step,
            route,
            n_of_inputs: 0,
            n_of_expects,
            values: Map::new(),
            completed: false,
        }
    }
}

/// Tasks of a session plus the index of which task waits for which input.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    pub tasks: Vec<Task>,
    /// `input name -> indices into tasks`
    pub inputs: BTreeMap<String, Vec<usize>>,
    /// Tasks that need no input and run as soon as the session starts.
    pub roots: Vec<usize>,
}

/// A root task handed to the local worker. The worker sends each named output
/// to the routes listed for it in `descendants`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalMessage {
    pub id: SessionId,
    pub route: Route,
    pub step: Message,
    pub descendants: BTreeMap<String, Vec<Route>>,
}

/// A finished task's output sent on to a consuming step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescendantMessage {
    pub id: SessionId,
    pub input: String,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Finished,
    TimedOut,
}
