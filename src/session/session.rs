//! Request Session
//!
//! Drives one request's task graph to completion. Root tasks are dispatched on
//! `start`; every other task waits until it has received all the partial
//! results it expects, then replies (if its step posts) and forwards its result
//! to the steps consuming it.
//!
//! A session is owned by one loop and mutated only from it. There is no
//! internal locking.

use super::collector::{self, CollectorKind};
use super::dispatcher::Dispatcher;
use super::graph;
use super::types::*;
use crate::catalog::types::Route;
use crate::planner::planner::ERRORS;

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

pub struct Session {
    id: SessionId,
    dispatcher: Box<dyn Dispatcher>,
    tasks: Vec<Task>,
    inputs: BTreeMap<String, Vec<usize>>,
    roots: Vec<usize>,
    n_dones: usize,
    timeout_timer: Option<JoinHandle<()>>,
    timed_out: Arc<AtomicBool>,
    finished: bool,
}

impl Session {
    pub fn new(id: SessionId, dispatcher: Box<dyn Dispatcher>, graph: TaskGraph) -> Self {
        tracing::trace!(
            "session {} initialized with {} tasks",
            id.0,
            graph.tasks.len()
        );

        Self {
            id,
            dispatcher,
            tasks: graph.tasks,
            inputs: graph.inputs,
            roots: graph.roots,
            n_dones: 0,
            timeout_timer: None,
            timed_out: Arc::new(AtomicBool::new(false)),
            finished: false,
        }
    }

    /// Builds the task graph for the routes this process serves.
    pub fn from_plan(
        id: SessionId,
        steps: Vec<RoutedStep>,
        is_local: impl Fn(&Route) -> bool,
        dispatcher: Box<dyn Dispatcher>,
    ) -> Self {
        Self::new(id, dispatcher, graph::build_tasks(steps, is_local))
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn n_dones(&self) -> usize {
        self.n_dones
    }

    pub fn done(&self) -> bool {
        self.n_dones == self.tasks.len()
    }

    /// Whether any task collects results. Sessions without one only have side
    /// effects and can be finished right after `start`.
    pub fn need_result(&self) -> bool {
        self.tasks
            .iter()
            .any(|task| collector::is_collectable(&task.step.message))
    }

    pub fn state(&self) -> SessionState {
        if self.timed_out.load(Ordering::SeqCst) {
            SessionState::TimedOut
        } else if self.finished {
            SessionState::Finished
        } else {
            SessionState::Running
        }
    }

    pub fn start(&mut self) {
        if self.roots.is_empty() {
            tracing::trace!("session {} start: no task!", self.id.0);
        }

        for &index in &self.roots {
            let task = &mut self.tasks[index];
            let message = LocalMessage {
                id: self.id.clone(),
                route: task.route.clone(),
                step: task.step.message.clone(),
                descendants: task.step.descendants.clone(),
            };
            tracing::trace!(
                "session {} start: dispatching local message to {}",
                self.id.0,
                message.route
            );
            self.dispatcher.process_local_message(message);
            task.completed = true;
            self.n_dones += 1;
        }
    }

    /// Feeds one partial result for input `name`.
    ///
    /// A result for an input no task waits for is dropped.
    // TODO: buffer results that arrive before their task is registered.
    pub fn receive(&mut self, name: &str, value: Value) {
        let Some(indices) = self.inputs.get(name).cloned() else {
            tracing::trace!("session {} receive: no task waits for '{}'", self.id.0, name);
            return;
        };

        for index in indices {
            let task = &mut self.tasks[index];
            if task.completed {
                tracing::debug!(
                    "session {} receive: task at {} already complete, ignoring '{}'",
                    self.id.0,
                    task.route,
                    name
                );
                continue;
            }

            task.n_of_inputs += 1;
            collector::collect(task, name, value.clone());
            if task.n_of_inputs < task.n_of_expects {
                continue;
            }

            task.completed = true;
            let step = task.step.clone();
            let result = task.values.clone();
            self.finalize(&step, &result);
        }
    }

    fn finalize(&mut self, step: &ExecStep, result: &Map<String, Value>) {
        if step.message.post {
            let body = reply_body(step, result);
            tracing::debug!("session {} replying for '{}'", self.id.0, step.message.command);
            self.dispatcher.reply(body);
        }

        for (name, routes) in &step.descendants {
            let message = DescendantMessage {
                id: self.id.clone(),
                input: name.clone(),
                value: result.get(name).cloned().unwrap_or(Value::Null),
            };
            for route in routes {
                self.dispatcher.dispatch(message.clone(), route);
            }
        }

        self.n_dones += 1;
    }

    /// Arms a one-shot timer. When it fires the session is abandoned: a timeout
    /// is reported and `on_timeout` runs. Arming again replaces a pending timer.
    pub fn set_timeout<F>(&mut self, timeout: Duration, on_timeout: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Some(timer) = self.timeout_timer.take() {
            timer.abort();
        }

        let id = self.id.clone();
        let timed_out = self.timed_out.clone();
        self.timeout_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            timed_out.store(true, Ordering::SeqCst);
            report_timeout_error(&id, timeout);
            on_timeout();
        }));
    }

    /// Cancels a pending timeout.
    pub fn finish(&mut self) {
        if let Some(timer) = self.timeout_timer.take() {
            timer.abort();
        }
        self.finished = true;
        tracing::trace!("session {} finished ({} tasks done)", self.id.0, self.n_dones);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(timer) = self.timeout_timer.take() {
            timer.abort();
        }
    }
}

/// Accumulated errors win; a final gather replies with everything it gathered;
/// anything else replies with its `"result"` value.
fn reply_body(step: &ExecStep, result: &Map<String, Value>) -> Value {
    let has_errors = result.get(ERRORS).is_some_and(collector::is_present);
    let final_gather = CollectorKind::lookup(&step.message.command)
        .is_some_and(|kind| kind.is_final_gather());

    if has_errors || final_gather {
        Value::Object(result.clone())
    } else {
        result.get("result").cloned().unwrap_or(Value::Null)
    }
}

fn report_timeout_error(id: &SessionId, timeout: Duration) {
    tracing::warn!("session {} timed out after {:?}", id.0, timeout);
}
