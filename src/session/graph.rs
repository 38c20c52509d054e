//! Step Graph
//!
//! Resolves plan steps into routes and wires them into tasks: each output is
//! connected to the steps that consume it, and each step learns how many
//! partial results it must wait for.

use super::types::{ExecStep, RoutedStep, Task, TaskGraph};
use crate::catalog::dataset::Catalog;
use crate::catalog::types::{LiveNodes, Route};
use crate::error::ConfigurationError;
use crate::planner::types::PlanStep;

use std::collections::BTreeMap;
use std::sync::Arc;

/// Scatter and broadcast steps go to their dataset's replicas; reduce and gather
/// steps run at `local`.
pub fn route_steps(
    steps: Vec<PlanStep>,
    catalog: &Catalog,
    live_nodes: &LiveNodes,
    local: &Route,
) -> Result<Vec<RoutedStep>, ConfigurationError> {
    steps
        .into_iter()
        .map(|step| -> Result<RoutedStep, ConfigurationError> {
            let message = step.into_message();
            let routes = if message.kind.is_distributed() {
                let name = message.dataset.as_deref().unwrap_or_default();
                catalog.dataset(name)?.compute_routes(&message, live_nodes)
            } else {
                vec![local.clone()]
            };
            Ok(RoutedStep { message, routes })
        })
        .collect()
}

/// Builds the tasks this process runs: one per step route accepted by `is_local`.
pub fn build_tasks(steps: Vec<RoutedStep>, is_local: impl Fn(&Route) -> bool) -> TaskGraph {
    let exec_steps: Vec<Arc<ExecStep>> = steps
        .iter()
        .map(|step| {
            let mut descendants = BTreeMap::new();
            for output in &step.message.outputs {
                let consumers: Vec<Route> = steps
                    .iter()
                    .filter(|other| other.message.inputs.contains(output))
                    .flat_map(|other| other.routes.iter().cloned())
                    .collect();
                descendants.insert(output.clone(), consumers);
            }

            let n_of_expects = step
                .message
                .inputs
                .iter()
                .map(|input| {
                    steps
                        .iter()
                        .filter(|other| other.message.outputs.contains(input))
                        .map(|other| other.routes.len())
                        .sum::<usize>()
                })
                .sum();

            Arc::new(ExecStep {
                message: step.message.clone(),
                routes: step.routes.clone(),
                n_of_expects,
                descendants,
            })
        })
        .collect();

    let mut graph = TaskGraph::default();
    for step in exec_steps {
        for route in step.routes.iter().filter(|route| is_local(route)) {
            let index = graph.tasks.len();
            graph.tasks.push(Task::new(step.clone(), route.clone()));

            if step.message.inputs.is_empty() {
                graph.roots.push(index);
            } else {
                for input in &step.message.inputs {
                    graph.inputs.entry(input.clone()).or_default().push(index);
                }
            }
        }
    }

    tracing::trace!(
        "built {} tasks ({} roots, {} inputs)",
        graph.tasks.len(),
        graph.roots.len(),
        graph.inputs.len()
    );
    graph
}

/// Every route any step of the plan reaches, sorted and unique.
pub fn destinations(steps: &[RoutedStep]) -> Vec<Route> {
    let mut routes: Vec<Route> = steps
        .iter()
        .flat_map(|step| step.routes.iter().cloned())
        .collect();
    routes.sort();
    routes.dedup();
    routes
}
