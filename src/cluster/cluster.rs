//! Cluster View
//!
//! Combines the catalog's node list with the persisted cluster state file.
//! Node tables and the derived node lists are rebuilt only when the state
//! actually changes, while each node's forwarder lives for the whole process.

use super::engine_node::{self, EngineNode};
use super::forwarder::{Forwarder, ForwarderFactory};
use super::types::*;
use crate::catalog::dataset::Catalog;
use crate::catalog::types::{Address, LiveNodes};
use crate::error::RoutingError;

use dashmap::DashMap;
use rand::seq::SliceRandom;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// Invoked with the difference after every accepted state change.
pub type OnChange = Box<dyn Fn(&StateDiff) + Send + Sync>;

pub struct ClusterParams {
    pub catalog: Catalog,
    pub state_path: PathBuf,
    pub sender_role: NodeRole,
    pub forwarder_factory: ForwarderFactory,
}

pub struct Cluster {
    catalog: Catalog,
    state_path: PathBuf,
    sender_role: NodeRole,
    state: ClusterState,
    engine_nodes: Option<Vec<EngineNode>>,
    forwarders: DashMap<String, Arc<dyn Forwarder>>,
    forwarder_factory: ForwarderFactory,
    on_change: Option<OnChange>,
    engine_node_names: OnceLock<Vec<String>>,
    readable_nodes: OnceLock<Vec<String>>,
    writable_nodes: OnceLock<Vec<String>>,
    live_nodes: OnceLock<LiveNodes>,
}

impl Cluster {
    pub fn new(params: ClusterParams) -> Self {
        let state = load_state_file(&params.state_path);
        tracing::debug!(
            "Cluster initialized with {} nodes, {} in state file",
            params.catalog.all_nodes().len(),
            state.len()
        );

        Self {
            catalog: params.catalog,
            state_path: params.state_path,
            sender_role: params.sender_role,
            state,
            engine_nodes: None,
            forwarders: DashMap::new(),
            forwarder_factory: params.forwarder_factory,
            on_change: None,
            engine_node_names: OnceLock::new(),
            readable_nodes: OnceLock::new(),
            writable_nodes: OnceLock::new(),
            live_nodes: OnceLock::new(),
        }
    }

    pub fn on_change(&mut self, callback: OnChange) {
        self.on_change = Some(callback);
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn state(&self) -> &ClusterState {
        &self.state
    }

    pub fn sender_role(&self) -> &NodeRole {
        &self.sender_role
    }

    pub fn engine_nodes(&self) -> Option<&[EngineNode]> {
        self.engine_nodes.as_deref()
    }

    pub fn started(&self) -> bool {
        self.engine_nodes.is_some()
    }

    pub fn start(&mut self) {
        if self.engine_nodes.is_none() {
            self.engine_nodes = Some(self.create_engine_nodes());
        }
        if let Some(nodes) = &self.engine_nodes {
            for node in nodes {
                node.start();
            }
            tracing::info!("Cluster started with {} engine nodes", nodes.len());
        }
    }

    pub fn shutdown(&mut self) {
        if let Some(nodes) = &self.engine_nodes {
            for node in nodes {
                node.shutdown();
            }
        }
        tracing::info!("Cluster shut down");
    }

    /// Re-reads the state file. Nothing happens unless its content changed.
    pub fn reload(&mut self) {
        let new_state = load_state_file(&self.state_path);
        if new_state == self.state {
            tracing::info!("Cluster state not changed");
            return;
        }

        let diff = StateDiff::between(&self.state, &new_state);
        tracing::info!(
            "Cluster state changed: added {:?}, removed {:?}, changed {:?}",
            diff.added,
            diff.removed,
            diff.changed
        );

        self.state = new_state;
        self.clear_cache();

        let nodes = self.create_engine_nodes();
        for node in &nodes {
            node.on_change();
        }
        self.engine_nodes = Some(nodes);

        if let Some(callback) = &self.on_change {
            callback(&diff);
        }
    }

    /// Sends `message` to the node owning `destination.to`.
    pub fn forward(&self, message: &Value, destination: &Destination) -> Result<(), RoutingError> {
        let receiver = Address::parse(&destination.to)
            .map_err(|_| RoutingError::UnknownTarget(destination.to.clone()))?
            .node();
        let nodes = self
            .engine_nodes
            .as_ref()
            .ok_or(RoutingError::NotStartedYet)?;

        match nodes.iter().find(|node| node.name() == receiver) {
            Some(node) => {
                node.forward(message, destination);
                Ok(())
            }
            None => Err(RoutingError::UnknownTarget(destination.to.clone())),
        }
    }

    /// Hands `message` to a random live node of the role named by its
    /// `targetRole`. Having no such node is logged, not returned.
    pub fn bounce(&self, message: &Value) -> Result<(), RoutingError> {
        let role = message
            .get("targetRole")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_lowercase();
        tracing::info!("bounce: trying to bounce message to a node with the role {}", role);

        let nodes = self
            .engine_nodes
            .as_ref()
            .ok_or(RoutingError::NotStartedYet)?;
        let role = NodeRole::from(role);

        let acceptable: Vec<&EngineNode> = nodes
            .iter()
            .filter(|node| node.live() && *node.role() == role)
            .collect();

        match acceptable.choose(&mut rand::thread_rng()) {
            Some(node) => node.bounce(message),
            None => tracing::error!("No acceptable receiver for role {}", role),
        }
        Ok(())
    }

    pub fn engine_node_names(&self) -> &[String] {
        self.engine_node_names
            .get_or_init(|| self.catalog.all_nodes().to_vec())
    }

    pub fn readable_nodes(&self) -> &[String] {
        self.readable_nodes.get_or_init(|| {
            self.select_names(|state| engine_node::is_forwardable(state, &self.sender_role))
        })
    }

    pub fn writable_nodes(&self) -> &[String] {
        self.writable_nodes.get_or_init(|| {
            self.select_names(|state| engine_node::is_writable(state, &self.sender_role))
        })
    }

    pub fn live_nodes(&self) -> &LiveNodes {
        self.live_nodes.get_or_init(|| {
            self.select_names(engine_node::is_live)
                .into_iter()
                .collect()
        })
    }

    pub fn engine_nodes_status(&self) -> BTreeMap<String, NodeStatusEntry> {
        self.engine_node_names()
            .iter()
            .map(|name| {
                let status = engine_node::status_of(self.state.get(name), &self.sender_role);
                (name.clone(), NodeStatusEntry { status })
            })
            .collect()
    }

    fn select_names(&self, predicate: impl Fn(Option<&NodeState>) -> bool) -> Vec<String> {
        self.engine_node_names()
            .iter()
            .filter(|name| predicate(self.state.get(name.as_str())))
            .cloned()
            .collect()
    }

    fn forwarder_for(&self, name: &str) -> Arc<dyn Forwarder> {
        self.forwarders
            .entry(name.to_string())
            .or_insert_with(|| (self.forwarder_factory)(name))
            .value()
            .clone()
    }

    fn create_engine_nodes(&self) -> Vec<EngineNode> {
        self.engine_node_names()
            .iter()
            .map(|name| {
                EngineNode::new(
                    name.clone(),
                    self.state.get(name).cloned(),
                    self.sender_role.clone(),
                    self.forwarder_for(name),
                )
            })
            .collect()
    }

    fn clear_cache(&mut self) {
        if let Some(nodes) = self.engine_nodes.take() {
            for node in &nodes {
                node.shutdown();
            }
        }
        self.engine_node_names = OnceLock::new();
        self.readable_nodes = OnceLock::new();
        self.writable_nodes = OnceLock::new();
        self.live_nodes = OnceLock::new();
    }
}

/// Reads the cluster state file. A file that cannot be read or parsed yields
/// an empty state.
pub fn load_state_file(path: &Path) -> ClusterState {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!("Cluster state file {} not readable: {}", path.display(), e);
            return ClusterState::default();
        }
    };
    if content.trim().is_empty() {
        return ClusterState::default();
    }

    match serde_json::from_str(&content) {
        Ok(state) => state,
        Err(e) => {
            tracing::warn!("Invalid cluster state file {}: {}", path.display(), e);
            ClusterState::default()
        }
    }
}
