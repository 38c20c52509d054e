use super::forwarder::Forwarder;
use super::types::{Destination, NodeRole, NodeState, NodeStatus};

use serde_json::Value;
use std::sync::Arc;

static DEFAULT_ROLE: NodeRole = NodeRole::ServiceProvider;

/// Nodes missing from the state file are live.
pub fn is_live(state: Option<&NodeState>) -> bool {
    state.is_none_or(|state| state.live)
}

pub fn role_of(state: Option<&NodeState>) -> &NodeRole {
    state
        .and_then(|state| state.role.as_ref())
        .unwrap_or(&DEFAULT_ROLE)
}

/// A live node shares its role with the sender.
pub fn is_forwardable(state: Option<&NodeState>, sender_role: &NodeRole) -> bool {
    is_live(state) && role_of(state) == sender_role
}

/// A node accepts writes coming from a sender of `sender_role`. Service
/// providers write everywhere; each side of a migration only writes to its own
/// side.
pub fn is_writable(state: Option<&NodeState>, sender_role: &NodeRole) -> bool {
    let role = role_of(state);
    match sender_role {
        NodeRole::ServiceProvider => true,
        NodeRole::AbsorbSource => *role == NodeRole::AbsorbSource,
        NodeRole::AbsorbDestination => *role == NodeRole::AbsorbDestination,
        NodeRole::Other(_) => false,
    }
}

pub fn status_of(state: Option<&NodeState>, sender_role: &NodeRole) -> NodeStatus {
    if !is_live(state) {
        NodeStatus::Dead
    } else if is_forwardable(state, sender_role) {
        NodeStatus::Active
    } else {
        NodeStatus::Inactive
    }
}

/// One engine node as seen from this process.
pub struct EngineNode {
    name: String,
    state: Option<NodeState>,
    sender_role: NodeRole,
    forwarder: Arc<dyn Forwarder>,
}

impl EngineNode {
    pub fn new(
        name: impl Into<String>,
        state: Option<NodeState>,
        sender_role: NodeRole,
        forwarder: Arc<dyn Forwarder>,
    ) -> Self {
        Self {
            name: name.into(),
            state,
            sender_role,
            forwarder,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> Option<&NodeState> {
        self.state.as_ref()
    }

    pub fn live(&self) -> bool {
        is_live(self.state())
    }

    pub fn dead(&self) -> bool {
        !self.live()
    }

    pub fn role(&self) -> &NodeRole {
        role_of(self.state())
    }

    pub fn forwardable(&self) -> bool {
        is_forwardable(self.state(), &self.sender_role)
    }

    pub fn writable(&self) -> bool {
        is_writable(self.state(), &self.sender_role)
    }

    pub fn readable(&self) -> bool {
        self.forwardable()
    }

    pub fn status(&self) -> NodeStatus {
        status_of(self.state(), &self.sender_role)
    }

    pub fn start(&self) {
        tracing::trace!("{}: start", self.name);
        self.forwarder.start();
    }

    pub fn shutdown(&self) {
        tracing::trace!("{}: shutdown", self.name);
        self.forwarder.shutdown();
    }

    /// Called when the cluster state changed.
    pub fn on_change(&self) {
        tracing::trace!("{}: on_change", self.name);
        self.forwarder.resume();
    }

    pub fn forward(&self, message: &Value, destination: &Destination) {
        tracing::trace!("{}: forward {} -> {}", self.name, self.sender_role, destination.to);
        self.forwarder.forward(message, destination);
    }

    /// Hands a message to this node as is.
    pub fn bounce(&self, message: &Value) {
        self.forwarder.forward(message, &Destination::new(self.name.clone()));
    }
}
