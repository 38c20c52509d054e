use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// What a node is doing in the cluster.
///
/// `absorb-source` and `absorb-destination` mark the two sides of a live data
/// migration. Unknown role strings are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeRole {
    #[default]
    ServiceProvider,
    AbsorbSource,
    AbsorbDestination,
    Other(String),
}

impl NodeRole {
    pub fn as_str(&self) -> &str {
        match self {
            NodeRole::ServiceProvider => "service-provider",
            NodeRole::AbsorbSource => "absorb-source",
            NodeRole::AbsorbDestination => "absorb-destination",
            NodeRole::Other(other) => other,
        }
    }
}

impl From<String> for NodeRole {
    fn from(value: String) -> Self {
        match value.as_str() {
            "service-provider" => NodeRole::ServiceProvider,
            "absorb-source" => NodeRole::AbsorbSource,
            "absorb-destination" => NodeRole::AbsorbDestination,
            _ => NodeRole::Other(value),
        }
    }
}

impl From<&str> for NodeRole {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<NodeRole> for String {
    fn from(value: NodeRole) -> Self {
        match value {
            NodeRole::Other(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted state of one node. A node listed without `"live"` is not live.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeState {
    #[serde(default)]
    pub live: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<NodeRole>,
}

/// The cluster state file: `node name -> state`. Nodes not listed use defaults.
pub type ClusterState = BTreeMap<String, NodeState>;

/// Structural difference between two cluster states.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct StateDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<String>,
}

impl StateDiff {
    pub fn between(before: &ClusterState, after: &ClusterState) -> Self {
        let mut diff = StateDiff::default();

        for (name, state) in after {
            match before.get(name) {
                None => diff.added.push(name.clone()),
                Some(previous) if previous != state => diff.changed.push(name.clone()),
                Some(_) => {}
            }
        }
        for name in before.keys() {
            if !after.contains_key(name) {
                diff.removed.push(name.clone());
            }
        }

        diff
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Active,
    Inactive,
    Dead,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Active => "active",
            NodeStatus::Inactive => "inactive",
            NodeStatus::Dead => "dead",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatusEntry {
    pub status: NodeStatus,
}

/// Where a forwarded message goes. `to` is an engine address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub to: String,
}

impl Destination {
    pub fn new(to: impl Into<String>) -> Self {
        Self { to: to.into() }
    }
}
