//! Replica Sets
//!
//! An ordered list of volumes holding the same data. Routing picks replicas by
//! strategy and unions the routes of the ones picked.

use super::types::{LiveNodes, Message, ReplicaStrategy, Route};
use super::volume::Volume;
use crate::error::ConfigurationError;

use rand::seq::SliceRandom;
use serde_json::Value;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone)]
pub struct ReplicasVolume {
    volumes: Vec<Volume>,
    /// Union of every node behind every replica, computed once on construction.
    all_nodes: Vec<String>,
}

impl ReplicasVolume {
    pub fn new(volumes: Vec<Volume>) -> Result<Self, ConfigurationError> {
        if volumes.is_empty() {
            return Err(ConfigurationError::EmptyReplicas);
        }

        let mut all_nodes: Vec<String> = volumes.iter().flat_map(Volume::all_nodes).collect();
        all_nodes.sort();
        all_nodes.dedup();

        Ok(Self { volumes, all_nodes })
    }

    /// Accepts either a bare list of volumes or `{"replicas": [...]}`.
    pub fn from_raw(raw: &Value) -> Result<Self, ConfigurationError> {
        let list = match raw {
            Value::Array(list) => list,
            Value::Object(object) => object
                .get("replicas")
                .and_then(Value::as_array)
                .ok_or_else(|| ConfigurationError::InvalidVolume(raw.to_string()))?,
            _ => return Err(ConfigurationError::InvalidVolume(raw.to_string())),
        };

        let volumes = list
            .iter()
            .map(Volume::from_raw)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(volumes)
    }

    pub fn volumes(&self) -> &[Volume] {
        &self.volumes
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    /// Chooses replicas for delivery.
    ///
    /// `Top` and `Random` only consider fully live replicas. `All` returns every
    /// replica whatever its liveness, and so does any unrecognized strategy.
    pub fn select(&self, strategy: &ReplicaStrategy, live_nodes: &LiveNodes) -> Vec<&Volume> {
        match strategy {
            ReplicaStrategy::Top => self.live_volumes(live_nodes).into_iter().take(1).collect(),
            ReplicaStrategy::Random => self
                .live_volumes(live_nodes)
                .choose(&mut rand::thread_rng())
                .copied()
                .into_iter()
                .collect(),
            ReplicaStrategy::All | ReplicaStrategy::Other(_) => self.volumes.iter().collect(),
        }
    }

    /// Replicas whose whole node set is live. One dead node disqualifies the replica.
    pub fn live_volumes(&self, live_nodes: &LiveNodes) -> Vec<&Volume> {
        self.volumes
            .iter()
            .filter(|volume| {
                volume
                    .all_nodes()
                    .iter()
                    .all(|node| live_nodes.contains(node))
            })
            .collect()
    }

    pub fn compute_routes(&self, message: &Message, live_nodes: &LiveNodes) -> Vec<Route> {
        if !message.kind.is_distributed() {
            return Vec::new();
        }

        let mut routes: Vec<Route> = self
            .select(&message.replica, live_nodes)
            .into_iter()
            .flat_map(|volume| volume.compute_routes(message, live_nodes))
            .collect();
        routes.sort();
        routes.dedup();
        routes
    }

    pub fn all_nodes(&self) -> &[String] {
        &self.all_nodes
    }

    pub fn is_sliced(&self) -> bool {
        self.volumes.iter().any(Volume::is_sliced)
    }
}

impl PartialEq for ReplicasVolume {
    fn eq(&self, other: &Self) -> bool {
        self.volumes == other.volumes
    }
}

impl Eq for ReplicasVolume {}

impl Hash for ReplicasVolume {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.volumes.hash(state);
    }
}
