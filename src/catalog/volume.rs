//! Volume Variants
//!
//! A `Volume` is anything a message can be routed to. The set of shapes is
//! closed: a single engine endpoint, a replica set, or a collection of slices.

use super::replicas::ReplicasVolume;
use super::slice::Slice;
use super::types::{Address, LiveNodes, Message, MessageType, Route, SliceStrategy};
use crate::error::ConfigurationError;

use serde_json::Value;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Volume {
    Single(SingleVolume),
    Replicas(ReplicasVolume),
    Sliced(SlicedVolume),
}

impl Volume {
    /// Builds a volume from its catalog definition.
    ///
    /// `{"address": ...}` is a single endpoint, `{"replicas": [...]}` a replica
    /// set and `{"slices": [...]}` a sliced collection.
    pub fn from_raw(raw: &Value) -> Result<Self, ConfigurationError> {
        let object = raw
            .as_object()
            .ok_or_else(|| ConfigurationError::InvalidVolume(raw.to_string()))?;

        if let Some(address) = object.get("address").and_then(Value::as_str) {
            return Ok(Volume::Single(SingleVolume::new(Address::parse(address)?)));
        }
        if let Some(replicas) = object.get("replicas") {
            return Ok(Volume::Replicas(ReplicasVolume::from_raw(replicas)?));
        }
        if let Some(slices) = object.get("slices").and_then(Value::as_array) {
            let slices = slices
                .iter()
                .map(Slice::from_raw)
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Volume::Sliced(SlicedVolume::new(slices)?));
        }

        Err(ConfigurationError::InvalidVolume(raw.to_string()))
    }

    pub fn compute_routes(&self, message: &Message, live_nodes: &LiveNodes) -> Vec<Route> {
        match self {
            Volume::Single(single) => single.compute_routes(),
            Volume::Replicas(replicas) => replicas.compute_routes(message, live_nodes),
            Volume::Sliced(sliced) => sliced.compute_routes(message, live_nodes),
        }
    }

    /// Every node name reachable through the configured topology.
    pub fn all_nodes(&self) -> Vec<String> {
        match self {
            Volume::Single(single) => vec![single.address.node()],
            Volume::Replicas(replicas) => replicas.all_nodes().to_vec(),
            Volume::Sliced(sliced) => sliced.all_nodes(),
        }
    }

    pub fn is_sliced(&self) -> bool {
        match self {
            Volume::Single(_) => false,
            Volume::Replicas(replicas) => replicas.is_sliced(),
            Volume::Sliced(sliced) => sliced.slices.len() > 1,
        }
    }
}

/// One engine endpoint serving one shard.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SingleVolume {
    pub address: Address,
}

impl SingleVolume {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    fn compute_routes(&self) -> Vec<Route> {
        vec![Route::from(&self.address)]
    }
}

/// A volume split into weighted slices.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlicedVolume {
    pub slices: Vec<Slice>,
}

impl SlicedVolume {
    pub fn new(slices: Vec<Slice>) -> Result<Self, ConfigurationError> {
        if slices.is_empty() {
            return Err(ConfigurationError::InvalidVolume(
                "sliced volume without slices".to_string(),
            ));
        }
        Ok(Self { slices })
    }

    /// Broadcasts reach the slices selected by the message's slice strategy.
    /// A scatter with a record key reaches only the slice owning that key;
    /// without one it behaves like a broadcast.
    fn compute_routes(&self, message: &Message, live_nodes: &LiveNodes) -> Vec<Route> {
        let mut routes = match message.kind {
            MessageType::Broadcast => self.routes_of_selected(message, live_nodes),
            MessageType::Scatter => match message.record_key() {
                Some(key) => self.choose_slice(&key).compute_routes(message, live_nodes),
                None => self.routes_of_selected(message, live_nodes),
            },
            MessageType::Reduce | MessageType::Gather => Vec::new(),
        };
        routes.sort();
        routes.dedup();
        routes
    }

    fn routes_of_selected(&self, message: &Message, live_nodes: &LiveNodes) -> Vec<Route> {
        self.select_slices(&message.slice)
            .flat_map(|slice| slice.compute_routes(message, live_nodes))
            .collect()
    }

    /// `all` keeps every slice, any other strategy keeps the slices labelled
    /// with its name.
    pub fn select_slices<'a>(
        &'a self,
        strategy: &'a SliceStrategy,
    ) -> impl Iterator<Item = &'a Slice> + 'a {
        self.slices.iter().filter(move |slice| match strategy {
            SliceStrategy::All => true,
            SliceStrategy::Other(label) => slice.label.as_deref() == Some(label.as_str()),
        })
    }

    /// Picks the slice owning `key` on a continuum scaled by slice weights.
    ///
    /// The position is the first eight bytes of the key's SHA-256 digest, so
    /// every engine maps a key to the same slice.
    pub fn choose_slice(&self, key: &str) -> &Slice {
        let total_weight: u64 = self.slices.iter().map(|slice| slice.weight).sum();

        let digest = Sha256::digest(key.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        let position = u64::from_be_bytes(prefix) % total_weight.max(1);

        let mut cumulative = 0;
        for slice in &self.slices {
            cumulative += slice.weight;
            if position < cumulative {
                return slice;
            }
        }
        // weights are >= 1, so the loop always returns before this point
        &self.slices[self.slices.len() - 1]
    }

    fn all_nodes(&self) -> Vec<String> {
        let mut nodes: Vec<String> = self
            .slices
            .iter()
            .flat_map(|slice| slice.all_nodes().to_vec())
            .collect();
        nodes.sort();
        nodes.dedup();
        nodes
    }
}
