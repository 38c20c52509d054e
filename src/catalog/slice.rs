use super::replicas::ReplicasVolume;
use super::types::{LiveNodes, Message, Route};
use super::volume::Volume;
use crate::error::ConfigurationError;

use serde_json::Value;

/// What a slice stores its data on. Exactly one of the two is configured.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SliceBacking {
    Volume(Box<Volume>),
    Replicas(ReplicasVolume),
}

/// One shard of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Slice {
    pub weight: u64,
    pub label: Option<String>,
    pub boundary: Option<String>,
    pub backing: SliceBacking,
    all_nodes: Vec<String>,
}

impl Slice {
    pub fn new(
        weight: u64,
        label: Option<String>,
        boundary: Option<String>,
        backing: SliceBacking,
    ) -> Self {
        let all_nodes = match &backing {
            SliceBacking::Volume(volume) => volume.all_nodes(),
            SliceBacking::Replicas(replicas) => replicas.all_nodes().to_vec(),
        };

        Self {
            weight: weight.max(1),
            label,
            boundary,
            backing,
            all_nodes,
        }
    }

    /// Parses `{"weight"?, "label"?, "boundary"?, "volume" | "replicas"}`.
    ///
    /// A slice with neither `volume` nor `replicas` is rejected here, before any
    /// routing can reach it.
    pub fn from_raw(raw: &Value) -> Result<Self, ConfigurationError> {
        let object = raw
            .as_object()
            .ok_or_else(|| ConfigurationError::InvalidVolume(raw.to_string()))?;

        let backing = if let Some(volume) = object.get("volume") {
            SliceBacking::Volume(Box::new(Volume::from_raw(volume)?))
        } else if let Some(replicas) = object.get("replicas") {
            SliceBacking::Replicas(ReplicasVolume::from_raw(replicas)?)
        } else {
            return Err(ConfigurationError::SliceWithoutBacking(raw.to_string()));
        };

        let weight = object.get("weight").and_then(Value::as_u64).unwrap_or(1);
        let label = object
            .get("label")
            .and_then(Value::as_str)
            .map(str::to_string);
        let boundary = object.get("boundary").and_then(|value| match value {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        });

        Ok(Self::new(weight, label, boundary, backing))
    }

    pub fn volume(&self) -> Option<&Volume> {
        match &self.backing {
            SliceBacking::Volume(volume) => Some(volume),
            SliceBacking::Replicas(_) => None,
        }
    }

    pub fn replicas(&self) -> Option<&ReplicasVolume> {
        match &self.backing {
            SliceBacking::Replicas(replicas) => Some(replicas),
            SliceBacking::Volume(_) => None,
        }
    }

    pub fn compute_routes(&self, message: &Message, live_nodes: &LiveNodes) -> Vec<Route> {
        match &self.backing {
            SliceBacking::Volume(volume) => volume.compute_routes(message, live_nodes),
            SliceBacking::Replicas(replicas) => replicas.compute_routes(message, live_nodes),
        }
    }

    pub fn all_nodes(&self) -> &[String] {
        &self.all_nodes
    }
}
