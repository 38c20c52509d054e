//! Catalog Loading
//!
//! Parses the catalog document into datasets and exposes the lookups the rest
//! of the engine needs: dataset by name, slices served by a node, and the
//! configured node set.

use super::replicas::ReplicasVolume;
use super::types::{LiveNodes, Message, Route};
use super::volume::{SingleVolume, Volume};
use crate::error::ConfigurationError;

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// A named configuration scope owning a replica set of slices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    pub name: String,
    pub n_workers: u32,
    pub plugins: Vec<String>,
    pub replicas: ReplicasVolume,
}

impl Dataset {
    pub fn from_raw(name: &str, raw: &Value) -> Result<Self, ConfigurationError> {
        let replicas = raw
            .get("replicas")
            .ok_or_else(|| ConfigurationError::InvalidCatalog(format!("{name}: no replicas")))?;

        Ok(Self {
            name: name.to_string(),
            n_workers: raw.get("nWorkers").and_then(Value::as_u64).unwrap_or(0) as u32,
            plugins: raw
                .get("plugins")
                .and_then(Value::as_array)
                .map(|plugins| {
                    plugins
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            replicas: ReplicasVolume::from_raw(replicas)?,
        })
    }

    pub fn compute_routes(&self, message: &Message, live_nodes: &LiveNodes) -> Vec<Route> {
        self.replicas.compute_routes(message, live_nodes)
    }

    pub fn all_nodes(&self) -> &[String] {
        self.replicas.all_nodes()
    }
}

/// Options for one locally served slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceOptions {
    pub dataset: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    datasets: BTreeMap<String, Dataset>,
    all_nodes: Vec<String>,
}

impl Catalog {
    pub fn new(datasets: Vec<Dataset>) -> Self {
        let mut all_nodes: Vec<String> = datasets
            .iter()
            .flat_map(|dataset| dataset.all_nodes().to_vec())
            .collect();
        all_nodes.sort();
        all_nodes.dedup();

        Self {
            datasets: datasets
                .into_iter()
                .map(|dataset| (dataset.name.clone(), dataset))
                .collect(),
            all_nodes,
        }
    }

    pub fn from_value(raw: &Value) -> Result<Self, ConfigurationError> {
        let datasets = raw
            .get("datasets")
            .and_then(Value::as_object)
            .ok_or_else(|| ConfigurationError::InvalidCatalog("no datasets".to_string()))?;

        let datasets = datasets
            .iter()
            .map(|(name, raw)| Dataset::from_raw(name, raw))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(datasets))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ConfigurationError::InvalidCatalog(format!("{}: {}", path.display(), e))
        })?;
        let raw: Value = serde_json::from_str(&contents).map_err(|e| {
            ConfigurationError::InvalidCatalog(format!("{}: {}", path.display(), e))
        })?;

        let catalog = Self::from_value(&raw)?;
        tracing::info!(
            "Loaded catalog {} ({} datasets, {} nodes)",
            path.display(),
            catalog.datasets.len(),
            catalog.all_nodes.len()
        );
        Ok(catalog)
    }

    pub fn dataset(&self, name: &str) -> Result<&Dataset, ConfigurationError> {
        self.datasets
            .get(name)
            .ok_or_else(|| ConfigurationError::UnknownDataset(name.to_string()))
    }

    pub fn all_nodes(&self) -> &[String] {
        &self.all_nodes
    }

    /// Slices served by the engine node `node`, keyed by their local name.
    pub fn slices(&self, node: &str) -> BTreeMap<String, SliceOptions> {
        let mut slices = BTreeMap::new();

        for dataset in self.datasets.values() {
            let mut singles = Vec::new();
            for volume in dataset.replicas.volumes() {
                collect_single_volumes(volume, &mut singles);
            }

            for single in singles {
                if single.address.node() != node {
                    continue;
                }
                let name = single
                    .address
                    .local_name
                    .clone()
                    .unwrap_or_else(|| single.address.to_string());
                slices.insert(
                    name,
                    SliceOptions {
                        dataset: dataset.name.clone(),
                    },
                );
            }
        }

        slices
    }
}

fn collect_single_volumes<'a>(volume: &'a Volume, out: &mut Vec<&'a SingleVolume>) {
    match volume {
        Volume::Single(single) => out.push(single),
        Volume::Replicas(replicas) => {
            for replica in replicas.volumes() {
                collect_single_volumes(replica, out);
            }
        }
        Volume::Sliced(sliced) => {
            for slice in &sliced.slices {
                if let Some(inner) = slice.volume() {
                    collect_single_volumes(inner, out);
                }
                for replica in slice.replicas().map(|r| r.volumes()).unwrap_or_default() {
                    collect_single_volumes(replica, out);
                }
            }
        }
    }
}
