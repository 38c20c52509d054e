//! Error Types
//!
//! Typed errors surfaced by the routing, planning and cluster layers.
//! Configuration problems are fatal and reported at construction or plan time;
//! routing problems are handed back to the caller untouched.

use thiserror::Error;

/// Invalid catalog or planner setup. Never recovered internally.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("slice has neither a volume nor replicas: {0}")]
    SliceWithoutBacking(String),

    #[error("unrecognized volume definition: {0}")]
    InvalidVolume(String),

    #[error("replica set must contain at least one volume")]
    EmptyReplicas,

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("plan requested before scatter or broadcast was configured")]
    NoProcessor,

    #[error("unknown reducer type: {0}")]
    UnknownReducer(String),

    #[error("unknown dataset: {0}")]
    UnknownDataset(String),

    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),
}

/// Failure to hand a message to a cluster member.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoutingError {
    #[error("unknown target: {0}")]
    UnknownTarget(String),

    #[error("engine node table is not built yet")]
    NotStartedYet,
}
