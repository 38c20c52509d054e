//! Catalog Routing Module
//!
//! Describes where a dataset's data lives and resolves a message into the set of
//! endpoints it must reach.
//!
//! ## Core Concepts
//! - **Volume**: a routable destination (single endpoint, replica set, or sliced collection).
//! - **Replicas**: copies of the same data. A replica only counts as live when every node behind it is live.
//! - **Slices**: weighted shards of a dataset, each backed by a volume or a replica set.
//! - **Routes**: computed route sets are sorted and deduplicated, so identical inputs give identical outputs.
//!
//! ## Submodules
//! - **`types`**: addresses, routes, strategies and the logical message shape.
//! - **`volume`**: the closed set of volume variants.
//! - **`replicas`**: replica selection and liveness filtering.
//! - **`slice`**: slice definitions.
//! - **`dataset`**: catalog document parsing and lookups.

pub mod dataset;
pub mod replicas;
pub mod slice;
pub mod types;
pub mod volume;

#[cfg(test)]
mod tests;
