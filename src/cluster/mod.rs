//! Cluster Module
//!
//! Tracks which engine nodes exist, which are live and what role each one
//! plays, and owns the forwarders that deliver messages to them.
//!
//! ## Submodules
//! - **`types`**: roles, persisted node state and state diffs.
//! - **`engine_node`**: liveness and role predicates for one node.
//! - **`forwarder`**: the per-node delivery seam and its HTTP implementation.
//! - **`cluster`**: the node table rebuilt from the state file.
//! - **`watcher`**: polls the state file for changes.
//! - **`handlers`**: HTTP endpoints exposing node status.

pub mod cluster;
pub mod engine_node;
pub mod forwarder;
pub mod handlers;
pub mod types;
pub mod watcher;
