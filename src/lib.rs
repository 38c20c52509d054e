//! Distributed Document Engine Core
//!
//! This library crate holds the distributed execution core of a sharded,
//! replicated document engine. It is the foundation for the binary
//! executable (`main.rs`).
//!
//! ## Architecture Modules
//!
//! - **`catalog`**: Static topology. Datasets own replica sets of volumes; a
//!   volume is a single engine address or a weighted set of slices. Messages
//!   are routed against a snapshot of live nodes.
//! - **`planner`**: Turns one request into a unified list of steps: a
//!   scatter or broadcast processor followed by reduce and gather steps.
//! - **`session`**: Executes a routed plan. Counts fan-in arrivals and
//!   finalizes each task once, with a timeout for abandoned requests.
//! - **`cluster`**: Node liveness and roles from the persisted state file,
//!   plus the per-node forwarders.
//! - **`config`**: Engine process configuration.
//! - **`error`**: Typed errors of the layers above.

pub mod catalog;
pub mod cluster;
pub mod config;
pub mod error;
pub mod planner;
pub mod session;
