//! Distributed Command Planner Module
//!
//! Turns one request into the steps a session executes.
//!
//! ## Plan Shape
//! 1. **Reduce steps**: one per distinct reducer type, folding per-shard partials.
//! 2. **Gather steps**: one per distinct gatherer type, renaming reduced values and posting the reply.
//! 3. **Processor step**: the single scatter or broadcast that reaches the shards.

pub mod planner;
pub mod types;
