//! Session Module
//!
//! Executes one request's plan: dispatches root tasks, counts fan-in arrivals
//! and finalizes each task exactly once.
//!
//! ## Lifecycle
//! 1. **Graph**: routed plan steps become tasks wired to their consumers (`graph`).
//! 2. **Start**: root tasks go to the local worker and count as done.
//! 3. **Receive**: partial results are folded into waiting tasks by their collector (`collector`).
//! 4. **Finalize**: a complete task replies upstream and forwards its result to descendants.
//! 5. **Finish / Timeout**: `finish` cancels the timer; a fired timer abandons the session.
//!
//! ## Submodules
//! - **`types`**: task, step and message shapes.
//! - **`collector`**: the table of collectors and their pure merge functions.
//! - **`dispatcher`**: the output seam sessions emit through.
//! - **`graph`**: turns routed steps into tasks.
//! - **`session`**: the state machine.

pub mod collector;
pub mod dispatcher;
pub mod graph;
pub mod session;
pub mod types;

#[cfg(test)]
mod tests;
