//! Session Output Seam
//!
//! Sessions never talk to the network themselves. Everything they emit goes
//! through a `Dispatcher`; delivery is fire-and-forget.

use super::types::{DescendantMessage, LocalMessage};
use crate::catalog::types::Route;

use serde_json::Value;
use tokio::sync::mpsc;

pub trait Dispatcher: Send {
    /// Hands a root task to the local worker.
    fn process_local_message(&mut self, message: LocalMessage);

    /// Posts a reply to the requester.
    fn reply(&mut self, body: Value);

    /// Sends a finished task's output to a consuming step.
    fn dispatch(&mut self, message: DescendantMessage, route: &Route);
}

/// Everything a session can emit.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Local(LocalMessage),
    Reply(Value),
    Dispatch {
        message: DescendantMessage,
        route: Route,
    },
}

/// Queues session output on a channel drained by the owning loop.
pub struct ChannelDispatcher {
    sender: mpsc::UnboundedSender<Outbound>,
}

impl ChannelDispatcher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn send(&self, outbound: Outbound) {
        if let Err(e) = self.sender.send(outbound) {
            tracing::warn!("Dropping session output, receiver is gone: {:?}", e.0);
        }
    }
}

impl Dispatcher for ChannelDispatcher {
    fn process_local_message(&mut self, message: LocalMessage) {
        self.send(Outbound::Local(message));
    }

    fn reply(&mut self, body: Value) {
        self.send(Outbound::Reply(body));
    }

    fn dispatch(&mut self, message: DescendantMessage, route: &Route) {
        self.send(Outbound::Dispatch {
            message,
            route: route.clone(),
        });
    }
}
