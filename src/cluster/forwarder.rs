//! Node Forwarders
//!
//! A forwarder owns the connection to one engine node. Callers never wait on
//! it: `forward` queues the delivery and returns, retrying across reconnects.
//! Between `shutdown` and the next `start` or `resume` nothing is delivered.

use super::types::Destination;
use crate::catalog::types::Address;

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Endpoint a peer engine accepts forwarded envelopes on.
pub const ENDPOINT_FORWARD: &str = "/internal/forward";

pub trait Forwarder: Send + Sync {
    fn start(&self) {}

    fn shutdown(&self) {}

    /// Re-establishes the connection if it is down.
    fn resume(&self);

    fn forward(&self, message: &Value, destination: &Destination);
}

/// Creates the forwarder for a node name.
pub type ForwarderFactory = Box<dyn Fn(&str) -> Arc<dyn Forwarder> + Send + Sync>;

#[derive(Debug, Serialize)]
struct Envelope<'a> {
    message: &'a Value,
    destination: &'a Destination,
}

/// Posts envelopes to the peer's forward endpoint as JSON.
pub struct HttpForwarder {
    node: String,
    url: String,
    http_client: reqwest::Client,
    timeout: Duration,
    attempts: usize,
    open: AtomicBool,
}

impl HttpForwarder {
    pub fn new(node: &str, timeout: Duration, attempts: usize) -> Self {
        let url = match Address::parse(node) {
            Ok(address) => format!("http://{}:{}{}", address.host, address.port, ENDPOINT_FORWARD),
            Err(e) => {
                tracing::warn!("Forwarder for {} has no usable address: {}", node, e);
                String::new()
            }
        };

        Self {
            node: node.to_string(),
            url,
            http_client: reqwest::Client::new(),
            timeout,
            attempts: attempts.max(1),
            open: AtomicBool::new(false),
        }
    }

    pub fn factory(timeout: Duration, attempts: usize) -> ForwarderFactory {
        Box::new(move |node: &str| {
            Arc::new(HttpForwarder::new(node, timeout, attempts)) as Arc<dyn Forwarder>
        })
    }

    fn connect(&self) {
        if !self.open.swap(true, Ordering::SeqCst) {
            tracing::trace!("connect: {}", self.node);
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

impl Forwarder for HttpForwarder {
    fn start(&self) {
        self.connect();
    }

    fn shutdown(&self) {
        self.open.store(false, Ordering::SeqCst);
        tracing::trace!("shutdown: {}", self.node);
    }

    fn resume(&self) {
        if !self.is_open() {
            tracing::trace!("resume: reconnect to {}", self.node);
            self.connect();
        }
    }

    fn forward(&self, message: &Value, destination: &Destination) {
        if self.url.is_empty() {
            tracing::error!("Cannot forward to {}: no address", self.node);
            return;
        }
        if !self.is_open() {
            tracing::warn!("Dropping message for {}: forwarder is shut down", destination.to);
            return;
        }

        let payload = match serde_json::to_value(Envelope {
            message,
            destination,
        }) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("Failed to encode message for {}: {}", destination.to, e);
                return;
            }
        };

        let client = self.http_client.clone();
        let url = self.url.clone();
        let timeout = self.timeout;
        let attempts = self.attempts;
        let to = destination.to.clone();

        tokio::spawn(async move {
            match post_with_retry(&client, &url, &payload, timeout, attempts).await {
                Ok(response) if response.status().is_success() => {
                    tracing::trace!("Forwarded message to {}", to);
                }
                Ok(response) => {
                    tracing::warn!("Forward to {} rejected: {}", to, response.status());
                }
                Err(e) => {
                    tracing::warn!("Forward to {} failed: {}", to, e);
                }
            }
        });
    }
}

async fn post_with_retry(
    client: &reqwest::Client,
    url: &str,
    payload: &Value,
    timeout: Duration,
    attempts: usize,
) -> Result<reqwest::Response> {
    let mut delay_ms = 150u64;

    for attempt in 0..attempts {
        let response = client.post(url).json(payload).timeout(timeout).send().await;

        match response {
            Ok(resp) => return Ok(resp),
            Err(e) => {
                if attempt + 1 == attempts {
                    return Err(anyhow::anyhow!(e));
                }
                let jitter = rand::random::<u64>() % 50;
                tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                delay_ms = (delay_ms * 2).min(1200);
            }
        }
    }

    Err(anyhow::anyhow!("Retry attempts exhausted"))
}
