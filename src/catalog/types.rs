use crate::error::ConfigurationError;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static ADDRESS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<host>[^:/]+):(?P<port>\d+)/(?P<tag>[^./]+)(?:\.(?P<local>.+))?$")
        .expect("address pattern is a valid regex")
});

/// Names of the nodes currently considered live.
///
/// Routing only ever reads this snapshot; the owner (usually `Cluster`) rebuilds
/// it when the cluster state changes.
pub type LiveNodes = BTreeSet<String>;

/// An engine endpoint: `host:port/tag[.localName]`.
///
/// The `host:port/tag` prefix identifies an engine node; the optional local name
/// identifies one shard served by that node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    pub host: String,
    pub port: u16,
    pub tag: String,
    pub local_name: Option<String>,
}

impl Address {
    pub fn parse(raw: &str) -> Result<Self, ConfigurationError> {
        let caps = ADDRESS_PATTERN
            .captures(raw)
            .ok_or_else(|| ConfigurationError::InvalidAddress(raw.to_string()))?;

        let port = caps["port"]
            .parse::<u16>()
            .map_err(|_| ConfigurationError::InvalidAddress(raw.to_string()))?;

        Ok(Self {
            host: caps["host"].to_string(),
            port,
            tag: caps["tag"].to_string(),
            local_name: caps.name("local").map(|m| m.as_str().to_string()),
        })
    }

    /// The engine node part of the address, without the local shard name.
    pub fn node(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.tag)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.local_name {
            Some(local) => write!(f, "{}.{}", self.node(), local),
            None => write!(f, "{}", self.node()),
        }
    }
}

impl FromStr for Address {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A resolved delivery destination.
///
/// Routes order and compare by their address string, so a computed route set
/// can be sorted and deduplicated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Route(pub String);

impl Route {
    pub fn new(destination: impl Into<String>) -> Self {
        Self(destination.into())
    }

    pub fn address(&self) -> Result<Address, ConfigurationError> {
        Address::parse(&self.0)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&Address> for Route {
    fn from(address: &Address) -> Self {
        Self(address.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Scatter,
    Broadcast,
    Reduce,
    Gather,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Scatter => "scatter",
            MessageType::Broadcast => "broadcast",
            MessageType::Reduce => "reduce",
            MessageType::Gather => "gather",
        }
    }

    /// Whether messages of this type are delivered to dataset replicas.
    pub fn is_distributed(&self) -> bool {
        matches!(self, MessageType::Scatter | MessageType::Broadcast)
    }
}

/// How replicas of a slice are chosen.
///
/// Unrecognized names are kept verbatim; they select every replica.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReplicaStrategy {
    Top,
    Random,
    #[default]
    All,
    Other(String),
}

impl From<String> for ReplicaStrategy {
    fn from(value: String) -> Self {
        match value.as_str() {
            "top" => ReplicaStrategy::Top,
            "random" => ReplicaStrategy::Random,
            "all" => ReplicaStrategy::All,
            _ => ReplicaStrategy::Other(value),
        }
    }
}

impl From<&str> for ReplicaStrategy {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<ReplicaStrategy> for String {
    fn from(value: ReplicaStrategy) -> Self {
        match value {
            ReplicaStrategy::Top => "top".to_string(),
            ReplicaStrategy::Random => "random".to_string(),
            ReplicaStrategy::All => "all".to_string(),
            ReplicaStrategy::Other(other) => other,
        }
    }
}

/// How slices of a sliced volume are chosen.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SliceStrategy {
    #[default]
    All,
    Other(String),
}

impl From<String> for SliceStrategy {
    fn from(value: String) -> Self {
        match value.as_str() {
            "all" => SliceStrategy::All,
            _ => SliceStrategy::Other(value),
        }
    }
}

impl From<&str> for SliceStrategy {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<SliceStrategy> for String {
    fn from(value: SliceStrategy) -> Self {
        match value {
            SliceStrategy::All => "all".to_string(),
            SliceStrategy::Other(other) => other,
        }
    }
}

/// The logical message routing depends on.
///
/// Planner steps, shard requests and fan-in results all share this shape; only
/// `scatter` and `broadcast` messages are resolved against dataset replicas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default)]
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<String>,
    #[serde(default)]
    pub body: Value,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub replica: ReplicaStrategy,
    #[serde(default)]
    pub slice: SliceStrategy,
    #[serde(default)]
    pub post: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<Value>,
}

impl Message {
    pub fn new(kind: MessageType, command: impl Into<String>) -> Self {
        Self {
            kind,
            command: command.into(),
            dataset: None,
            body: Value::Object(Default::default()),
            inputs: Vec::new(),
            outputs: Vec::new(),
            replica: ReplicaStrategy::default(),
            slice: SliceStrategy::default(),
            post: false,
            record: None,
        }
    }

    /// The hashing key of the record this message targets, if any.
    pub fn record_key(&self) -> Option<String> {
        let key = self.record.as_ref()?.get("_key")?;
        match key {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}
