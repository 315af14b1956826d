use std::fmt;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::BusError;

/// Identifies one participant on a bus. Envelopes carry the id of the node
/// that published them so a node can recognise its own messages.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Ord, PartialOrd, Serialize, Deserialize)]
pub struct NodeId(Ulid);

impl NodeId {
    pub fn new() -> Self { NodeId(Ulid::new()) }

    pub fn from_ulid(ulid: Ulid) -> Self { NodeId(ulid) }
}

impl Default for NodeId {
    fn default() -> Self { Self::new() }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            // the random tail is enough to tell nodes apart in logs
            let value = self.0.to_string();
            write!(f, "{}", &value[value.len() - 6..])
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "NodeId({:#})", self) }
}

/// A property value in transit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub origin: NodeId,
    pub channel: String,
    pub value: serde_json::Value,
}

impl Envelope {
    /// Wrap a value published by `origin` on `channel`.
    pub fn wrap<T: Serialize>(origin: NodeId, channel: impl Into<String>, value: &T) -> Result<Self, BusError> {
        Ok(Self { origin, channel: channel.into(), value: serde_json::to_value(value).map_err(BusError::Encode)? })
    }

    /// Convert the payload back into a typed value.
    pub fn unwrap_value<T: serde::de::DeserializeOwned>(&self) -> Result<T, BusError> {
        T::deserialize(&self.value).map_err(BusError::Decode)
    }

    pub fn encode(&self) -> Result<String, BusError> { serde_json::to_string(self).map_err(BusError::Encode) }

    pub fn decode(payload: &str) -> Result<Self, BusError> { serde_json::from_str(payload).map_err(BusError::Decode) }
}
