//! Actor addressing.
//!
//! An [`ActorAddr`] names one actor instance across the cluster: the node
//! hosting it plus a node-local numeric id. Addresses are plain data with no
//! ownership implications and may outlive the actor they name; delivery to a
//! dead address is absorbed at the runtime boundary, not here.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one cluster member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for NodeId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Node-local actor identifier.
///
/// Allocated monotonically by one runtime and never reused within that
/// runtime's lifetime, so an id held after its actor terminated can never
/// alias a younger actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(u64);

impl ActorId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cluster-wide actor address: hosting node plus node-local id.
///
/// The only legal way to refer to an actor from outside its own handler
/// invocation. Serializes losslessly when embedded in messages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorAddr {
    pub node: NodeId,
    pub id: ActorId,
}

impl ActorAddr {
    pub fn new(node: NodeId, id: ActorId) -> Self {
        Self { node, id }
    }

    /// Whether this address lives on `node`.
    pub fn is_on(&self, node: &NodeId) -> bool {
        self.node == *node
    }
}

impl fmt::Display for ActorAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.node, self.id)
    }
}
