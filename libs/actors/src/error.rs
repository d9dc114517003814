//! Error types for the actor core.
//!
//! Failures an actor should react to travel as [`ControlMessage`]s on the
//! ordinary dispatch path, never as `Err` values. This type covers the
//! genuinely fallible internal edges: wire encoding and router bookkeeping.
//!
//! [`ControlMessage`]: crate::messages::ControlMessage

use crate::address::NodeId;
use std::fmt;
use thiserror::Error;

/// Errors surfaced by the actor core's infrastructure edges.
#[derive(Error, Debug)]
pub enum ActorError {
    /// A message could not be rendered into its structured wire value.
    #[error("serialization of {message_type} failed: {message}")]
    Serialization {
        message_type: &'static str,
        message: String,
    },

    /// An in-process router already has a live runtime for this node.
    #[error("node {node} already registered")]
    NodeAlreadyRegistered { node: NodeId },

    /// An in-process router has no live runtime for this node.
    #[error("no reachable runtime for node {node}")]
    UnknownPeer { node: NodeId },
}

impl ActorError {
    /// Create a serialization error for a message type.
    pub fn serialization(message_type: &'static str, source: impl fmt::Display) -> Self {
        Self::Serialization {
            message_type,
            message: source.to_string(),
        }
    }
}

/// Result type alias for actor core operations.
pub type Result<T> = std::result::Result<T, ActorError>;
