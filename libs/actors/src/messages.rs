//! Message plumbing shared by every actor protocol.
//!
//! Application protocols are closed serde-tagged enums owned by each actor
//! definition. This module carries everything that travels *around* those
//! enums: the type-erased payload handed through a runtime, the standard
//! control notifications every actor can receive, and the structured
//! envelope a message takes when it crosses a node boundary.

use crate::address::ActorAddr;
use crate::error::{ActorError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;

/// Bounds required of an actor protocol message.
///
/// Blanket-implemented: `#[derive(Debug, Serialize, Deserialize)]` on a
/// `Send` enum is enough.
pub trait ActorMessage: Serialize + DeserializeOwned + fmt::Debug + Send + 'static {}

impl<T> ActorMessage for T where T: Serialize + DeserializeOwned + fmt::Debug + Send + 'static {}

/// Standard notifications understood by every actor regardless of its own
/// protocol.
///
/// Failures detected by the core arrive through these variants on the
/// ordinary dispatch path; nothing in the core propagates a failure into an
/// actor as an exception.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlMessage {
    /// A message this actor previously sent to `receiver` could not be
    /// represented in the receiving actor's protocol.
    NotUnderstood { receiver: ActorAddr },
    /// A message this actor previously sent to `receiver` reached a runtime
    /// whose registry no longer contains that actor.
    ActorNotFound { receiver: ActorAddr },
    /// An actor this actor monitors was removed from its registry.
    Terminated { actor: ActorAddr },
}

/// Description of a payload that could not be decoded into the receiving
/// actor's protocol, handed to the handler's fallback arm.
#[derive(Debug)]
pub struct UnknownPayload {
    /// Type name recorded at the sending site, for same-process payloads.
    pub type_name: Option<&'static str>,
    /// The structured wire value, for payloads that crossed a node boundary.
    pub value: Option<serde_json::Value>,
}

impl UnknownPayload {
    pub(crate) fn local(type_name: &'static str) -> Self {
        Self {
            type_name: Some(type_name),
            value: None,
        }
    }

    pub(crate) fn wire(value: serde_json::Value) -> Self {
        Self {
            type_name: None,
            value: Some(value),
        }
    }

    /// Human-readable description for logs.
    pub fn describe(&self) -> String {
        match (&self.type_name, &self.value) {
            (Some(name), _) => (*name).to_string(),
            (None, Some(value)) => value.to_string(),
            (None, None) => "opaque payload".to_string(),
        }
    }
}

/// A message in flight inside one runtime.
///
/// Same-node sends stay type-erased but in memory; sends bound for another
/// node are rendered to their wire value at the dispatch site, before the
/// payload goes type-erased.
pub enum Payload {
    /// Same-process payload, downcast by the receiving cell.
    Local {
        type_name: &'static str,
        value: Box<dyn Any + Send>,
    },
    /// Structured value produced on another node, or bound for one.
    Wire(serde_json::Value),
    /// Standard control notification.
    Control(ControlMessage),
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Local { type_name, .. } => {
                f.debug_struct("Local").field("type_name", type_name).finish()
            }
            Payload::Wire(value) => f.debug_tuple("Wire").field(value).finish(),
            Payload::Control(ctrl) => f.debug_tuple("Control").field(ctrl).finish(),
        }
    }
}

impl Payload {
    /// Type-erase `msg` for same-node delivery.
    pub fn local<M: ActorMessage>(msg: M) -> Self {
        Payload::Local {
            type_name: std::any::type_name::<M>(),
            value: Box::new(msg),
        }
    }

    /// Render `msg` into its structured wire value.
    pub fn wire<M: ActorMessage>(msg: &M) -> Result<Self> {
        let value = serde_json::to_value(msg)
            .map_err(|e| ActorError::serialization(std::any::type_name::<M>(), e))?;
        Ok(Payload::Wire(value))
    }

    /// Encode `msg` for its destination: in-memory when it stays on this
    /// node, wire value when it leaves it.
    pub fn encode<M: ActorMessage>(msg: M, local: bool) -> Result<Self> {
        if local {
            Ok(Self::local(msg))
        } else {
            Self::wire(&msg)
        }
    }

    pub fn is_control(&self) -> bool {
        matches!(self, Payload::Control(_))
    }

    /// The wire rendering of this payload, if it has one. `Local` payloads
    /// are never converted after the fact; encoding happens at dispatch.
    pub(crate) fn into_wire(self) -> Option<WirePayload> {
        match self {
            Payload::Local { .. } => None,
            Payload::Wire(value) => Some(WirePayload::Message { value }),
            Payload::Control(ctrl) => Some(WirePayload::Control(ctrl)),
        }
    }
}

/// Fully addressed message as it crosses a node boundary.
///
/// The payload is a structured, inspectable value carrying enough to
/// reconstruct the tagged message variant on the receiving node. Byte
/// framing underneath this struct is the transport's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireEnvelope {
    pub sender: ActorAddr,
    pub receiver: ActorAddr,
    pub payload: WirePayload,
}

impl WireEnvelope {
    pub fn new(sender: ActorAddr, receiver: ActorAddr, payload: WirePayload) -> Self {
        Self {
            sender,
            receiver,
            payload,
        }
    }

    pub(crate) fn into_payload(self) -> (ActorAddr, ActorAddr, Payload) {
        let payload = match self.payload {
            WirePayload::Message { value } => Payload::Wire(value),
            WirePayload::Control(ctrl) => Payload::Control(ctrl),
        };
        (self.sender, self.receiver, payload)
    }
}

/// Wire form of a payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WirePayload {
    /// A protocol message, rendered with the sending enum's tagging.
    Message { value: serde_json::Value },
    /// A standard control notification.
    Control(ControlMessage),
}
