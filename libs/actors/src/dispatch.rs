//! Cross-node message handoff.
//!
//! The runtime owns local delivery; everything addressed off-node is handed
//! to a [`RemoteDispatcher`] unchanged, fire and forget. Delivery failures
//! past that point are the dispatcher's concern and come back, if at all, as
//! ordinary messages re-entering the dispatch path, never as errors
//! propagating through `dispatch`.

use crate::address::NodeId;
use crate::error::{ActorError, Result};
use crate::messages::WireEnvelope;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// Carries a fully addressed envelope toward the runtime owning the
/// destination node.
pub trait RemoteDispatcher: Send + Sync + 'static {
    /// Best-effort delivery. No return channel; must not panic.
    fn deliver(&self, envelope: WireEnvelope);
}

impl<D: RemoteDispatcher + ?Sized> RemoteDispatcher for Arc<D> {
    fn deliver(&self, envelope: WireEnvelope) {
        (**self).deliver(envelope)
    }
}

/// Dispatcher for single-node deployments: every off-node message is logged
/// and absorbed at the transport edge.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnroutableDispatcher;

impl RemoteDispatcher for UnroutableDispatcher {
    fn deliver(&self, envelope: WireEnvelope) {
        warn!(
            sender = %envelope.sender,
            receiver = %envelope.receiver,
            "no route off this node, envelope dropped"
        );
    }
}

/// Receiving half a router delivers into. Implemented by the runtime.
pub trait EnvelopeSink: Send + Sync {
    /// Node this sink serves.
    fn node_id(&self) -> &NodeId;

    /// Accept an envelope addressed to this sink's node.
    fn accept(&self, envelope: WireEnvelope);
}

/// Routes envelopes between runtimes hosted in one process.
///
/// Stands in for the network transport in tests and single-process
/// multi-runtime setups: each runtime registers under its node id, and
/// envelopes cross "nodes" as structured values, exactly as they would cross
/// the wire. Peers are held weakly so a dropped runtime simply becomes
/// unreachable.
#[derive(Default)]
pub struct InProcessRouter {
    peers: RwLock<HashMap<NodeId, Weak<dyn EnvelopeSink>>>,
}

impl InProcessRouter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register the runtime serving `peer.node_id()`.
    pub fn register(&self, peer: Arc<dyn EnvelopeSink>) -> Result<()> {
        let node = peer.node_id().clone();
        let mut peers = self.peers.write();
        if let Some(existing) = peers.get(&node) {
            if existing.upgrade().is_some() {
                return Err(ActorError::NodeAlreadyRegistered { node });
            }
        }
        debug!(node = %node, "runtime registered with in-process router");
        peers.insert(node, Arc::downgrade(&peer));
        Ok(())
    }

    fn lookup(&self, node: &NodeId) -> Result<Arc<dyn EnvelopeSink>> {
        self.peers
            .read()
            .get(node)
            .and_then(Weak::upgrade)
            .ok_or_else(|| ActorError::UnknownPeer { node: node.clone() })
    }
}

impl RemoteDispatcher for InProcessRouter {
    fn deliver(&self, envelope: WireEnvelope) {
        match self.lookup(&envelope.receiver.node) {
            Ok(peer) => peer.accept(envelope),
            Err(error) => {
                warn!(
                    sender = %envelope.sender,
                    receiver = %envelope.receiver,
                    %error,
                    "envelope dropped"
                );
            }
        }
    }
}
