//! One node's actor host.
//!
//! The runtime owns its registry exclusively, executes handler invocations
//! through its [`Scheduler`], and hands everything addressed off-node to its
//! [`RemoteDispatcher`]. Failures it detects (unknown receivers,
//! undecodable payloads) surface as [`ControlMessage`]s on the ordinary
//! dispatch path or are counted and dropped at the boundary; nothing here
//! raises an error into an unrelated actor.

use crate::actor::{self, Actor, ActorCell, AnyCell, RuntimeLink};
use crate::address::{ActorAddr, ActorId, NodeId};
use crate::dispatch::{EnvelopeSink, RemoteDispatcher};
use crate::messages::{ActorMessage, ControlMessage, Payload, WireEnvelope};
use crate::registry::{ActorOverview, ActorRegistry};
use crate::scheduler::Scheduler;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

/// Counters exposed for observability; all relaxed, read via [`snapshot`].
///
/// [`snapshot`]: RuntimeMetrics::snapshot
#[derive(Debug, Default)]
pub struct RuntimeMetrics {
    pub messages_dispatched: AtomicU64,
    pub local_deliveries: AtomicU64,
    pub remote_handoffs: AtomicU64,
    pub delivery_failures: AtomicU64,
    pub unknown_payloads: AtomicU64,
    pub actors_spawned: AtomicU64,
    pub actors_finished: AtomicU64,
}

impl RuntimeMetrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_dispatched: self.messages_dispatched.load(Ordering::Relaxed),
            local_deliveries: self.local_deliveries.load(Ordering::Relaxed),
            remote_handoffs: self.remote_handoffs.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            unknown_payloads: self.unknown_payloads.load(Ordering::Relaxed),
            actors_spawned: self.actors_spawned.load(Ordering::Relaxed),
            actors_finished: self.actors_finished.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of [`RuntimeMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub messages_dispatched: u64,
    pub local_deliveries: u64,
    pub remote_handoffs: u64,
    pub delivery_failures: u64,
    pub unknown_payloads: u64,
    pub actors_spawned: u64,
    pub actors_finished: u64,
}

/// One node's actor host: registry, scheduler, and remote dispatcher.
///
/// Created once per node process and used behind [`Arc`]; every surface
/// takes `&self` and is safe under concurrent invocation.
pub struct ActorRuntime<S: Scheduler, D: RemoteDispatcher> {
    node: NodeId,
    registry: ActorRegistry,
    scheduler: S,
    remote: D,
    next_id: AtomicU64,
    metrics: RuntimeMetrics,
    /// Back-reference captured by scheduled handler invocations.
    this: Weak<Self>,
    /// Instance tag for log correlation across runtimes in one process.
    tag: String,
}

impl<S: Scheduler, D: RemoteDispatcher> ActorRuntime<S, D> {
    pub fn new(node: NodeId, scheduler: S, remote: D) -> Arc<Self> {
        let tag = format!("runtime-{}", Uuid::new_v4());
        info!(node = %node, runtime = %tag, "creating actor runtime");
        Arc::new_cyclic(|this| Self {
            node,
            registry: ActorRegistry::new(),
            scheduler,
            remote,
            next_id: AtomicU64::new(1),
            metrics: RuntimeMetrics::default(),
            this: this.clone(),
            tag,
        })
    }

    pub fn node(&self) -> &NodeId {
        &self.node
    }

    pub fn registry(&self) -> &ActorRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> &RuntimeMetrics {
        &self.metrics
    }

    /// Address of actor `id` on this node.
    pub fn addr_of(&self, id: ActorId) -> ActorAddr {
        ActorAddr::new(self.node.clone(), id)
    }

    /// Spawn an actor: allocate an id, register the cell, and immediately
    /// dispatch `start` so the actor's first observed message is uniform
    /// with all later ones. Returns the new id.
    pub fn spawn<A: Actor>(&self, state: A::State, start: A::Message) -> ActorId {
        let addr = actor::spawn_on::<A>(self, state, start);
        addr.id
    }

    /// The message-send surface: route `msg` to a local actor or hand it to
    /// the remote dispatcher, depending on `receiver.node`.
    pub fn dispatch<M: ActorMessage>(&self, sender: ActorAddr, receiver: ActorAddr, msg: M) {
        actor::send_from(self, sender, receiver, msg);
    }

    /// Terminate actor `id`: detach its entry and notify every registered
    /// monitor with [`ControlMessage::Terminated`], sent from the terminated
    /// actor's own address.
    pub fn finish(&self, id: ActorId) {
        let Some(entry) = self.registry.remove(id) else {
            debug!(node = %self.node, actor = %id, "finish for unknown actor");
            return;
        };
        self.metrics.actors_finished.fetch_add(1, Ordering::Relaxed);
        let (cell, monitors) = entry.into_parts();
        cell.close();
        debug!(
            node = %self.node,
            actor = %id,
            actor_type = cell.type_name(),
            monitors = monitors.len(),
            "actor finished"
        );
        let terminated = self.addr_of(id);
        for monitor in monitors {
            self.route(
                terminated.clone(),
                monitor,
                Payload::Control(ControlMessage::Terminated {
                    actor: terminated.clone(),
                }),
            );
        }
    }

    /// Register actor `watcher` to be notified when `watched` terminates.
    /// Returns `false` if `watched` is not live on this runtime.
    pub fn monitor(&self, watcher: ActorId, watched: ActorId) -> bool {
        self.registry.monitor(self.addr_of(watcher), watched)
    }

    /// Read-only state snapshot for introspection and tests. `None` when the
    /// actor is unknown, of a different definition, or mid-invocation; meant
    /// for actors that have gone quiet, not for racing live handlers.
    pub fn get_actor_state<A: Actor>(&self, id: ActorId) -> Option<A::State> {
        let cell = self.registry.find(id)?;
        let cell = cell.as_any().downcast_ref::<ActorCell<A>>()?;
        cell.state()
    }

    /// Structural dump of the registry: id, actor type name, monitor list.
    pub fn overview(&self) -> Vec<ActorOverview> {
        self.registry.overview()
    }

    /// Block until every actor on this runtime has finished.
    pub fn wait_for_all(&self) {
        self.registry.wait_for_all()
    }

    /// Finish every live actor. Graceful teardown for hosts and tests;
    /// monitors are notified exactly as with individual `finish` calls.
    pub fn shutdown(&self) {
        info!(node = %self.node, runtime = %self.tag, actors = self.registry.len(), "shutting down");
        let mut ids = Vec::new();
        self.registry.apply(|id, _| ids.push(id));
        for id in ids {
            self.finish(id);
        }
    }

    fn deliver_local(&self, sender: ActorAddr, receiver: ActorAddr, payload: Payload) {
        match self.registry.find(receiver.id) {
            Some(cell) => {
                self.metrics.local_deliveries.fetch_add(1, Ordering::Relaxed);
                let Some(runtime) = self.this.upgrade() else {
                    return;
                };
                self.scheduler.run(Box::new(move || {
                    cell.receive(&*runtime, receiver, sender, payload);
                }));
            }
            None => {
                self.metrics.delivery_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    node = %self.node,
                    receiver = %receiver,
                    sender = %sender,
                    "message for unknown actor dropped"
                );
                // Feedback rides the normal dispatch path. Control payloads
                // get none, which bounds a dead-letter exchange at one hop.
                if !payload.is_control() {
                    self.route(
                        receiver.clone(),
                        sender,
                        Payload::Control(ControlMessage::ActorNotFound { receiver }),
                    );
                }
            }
        }
    }
}

impl<S: Scheduler, D: RemoteDispatcher> RuntimeLink for ActorRuntime<S, D> {
    fn node(&self) -> &NodeId {
        &self.node
    }

    fn next_actor_id(&self) -> ActorId {
        ActorId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn install(&self, id: ActorId, cell: Arc<dyn AnyCell>) {
        debug!(node = %self.node, actor = %id, actor_type = cell.type_name(), "actor installed");
        self.registry.add(id, cell);
        self.metrics.actors_spawned.fetch_add(1, Ordering::Relaxed);
    }

    fn route(&self, sender: ActorAddr, receiver: ActorAddr, payload: Payload) {
        self.metrics.messages_dispatched.fetch_add(1, Ordering::Relaxed);
        if receiver.is_on(&self.node) {
            self.deliver_local(sender, receiver, payload);
            return;
        }
        match payload.into_wire() {
            Some(wire) => {
                self.metrics.remote_handoffs.fetch_add(1, Ordering::Relaxed);
                trace!(
                    node = %self.node,
                    sender = %sender,
                    receiver = %receiver,
                    "handing envelope to remote dispatcher"
                );
                self.remote.deliver(WireEnvelope::new(sender, receiver, wire));
            }
            None => {
                // Payloads are encoded for their destination at the dispatch
                // site; an in-memory payload addressed off-node is a bug.
                error!(
                    node = %self.node,
                    receiver = %receiver,
                    "in-memory payload addressed to another node dropped"
                );
                self.metrics.delivery_failures.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn finish(&self, id: ActorId) {
        ActorRuntime::finish(self, id);
    }

    fn note_unknown_payload(&self) {
        self.metrics.unknown_payloads.fetch_add(1, Ordering::Relaxed);
    }
}

impl<S: Scheduler, D: RemoteDispatcher> EnvelopeSink for ActorRuntime<S, D> {
    fn node_id(&self) -> &NodeId {
        &self.node
    }

    /// Entry point for envelopes arriving from another node. An envelope for
    /// a node this runtime does not serve is dropped, never delivered into
    /// the wrong registry.
    fn accept(&self, envelope: WireEnvelope) {
        if !envelope.receiver.is_on(&self.node) {
            warn!(
                node = %self.node,
                receiver = %envelope.receiver,
                "envelope for another node dropped"
            );
            self.metrics.delivery_failures.fetch_add(1, Ordering::Relaxed);
            return;
        }
        let (sender, receiver, payload) = envelope.into_payload();
        self.deliver_local(sender, receiver, payload);
    }
}
