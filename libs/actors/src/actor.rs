//! The actor/handler contract and the per-actor cell.
//!
//! An actor definition is a `(State, Message, handler)` triple expressed as
//! an implementation of [`Actor`]. The registry stores actors behind the
//! type-erased [`AnyCell`] capability, so new definitions need no change to
//! the registry or runtime.
//!
//! State ownership follows one rule: the cell owns the state at rest, the
//! in-flight handler invocation owns it while it runs, and nothing else ever
//! touches it. Deliveries that arrive while the state is checked out queue
//! in the cell's mailbox and are drained by the invocation that holds the
//! state, which is what keeps handler invocations for one actor from ever
//! overlapping, on any scheduler.

use crate::address::{ActorAddr, ActorId, NodeId};
use crate::messages::{ActorMessage, ControlMessage, Payload, UnknownPayload};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::{error, trace, warn};

/// One kind of actor: its state, its closed message protocol, and the
/// handler mapping (state, delivery) to the next state.
pub trait Actor: Sized + Send + 'static {
    /// Per-actor data. Exclusively owned by the registry entry at rest or by
    /// the in-flight handler invocation; `Clone` exists for read-only
    /// introspection of quiesced actors.
    type State: fmt::Debug + Clone + Send + 'static;

    /// The closed protocol of this actor: a serde-tagged enum with at least
    /// a start variant delivered by spawn.
    type Message: ActorMessage;

    /// Stable type name used in registry dumps and logs.
    const NAME: &'static str;

    /// Map the current state and one delivery to the next state.
    ///
    /// Invoked exactly once per delivered message, never concurrently with
    /// itself for the same actor. Outward sends made through `ctx` are side
    /// effects and are not transactional with the state update: the returned
    /// state is stored even if a send is later dropped at the transport
    /// edge.
    fn handle(
        state: Self::State,
        ctx: &mut ActorContext<'_>,
        delivery: Delivery<Self::Message>,
    ) -> Self::State;
}

/// What a handler is invoked with.
///
/// The `Unknown` arm is the mandatory fallback of the handler contract: a
/// payload this actor's protocol cannot represent, typically a message meant
/// for a different actor definition routed to the wrong address. Matching
/// `Delivery` exhaustively forces every handler to decide what that arm
/// does; the conventional choice is [`ActorContext::reply_not_understood`],
/// which puts recovery in the sender's hands.
#[derive(Debug)]
pub enum Delivery<M> {
    /// A message of this actor's own protocol.
    Message(M),
    /// A standard cross-protocol notification.
    Control(ControlMessage),
    /// A payload this actor's protocol cannot represent.
    Unknown(UnknownPayload),
}

/// Capabilities handed to a handler invocation.
pub struct ActorContext<'a> {
    link: &'a dyn RuntimeLink,
    self_addr: ActorAddr,
    sender: ActorAddr,
    finish: bool,
}

impl ActorContext<'_> {
    /// Address of the actor being invoked.
    pub fn self_addr(&self) -> &ActorAddr {
        &self.self_addr
    }

    /// Address the current delivery came from.
    pub fn sender(&self) -> &ActorAddr {
        &self.sender
    }

    /// Node hosting this actor.
    pub fn node(&self) -> &NodeId {
        self.link.node()
    }

    /// Send `msg` to `to` through the hosting runtime.
    pub fn dispatch<M: ActorMessage>(&self, to: ActorAddr, msg: M) {
        send_from(self.link, self.self_addr.clone(), to, msg);
    }

    /// Send `msg` back to the sender of the current delivery.
    pub fn reply<M: ActorMessage>(&self, msg: M) {
        self.dispatch(self.sender.clone(), msg);
    }

    /// The standard fallback reply: tell the sender its message was not
    /// understood, in the control protocol the sender already speaks.
    pub fn reply_not_understood(&self) {
        self.link.route(
            self.self_addr.clone(),
            self.sender.clone(),
            Payload::Control(ControlMessage::NotUnderstood {
                receiver: self.self_addr.clone(),
            }),
        );
    }

    /// Spawn a collaborator on the hosting runtime and return its address.
    pub fn spawn<A: Actor>(&self, state: A::State, start: A::Message) -> ActorAddr {
        spawn_on::<A>(self.link, state, start)
    }

    /// Remove this actor from the registry once the current invocation
    /// completes. Messages still queued for it are dropped; later sends fail
    /// as delivery to an unknown actor.
    pub fn finish(&mut self) {
        self.finish = true;
    }
}

/// Runtime capabilities the cell and context need. Object-safe, so cells and
/// handler code stay independent of the runtime's scheduler and dispatcher
/// type parameters.
pub trait RuntimeLink: Send + Sync {
    fn node(&self) -> &NodeId;
    fn next_actor_id(&self) -> ActorId;
    fn install(&self, id: ActorId, cell: Arc<dyn AnyCell>);
    fn route(&self, sender: ActorAddr, receiver: ActorAddr, payload: Payload);
    fn finish(&self, id: ActorId);
    fn note_unknown_payload(&self);
}

/// Typed send through an object-safe link: the payload is encoded for its
/// destination before it goes type-erased.
pub(crate) fn send_from<M: ActorMessage>(
    link: &dyn RuntimeLink,
    sender: ActorAddr,
    to: ActorAddr,
    msg: M,
) {
    let local = to.is_on(link.node());
    match Payload::encode(msg, local) {
        Ok(payload) => link.route(sender, to, payload),
        Err(err) => {
            error!(%sender, receiver = %to, error = %err, "message dropped at dispatch");
        }
    }
}

/// Allocate an id, install the cell, and deliver the start message.
///
/// The first delivery is uniform with every later one: an ordinary dispatch,
/// sent from the new actor's own address.
pub(crate) fn spawn_on<A: Actor>(
    link: &dyn RuntimeLink,
    state: A::State,
    start: A::Message,
) -> ActorAddr {
    let id = link.next_actor_id();
    let addr = ActorAddr::new(link.node().clone(), id);
    link.install(id, Arc::new(ActorCell::<A>::new(state)));
    link.route(addr.clone(), addr.clone(), Payload::local(start));
    addr
}

/// Type-erased live actor, as stored in the registry.
pub trait AnyCell: Send + Sync {
    /// Deliver one payload: run the handler if the state is at rest, or
    /// queue behind the invocation currently holding it.
    fn receive(
        &self,
        link: &dyn RuntimeLink,
        self_addr: ActorAddr,
        sender: ActorAddr,
        payload: Payload,
    );

    /// Stable actor type name.
    fn type_name(&self) -> &'static str;

    /// Debug rendering of the state; `None` while an invocation holds it.
    fn state_debug(&self) -> Option<String>;

    /// Drop queued messages and reject later deliveries. The state of an
    /// invocation still in flight dies with that invocation.
    fn close(&self);

    fn as_any(&self) -> &dyn Any;
}

pub(crate) struct ActorCell<A: Actor> {
    inner: Mutex<CellInner<A>>,
}

struct CellInner<A: Actor> {
    /// `None` while an invocation has the state checked out.
    state: Option<A::State>,
    /// Deliveries that arrived while the state was checked out.
    mailbox: VecDeque<(ActorAddr, Payload)>,
    closed: bool,
}

impl<A: Actor> ActorCell<A> {
    pub(crate) fn new(state: A::State) -> Self {
        Self {
            inner: Mutex::new(CellInner {
                state: Some(state),
                mailbox: VecDeque::new(),
                closed: false,
            }),
        }
    }

    pub(crate) fn state(&self) -> Option<A::State> {
        self.inner.lock().state.clone()
    }

    fn decode(link: &dyn RuntimeLink, payload: Payload) -> Delivery<A::Message> {
        match payload {
            Payload::Control(ctrl) => Delivery::Control(ctrl),
            Payload::Local { type_name, value } => match value.downcast::<A::Message>() {
                Ok(msg) => Delivery::Message(*msg),
                Err(_) => {
                    link.note_unknown_payload();
                    Delivery::Unknown(UnknownPayload::local(type_name))
                }
            },
            Payload::Wire(value) => match serde_json::from_value::<A::Message>(value.clone()) {
                Ok(msg) => Delivery::Message(msg),
                Err(_) => {
                    link.note_unknown_payload();
                    Delivery::Unknown(UnknownPayload::wire(value))
                }
            },
        }
    }

    /// Handler loop for the thread that owns the state: process the
    /// triggering delivery, then drain whatever queued up meanwhile.
    fn invoke(
        &self,
        link: &dyn RuntimeLink,
        self_addr: ActorAddr,
        mut state: A::State,
        sender: ActorAddr,
        payload: Payload,
    ) {
        let mut pending = Some((sender, payload));
        while let Some((sender, payload)) = pending.take() {
            trace!(actor = %self_addr, from = %sender, actor_type = A::NAME, "delivering");
            let delivery = Self::decode(link, payload);
            let mut ctx = ActorContext {
                link,
                self_addr: self_addr.clone(),
                sender,
                finish: false,
            };
            state = A::handle(state, &mut ctx, delivery);

            if ctx.finish {
                let dropped = {
                    let mut inner = self.inner.lock();
                    inner.closed = true;
                    inner.mailbox.drain(..).count()
                };
                if dropped > 0 {
                    warn!(actor = %self_addr, dropped, "actor finished with queued messages");
                }
                link.finish(self_addr.id);
                return;
            }

            let mut inner = self.inner.lock();
            if inner.closed {
                // Removed externally while the handler ran; the returned
                // state dies with this invocation.
                return;
            }
            match inner.mailbox.pop_front() {
                Some(next) => pending = Some(next),
                None => {
                    inner.state = Some(state);
                    return;
                }
            }
        }
    }
}

impl<A: Actor> AnyCell for ActorCell<A> {
    fn receive(
        &self,
        link: &dyn RuntimeLink,
        self_addr: ActorAddr,
        sender: ActorAddr,
        payload: Payload,
    ) {
        let state = {
            let mut inner = self.inner.lock();
            if inner.closed {
                warn!(actor = %self_addr, from = %sender, "delivery to finished actor dropped");
                return;
            }
            match inner.state.take() {
                Some(state) => state,
                None => {
                    // An invocation is in flight; it drains the mailbox
                    // before putting the state back.
                    inner.mailbox.push_back((sender, payload));
                    return;
                }
            }
        };
        self.invoke(link, self_addr, state, sender, payload);
    }

    fn type_name(&self) -> &'static str {
        A::NAME
    }

    fn state_debug(&self) -> Option<String> {
        self.inner.lock().state.as_ref().map(|s| format!("{s:?}"))
    }

    fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        inner.state = None;
        inner.mailbox.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;
    use serde::{Deserialize, Serialize};

    /// Link stub that records routed payloads instead of delivering them.
    struct RecordingLink {
        node: NodeId,
        routed: PlMutex<Vec<(ActorAddr, ActorAddr, Payload)>>,
        finished: PlMutex<Vec<ActorId>>,
        unknown: PlMutex<usize>,
    }

    impl RecordingLink {
        fn new() -> Self {
            Self {
                node: NodeId::new("test"),
                routed: PlMutex::new(Vec::new()),
                finished: PlMutex::new(Vec::new()),
                unknown: PlMutex::new(0),
            }
        }
    }

    impl RuntimeLink for RecordingLink {
        fn node(&self) -> &NodeId {
            &self.node
        }

        fn next_actor_id(&self) -> ActorId {
            ActorId::new(99)
        }

        fn install(&self, _id: ActorId, _cell: Arc<dyn AnyCell>) {}

        fn route(&self, sender: ActorAddr, receiver: ActorAddr, payload: Payload) {
            self.routed.lock().push((sender, receiver, payload));
        }

        fn finish(&self, id: ActorId) {
            self.finished.lock().push(id);
        }

        fn note_unknown_payload(&self) {
            *self.unknown.lock() += 1;
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct EchoState {
        seen: Vec<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    enum EchoProtocol {
        Start,
        Say { text: String },
        Stop,
    }

    struct Echo;

    impl Actor for Echo {
        type State = EchoState;
        type Message = EchoProtocol;
        const NAME: &'static str = "echo";

        fn handle(
            mut state: EchoState,
            ctx: &mut ActorContext<'_>,
            delivery: Delivery<EchoProtocol>,
        ) -> EchoState {
            match delivery {
                Delivery::Message(EchoProtocol::Start) => state,
                Delivery::Message(EchoProtocol::Say { text }) => {
                    state.seen.push(text);
                    state
                }
                Delivery::Message(EchoProtocol::Stop) => {
                    ctx.finish();
                    state
                }
                Delivery::Control(_) => state,
                Delivery::Unknown(_) => {
                    ctx.reply_not_understood();
                    state
                }
            }
        }
    }

    fn addr(id: u64) -> ActorAddr {
        ActorAddr::new(NodeId::new("test"), ActorId::new(id))
    }

    #[test]
    fn delivers_local_payload_to_the_handler() {
        let link = RecordingLink::new();
        let cell = ActorCell::<Echo>::new(EchoState { seen: vec![] });
        cell.receive(
            &link,
            addr(1),
            addr(2),
            Payload::local(EchoProtocol::Say {
                text: "one".to_string(),
            }),
        );
        assert_eq!(cell.state().unwrap().seen, vec!["one".to_string()]);
    }

    #[test]
    fn wire_payload_decodes_against_the_actor_protocol() {
        let link = RecordingLink::new();
        let cell = ActorCell::<Echo>::new(EchoState { seen: vec![] });
        let value = serde_json::to_value(EchoProtocol::Say {
            text: "over the wire".to_string(),
        })
        .unwrap();
        cell.receive(&link, addr(1), addr(2), Payload::Wire(value));
        assert_eq!(
            cell.state().unwrap().seen,
            vec!["over the wire".to_string()]
        );
        assert_eq!(*link.unknown.lock(), 0);
    }

    #[test]
    fn foreign_payload_takes_the_fallback_arm_and_replies() {
        #[derive(Debug, Serialize, Deserialize)]
        enum ForeignProtocol {
            Kick,
        }

        let link = RecordingLink::new();
        let cell = ActorCell::<Echo>::new(EchoState { seen: vec![] });
        cell.receive(&link, addr(1), addr(2), Payload::local(ForeignProtocol::Kick));

        assert_eq!(*link.unknown.lock(), 1);
        let routed = link.routed.lock();
        assert_eq!(routed.len(), 1);
        let (sender, receiver, payload) = &routed[0];
        assert_eq!(*sender, addr(1));
        assert_eq!(*receiver, addr(2));
        match payload {
            Payload::Control(ControlMessage::NotUnderstood { receiver }) => {
                assert_eq!(*receiver, addr(1));
            }
            other => panic!("unexpected reply: {other:?}"),
        }
        // The handler ran; the state survived the fallback untouched.
        assert_eq!(cell.state().unwrap().seen, Vec::<String>::new());
    }

    #[test]
    fn finish_closes_the_cell_and_reports_to_the_link() {
        let link = RecordingLink::new();
        let cell = ActorCell::<Echo>::new(EchoState { seen: vec![] });
        cell.receive(&link, addr(1), addr(2), Payload::local(EchoProtocol::Stop));
        assert_eq!(link.finished.lock().as_slice(), &[ActorId::new(1)]);
        assert!(cell.state().is_none());
        // Later deliveries are rejected without running the handler.
        cell.receive(
            &link,
            addr(1),
            addr(2),
            Payload::local(EchoProtocol::Say {
                text: "late".to_string(),
            }),
        );
        assert!(cell.state().is_none());
    }

    #[test]
    fn close_discards_queued_mail() {
        let cell = ActorCell::<Echo>::new(EchoState { seen: vec![] });
        cell.close();
        assert!(cell.state().is_none());
        assert_eq!(cell.type_name(), "echo");
        assert!(cell.state_debug().is_none());
    }
}
