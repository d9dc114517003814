//! Actor-Based Concurrency Core
//!
//! Isolated units of computation that communicate exclusively by typed
//! messages, locally or across cluster nodes. Each node hosts one
//! [`ActorRuntime`] owning a concurrency-safe [`ActorRegistry`] of live
//! actors; messages addressed to another node leave through a pluggable
//! [`RemoteDispatcher`] as structured [`WireEnvelope`]s.
//!
//! ```text
//! ┌───────────────────────────┐      ┌───────────────────────────┐
//! │  ActorRuntime (node "A")  │      │  ActorRuntime (node "B")  │
//! │                           │      │                           │
//! │  registry ──┬─ actor 1    │      │  registry ──┬─ actor 1    │
//! │             └─ actor 2 ───┼──────┼─────────────┘             │
//! │  scheduler                │ wire │  scheduler                │
//! └──────────┬────────────────┘      └────────────▲──────────────┘
//!            └── RemoteDispatcher ────────────────┘
//! ```
//!
//! Handlers are pure state transitions: `(state, delivery) -> state`,
//! invoked exactly once per delivered message and never concurrently for
//! the same actor. Every failure the core detects arrives back as an
//! ordinary [`ControlMessage`], never as an exception crossing actors.
//!
//! # Example
//!
//! ```rust
//! use cluster_actors::{
//!     Actor, ActorContext, ActorRuntime, Delivery, InlineScheduler, NodeId,
//!     UnroutableDispatcher,
//! };
//! use serde::{Deserialize, Serialize};
//!
//! struct Counter;
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! enum CounterProtocol {
//!     Start,
//!     Add(u64),
//! }
//!
//! impl Actor for Counter {
//!     type State = u64;
//!     type Message = CounterProtocol;
//!     const NAME: &'static str = "counter";
//!
//!     fn handle(state: u64, ctx: &mut ActorContext<'_>, delivery: Delivery<CounterProtocol>) -> u64 {
//!         match delivery {
//!             Delivery::Message(CounterProtocol::Start) => state,
//!             Delivery::Message(CounterProtocol::Add(n)) => state + n,
//!             Delivery::Control(_) => state,
//!             Delivery::Unknown(_) => {
//!                 ctx.reply_not_understood();
//!                 state
//!             }
//!         }
//!     }
//! }
//!
//! let runtime = ActorRuntime::new(NodeId::new("solo"), InlineScheduler, UnroutableDispatcher);
//! let id = runtime.spawn::<Counter>(0, CounterProtocol::Start);
//! let addr = runtime.addr_of(id);
//! runtime.dispatch(addr.clone(), addr, CounterProtocol::Add(5));
//! assert_eq!(runtime.get_actor_state::<Counter>(id), Some(5));
//! ```

pub mod actor;
pub mod address;
pub mod dispatch;
pub mod error;
pub mod messages;
pub mod registry;
pub mod runtime;
pub mod scheduler;

pub use actor::{Actor, ActorContext, AnyCell, Delivery, RuntimeLink};
pub use address::{ActorAddr, ActorId, NodeId};
pub use dispatch::{EnvelopeSink, InProcessRouter, RemoteDispatcher, UnroutableDispatcher};
pub use error::{ActorError, Result};
pub use messages::{ActorMessage, ControlMessage, Payload, UnknownPayload, WireEnvelope, WirePayload};
pub use registry::{ActorEntry, ActorOverview, ActorRegistry};
pub use runtime::{ActorRuntime, MetricsSnapshot, RuntimeMetrics};
pub use scheduler::{InlineScheduler, Scheduler, TokioScheduler};
