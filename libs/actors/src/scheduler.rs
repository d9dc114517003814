//! Handler execution strategies.
//!
//! The runtime hands every handler invocation to a [`Scheduler`] as one unit
//! of work. The contract is minimal: run it exactly once, inline or
//! deferred. Per-actor exclusivity is enforced by the actor cell, not here,
//! so swapping schedulers never changes registry or runtime semantics.

use std::sync::Arc;

/// Executes one unit of work.
pub trait Scheduler: Send + Sync + 'static {
    /// Eventually execute `work` exactly once.
    fn run(&self, work: Box<dyn FnOnce() + Send>);
}

impl<S: Scheduler + ?Sized> Scheduler for Arc<S> {
    fn run(&self, work: Box<dyn FnOnce() + Send>) {
        (**self).run(work)
    }
}

/// Runs work synchronously on the calling thread.
///
/// Deterministic: dispatch returns only after the handler, and anything it
/// dispatched locally in turn, has run. The reference scheduler for tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineScheduler;

impl Scheduler for InlineScheduler {
    fn run(&self, work: Box<dyn FnOnce() + Send>) {
        work();
    }
}

/// Defers work onto a tokio runtime's blocking pool.
///
/// Handlers are synchronous state transitions, so they run as blocking
/// tasks rather than on the async executor threads.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: tokio::runtime::Handle,
}

impl TokioScheduler {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Scheduler for the ambient tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime context.
    pub fn current() -> Self {
        Self::new(tokio::runtime::Handle::current())
    }
}

impl Scheduler for TokioScheduler {
    fn run(&self, work: Box<dyn FnOnce() + Send>) {
        self.handle.spawn_blocking(work);
    }
}
